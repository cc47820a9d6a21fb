//! External tool detection and bounded execution.

use crate::{CodecError, Result};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Default time budget for a single external conversion.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Information about an external tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Where to find external tools and how long to let them run.
///
/// Unset paths fall back to a `PATH` lookup at conversion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub soffice: Option<PathBuf>,
    pub pandoc: Option<PathBuf>,
    pub pdftotext: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: None,
            ffprobe: None,
            soffice: None,
            pandoc: None,
            pdftotext: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Check if a tool is available and get its information.
///
/// # Example
///
/// ```no_run
/// use fileforge_codecs::check_tool;
///
/// let info = check_tool("pandoc");
/// if info.available {
///     println!("pandoc version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(name: &str) -> ToolInfo {
    check_tool_with_arg(name, "--version")
}

/// Check if a tool is available using a custom version argument.
pub fn check_tool_with_arg(name: &str, version_arg: &str) -> ToolInfo {
    let result = Command::new(name)
        .arg(version_arg)
        .stdin(Stdio::null())
        .output();

    match result {
        Ok(output) if output.status.success() => {
            // pdftotext prints its version on stderr
            let text = if output.stdout.is_empty() {
                &output.stderr
            } else {
                &output.stdout
            };
            let version = String::from_utf8_lossy(text)
                .lines()
                .next()
                .map(|s| s.trim().to_string());

            ToolInfo {
                name: name.to_string(),
                available: true,
                version,
                path: which::which(name).ok(),
            }
        }
        _ => ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check every external tool the adapters can use.
///
/// Returns information about ffmpeg, ffprobe, soffice, pandoc and pdftotext.
pub fn check_tools() -> Vec<ToolInfo> {
    vec![
        check_tool_with_arg("ffmpeg", "-version"),
        check_tool_with_arg("ffprobe", "-version"),
        check_tool("soffice"),
        check_tool("pandoc"),
        check_tool_with_arg("pdftotext", "-v"),
    ]
}

/// Require that a tool is available, returning its path.
///
/// # Errors
///
/// Returns an error if the tool is not found.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| CodecError::tool_not_found(name))
}

/// Get the path to a tool, preferring a configured path over PATH lookup.
pub fn get_tool_path(name: &str, config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
    }

    require_tool(name)
}

/// Captured result of a finished tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    /// Last non-empty stderr line, which is where most tools put the reason.
    pub fn error_message(&self) -> String {
        let stderr = String::from_utf8_lossy(&self.stderr);
        stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.trim().to_string())
            .unwrap_or_else(|| format!("exited with {}", self.status))
    }
}

/// Run `command` to completion, killing it once `timeout` elapses.
///
/// Output pipes are drained on helper threads so a chatty tool cannot
/// block on a full pipe while we wait for it. A non-zero exit status is
/// returned as [`CodecError::ToolFailed`].
pub fn run_with_timeout(mut command: Command, tool: &str, timeout: Duration) -> Result<ToolOutput> {
    #[cfg(feature = "tracing")]
    tracing::debug!("Running {}: {:?}", tool, command);

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CodecError::tool_not_found(tool)
            } else {
                CodecError::Io(e)
            }
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();

            #[cfg(feature = "tracing")]
            tracing::warn!("{} exceeded {:?}, killed", tool, timeout);

            return Err(CodecError::Timeout {
                tool: tool.to_string(),
                secs: timeout.as_secs(),
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let output = ToolOutput {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    };

    if !output.status.success() {
        return Err(CodecError::tool_failed(tool, output.error_message()));
    }

    Ok(output)
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_tool_not_found() {
        let info = check_tool("nonexistent_tool_12345");
        assert!(!info.available);
        assert!(info.version.is_none());
        assert!(info.path.is_none());
    }

    #[test]
    fn test_get_tool_path_missing() {
        let err = get_tool_path("nonexistent_tool_12345", Some(Path::new("/no/such/bin"))).unwrap_err();
        assert!(matches!(err, CodecError::ToolNotFound { tool } if tool == "nonexistent_tool_12345"));
    }

    #[test]
    fn test_run_missing_tool() {
        let err = run_with_timeout(
            Command::new("nonexistent_tool_12345"),
            "nonexistent_tool_12345",
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::ToolNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_kills_on_timeout() {
        let mut command = Command::new("sh");
        command.args(["-c", "sleep 5"]);

        let started = Instant::now();
        let err = run_with_timeout(command, "sh", Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, CodecError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_failure_message() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo 'bad input' >&2; exit 3"]);

        let err = run_with_timeout(command, "sh", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, CodecError::ToolFailed { message, .. } if message == "bad input"));
    }

    #[test]
    fn test_default_settings() {
        let settings = ToolSettings::default();
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
        assert!(settings.ffmpeg.is_none());
    }
}
