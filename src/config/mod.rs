mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./fileforge.toml",
        "./config.toml",
        "~/.config/fileforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.batch.workers == Some(0) {
        anyhow::bail!("batch.workers must be at least 1");
    }

    if config.batch.output_suffix.is_empty() {
        anyhow::bail!("batch.output_suffix cannot be empty");
    }

    if config.tools.timeout_secs == 0 {
        anyhow::bail!("tools.timeout_secs must be at least 1");
    }

    config
        .conversion
        .validate()
        .context("Invalid [conversion] defaults")?;

    if config.limits.max_input_bytes == Some(0) {
        tracing::warn!("limits.max_input_bytes is 0; every file will be rejected");
    }

    for (name, path) in [
        ("ffmpeg_path", &config.tools.ffmpeg_path),
        ("ffprobe_path", &config.tools.ffprobe_path),
        ("soffice_path", &config.tools.soffice_path),
        ("pandoc_path", &config.tools.pandoc_path),
        ("pdftotext_path", &config.tools.pdftotext_path),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                tracing::warn!("tools.{} does not exist: {:?}", name, path);
            }
        }
    }

    Ok(())
}
