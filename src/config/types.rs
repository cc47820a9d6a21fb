use fileforge_codecs::{ConversionOptions, ToolSettings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub batch: BatchConfig,

    /// Defaults applied to every conversion before command-line overrides.
    #[serde(default)]
    pub conversion: ConversionOptions,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Worker threads; defaults to twice the available parallelism
    #[serde(default)]
    pub workers: Option<usize>,

    #[serde(default)]
    pub recursive: bool,

    #[serde(default)]
    pub overwrite: bool,

    #[serde(default)]
    pub delete_original: bool,

    /// Glob or comma-separated extension list applied to file names
    #[serde(default)]
    pub pattern: Option<String>,

    /// Suffix for the default output folder (`<input>_converted`)
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
}

fn default_output_suffix() -> String {
    "_converted".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: None,
            recursive: false,
            overwrite: false,
            delete_original: false,
            pattern: None,
            output_suffix: default_output_suffix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    #[serde(default)]
    pub soffice_path: Option<PathBuf>,

    #[serde(default)]
    pub pandoc_path: Option<PathBuf>,

    #[serde(default)]
    pub pdftotext_path: Option<PathBuf>,

    /// Seconds an external tool may run before it is killed
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            soffice_path: None,
            pandoc_path: None,
            pdftotext_path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ToolsConfig {
    /// Tool settings handed to the codec adapters.
    pub fn settings(&self) -> ToolSettings {
        ToolSettings {
            ffmpeg: self.ffmpeg_path.clone(),
            ffprobe: self.ffprobe_path.clone(),
            soffice: self.soffice_path.clone(),
            pandoc: self.pandoc_path.clone(),
            pdftotext: self.pdftotext_path.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Sources larger than this fail input validation
    #[serde(default)]
    pub max_input_bytes: Option<u64>,
}
