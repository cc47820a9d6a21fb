use clap::{Parser, Subcommand};
use fileforge_common::FileCategory;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fileforge")]
#[command(author, version, about = "Batch file format converter")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by `convert` and `batch`.
#[derive(clap::Args, Debug, Default)]
pub struct ConvertArgs {
    /// Quality from 1 to 100
    #[arg(short, long)]
    pub quality: Option<u8>,

    /// Replace existing output files
    #[arg(long)]
    pub overwrite: bool,

    /// Delete each source once its output has been verified
    #[arg(long)]
    pub delete_original: bool,

    /// Extra conversion option as key=value (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a single file
    Convert {
        /// Source file
        #[arg(required = true)]
        input: PathBuf,

        /// Destination file; its extension selects the output format
        #[arg(required = true)]
        output: PathBuf,

        #[command(flatten)]
        args: ConvertArgs,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert every matching file in a directory
    Batch {
        /// Input directory
        #[arg(required = true)]
        input: PathBuf,

        /// Target format, e.g. webp or mp3
        #[arg(short, long)]
        to: String,

        /// Output directory (default: <input>_converted next to the input)
        #[arg(short, long)]
        output_folder: Option<PathBuf>,

        /// Glob or comma-separated extensions, e.g. "*.png" or "jpg,png"
        #[arg(short, long)]
        pattern: Option<String>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Number of worker threads
        #[arg(short, long)]
        workers: Option<usize>,

        /// Only convert files of this category
        #[arg(long)]
        category: Option<FileCategory>,

        #[command(flatten)]
        args: ConvertArgs,

        /// Print the batch result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show what fileforge knows about a file
    Info {
        /// File to inspect
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List supported input and output formats
    Formats {
        /// Only show this category
        #[arg(long)]
        category: Option<FileCategory>,
    },

    /// Check that external conversion tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))
}
