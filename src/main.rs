mod cli;

use fileforge::batch::{BatchEngine, BatchHandle, BatchResult, BatchSpec};
use fileforge::config::{self, Config};
use fileforge::pipeline::{ConversionJob, ConversionOutcome, ValidationPipeline};
use fileforge::progress::{ProgressEvent, ProgressReporter};
use fileforge_codecs::{AdapterRegistry, ConversionOptions};
use fileforge_common::paths::extensions_for;
use fileforge_common::{FileCategory, FileDescriptor, FormatTag};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ConvertArgs};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "fileforge=debug,fileforge_codecs=debug,fileforge_common=debug".to_string()
        } else {
            "fileforge=warn,fileforge_codecs=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert {
            input,
            output,
            args,
            json,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            convert_file(&config, &input, &output, &args, json)
        }
        Commands::Batch {
            input,
            to,
            output_folder,
            pattern,
            recursive,
            workers,
            category,
            args,
            json,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let target = FormatTag::new(&to).with_context(|| format!("Invalid target format {to:?}"))?;
            let mut spec = BatchSpec::new(input, target)
                .recursive(recursive || config.batch.recursive)
                .with_options(conversion_options(&config, &args)?)
                .delete_original(args.delete_original || config.batch.delete_original)
                .with_max_input_bytes(config.limits.max_input_bytes);
            spec.output_root = output_folder;
            spec.output_suffix = config.batch.output_suffix.clone();
            spec.pattern = pattern.or_else(|| config.batch.pattern.clone());
            spec.workers = workers.or(config.batch.workers);
            spec.category = category;
            run_batch(&config, spec, json)
        }
        Commands::Info { file, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            info_file(&config, &file, json)
        }
        Commands::Formats { category } => {
            list_formats(category);
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("fileforge {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Config defaults with command-line overrides applied on top.
fn conversion_options(config: &Config, args: &ConvertArgs) -> Result<ConversionOptions> {
    let mut options = config.conversion.clone();
    if args.quality.is_some() {
        options.quality = args.quality;
    }
    options.overwrite |= args.overwrite || config.batch.overwrite;
    options.delete_original |= args.delete_original;

    for (key, value) in &args.set {
        let known = options
            .set(key, value)
            .with_context(|| format!("Invalid value for {key}"))?;
        if !known {
            tracing::warn!("Ignoring unknown option {:?}", key);
        }
    }

    options.validate()?;
    Ok(options)
}

fn convert_file(
    config: &Config,
    input: &Path,
    output: &Path,
    args: &ConvertArgs,
    json: bool,
) -> Result<ExitCode> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let registry = AdapterRegistry::with_defaults(&config.tools.settings());
    let options = conversion_options(config, args)?;
    let job = ConversionJob::for_path(input, output, options, &registry)
        .with_context(|| format!("Cannot convert {}", input.display()))?;
    let pipeline = ValidationPipeline::new().with_max_input_bytes(config.limits.max_input_bytes);

    tracing::info!("Converting {:?} -> {:?}", input, output);
    let outcome = job.run(&pipeline);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_outcome(outcome: &ConversionOutcome) {
    for record in &outcome.checkpoints {
        let status = if record.passed { "✓" } else { "✗" };
        print!("{} {}", status, record.checkpoint);
        if let Some(ref message) = record.message {
            print!(": {}", message);
        }
        println!();
    }

    if outcome.success {
        println!("\nConverted in {:.2?}: {}", outcome.elapsed, outcome.destination.display());
        if outcome.original_removed {
            println!("Removed original {}", outcome.source.display());
        }
    } else if let Some(kind) = outcome.error {
        println!("\nConversion failed ({})", kind);
    }
}

/// Progress bar driven by batch events.
struct BarReporter {
    bar: ProgressBar,
}

impl ProgressReporter for BarReporter {
    fn emit(&self, event: ProgressEvent) {
        if self.bar.length() != Some(event.total as u64) {
            self.bar.set_length(event.total as u64);
        }
        self.bar.set_position(event.completed as u64);
        self.bar.set_message(event.filename.clone());
        if !event.success {
            self.bar
                .println(format!("✗ {}: {}", event.filename, event.summary));
        }
    }
}

fn run_batch(config: &Config, spec: BatchSpec, json: bool) -> Result<ExitCode> {
    let registry = AdapterRegistry::with_defaults(&config.tools.settings());
    let engine = BatchEngine::new(registry);

    let bar = if json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.blue} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );
        bar
    };
    let reporter = Arc::new(BarReporter { bar: bar.clone() });

    let handle = engine.spawn(spec, reporter)?;
    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(wait_or_cancel(handle))?;
    bar.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_batch_summary(&result);
    }

    Ok(if result.failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Wait for the batch, turning Ctrl-C into a cooperative cancel.
async fn wait_or_cancel(handle: BatchHandle) -> Result<BatchResult> {
    let token = handle.cancel_token();
    let mut waiter = tokio::task::spawn_blocking(move || handle.wait());

    tokio::select! {
        joined = &mut waiter => return Ok(joined??),
        Ok(()) = tokio::signal::ctrl_c() => {
            eprintln!("Cancelling, waiting for running conversions to finish...");
            token.cancel();
        }
    }

    Ok(waiter.await??)
}

fn print_batch_summary(result: &BatchResult) {
    for entry in result.failures() {
        let message = entry
            .outcome
            .as_ref()
            .map(ConversionOutcome::summary)
            .unwrap_or_default();
        println!("✗ {}: {}", entry.source.display(), message);
    }

    println!();
    println!("Files found:  {}", result.total);
    println!("Converted:    {}", result.successful);
    println!("Failed:       {}", result.failed);
    println!("Skipped:      {}", result.skipped);
    for (reason, count) in result.skipped_by_reason() {
        println!("  {}: {}", reason, count);
    }
    println!(
        "Duration:     {:.1?} ({} -> {} bytes)",
        result.duration,
        result.bytes_in(),
        result.bytes_out()
    );
    if result.cancelled {
        println!("Batch was cancelled before all files were processed.");
    }
}

fn info_file(config: &Config, file: &Path, json: bool) -> Result<ExitCode> {
    let descriptor = FileDescriptor::snapshot(file)
        .with_context(|| format!("Cannot read {}", file.display()))?;
    let registry = AdapterRegistry::with_defaults(&config.tools.settings());
    let summary = registry
        .get(descriptor.category)
        .map(|adapter| adapter.inspect(file))
        .transpose();
    let summary = match summary {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!("Could not inspect {:?}: {}", file, e);
            None
        }
    };

    if json {
        let value = serde_json::json!({
            "file": descriptor,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("File: {}", descriptor.path.display());
    println!("Category: {}", descriptor.category);
    println!("Format: {}", descriptor.format);
    println!("Size: {} bytes", descriptor.size);
    if let Some(modified) = descriptor.modified {
        println!("Modified: {}", modified.to_rfc3339());
    }
    if let Some(summary) = summary {
        if let Some((w, h)) = summary.dimensions() {
            println!("Dimensions: {}x{}", w, h);
        }
        if let Some(duration) = summary.duration {
            let secs = duration as u64;
            println!("Duration: {:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60);
        }
        if let Some(pages) = summary.pages {
            println!("Pages: {}", pages);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn list_formats(category: Option<FileCategory>) {
    let registry = AdapterRegistry::with_defaults(&Default::default());
    let categories = match category {
        Some(category) => vec![category],
        None => FileCategory::KNOWN.to_vec(),
    };

    for category in categories {
        println!("{}:", category);
        println!("  recognised: {}", extensions_for(category).join(", "));
        if let Some(adapter) = registry.get(category) {
            println!("  reads:      {}", adapter.input_formats().join(", "));
            println!("  writes:     {}", adapter.output_formats().join(", "));
        }
    }
}

fn check_tools() -> Result<ExitCode> {
    println!("Checking external tools...\n");

    let tools = fileforge_codecs::check_tools();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All external tools are available!");
    } else {
        println!("Some tools are missing. Image conversion works without them.");
    }

    Ok(ExitCode::SUCCESS)
}

fn validate_config(path: Option<&Path>) -> Result<ExitCode> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };
    config::validate_config(&config)?;

    println!("✓ Configuration is valid");
    match config.batch.workers {
        Some(workers) => println!("  Workers: {}", workers),
        None => println!("  Workers: {} (automatic)", num_cpus::get() * 2),
    }
    println!("  Recursive: {}", config.batch.recursive);
    println!("  Overwrite: {}", config.batch.overwrite);
    println!("  Output suffix: {}", config.batch.output_suffix);
    println!("  Tool timeout: {}s", config.tools.timeout_secs);
    if let Some(limit) = config.limits.max_input_bytes {
        println!("  Max input size: {} bytes", limit);
    }

    Ok(ExitCode::SUCCESS)
}
