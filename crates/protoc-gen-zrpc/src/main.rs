//! protoc-gen-zrpc - Generate RPC bindings from Protocol Buffer services
//!
//! Without `--descriptor-set` this runs as a protoc plugin: the encoded
//! request is read from stdin and the response written to stdout. With it,
//! bindings are generated offline from a descriptor set and written to disk.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, Level};
use tracing_subscriber::EnvFilter;
use zrpc_codegen::config::parse_targets;
use zrpc_codegen::{plugin, GeneratedFile, GeneratorConfig};

/// Generate RPC client, server and UI bindings from Protocol Buffer services
#[derive(Parser, Debug)]
#[command(name = "protoc-gen-zrpc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Encoded FileDescriptorSet to generate from instead of stdin
    /// (protoc --include_imports --descriptor_set_out=...)
    #[arg(long)]
    descriptor_set: Option<PathBuf>,

    /// Output directory for generated units
    #[arg(short, long, default_value = ".", requires = "descriptor_set")]
    output: PathBuf,

    /// Schema file to generate (repeatable; default: every file with services or telemetry)
    #[arg(short, long = "file", requires = "descriptor_set")]
    files: Vec<String>,

    /// Targets to generate: client, server, ui or all
    #[arg(
        short,
        long,
        env = "ZRPC_TARGET",
        value_delimiter = ',',
        default_value = "all"
    )]
    target: Vec<String>,

    /// Directory searched for `.options` sidecar files (repeatable)
    #[arg(short = 'I', long = "include")]
    include: Vec<PathBuf>,

    /// Rust path of the prost-generated message types, seen from the generated module
    #[arg(long)]
    pb_module: Option<String>,

    /// Crate name generated code uses for runtime support
    #[arg(long)]
    runtime: Option<String>,

    /// Device id the generated UI starts with
    #[arg(long)]
    device_id: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Dry run - don't write files, just show what would be generated
    #[arg(long, requires = "descriptor_set")]
    dry_run: bool,

    /// Overwrite existing files whose content differs
    #[arg(long, requires = "descriptor_set")]
    force: bool,
}

impl Cli {
    /// Generator settings from the command line
    fn generator_config(&self) -> Result<GeneratorConfig> {
        let mut targets = Vec::new();
        for value in &self.target {
            targets.extend(parse_targets(value)?);
        }

        let mut config = GeneratorConfig::new().targets(targets);
        for path in &self.include {
            config = config.include_path(path);
        }
        if let Some(ref pb_module) = self.pb_module {
            config = config.pb_module(pb_module);
        }
        if let Some(ref runtime) = self.runtime {
            config = config.runtime_crate(runtime);
        }
        if let Some(ref device_id) = self.device_id {
            config = config.default_device_id(device_id);
        }
        Ok(config)
    }
}

/// Outcome of writing one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOutcome {
    Written,
    Unchanged,
}

#[derive(Debug, Default)]
struct WriteStats {
    generated: usize,
    written: usize,
    unchanged: usize,
    failed: usize,
}

impl WriteStats {
    fn print_summary(&self) {
        info!(
            "Summary: {} generated, {} written, {} unchanged, {} failed",
            self.generated, self.written, self.unchanged, self.failed
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout carries the plugin response
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.descriptor_set {
        Some(ref descriptor_set) => run_offline(&cli, descriptor_set),
        None => run_plugin(),
    }
}

/// Plugin mode: one request on stdin, one response on stdout
fn run_plugin() -> Result<()> {
    let mut input = Vec::new();
    std::io::stdin()
        .read_to_end(&mut input)
        .context("Failed to read plugin request from stdin")?;
    debug!("Read {} byte request", input.len());

    let output = plugin::run(&input).context("Failed to decode plugin request")?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&output)
        .context("Failed to write plugin response")?;
    stdout.flush().context("Failed to flush plugin response")?;
    Ok(())
}

/// Offline mode: descriptor set in, units written under `--output`
fn run_offline(cli: &Cli, descriptor_set: &Path) -> Result<()> {
    if !descriptor_set.is_file() {
        bail!(
            "Descriptor set does not exist: {}",
            descriptor_set.display()
        );
    }

    let config = cli.generator_config()?;
    let data = fs::read(descriptor_set).with_context(|| {
        format!(
            "Failed to read descriptor set: {}",
            descriptor_set.display()
        )
    })?;

    let units = plugin::generate_from_descriptor_set(&data, &cli.files, &config)
        .with_context(|| format!("Generation failed for {}", descriptor_set.display()))?;
    if units.is_empty() {
        info!("Nothing to generate in {}", descriptor_set.display());
        return Ok(());
    }

    let mut stats = WriteStats::default();
    for unit in &units {
        stats.generated += 1;

        if cli.dry_run {
            let path = unit.output_path(&cli.output)?;
            println!("Would write: {}", path.display());
            if cli.verbose > 0 {
                println!("---");
                println!("{}", unit.content);
                println!("---");
            }
            continue;
        }

        match write_unit(&cli.output, unit, cli.force) {
            Ok((path, WriteOutcome::Written)) => {
                println!("Wrote {}", path.display());
                stats.written += 1;
            }
            Ok((path, WriteOutcome::Unchanged)) => {
                debug!("Unchanged: {}", path.display());
                stats.unchanged += 1;
            }
            Err(e) => {
                error!("Failed to write {}: {:#}", unit.name, e);
                stats.failed += 1;
            }
        }
    }

    if !cli.dry_run {
        stats.print_summary();
    }
    if stats.failed > 0 {
        bail!("{} of {} unit(s) could not be written", stats.failed, stats.generated);
    }
    Ok(())
}

/// Content hash used to detect unchanged output
fn content_hash(content: &[u8]) -> blake3::Hash {
    blake3::hash(content)
}

/// Writes a unit unless an identical file is already in place
fn write_unit(
    output_dir: &Path,
    unit: &GeneratedFile,
    force: bool,
) -> Result<(PathBuf, WriteOutcome)> {
    let path = unit.output_path(output_dir)?;

    if path.exists() {
        let existing = fs::read(&path)
            .with_context(|| format!("Failed to read existing file: {}", path.display()))?;
        if content_hash(&existing) == content_hash(unit.content.as_bytes()) {
            return Ok((path, WriteOutcome::Unchanged));
        }
        if !force {
            bail!(
                "File already exists with different content: {} (use --force to overwrite)",
                path.display()
            );
        }
    }

    let path = unit.write_to(output_dir)?;
    Ok((path, WriteOutcome::Written))
}
