#![warn(missing_docs)]
//! vectorcheck CLI Library
//!
//! Command line front end of the conformance harness: argument parsing,
//! configuration layering, logging setup and the worker-process entry point.
//! Binaries call [`run`] with the registry of decoders they ship.
//!
//! # Example
//!
//! ```ignore
//! use vectorcheck_core::DecoderRegistry;
//!
//! fn main() {
//!     let code = vectorcheck_cli::run(DecoderRegistry::builtin()).unwrap_or(1);
//!     std::process::exit(code);
//! }
//! ```

mod config;
#[allow(missing_docs)]
mod executor;
#[allow(missing_docs)]
mod orchestrator;
#[allow(missing_docs)]
mod planner;
#[allow(missing_docs)]
mod supervisor;

pub use config::*;
pub use executor::{
    ExecutionConfig, Executor, IsolatedExecutor, JobRunner, ResultLayout, Scheduler,
    SuccessThreshold, SuiteRun, ThresholdPolicy, ThresholdViolation, build_report,
};
pub use orchestrator::{
    ListOptions, Orchestrator, OrchestratorError, RunContext, RunOutcome, RunStatus,
};
pub use planner::{SelectionKind, Unmatched};
pub use supervisor::{Supervisor, SupervisorError, WorkerHandle};

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use vectorcheck_core::{
    Codec, DecoderRegistry, RegistryBuilder, SuiteCatalog, WorkerMain, split_path_list,
};
use vectorcheck_report::{ResultGlyphs, SummaryFormat};

/// Single-dash multi-letter flags accepted for compatibility, with the long
/// form each one is rewritten to before parsing.
const LEGACY_FLAGS: &[(&str, &str)] = &[
    ("-ts", "--testsuites"),
    ("-tv", "--testvectors"),
    ("-sv", "--skipvectors"),
    ("-ff", "--failfast"),
    ("-th", "--threshold"),
    ("-tth", "--time-threshold"),
    ("-so", "--summary-output"),
    ("-ne", "--no-emoji"),
    ("-tsd", "--test-suites-dir"),
];

/// vectorcheck CLI arguments
#[derive(Parser, Debug)]
#[command(name = "vectorcheck")]
#[command(
    author,
    version,
    about = "vectorcheck - conformance testing for video and audio decoders"
)]
pub struct Cli {
    /// Subcommand; required unless running as a worker
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory where test vectors are stored
    #[arg(short = 'r', long = "resources", global = true)]
    pub resources: Option<PathBuf>,

    /// Directory where decoder output is written
    #[arg(short = 'o', long = "output", global = true)]
    pub output: Option<PathBuf>,

    /// Plain-text result glyphs in the Markdown summary
    #[arg(long = "no-emoji", global = true)]
    pub no_emoji: bool,

    /// Test suite directories, separated like PATH entries
    #[arg(long = "test-suites-dir", global = true)]
    pub test_suites_dir: Option<String>,

    /// Configuration file (default: vectorcheck.toml found from the current directory up)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Internal: run as worker process (used by the supervisor)
    #[arg(long = "worker", hide = true)]
    pub worker: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List test suites and decoders
    List(ListArgs),
    /// Run test suites against decoders
    Run(RunArgs),
    /// Record a decoder's output as the expected results of test suites
    Reference(ReferenceArgs),
}

/// Arguments of `list`
#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Only these test suites
    #[arg(long = "testsuites", num_args = 1..)]
    pub testsuites: Vec<String>,

    /// Show the test vectors of every suite
    #[arg(long = "testvectors")]
    pub testvectors: bool,

    /// Check whether each decoder can run
    #[arg(short = 'c', long)]
    pub check: bool,

    /// Only suites and decoders of this codec
    #[arg(long)]
    pub codec: Option<Codec>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments of `run`
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Parallel jobs (default: config, then number of CPUs)
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub jobs: Option<u64>,

    /// Per-job timeout in seconds
    #[arg(short = 't', long)]
    pub timeout: Option<f64>,

    /// Stop after the first failure (requires a single job)
    #[arg(long)]
    pub failfast: bool,

    /// Print only status characters
    #[arg(short, long)]
    pub quiet: bool,

    /// Only these test suites
    #[arg(long = "testsuites", num_args = 1..)]
    pub testsuites: Vec<String>,

    /// Only these test vectors
    #[arg(long = "testvectors", num_args = 1..)]
    pub testvectors: Vec<String>,

    /// Never run these test vectors
    #[arg(long = "skipvectors", num_args = 1..)]
    pub skipvectors: Vec<String>,

    /// Only these decoders
    #[arg(short = 'd', long = "decoders", num_args = 1..)]
    pub decoders: Vec<String>,

    /// Generate a summary
    #[arg(short, long)]
    pub summary: bool,

    /// Write the summary to this file
    #[arg(long = "summary-output")]
    pub summary_output: Option<PathBuf>,

    /// Summary format: md, csv, junitxml, json
    #[arg(short = 'f', long = "format")]
    pub format: Option<SummaryFormat>,

    /// Keep decoder output files
    #[arg(short, long)]
    pub keep: bool,

    /// Minimum successes: a count (N) or a percentage (P%); exit code 2 below it
    #[arg(long)]
    pub threshold: Option<SuccessThreshold>,

    /// Maximum seconds per suite run; exit code 3 above it
    #[arg(long = "time-threshold")]
    pub time_threshold: Option<f64>,

    /// Job isolation: process or in-process
    #[arg(long)]
    pub isolation: Option<IsolationMode>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments of `reference`
#[derive(Args, Debug)]
pub struct ReferenceArgs {
    /// Decoder whose output becomes the reference
    pub decoder: String,

    /// Test suites to record
    #[arg(required = true, num_args = 1..)]
    pub testsuites: Vec<String>,

    /// Parallel jobs
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub jobs: Option<u64>,

    /// Per-job timeout in seconds
    #[arg(short = 't', long)]
    pub timeout: Option<f64>,

    /// Print only status characters
    #[arg(short, long)]
    pub quiet: bool,

    /// Job isolation: process or in-process
    #[arg(long)]
    pub isolation: Option<IsolationMode>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Rewrite legacy single-dash flags (`-ts`, `-tth`, ...) to their long forms.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(|arg| {
            let arg: OsString = arg.into();
            LEGACY_FLAGS
                .iter()
                .find(|(short, _)| arg == *short)
                .map(|(_, long)| OsString::from(*long))
                .unwrap_or(arg)
        })
        .collect()
}

/// Run the vectorcheck CLI with the process arguments.
///
/// Returns the process exit code: 0 success, 1 failure, 2 success threshold
/// violated, 3 time threshold violated.
pub fn run(registry: RegistryBuilder) -> anyhow::Result<i32> {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    run_with_cli(cli, registry)
}

/// Run the vectorcheck CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli, registry: RegistryBuilder) -> anyhow::Result<i32> {
    let verbose = match &cli.command {
        Some(Commands::List(args)) => args.verbose,
        Some(Commands::Run(args)) => args.verbose,
        Some(Commands::Reference(args)) => args.verbose,
        None => false,
    };
    init_logging(verbose);

    let config = match &cli.config {
        Some(path) => VectorcheckConfig::load(path)?,
        None => VectorcheckConfig::discover()?.unwrap_or_default(),
    };
    let registry = build_registry(registry, &config)?;

    if cli.worker {
        return run_worker_mode(registry);
    }

    let Some(command) = &cli.command else {
        Cli::command().print_help()?;
        return Ok(1);
    };

    let settings = Settings::resolve(&cli, &config);
    let catalog = SuiteCatalog::load(&settings.test_suites_dirs)?;
    for (path, problem) in catalog.problems() {
        warn!(path = %path.display(), "skipping test suite: {}", problem);
    }
    debug!(
        suites = catalog.suites().len(),
        decoders = registry.len(),
        "catalog and registry ready"
    );

    let orchestrator = Orchestrator::new(catalog, registry).with_worker_args(worker_args(&config));

    match command {
        Commands::List(args) => {
            let listing = orchestrator.list(&ListOptions {
                test_suites: args.testsuites.clone(),
                show_vectors: args.testvectors,
                check: args.check,
                codec: args.codec,
                verbose: args.verbose,
            })?;
            print!("{}", listing);
            Ok(0)
        }
        Commands::Run(args) => {
            let ctx = run_context(args, &settings, &config)?;
            Ok(orchestrator.run(&ctx)?.status.code())
        }
        Commands::Reference(args) => {
            let ctx = reference_context(args, &settings, &config)?;
            Ok(orchestrator.run(&ctx)?.status.code())
        }
    }
}

/// Initialise tracing on stderr; `RUST_LOG` overrides the default filter.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "vectorcheck=debug"
    } else {
        "vectorcheck=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Built-in decoders plus the command decoders declared in the configuration
fn build_registry(
    builder: RegistryBuilder,
    config: &VectorcheckConfig,
) -> anyhow::Result<DecoderRegistry> {
    let builder = config
        .decoders
        .iter()
        .cloned()
        .fold(builder, |builder, decoder| builder.with(decoder));
    Ok(builder.build()?)
}

/// Worker processes reload the same configuration file.
fn worker_args(config: &VectorcheckConfig) -> Vec<OsString> {
    match &config.source {
        Some(path) => vec![OsString::from("--config"), path.clone().into_os_string()],
        None => Vec::new(),
    }
}

/// Run as a worker process (IPC mode)
fn run_worker_mode(registry: DecoderRegistry) -> anyhow::Result<i32> {
    let mut worker = WorkerMain::new(registry);
    worker
        .run()
        .map_err(|e| anyhow::anyhow!("Worker error: {}", e))?;
    Ok(0)
}

/// Paths and output settings shared by every subcommand, layered
/// CLI flag > configuration file > default.
struct Settings {
    test_suites_dirs: Vec<PathBuf>,
    resources_dir: PathBuf,
    output_dir: PathBuf,
    glyphs: ResultGlyphs,
}

impl Settings {
    fn resolve(cli: &Cli, config: &VectorcheckConfig) -> Self {
        let test_suites_dirs = cli
            .test_suites_dir
            .as_deref()
            .map(split_path_list)
            .unwrap_or_else(|| config.paths.test_suites_dirs.clone());
        let glyphs = if cli.no_emoji || !config.output.emoji {
            ResultGlyphs::Text
        } else {
            ResultGlyphs::Emoji
        };
        Self {
            test_suites_dirs,
            resources_dir: cli
                .resources
                .clone()
                .unwrap_or_else(|| config.paths.resources_dir.clone()),
            output_dir: cli
                .output
                .clone()
                .unwrap_or_else(|| config.paths.output_dir.clone()),
            glyphs,
        }
    }
}

fn resolve_jobs(cli_jobs: Option<u64>, config: &VectorcheckConfig) -> usize {
    cli_jobs
        .map(|j| j as usize)
        .or(config.runner.jobs)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
        .max(1)
}

/// Timeouts travel to workers in nanoseconds, so they must fit a `u64`.
fn resolve_timeout(cli_secs: Option<f64>, config: &VectorcheckConfig) -> anyhow::Result<Duration> {
    let Some(secs) = cli_secs else {
        return Ok(Duration::from_nanos(config.timeout_ns()?));
    };
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero() && u64::try_from(d.as_nanos()).is_ok())
        .ok_or_else(|| anyhow::anyhow!("Invalid timeout: {}", secs))
}

fn resolve_time_threshold(secs: Option<f64>) -> anyhow::Result<Option<f64>> {
    match secs {
        Some(secs) if !(secs.is_finite() && secs >= 0.0) => {
            Err(anyhow::anyhow!("Invalid time threshold: {}", secs))
        }
        other => Ok(other),
    }
}

fn run_context(
    args: &RunArgs,
    settings: &Settings,
    config: &VectorcheckConfig,
) -> anyhow::Result<RunContext> {
    let summary_format = match args.format {
        Some(format) => format,
        None => config
            .output
            .summary_format
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?,
    };
    Ok(RunContext {
        jobs: resolve_jobs(args.jobs, config),
        timeout: resolve_timeout(args.timeout, config)?,
        failfast: args.failfast,
        quiet: args.quiet,
        reference: false,
        summary: args.summary || args.summary_output.is_some(),
        summary_output: args.summary_output.clone(),
        summary_format,
        glyphs: settings.glyphs,
        test_suites: args.testsuites.clone(),
        decoders: args.decoders.clone(),
        test_vectors: args.testvectors.clone(),
        skip_vectors: args.skipvectors.clone(),
        keep_files: args.keep,
        thresholds: ThresholdPolicy {
            success: args.threshold,
            time: resolve_time_threshold(args.time_threshold)?,
        },
        verbose: args.verbose,
        isolation: args.isolation.unwrap_or(config.runner.isolation),
        resources_dir: settings.resources_dir.clone(),
        output_dir: settings.output_dir.clone(),
    })
}

fn reference_context(
    args: &ReferenceArgs,
    settings: &Settings,
    config: &VectorcheckConfig,
) -> anyhow::Result<RunContext> {
    Ok(RunContext {
        jobs: resolve_jobs(args.jobs, config),
        timeout: resolve_timeout(args.timeout, config)?,
        quiet: args.quiet,
        reference: true,
        glyphs: settings.glyphs,
        test_suites: args.testsuites.clone(),
        decoders: vec![args.decoder.clone()],
        verbose: args.verbose,
        isolation: args.isolation.unwrap_or(config.runner.isolation),
        resources_dir: settings.resources_dir.clone(),
        output_dir: settings.output_dir.clone(),
        ..RunContext::default()
    })
}
