//! Run Orchestrator
//!
//! Drives one invocation: select suites and decoders, validate the request,
//! run every matching suite × decoder pair, then report.
//!
//! ```text
//! Selecting ──▶ Validating ──▶ Running (pair by pair) ──▶ Reporting
//!                                  │
//!                                  ├─ fail-fast ─────────▶ exit 1
//!                                  └─ threshold broken ──▶ exit 2 / 3
//! ```

use crate::config::IsolationMode;
use crate::executor::{
    ExecutionConfig, Executor, IsolatedExecutor, JobRunner, ResultLayout, Scheduler, SuiteRun,
    ThresholdPolicy, ThresholdViolation, build_report, format_run_banner, format_run_footer,
};
use crate::planner::{self, SelectionKind, Unmatched, VectorFilter};
use crate::supervisor::{Supervisor, SupervisorError};
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use vectorcheck_core::{
    CatalogError, Codec, DecoderRegistry, JobSettings, RegisteredDecoder, SuiteCatalog, TestSuite,
};
use vectorcheck_report::{ReportConfig, ResultGlyphs, SummaryError, SummaryFormat, render_summary};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Selection(#[from] Unmatched),

    #[error("Fail fast (--failfast) requires a single job, got {jobs} jobs")]
    FailfastParallel { jobs: usize },

    #[error("Only one decoder can be the reference. Given: {}", .0.join(", "))]
    ReferenceDecoders(Vec<String>),

    #[error(
        "Only one test suite can be checked against a success threshold. Given: {}",
        .0.join(", ")
    )]
    ThresholdSuites(Vec<String>),

    #[error("Summary format {0} requires an output file (--summary-output)")]
    SummaryOutputRequired(&'static str),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Failed to render summary: {0}")]
    Summary(#[from] SummaryError),

    #[error(transparent)]
    Worker(#[from] SupervisorError),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> OrchestratorError + '_ {
    move |source| OrchestratorError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Everything one `run` or `reference` invocation was asked to do
#[derive(Debug, Clone)]
pub struct RunContext {
    pub jobs: usize,
    pub timeout: Duration,
    pub failfast: bool,
    /// Status characters only, no per-vector lines
    pub quiet: bool,
    pub reference: bool,
    pub summary: bool,
    pub summary_output: Option<PathBuf>,
    pub summary_format: SummaryFormat,
    pub glyphs: ResultGlyphs,
    pub test_suites: Vec<String>,
    pub decoders: Vec<String>,
    pub test_vectors: Vec<String>,
    pub skip_vectors: Vec<String>,
    pub keep_files: bool,
    pub thresholds: ThresholdPolicy,
    pub verbose: bool,
    pub isolation: IsolationMode,
    pub resources_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            jobs: 1,
            timeout: Duration::from_secs(30),
            failfast: false,
            quiet: false,
            reference: false,
            summary: false,
            summary_output: None,
            summary_format: SummaryFormat::default(),
            glyphs: ResultGlyphs::default(),
            test_suites: Vec::new(),
            decoders: Vec::new(),
            test_vectors: Vec::new(),
            skip_vectors: Vec::new(),
            keep_files: false,
            thresholds: ThresholdPolicy::default(),
            verbose: false,
            isolation: IsolationMode::default(),
            resources_dir: PathBuf::from("resources"),
            output_dir: std::env::temp_dir().join("vectorcheck_output"),
        }
    }
}

/// How the invocation ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Success,
    /// Failures without a configured threshold, fail-fast, or nothing ran
    Failure,
    BelowThreshold(ThresholdViolation),
    OverTime(ThresholdViolation),
}

impl RunStatus {
    /// Process exit code
    pub fn code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failure => 1,
            RunStatus::BelowThreshold(_) => 2,
            RunStatus::OverTime(_) => 3,
        }
    }
}

impl From<ThresholdViolation> for RunStatus {
    fn from(violation: ThresholdViolation) -> Self {
        match violation {
            ThresholdViolation::Success { .. } => RunStatus::BelowThreshold(violation),
            ThresholdViolation::Time { .. } => RunStatus::OverTime(violation),
        }
    }
}

/// Final state of an invocation
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Finished suite × decoder runs, in execution order
    pub runs: Vec<SuiteRun>,
}

/// Options of the `list` command
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub test_suites: Vec<String>,
    pub show_vectors: bool,
    pub check: bool,
    pub codec: Option<Codec>,
    pub verbose: bool,
}

pub struct Orchestrator {
    catalog: SuiteCatalog,
    registry: DecoderRegistry,
    worker_binary: Option<PathBuf>,
    worker_args: Vec<OsString>,
}

impl Orchestrator {
    pub fn new(catalog: SuiteCatalog, registry: DecoderRegistry) -> Self {
        Self {
            catalog,
            registry,
            worker_binary: None,
            worker_args: Vec::new(),
        }
    }

    /// Worker processes run `binary` (default: the current executable).
    pub fn with_worker_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.worker_binary = Some(binary.into());
        self
    }

    /// Arguments passed to every worker after `--worker`
    pub fn with_worker_args(mut self, args: Vec<OsString>) -> Self {
        self.worker_args = args;
        self
    }

    pub fn catalog(&self) -> &SuiteCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    fn runner(&self, isolation: IsolationMode) -> Result<Box<dyn JobRunner>, OrchestratorError> {
        Ok(match isolation {
            IsolationMode::InProcess => Box::new(Executor::new(self.registry.clone())),
            IsolationMode::Process => {
                let supervisor = match &self.worker_binary {
                    Some(binary) => Supervisor::new(binary.clone(), self.worker_args.clone()),
                    None => Supervisor::current_exe(self.worker_args.clone())?,
                };
                Box::new(IsolatedExecutor::new(supervisor))
            }
        })
    }

    fn validate(ctx: &RunContext) -> Result<(), OrchestratorError> {
        if ctx.failfast && ctx.jobs > 1 {
            return Err(OrchestratorError::FailfastParallel { jobs: ctx.jobs });
        }
        if ctx.reference && ctx.decoders.len() != 1 {
            return Err(OrchestratorError::ReferenceDecoders(ctx.decoders.clone()));
        }
        if ctx.summary
            && ctx.summary_format.requires_output_file()
            && ctx.summary_output.is_none()
        {
            return Err(OrchestratorError::SummaryOutputRequired(ctx.summary_format.as_str()));
        }
        Ok(())
    }

    /// Run every matching suite × decoder pair.
    ///
    /// Selection and precondition errors are returned before any job runs.
    pub fn run(&self, ctx: &RunContext) -> Result<RunOutcome, OrchestratorError> {
        Self::validate(ctx)?;

        let suites = planner::select_by_name(
            self.catalog.suites(),
            &ctx.test_suites,
            SelectionKind::TestSuite,
            |s| s.name.as_str(),
        )?;
        let decoders = planner::select_by_name(
            self.registry.iter(),
            &ctx.decoders,
            SelectionKind::Decoder,
            |d| d.name(),
        )?;
        if ctx.thresholds.success.is_some() && suites.len() > 1 {
            return Err(OrchestratorError::ThresholdSuites(
                suites.iter().map(|s| s.name.clone()).collect(),
            ));
        }
        planner::check_vectors_exist(&suites, &ctx.test_vectors)?;

        let runner = self.runner(ctx.isolation)?;

        if ctx.reference {
            println!("\n=== Reference mode ===\n");
        }

        let mut runs = Vec::new();
        let mut failed = false;

        for suite in &suites {
            for decoder in decoders.iter().filter(|d| d.codec() == suite.codec) {
                let Some(run) = self.run_pair(suite, decoder, ctx, runner.as_ref())? else {
                    continue;
                };
                let has_failures = run.has_failures();
                let violation = ctx.thresholds.check(&run);
                runs.push(run);

                if has_failures {
                    failed = true;
                    if ctx.failfast {
                        info!("fail-fast: aborting after first failing run");
                        self.finish(ctx, &runs)?;
                        return Ok(RunOutcome {
                            status: RunStatus::Failure,
                            runs,
                        });
                    }
                }

                if let Some(violation) = violation {
                    println!("{}", violation);
                    self.finish(ctx, &runs)?;
                    return Ok(RunOutcome {
                        status: violation.into(),
                        runs,
                    });
                }
            }
        }

        self.finish(ctx, &runs)?;

        let status = if runs.is_empty() {
            warn!("no test was run");
            RunStatus::Failure
        } else if failed && !ctx.thresholds.is_configured() {
            RunStatus::Failure
        } else {
            RunStatus::Success
        };
        Ok(RunOutcome { status, runs })
    }

    /// Run one pair; `None` when the pair was skipped.
    fn run_pair(
        &self,
        suite: &TestSuite,
        decoder: &RegisteredDecoder,
        ctx: &RunContext,
        runner: &dyn JobRunner,
    ) -> Result<Option<SuiteRun>, OrchestratorError> {
        if !decoder.is_available(ctx.verbose) {
            warn!(decoder = decoder.name(), "decoder unavailable, skipping");
            println!("Skipping decoder {} because it cannot be run", decoder.name());
            return Ok(None);
        }

        let results_dir = ctx.output_dir.join(&suite.name);
        recreate_dir(&results_dir)?;

        let settings = JobSettings {
            timeout: ctx.timeout,
            verbose: ctx.verbose,
            keep_files: ctx.keep_files,
            reference: ctx.reference,
        };
        let plan = planner::plan_suite(
            suite,
            decoder.name(),
            VectorFilter {
                only: &ctx.test_vectors,
                skip: &ctx.skip_vectors,
            },
            &ctx.resources_dir,
            &results_dir,
            &settings,
        );
        if plan.is_empty() {
            println!("No test vectors for suite {} {}", suite.name, ctx.test_vectors.join(" "));
            return Ok(None);
        }

        let jobs = if decoder.hw_acceleration() && ctx.jobs > 1 {
            warn!(decoder = decoder.name(), "hardware accelerated decoder, forcing a single job");
            println!(
                "Decoder {} uses hardware acceleration, using 1 parallel job",
                decoder.name()
            );
            1
        } else {
            ctx.jobs
        };

        print!("{}", format_run_banner(&suite.name, decoder.name(), &ctx.test_vectors, jobs));
        let layout = ResultLayout::new(
            &suite.name,
            decoder.name(),
            plan.selected.iter().map(|v| v.name.as_str()),
        );
        if !ctx.quiet {
            println!("{}", layout.header());
        }

        let mut run = SuiteRun::seed(suite, decoder.name(), plan.selected.iter().copied());
        run.jobs = jobs;
        let scheduler = Scheduler::new(
            runner,
            ExecutionConfig {
                jobs,
                failfast: ctx.failfast,
                progress: true,
            },
        );
        let (outcomes, elapsed) = scheduler.execute(&plan.jobs, |job, outcome| {
            if !ctx.quiet {
                println!(
                    "{}",
                    layout.outcome_line(
                        &job.spec.suite,
                        &job.spec.decoder,
                        job.vector(),
                        outcome.outcome,
                    )
                );
            }
        });
        for outcome in outcomes {
            run.merge(outcome);
        }
        run.finish(elapsed);
        print!("{}", format_run_footer(&run));
        debug!(
            suite = %run.suite,
            decoder = %run.decoder,
            succeeded = run.success_count,
            total = run.vectors.len(),
            "suite run finished"
        );

        if ctx.reference {
            let recorded = run.reference_suite(suite);
            recorded.save()?;
            println!("Reference results for {} saved to {}", suite.name, suite.path.display());
        }

        if !ctx.keep_files {
            remove_dir(&results_dir)?;
        }

        Ok(Some(run))
    }

    /// Summary, then output directory cleanup.
    fn finish(&self, ctx: &RunContext, runs: &[SuiteRun]) -> Result<(), OrchestratorError> {
        if ctx.summary && !runs.is_empty() {
            self.write_summary(ctx, runs)?;
        }
        if !ctx.keep_files {
            remove_dir(&ctx.output_dir)?;
        }
        Ok(())
    }

    fn write_summary(&self, ctx: &RunContext, runs: &[SuiteRun]) -> Result<(), OrchestratorError> {
        let report = build_report(
            runs,
            ReportConfig {
                jobs: ctx.jobs,
                timeout_secs: ctx.timeout.as_secs_f64(),
                reference: ctx.reference,
                isolation: ctx.isolation.as_str().to_string(),
            },
        );
        let rendered = render_summary(&report, ctx.summary_format, ctx.glyphs)?;

        if ctx.summary_format == SummaryFormat::Markdown {
            let mut decoders: Vec<&str> = Vec::new();
            for run in runs {
                if !decoders.contains(&run.decoder.as_str()) {
                    decoders.push(&run.decoder);
                }
            }
            for suite in &report.suites {
                println!(
                    "Generating summary for test suite {} and decoders {}:\n",
                    suite.name,
                    decoders.join(", ")
                );
            }
        }

        match &ctx.summary_output {
            Some(path) => {
                fs::write(path, &rendered).map_err(io_error(path))?;
                println!("Summary written to {}", path.display());
            }
            None => print!("{}", rendered),
        }
        Ok(())
    }

    /// Render the `list` command output.
    pub fn list(&self, options: &ListOptions) -> Result<String, OrchestratorError> {
        let suites = planner::select_by_name(
            self.catalog.suites(),
            &options.test_suites,
            SelectionKind::TestSuite,
            |s| s.name.as_str(),
        )?;
        let wanted = |codec: Codec| options.codec.map_or(true, |c| c == codec);

        let mut output = String::from("\nList of available test suites:\n");
        for suite in suites.into_iter().filter(|s| wanted(s.codec)) {
            output.push_str(&format!("\n{}\n", suite.name));
            output.push_str(&format!("    Codec: {}\n", suite.codec));
            output.push_str(&format!("    Description: {}\n", suite.description));
            output.push_str(&format!("    Test vectors: {}\n", suite.test_vectors.len()));
            if options.show_vectors {
                for vector in &suite.test_vectors {
                    output.push_str(&format!("        {}\n", vector.name));
                }
            }
        }

        output.push_str("\nList of available decoders:\n");
        for codec in Codec::ALL.iter().copied().filter(|c| wanted(*c)) {
            let decoders: Vec<_> = self.registry.iter().filter(|d| d.codec() == codec).collect();
            if decoders.is_empty() {
                continue;
            }
            output.push_str(&format!("\n{}\n", codec));
            for decoder in decoders {
                let mark = if !options.check {
                    ""
                } else if decoder.is_available(options.verbose) {
                    " ✔️"
                } else {
                    " ❌"
                };
                output.push_str(&format!("    {}{}\n", decoder, mark));
            }
        }
        Ok(output)
    }
}

fn recreate_dir(path: &Path) -> Result<(), OrchestratorError> {
    remove_dir(path)?;
    fs::create_dir_all(path).map_err(io_error(path))
}

fn remove_dir(path: &Path) -> Result<(), OrchestratorError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path)(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SuccessThreshold;
    use std::path::PathBuf;
    use vectorcheck_core::decoders::Dummy;
    use vectorcheck_core::{ExpectedResult, OutputFormat, TestVector};

    fn suite(name: &str, codec: Codec) -> TestSuite {
        TestSuite {
            name: name.to_string(),
            codec,
            description: format!("{name} vectors"),
            test_vectors: vec![TestVector {
                name: "one".to_string(),
                source: String::new(),
                source_checksum: String::new(),
                input_file: "one.bin".to_string(),
                output_format: OutputFormat::Yuv420p,
                result: ExpectedResult::Checksum("00".to_string()),
            }],
            failing_test_vectors: None,
            path: PathBuf::new(),
        }
    }

    fn orchestrator() -> Orchestrator {
        let catalog = SuiteCatalog::from_suites(vec![
            suite("dummy", Codec::Dummy),
            suite("dummy_fail", Codec::Dummy),
            suite("JVT-AVC_V1", Codec::H264),
        ]);
        let registry = DecoderRegistry::builder().with(Dummy).build().unwrap();
        Orchestrator::new(catalog, registry)
    }

    #[test]
    fn test_failfast_with_parallel_jobs_rejected() {
        let ctx = RunContext {
            jobs: 4,
            failfast: true,
            ..RunContext::default()
        };
        let err = orchestrator().run(&ctx).unwrap_err();
        assert!(matches!(err, OrchestratorError::FailfastParallel { jobs: 4 }));
    }

    #[test]
    fn test_reference_needs_exactly_one_decoder() {
        let ctx = RunContext {
            reference: true,
            ..RunContext::default()
        };
        let err = orchestrator().run(&ctx).unwrap_err();
        assert_eq!(err.to_string(), "Only one decoder can be the reference. Given: ");
    }

    #[test]
    fn test_success_threshold_needs_single_suite() {
        let ctx = RunContext {
            thresholds: ThresholdPolicy {
                success: Some(SuccessThreshold::Count(1)),
                time: None,
            },
            ..RunContext::default()
        };
        assert!(matches!(
            orchestrator().run(&ctx),
            Err(OrchestratorError::ThresholdSuites(_))
        ));
    }

    #[test]
    fn test_unknown_suite_rejected() {
        let ctx = RunContext {
            test_suites: vec!["nope".to_string()],
            ..RunContext::default()
        };
        let err = orchestrator().run(&ctx).unwrap_err();
        assert_eq!(err.to_string(), "No test suite found for: nope");
    }

    #[test]
    fn test_csv_summary_needs_output_file() {
        let ctx = RunContext {
            summary: true,
            summary_format: SummaryFormat::Csv,
            ..RunContext::default()
        };
        assert!(matches!(
            orchestrator().run(&ctx),
            Err(OrchestratorError::SummaryOutputRequired("csv"))
        ));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(RunStatus::Success.code(), 0);
        assert_eq!(RunStatus::Failure.code(), 1);
        let time = ThresholdViolation::Time {
            elapsed: Duration::from_secs(2),
            limit_secs: 1.0,
        };
        assert_eq!(RunStatus::from(time).code(), 3);
    }

    #[test]
    fn test_list_filters_by_codec() {
        let listing = orchestrator()
            .list(&ListOptions {
                codec: Some(Codec::Dummy),
                show_vectors: true,
                ..ListOptions::default()
            })
            .unwrap();
        assert!(listing.contains("\ndummy\n"));
        assert!(listing.contains("        one\n"));
        assert!(!listing.contains("JVT-AVC_V1"));
        assert!(listing.contains("Dummy: This is a dummy implementation for the dummy codec"));
    }
}
