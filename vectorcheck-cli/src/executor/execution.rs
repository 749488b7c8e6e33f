//! Job Execution
//!
//! The scheduler fans jobs out to a [`JobRunner`] and judges every report as
//! it arrives.
//!
//! ## Runners
//!
//! - **In-process (`Executor`)**: decodes on helper threads of this process
//!   and gives up waiting once the job's timeout elapses. Cheap, but a decoder
//!   that aborts the process takes the whole run down.
//!
//! - **Isolated (`IsolatedExecutor`)**: every job runs in a fresh worker
//!   process driven by the [`Supervisor`]. A crash or hang only costs that job.
//!
//! ## Data Flow
//!
//! ```text
//!   Vec<Job>
//!      │
//!      ▼
//! ┌───────────┐  sequential (jobs = 1, fail-fast aware)
//! │ Scheduler │  or a rayon pool of `jobs` threads
//! └─────┬─────┘
//!       │ JobRunner::run
//!       ▼
//!   JobReport ──judge──▶ JobOutcome ──▶ progress line + caller callback
//! ```

use crate::supervisor::Supervisor;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::sync::Mutex;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use vectorcheck_core::{DecoderRegistry, Job, JobOutcome, judge, run_job};
use vectorcheck_ipc::JobReport;

/// Runs one job to completion and always produces a report.
pub trait JobRunner: Sync {
    fn run(&self, job: &Job) -> JobReport;
}

/// Scheduler settings for one suite × decoder run
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Worker count; 1 selects the ordered sequential path
    pub jobs: usize,
    /// Stop after the first failing vector (sequential only)
    pub failfast: bool,
    /// Draw the progress bar carrying the status line
    pub progress: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            failfast: false,
            progress: true,
        }
    }
}

/// In-process runner
pub struct Executor {
    registry: DecoderRegistry,
}

impl Executor {
    pub fn new(registry: DecoderRegistry) -> Self {
        Self { registry }
    }
}

impl JobRunner for Executor {
    fn run(&self, job: &Job) -> JobReport {
        let Some(entry) = self.registry.get(&job.spec.decoder) else {
            return JobReport::errored(
                &job.spec,
                format!("Decoder not found: {}", job.spec.decoder),
                Vec::new(),
            );
        };

        let decoder = entry.decoder().clone();
        let spec = job.spec.clone();
        let (tx, rx) = mpsc::channel();
        let started = Instant::now();

        let spawned = std::thread::Builder::new()
            .name(format!("decode-{}", job.spec.vector))
            .spawn(move || {
                let _ = tx.send(run_job(decoder.as_ref(), &spec));
            });
        if let Err(e) = spawned {
            return JobReport::errored(
                &job.spec,
                format!("Failed to spawn decode thread: {e}"),
                Vec::new(),
            );
        }

        match rx.recv_timeout(job.spec.timeout()) {
            Ok(report) => report,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // The helper thread is abandoned; it finishes or dies with the process.
                warn!(vector = %job.spec.vector, "in-process decode timed out");
                JobReport::timed_out(&job.spec, started.elapsed())
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => JobReport::errored(
                &job.spec,
                "decode thread exited without a report",
                Vec::new(),
            ),
        }
    }
}

/// Process-isolated runner
pub struct IsolatedExecutor {
    supervisor: Supervisor,
}

impl IsolatedExecutor {
    pub fn new(supervisor: Supervisor) -> Self {
        Self { supervisor }
    }
}

impl JobRunner for IsolatedExecutor {
    fn run(&self, job: &Job) -> JobReport {
        self.supervisor.run_job(&job.spec)
    }
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Runs a job list against a runner.
pub struct Scheduler<'a> {
    runner: &'a dyn JobRunner,
    config: ExecutionConfig,
}

impl<'a> Scheduler<'a> {
    pub fn new(runner: &'a dyn JobRunner, config: ExecutionConfig) -> Self {
        Self { runner, config }
    }

    /// Execute `jobs` and return one outcome per executed job.
    ///
    /// `on_result` sees every outcome as it completes; it runs on pool threads
    /// in parallel mode. With fail-fast the sequential path stops at the first
    /// failure, so fewer outcomes than jobs may come back.
    pub fn execute<F>(&self, jobs: &[Job], on_result: F) -> (Vec<JobOutcome>, Duration)
    where
        F: Fn(&Job, &JobOutcome) + Sync,
    {
        let pb = progress_bar(jobs.len(), self.config.progress);
        let status_line = Mutex::new(String::with_capacity(jobs.len()));

        let record = |job: &Job| {
            let outcome = judge(job, &self.runner.run(job));
            if let Ok(mut line) = status_line.lock() {
                line.push(outcome.outcome.progress_char());
                pb.set_message(line.clone());
            }
            pb.suspend(|| on_result(job, &outcome));
            pb.inc(1);
            outcome
        };

        let started = Instant::now();
        let outcomes = if self.config.jobs <= 1 || jobs.len() <= 1 {
            self.run_sequential(jobs, &record)
        } else {
            self.run_parallel(jobs, &record)
        };
        let elapsed = started.elapsed();

        pb.finish();
        debug!(executed = outcomes.len(), ?elapsed, "scheduler window closed");
        (outcomes, elapsed)
    }

    fn run_sequential<R>(&self, jobs: &[Job], record: &R) -> Vec<JobOutcome>
    where
        R: Fn(&Job) -> JobOutcome,
    {
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            let outcome = record(job);
            let stop = self.config.failfast && outcome.outcome.is_failure();
            outcomes.push(outcome);
            if stop {
                debug!(vector = %job.spec.vector, "fail-fast: stopping after first failure");
                break;
            }
        }
        outcomes
    }

    fn run_parallel<R>(&self, jobs: &[Job], record: &R) -> Vec<JobOutcome>
    where
        R: Fn(&Job) -> JobOutcome + Sync,
    {
        let worker_count = self.config.jobs.min(jobs.len());
        match ThreadPoolBuilder::new().num_threads(worker_count).build() {
            Ok(pool) => pool.install(|| jobs.par_iter().map(record).collect()),
            Err(e) => {
                warn!(error = %e, "failed to build worker pool, running sequentially");
                jobs.iter().map(record).collect()
            }
        }
    }
}
