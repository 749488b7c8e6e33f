//! Suite Run Executor
//!
//! Runs the jobs of one suite × decoder pair and turns their reports into a
//! finished [`SuiteRun`]. Jobs execute either in-process or in supervised
//! worker processes.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Vec<Job> (one per selected vector)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  execution  │  Scheduler: sequential or rayon pool, judge each report
//! └──────┬──────┘
//!        │ JobOutcome
//!        ▼
//! ┌─────────────┐
//! │ aggregation │  Merge by vector name, success count, thresholds
//! └──────┬──────┘
//!        │
//!        ├──────────────────┐
//!        ▼                  ▼
//! ┌─────────────┐    ┌─────────────┐
//! │ formatting  │    │   report    │  Serializable Report for summaries
//! └─────────────┘    └─────────────┘
//!  console lines
//! ```
//!
//! ## Modules
//!
//! - [`execution`] - Scheduler and job runners (in-process and isolated)
//! - [`aggregation`] - Suite run snapshot, thresholds, reference capture
//! - [`formatting`] - Banner, result lines, failure blocks
//! - [`report`] - Report building
//! - [`metadata`] - System metadata collection

mod aggregation;
mod execution;
mod formatting;
mod metadata;
mod report;

pub use aggregation::{SuccessThreshold, SuiteRun, ThresholdPolicy, ThresholdViolation};
pub use execution::{ExecutionConfig, Executor, IsolatedExecutor, JobRunner, Scheduler};
pub use formatting::{ResultLayout, format_run_banner, format_run_footer};
pub use report::build_report;
