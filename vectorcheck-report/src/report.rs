//! Report Data Structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complete conformance run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub meta: ReportMeta,
    /// One entry per suite, in run order
    pub suites: Vec<SuiteReport>,
    pub summary: ReportSummary,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub schema_version: u32,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub system: SystemInfo,
    pub config: ReportConfig,
}

/// Run settings captured in report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub jobs: usize,
    pub timeout_secs: f64,
    pub reference: bool,
    pub isolation: String,
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub hostname: String,
    pub cpu_cores: u32,
}

/// A suite and every decoder that ran it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub name: String,
    pub codec: String,
    pub decoders: Vec<DecoderRun>,
}

/// One suite × decoder run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderRun {
    pub decoder: String,
    pub success_count: usize,
    pub total: usize,
    /// Wall-clock time of the scheduler window
    pub elapsed_secs: f64,
    /// Parallel jobs used for this run; hardware decoders always run one
    pub jobs: usize,
    pub vectors: Vec<VectorReport>,
}

impl DecoderRun {
    /// Elapsed time minus the time burnt waiting on timeouts.
    ///
    /// Only meaningful for sequential runs; with parallel jobs timeouts
    /// overlap other work and the raw elapsed time is returned.
    pub fn time_without_timeouts(&self, config: &ReportConfig) -> f64 {
        if self.jobs != 1 {
            return self.elapsed_secs;
        }
        let timeouts = self
            .vectors
            .iter()
            .filter(|v| v.status == VectorStatus::Timeout)
            .count();
        self.elapsed_secs - timeouts as f64 * config.timeout_secs
    }

    pub fn vector(&self, name: &str) -> Option<&VectorReport> {
        self.vectors.iter().find(|v| v.name == name)
    }
}

/// Per-vector verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorReport {
    pub name: String,
    pub status: VectorStatus,
    pub elapsed_secs: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureInfo>,
}

/// Vector verdict as it appears in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorStatus {
    NotRun,
    Success,
    Fail,
    Timeout,
    Error,
    Reference,
}

impl VectorStatus {
    /// Label used in CSV summaries
    pub fn label(&self) -> &'static str {
        match self {
            VectorStatus::NotRun => "Not run",
            VectorStatus::Success => "Success",
            VectorStatus::Fail => "Fail",
            VectorStatus::Timeout => "Timeout",
            VectorStatus::Error => "Error",
            VectorStatus::Reference => "Reference",
        }
    }
}

/// Failure information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureInfo {
    pub title: String,
    pub detail: Vec<String>,
}

/// Report summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub suite_runs: usize,
    pub total_vectors: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub errored: usize,
    pub not_run: usize,
    pub total_duration_ms: f64,
}

impl ReportSummary {
    /// Tally every vector of every suite run.
    pub fn from_suites(suites: &[SuiteReport]) -> Self {
        let mut summary = ReportSummary::default();
        for run in suites.iter().flat_map(|s| &s.decoders) {
            summary.suite_runs += 1;
            summary.total_duration_ms += run.elapsed_secs * 1000.0;
            for vector in &run.vectors {
                summary.total_vectors += 1;
                match vector.status {
                    VectorStatus::Success | VectorStatus::Reference => summary.succeeded += 1,
                    VectorStatus::Fail => summary.failed += 1,
                    VectorStatus::Timeout => summary.timed_out += 1,
                    VectorStatus::Error => summary.errored += 1,
                    VectorStatus::NotRun => summary.not_run += 1,
                }
            }
        }
        summary
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn vector(name: &str, status: VectorStatus, elapsed_secs: f64) -> VectorReport {
        let failures = match status {
            VectorStatus::Fail | VectorStatus::Timeout | VectorStatus::Error => vec![FailureInfo {
                title: format!("{name} (Dummy.dummy)"),
                detail: vec!["'aa' != 'bb' : mismatch".to_string()],
            }],
            _ => Vec::new(),
        };
        VectorReport {
            name: name.to_string(),
            status,
            elapsed_secs,
            failures,
        }
    }

    pub fn report(jobs: usize) -> Report {
        let suites = vec![SuiteReport {
            name: "dummy".to_string(),
            codec: "Dummy".to_string(),
            decoders: vec![
                DecoderRun {
                    decoder: "Dummy".to_string(),
                    success_count: 1,
                    total: 3,
                    elapsed_secs: 31.5,
                    jobs,
                    vectors: vec![
                        vector("one", VectorStatus::Success, 0.5),
                        vector("two", VectorStatus::Fail, 0.5),
                        vector("three", VectorStatus::Timeout, 30.0),
                    ],
                },
                DecoderRun {
                    decoder: "Other".to_string(),
                    success_count: 2,
                    total: 3,
                    elapsed_secs: 1.25,
                    jobs,
                    vectors: vec![
                        vector("one", VectorStatus::Success, 0.5),
                        vector("two", VectorStatus::Success, 0.5),
                        vector("three", VectorStatus::Error, 0.25),
                    ],
                },
            ],
        }];
        Report {
            meta: ReportMeta {
                schema_version: 1,
                version: "0.1.0".to_string(),
                timestamp: Utc::now(),
                system: SystemInfo {
                    os: "linux".to_string(),
                    arch: "x86_64".to_string(),
                    hostname: "ci".to_string(),
                    cpu_cores: 8,
                },
                config: ReportConfig {
                    jobs,
                    timeout_secs: 30.0,
                    reference: false,
                    isolation: "process".to_string(),
                },
            },
            summary: ReportSummary::from_suites(&suites),
            suites,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::report;
    use super::*;

    #[test]
    fn test_summary_tally() {
        let report = report(1);
        assert_eq!(report.summary.suite_runs, 2);
        assert_eq!(report.summary.total_vectors, 6);
        assert_eq!(report.summary.succeeded, 3);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.timed_out, 1);
        assert_eq!(report.summary.errored, 1);
    }

    #[test]
    fn test_timeout_time_only_subtracted_when_sequential() {
        let sequential = report(1);
        let run = &sequential.suites[0].decoders[0];
        assert!((run.time_without_timeouts(&sequential.meta.config) - 1.5).abs() < 1e-9);

        let parallel = report(4);
        let run = &parallel.suites[0].decoders[0];
        assert!((run.time_without_timeouts(&parallel.meta.config) - 31.5).abs() < 1e-9);
    }
}
