//! Result Aggregation
//!
//! A [`SuiteRun`] is the per-run snapshot of one suite × decoder pair. Job
//! outcomes are merged into it by vector name, so completion order does not
//! matter. Thresholds are checked against the finished snapshot.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use vectorcheck_core::{
    Codec, FailureRecord, JobOutcome, TestSuite, TestVector, VectorOutcome, VectorRun,
};

/// Results of one suite run with one decoder
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteRun {
    pub suite: String,
    pub codec: Codec,
    pub decoder: String,
    /// Selected vectors in catalog order
    pub vectors: Vec<VectorRun>,
    pub success_count: usize,
    /// Wall-clock time of the scheduler window
    pub elapsed: Duration,
    /// Parallel jobs the scheduler actually used
    pub jobs: usize,
}

impl SuiteRun {
    /// Fresh snapshot with every selected vector `NotRun`.
    pub fn seed<'a>(
        suite: &TestSuite,
        decoder: &str,
        selected: impl IntoIterator<Item = &'a TestVector>,
    ) -> Self {
        Self {
            suite: suite.name.clone(),
            codec: suite.codec,
            decoder: decoder.to_string(),
            vectors: selected.into_iter().map(VectorRun::seed).collect(),
            success_count: 0,
            elapsed: Duration::ZERO,
            jobs: 1,
        }
    }

    /// Merge one job outcome into the vector of the same name.
    ///
    /// Returns `false` when no such vector was seeded.
    pub fn merge(&mut self, outcome: JobOutcome) -> bool {
        let Some(run) = self.vectors.iter_mut().find(|v| v.name == outcome.vector) else {
            debug!(
                vector = %outcome.vector,
                suite = %self.suite,
                "outcome for unknown vector dropped"
            );
            return false;
        };
        run.outcome = outcome.outcome;
        run.errors = outcome.errors;
        run.elapsed = outcome.elapsed;
        run.observed = outcome.observed;
        true
    }

    /// Close the run: record the scheduler window and count successes.
    pub fn finish(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
        self.success_count = self.vectors.iter().filter(|v| v.is_success()).count();
    }

    pub fn has_failures(&self) -> bool {
        self.vectors.iter().any(|v| !v.errors.is_empty())
    }

    /// Vectors that actually ran
    pub fn executed(&self) -> usize {
        self.vectors
            .iter()
            .filter(|v| v.outcome != VectorOutcome::NotRun)
            .count()
    }

    /// Failure records paired with their vector, in catalog order
    pub fn failures(&self) -> impl Iterator<Item = (&VectorRun, &FailureRecord)> {
        self.vectors
            .iter()
            .flat_map(|v| v.errors.iter().map(move |e| (v, e)))
    }

    /// Catalog suite with observed output recorded as the new expected result
    /// of every vector decoded in reference mode.
    pub fn reference_suite(&self, catalog: &TestSuite) -> TestSuite {
        let mut suite = catalog.clone();
        for vector in &mut suite.test_vectors {
            let observed = self
                .vectors
                .iter()
                .find(|run| run.name == vector.name && run.outcome == VectorOutcome::Reference)
                .and_then(|run| run.observed.clone());
            if let Some(result) = observed {
                vector.result = result;
            }
        }
        suite
    }
}

/// Minimum successes required of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SuccessThreshold {
    /// At least this many successful vectors
    Count(usize),
    /// At least this percentage of executed vectors
    Ratio(f64),
}

impl SuccessThreshold {
    fn is_met(&self, run: &SuiteRun) -> bool {
        match *self {
            SuccessThreshold::Count(min) => run.success_count >= min,
            SuccessThreshold::Ratio(percent) => {
                let executed = run.executed();
                if executed == 0 {
                    return true;
                }
                run.success_count as f64 * 100.0 / executed as f64 >= percent
            }
        }
    }
}

impl fmt::Display for SuccessThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuccessThreshold::Count(n) => write!(f, "{}", n),
            SuccessThreshold::Ratio(p) => write!(f, "{}%", p),
        }
    }
}

impl FromStr for SuccessThreshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(percent) = s.strip_suffix('%') {
            let value: f64 = percent
                .trim()
                .parse()
                .map_err(|_| format!("Invalid threshold percentage: {}", s))?;
            if !(0.0..=100.0).contains(&value) {
                return Err(format!("Threshold percentage out of range: {}", s));
            }
            return Ok(SuccessThreshold::Ratio(value));
        }
        s.parse()
            .map(SuccessThreshold::Count)
            .map_err(|_| format!("Invalid threshold: {} (expected N or P%)", s))
    }
}

/// Threshold that a finished run broke
#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdViolation {
    Success {
        succeeded: usize,
        threshold: SuccessThreshold,
    },
    Time {
        elapsed: Duration,
        limit_secs: f64,
    },
}

impl ThresholdViolation {
    pub fn exit_code(&self) -> i32 {
        match self {
            ThresholdViolation::Success { .. } => 2,
            ThresholdViolation::Time { .. } => 3,
        }
    }
}

impl fmt::Display for ThresholdViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdViolation::Success {
                succeeded,
                threshold,
            } => write!(
                f,
                "Tests results below threshold: {} vs {}\nReporting error through exit code {}",
                succeeded,
                threshold,
                self.exit_code()
            ),
            ThresholdViolation::Time {
                elapsed,
                limit_secs,
            } => write!(
                f,
                "Tests results over time threshold: {:.3} vs {}\n\
                 Reporting error through exit code {}",
                elapsed.as_secs_f64(),
                limit_secs,
                self.exit_code()
            ),
        }
    }
}

/// Thresholds configured for a run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThresholdPolicy {
    pub success: Option<SuccessThreshold>,
    /// Seconds
    pub time: Option<f64>,
}

impl ThresholdPolicy {
    pub fn is_configured(&self) -> bool {
        self.success.is_some() || self.time.is_some()
    }

    /// First violated threshold; the success threshold is checked first.
    pub fn check(&self, run: &SuiteRun) -> Option<ThresholdViolation> {
        if let Some(threshold) = self.success {
            if !threshold.is_met(run) {
                return Some(ThresholdViolation::Success {
                    succeeded: run.success_count,
                    threshold,
                });
            }
        }
        if let Some(limit_secs) = self.time {
            if run.elapsed.as_secs_f64() > limit_secs {
                return Some(ThresholdViolation::Time {
                    elapsed: run.elapsed,
                    limit_secs,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vectorcheck_core::{ExpectedResult, OutputFormat};

    fn vector(name: &str, result: &str) -> TestVector {
        TestVector {
            name: name.to_string(),
            source: format!("https://example.org/{name}.bin"),
            source_checksum: "0".repeat(32),
            input_file: format!("{name}.bin"),
            output_format: OutputFormat::Yuv420p,
            result: ExpectedResult::Checksum(result.to_string()),
        }
    }

    fn suite() -> TestSuite {
        TestSuite {
            name: "dummy".to_string(),
            codec: Codec::Dummy,
            description: "Dummy suite".to_string(),
            test_vectors: vec![vector("one", "aaa"), vector("two", "bbb"), vector("three", "ccc")],
            failing_test_vectors: None,
            path: Default::default(),
        }
    }

    fn outcome(name: &str, verdict: VectorOutcome) -> JobOutcome {
        let errors = if verdict.is_failure() {
            vec![FailureRecord::new(format!("{name} (Dummy.dummy)"))]
        } else {
            Vec::new()
        };
        JobOutcome {
            vector: name.to_string(),
            outcome: verdict,
            errors,
            observed: Some(ExpectedResult::Checksum(format!("{name}-observed"))),
            elapsed: Duration::from_millis(10),
        }
    }

    fn finished(verdicts: &[(&str, VectorOutcome)], elapsed: Duration) -> SuiteRun {
        let catalog = suite();
        let mut run = SuiteRun::seed(&catalog, "Dummy", &catalog.test_vectors);
        for (name, verdict) in verdicts {
            assert!(run.merge(outcome(name, *verdict)));
        }
        run.finish(elapsed);
        run
    }

    #[test]
    fn test_merge_is_order_independent() {
        let a = finished(
            &[
                ("one", VectorOutcome::Success),
                ("three", VectorOutcome::Fail),
                ("two", VectorOutcome::Success),
            ],
            Duration::from_secs(1),
        );
        let b = finished(
            &[
                ("two", VectorOutcome::Success),
                ("one", VectorOutcome::Success),
                ("three", VectorOutcome::Fail),
            ],
            Duration::from_secs(1),
        );
        assert_eq!(a, b);
        assert_eq!(a.success_count, 2);
        assert!(a.has_failures());
        assert_eq!(a.failures().count(), 1);
    }

    #[test]
    fn test_not_run_is_not_a_success() {
        let run = finished(&[("one", VectorOutcome::Success)], Duration::from_secs(1));
        assert_eq!(run.success_count, 1);
        assert_eq!(run.executed(), 1);
        assert!(!run.has_failures());
    }

    #[test]
    fn test_unknown_vector_is_dropped() {
        let catalog = suite();
        let mut run = SuiteRun::seed(&catalog, "Dummy", catalog.test_vectors.iter().take(1));
        assert!(!run.merge(outcome("two", VectorOutcome::Success)));
        assert_eq!(run.vectors.len(), 1);
    }

    #[test]
    fn test_threshold_parse() {
        assert_eq!("2".parse::<SuccessThreshold>(), Ok(SuccessThreshold::Count(2)));
        assert_eq!("75%".parse::<SuccessThreshold>(), Ok(SuccessThreshold::Ratio(75.0)));
        assert!("abc".parse::<SuccessThreshold>().is_err());
        assert!("150%".parse::<SuccessThreshold>().is_err());
    }

    #[test]
    fn test_success_threshold() {
        let run = finished(
            &[
                ("one", VectorOutcome::Success),
                ("two", VectorOutcome::Fail),
                ("three", VectorOutcome::Fail),
            ],
            Duration::from_secs(1),
        );
        let at_least = |n| ThresholdPolicy {
            success: Some(SuccessThreshold::Count(n)),
            time: None,
        };
        assert_eq!(at_least(1).check(&run), None);
        let violation = at_least(2).check(&run).unwrap();
        assert_eq!(violation.exit_code(), 2);
        assert!(violation.to_string().starts_with("Tests results below threshold: 1 vs 2"));

        let ratio = ThresholdPolicy {
            success: Some(SuccessThreshold::Ratio(30.0)),
            time: None,
        };
        assert_eq!(ratio.check(&run), None);
    }

    #[test]
    fn test_success_threshold_checked_before_time() {
        let run = finished(&[("one", VectorOutcome::Fail)], Duration::from_secs(10));
        let policy = ThresholdPolicy {
            success: Some(SuccessThreshold::Count(1)),
            time: Some(1.0),
        };
        assert_eq!(policy.check(&run).map(|v| v.exit_code()), Some(2));

        let time_only = ThresholdPolicy {
            success: None,
            time: Some(0.000000001),
        };
        assert_eq!(time_only.check(&run).map(|v| v.exit_code()), Some(3));
        assert!(!ThresholdPolicy::default().is_configured());
    }

    #[test]
    fn test_reference_suite_records_observations() {
        let catalog = suite();
        let mut run = finished(
            &[("one", VectorOutcome::Reference), ("two", VectorOutcome::Timeout)],
            Duration::from_secs(1),
        );
        run.vectors[1].observed = None;

        let recorded = run.reference_suite(&catalog);
        assert_eq!(
            recorded.test_vectors[0].result,
            ExpectedResult::Checksum("one-observed".to_string())
        );
        assert_eq!(recorded.test_vectors[1].result, catalog.test_vectors[1].result);
        assert_eq!(recorded.test_vectors[2].result, catalog.test_vectors[2].result);
        assert_eq!(catalog.test_vectors[0].result, ExpectedResult::Checksum("aaa".to_string()));
    }
}
