//! JUnit XML Output
//!
//! One `<testsuite>` per suite × decoder run, carrying the decoder as a
//! property so CI dashboards can tell runs of the same suite apart.

use crate::report::{DecoderRun, Report, ReportConfig, VectorReport, VectorStatus};
use quick_junit::{NonSuccessKind, Property, TestCase, TestCaseStatus, TestSuite};
use std::time::Duration;

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

fn case_status(vector: &VectorReport) -> TestCaseStatus {
    let kind = match vector.status {
        VectorStatus::Success | VectorStatus::Reference => return TestCaseStatus::success(),
        VectorStatus::NotRun => return TestCaseStatus::skipped(),
        VectorStatus::Error => NonSuccessKind::Error,
        VectorStatus::Fail | VectorStatus::Timeout => NonSuccessKind::Failure,
    };

    let mut status = TestCaseStatus::non_success(kind);
    if let Some(first) = vector.failures.first() {
        status.set_message(format!("FAIL: {}", first.title));
    }
    let text: Vec<String> = vector
        .failures
        .iter()
        .flat_map(|f| f.detail.iter().cloned())
        .collect();
    if !text.is_empty() {
        status.set_description(text.join("\n"));
    }
    status
}

fn junit_suite(suite_name: &str, run: &DecoderRun, config: &ReportConfig) -> TestSuite {
    let mut suite = TestSuite::new(suite_name);
    suite.add_property(Property::new("decoder", run.decoder.as_str()));
    for vector in &run.vectors {
        let mut case = TestCase::new(vector.name.as_str(), case_status(vector));
        case.set_classname(format!("{}.{}", run.decoder, suite_name));
        case.set_time(secs(vector.elapsed_secs));
        suite.add_test_case(case);
    }
    suite.set_time(secs(run.time_without_timeouts(config)));
    suite
}

/// Generate the JUnit XML summary.
pub fn generate_junit_report(report: &Report) -> Result<String, quick_junit::SerializeError> {
    let mut junit = quick_junit::Report::new("vectorcheck");
    for suite in &report.suites {
        for run in &suite.decoders {
            junit.add_test_suite(junit_suite(&suite.name, run, &report.meta.config));
        }
    }
    junit.to_string()
}
