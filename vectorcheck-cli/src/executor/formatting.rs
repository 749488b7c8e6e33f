//! Console Formatting
//!
//! Terminal output for a suite × decoder run: the banner, aligned per-vector
//! result lines, failure blocks and the closing tally.

use super::aggregation::SuiteRun;
use vectorcheck_core::VectorOutcome;

const BANNER_WIDTH: usize = 100;
const RULE_WIDTH: usize = 70;

const SUITE_LABEL: &str = "TEST SUITE";
const DECODER_LABEL: &str = "DECODER";
const VECTOR_LABEL: &str = "TEST VECTOR";
const RESULT_LABEL: &str = "RESULT";

/// Banner printed before a suite × decoder run
pub fn format_run_banner(suite: &str, decoder: &str, vectors: &[String], jobs: usize) -> String {
    let mut output = String::new();
    output.push_str(&"*".repeat(BANNER_WIDTH));
    output.push('\n');
    output.push_str(&format!("Running test suite {} with decoder {}\n", suite, decoder));
    if !vectors.is_empty() {
        output.push_str(&format!("Test vectors {}\n", vectors.join(" ")));
    }
    output.push_str(&format!("Using {} parallel job(s)\n", jobs));
    output.push_str(&"*".repeat(BANNER_WIDTH));
    output.push('\n');
    output
}

/// Column widths for the result lines of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultLayout {
    suite: usize,
    decoder: usize,
    vector: usize,
}

impl ResultLayout {
    pub fn new<'a>(suite: &str, decoder: &str, vectors: impl IntoIterator<Item = &'a str>) -> Self {
        let vector = vectors
            .into_iter()
            .map(str::len)
            .chain(std::iter::once(VECTOR_LABEL.len()))
            .max()
            .unwrap_or(VECTOR_LABEL.len());
        Self {
            suite: suite.len().max(SUITE_LABEL.len()),
            decoder: decoder.len().max(DECODER_LABEL.len()),
            vector,
        }
    }

    /// Column header followed by a rule
    pub fn header(&self) -> String {
        format!(
            "{}\n{}",
            self.line(SUITE_LABEL, DECODER_LABEL, VECTOR_LABEL, RESULT_LABEL),
            "-".repeat(RULE_WIDTH)
        )
    }

    /// `[suite] (decoder) vector ... Result`
    pub fn line(&self, suite: &str, decoder: &str, vector: &str, result: &str) -> String {
        format!(
            "[{:sw$}] ({:dw$}) {:vw$} ... {}",
            suite,
            decoder,
            vector,
            result,
            sw = self.suite,
            dw = self.decoder,
            vw = self.vector
        )
    }

    pub fn outcome_line(
        &self,
        suite: &str,
        decoder: &str,
        vector: &str,
        outcome: VectorOutcome,
    ) -> String {
        self.line(suite, decoder, vector, outcome.as_str())
    }
}

/// Failure blocks followed by `Ran N/M tests successfully in X secs`
pub fn format_run_footer(run: &SuiteRun) -> String {
    let mut output = String::new();

    for (_, failure) in run.failures() {
        output.push_str(&"=".repeat(RULE_WIDTH + 1));
        output.push('\n');
        output.push_str(&format!("FAIL: {}\n", failure.title));
        output.push_str(&"-".repeat(RULE_WIDTH));
        output.push('\n');
        for line in &failure.detail {
            output.push_str(line);
            output.push('\n');
        }
        output.push('\n');
    }

    output.push_str(&"-".repeat(RULE_WIDTH));
    output.push('\n');
    output.push_str(&format!(
        "Ran {}/{} tests successfully in {:.3} secs\n",
        run.success_count,
        run.vectors.len(),
        run.elapsed.as_secs_f64()
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vectorcheck_core::{
        Codec, ExpectedResult, FailureRecord, OutputFormat, VectorRun,
    };

    #[test]
    fn test_result_columns_align() {
        let layout = ResultLayout::new("dummy", "Dummy", ["one", "a-much-longer-vector-name"]);
        let header = layout.header();
        let line = layout.outcome_line("dummy", "Dummy", "one", VectorOutcome::Success);

        let header_first = header.lines().next().unwrap();
        assert_eq!(header_first.find(" ... "), line.find(" ... "));
        assert!(line.starts_with("[dummy     ] (Dummy  ) one"));
        assert!(line.ends_with("... Success"));
        assert!(header.ends_with(&"-".repeat(RULE_WIDTH)));
    }

    #[test]
    fn test_banner_lists_requested_vectors() {
        let vectors = ["one".to_string(), "two".to_string()];
        let banner = format_run_banner("dummy", "Dummy", &vectors, 4);
        assert!(banner.contains("Running test suite dummy with decoder Dummy\n"));
        assert!(banner.contains("Test vectors one two\n"));
        assert!(banner.contains("Using 4 parallel job(s)\n"));

        let plain = format_run_banner("dummy", "Dummy", &[], 1);
        assert!(!plain.contains("Test vectors"));
    }

    #[test]
    fn test_footer_prints_failures() {
        let mut failed = VectorRun {
            name: "two".to_string(),
            output_format: OutputFormat::Yuv420p,
            expected: ExpectedResult::Checksum("bbb".to_string()),
            outcome: VectorOutcome::Fail,
            errors: vec![
                FailureRecord::new("two (Dummy.dummy)")
                    .with_detail(vec!["'bbb' != 'ccc' : two".to_string()]),
            ],
            elapsed: Duration::ZERO,
            observed: None,
        };
        let mut passed = failed.clone();
        passed.name = "one".to_string();
        passed.outcome = VectorOutcome::Success;
        passed.errors.clear();
        failed.elapsed = Duration::from_millis(3);

        let run = SuiteRun {
            suite: "dummy".to_string(),
            codec: Codec::Dummy,
            decoder: "Dummy".to_string(),
            vectors: vec![passed, failed],
            success_count: 1,
            elapsed: Duration::from_millis(1500),
            jobs: 1,
        };

        let footer = format_run_footer(&run);
        assert!(footer.contains("FAIL: two (Dummy.dummy)\n"));
        assert!(footer.contains("'bbb' != 'ccc' : two\n"));
        assert!(footer.ends_with("Ran 1/2 tests successfully in 1.500 secs\n"));
    }
}
