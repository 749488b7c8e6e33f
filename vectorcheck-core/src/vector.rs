//! Test vectors and the per-run state attached to them.

use crate::codec::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use vectorcheck_ipc::DecodedOutput;

/// Expected decoder output for a vector.
///
/// Descriptors store either a single checksum string or an array with one
/// checksum per frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpectedResult {
    Checksum(String),
    Frames(Vec<String>),
}

impl ExpectedResult {
    /// Checksums compare case-insensitively, frame lists element by element.
    pub fn matches(&self, output: &DecodedOutput) -> bool {
        match (self, output) {
            (ExpectedResult::Checksum(expected), DecodedOutput::Checksum(actual)) => {
                expected.eq_ignore_ascii_case(actual)
            }
            (ExpectedResult::Frames(expected), DecodedOutput::Frames(actual)) => {
                expected.len() == actual.len()
                    && expected
                        .iter()
                        .zip(actual)
                        .all(|(e, a)| e.eq_ignore_ascii_case(a))
            }
            _ => false,
        }
    }

    /// Index of the first frame that differs, if both sides are frame lists.
    pub fn first_frame_mismatch(&self, output: &DecodedOutput) -> Option<usize> {
        match (self, output) {
            (ExpectedResult::Frames(expected), DecodedOutput::Frames(actual)) => {
                (0..expected.len().max(actual.len())).find(|&i| {
                    match (expected.get(i), actual.get(i)) {
                        (Some(e), Some(a)) => !e.eq_ignore_ascii_case(a),
                        _ => true,
                    }
                })
            }
            _ => None,
        }
    }
}

impl From<DecodedOutput> for ExpectedResult {
    fn from(output: DecodedOutput) -> Self {
        match output {
            DecodedOutput::Checksum(sum) => ExpectedResult::Checksum(sum),
            DecodedOutput::Frames(frames) => ExpectedResult::Frames(frames),
        }
    }
}

impl fmt::Display for ExpectedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedResult::Checksum(sum) => f.write_str(sum),
            ExpectedResult::Frames(frames) => write!(f, "{} frame checksums", frames.len()),
        }
    }
}

/// One entry of a suite descriptor. Catalog data: never mutated by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestVector {
    pub name: String,
    pub source: String,
    pub source_checksum: String,
    pub input_file: String,
    #[serde(default)]
    pub output_format: OutputFormat,
    pub result: ExpectedResult,
}

/// Verdict of a vector within one suite run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VectorOutcome {
    #[default]
    NotRun,
    Success,
    Fail,
    Timeout,
    Error,
    /// Decoded in reference mode; output recorded as the new expectation
    Reference,
}

impl VectorOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorOutcome::NotRun => "Not Run",
            VectorOutcome::Success => "Success",
            VectorOutcome::Fail => "Fail",
            VectorOutcome::Timeout => "Timeout",
            VectorOutcome::Error => "Error",
            VectorOutcome::Reference => "Reference run",
        }
    }

    /// Fail, Timeout and Error carry failure records; nothing else does.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            VectorOutcome::Fail | VectorOutcome::Timeout | VectorOutcome::Error
        )
    }

    /// Character appended to the live status line
    pub fn progress_char(&self) -> char {
        match self {
            VectorOutcome::Success | VectorOutcome::Reference => '.',
            VectorOutcome::Fail => 'F',
            VectorOutcome::Error => 'E',
            VectorOutcome::Timeout => 'T',
            VectorOutcome::NotRun => ' ',
        }
    }
}

impl fmt::Display for VectorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a vector failed: a one-line title plus detail lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub title: String,
    pub detail: Vec<String>,
}

impl FailureRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: Vec<String>) -> Self {
        self.detail = detail;
        self
    }
}

/// Per-run state of one vector, seeded from its catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRun {
    pub name: String,
    pub output_format: OutputFormat,
    pub expected: ExpectedResult,
    pub outcome: VectorOutcome,
    pub errors: Vec<FailureRecord>,
    pub elapsed: Duration,
    /// Output seen by the decoder, kept for reference runs and reports
    pub observed: Option<ExpectedResult>,
}

impl VectorRun {
    pub fn seed(vector: &TestVector) -> Self {
        Self {
            name: vector.name.clone(),
            output_format: vector.output_format,
            expected: vector.result.clone(),
            outcome: VectorOutcome::NotRun,
            errors: Vec::new(),
            elapsed: Duration::ZERO,
            observed: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            VectorOutcome::Success | VectorOutcome::Reference
        ) && self.errors.is_empty()
    }
}
