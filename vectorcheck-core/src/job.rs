//! Jobs: one vector decoded by one decoder, and how their results are judged.

use crate::codec::OutputFormat;
use crate::decoder::{DecodeError, DecodeRequest, Decoder};
use crate::suite::TestSuite;
use crate::vector::{ExpectedResult, FailureRecord, TestVector, VectorOutcome};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use vectorcheck_ipc::{JobReport, JobSpec, JobStatus};

/// Settings shared by every job of a suite run
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub timeout: Duration,
    pub verbose: bool,
    pub keep_files: bool,
    /// Record output instead of comparing it
    pub reference: bool,
}

/// A unit of work for the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub spec: JobSpec,
    /// `None` in reference mode
    pub expected: Option<ExpectedResult>,
}

impl Job {
    pub fn for_vector(
        suite: &TestSuite,
        vector: &TestVector,
        decoder: &str,
        resources_dir: &Path,
        results_dir: &Path,
        settings: &JobSettings,
    ) -> Self {
        let output = results_dir.join(format!("{}.out", vector.name));
        Self {
            spec: JobSpec {
                suite: suite.name.clone(),
                vector: vector.name.clone(),
                decoder: decoder.to_string(),
                input_path: suite
                    .input_path(resources_dir, vector)
                    .to_string_lossy()
                    .into_owned(),
                output_path: output.to_string_lossy().into_owned(),
                output_format: vector.output_format.as_str().to_string(),
                timeout_ns: u64::try_from(settings.timeout.as_nanos()).unwrap_or(u64::MAX),
                verbose: settings.verbose,
                keep_files: settings.keep_files,
            },
            expected: if settings.reference {
                None
            } else {
                Some(vector.result.clone())
            },
        }
    }

    pub fn vector(&self) -> &str {
        &self.spec.vector
    }

    /// Name used in failure titles: `vector (decoder.suite)`
    pub fn test_id(&self) -> String {
        format!(
            "{} ({}.{})",
            self.spec.vector, self.spec.decoder, self.spec.suite
        )
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Run one job in the current process. Never panics and never fails:
/// decode errors and panics become [`JobStatus::Errored`].
pub fn run_job(decoder: &dyn Decoder, spec: &JobSpec) -> JobReport {
    let input = PathBuf::from(&spec.input_path);
    let output = PathBuf::from(&spec.output_path);
    let format: OutputFormat = spec.output_format.parse().unwrap_or_default();
    let request = DecodeRequest {
        input: &input,
        output: &output,
        format,
        timeout: spec.timeout(),
        verbose: spec.verbose,
        keep_files: spec.keep_files,
    };

    debug!(vector = %spec.vector, decoder = %spec.decoder, "decoding");
    let started = Instant::now();
    let result = catch_unwind(AssertUnwindSafe(|| decoder.decode(&request)));
    let elapsed = started.elapsed();

    if !spec.keep_files && output.exists() {
        if let Err(e) = std::fs::remove_file(&output) {
            warn!(path = %output.display(), error = %e, "could not remove decoder output");
        }
    }

    let status = match result {
        Ok(Ok(decoded)) => JobStatus::Decoded(decoded),
        Ok(Err(DecodeError::Timeout(_))) => JobStatus::TimedOut,
        Ok(Err(e)) => JobStatus::Errored {
            message: e.to_string(),
            detail: e.detail(),
        },
        Err(panic) => JobStatus::Errored {
            message: format!("decoder panicked: {}", panic_message(&*panic)),
            detail: Vec::new(),
        },
    };

    JobReport {
        vector: spec.vector.clone(),
        decoder: spec.decoder.clone(),
        status,
        elapsed_ns: u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX),
    }
}

/// Verdict for one job, ready to be merged into its suite run.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub vector: String,
    pub outcome: VectorOutcome,
    pub errors: Vec<FailureRecord>,
    pub observed: Option<ExpectedResult>,
    pub elapsed: Duration,
}

/// Compare a report against the job's expectation.
pub fn judge(job: &Job, report: &JobReport) -> JobOutcome {
    let mut errors = Vec::new();
    let mut observed = None;

    let outcome = match &report.status {
        JobStatus::Decoded(output) => {
            observed = Some(ExpectedResult::from(output.clone()));
            match &job.expected {
                None => VectorOutcome::Reference,
                Some(expected) if expected.matches(output) => VectorOutcome::Success,
                Some(expected) => {
                    let actual = ExpectedResult::from(output.clone());
                    let reason = match expected.first_frame_mismatch(output) {
                        Some(frame) => {
                            format!("frame {frame} differs: expected {expected} got {actual}")
                        }
                        None => format!("'{expected}' != '{actual}' : {}", job.vector()),
                    };
                    errors.push(FailureRecord::new(job.test_id()).with_detail(vec![reason]));
                    VectorOutcome::Fail
                }
            }
        }
        JobStatus::TimedOut => {
            errors.push(FailureRecord::new(job.test_id()).with_detail(vec![format!(
                "timed out after {:.3} secs",
                job.spec.timeout().as_secs_f64()
            )]));
            VectorOutcome::Timeout
        }
        JobStatus::Errored { message, detail } => {
            let mut lines = vec![message.clone()];
            lines.extend(detail.iter().cloned());
            errors.push(FailureRecord::new(job.test_id()).with_detail(lines));
            VectorOutcome::Error
        }
    };

    JobOutcome {
        vector: report.vector.clone(),
        outcome,
        errors,
        observed,
        elapsed: report.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use vectorcheck_ipc::DecodedOutput;

    struct Fixed(&'static str);

    impl Decoder for Fixed {
        fn name(&self) -> &str {
            "Fixed"
        }
        fn codec(&self) -> Codec {
            Codec::Dummy
        }
        fn decode(&self, request: &DecodeRequest<'_>) -> Result<DecodedOutput, DecodeError> {
            std::fs::write(request.output, b"frame data")?;
            Ok(DecodedOutput::Checksum(self.0.to_string()))
        }
    }

    struct Panics;

    impl Decoder for Panics {
        fn name(&self) -> &str {
            "Panics"
        }
        fn codec(&self) -> Codec {
            Codec::Dummy
        }
        fn decode(&self, _request: &DecodeRequest<'_>) -> Result<DecodedOutput, DecodeError> {
            panic!("corrupt slice header")
        }
    }

    fn suite() -> TestSuite {
        serde_json::from_str(
            r#"{"name": "dummy", "codec": "Dummy", "description": "d",
                "test_vectors": [{"name": "one", "source": "s", "source_checksum": "c",
                "input_file": "one.bin", "output_format": "yuv420p", "result": "DEADBEEF"}]}"#,
        )
        .unwrap()
    }

    fn job(results: &Path, keep_files: bool, reference: bool) -> Job {
        let suite = suite();
        let settings = JobSettings {
            timeout: Duration::from_secs(5),
            verbose: false,
            keep_files,
            reference,
        };
        let vector = &suite.test_vectors[0];
        Job::for_vector(&suite, vector, "Fixed", Path::new("res"), results, &settings)
    }

    #[test]
    fn test_job_paths() {
        let job = job(Path::new("/tmp/out/dummy"), false, false);
        assert_eq!(job.spec.input_path, "res/dummy/one/one.bin");
        assert_eq!(job.spec.output_path, "/tmp/out/dummy/one.out");
        assert_eq!(job.spec.output_format, "yuv420p");
        assert_eq!(job.test_id(), "one (Fixed.dummy)");
    }

    #[test]
    fn test_huge_timeout_saturates() {
        let suite = suite();
        let settings = JobSettings {
            timeout: Duration::from_secs(u64::MAX),
            verbose: false,
            keep_files: false,
            reference: false,
        };
        let vector = &suite.test_vectors[0];
        let out = Path::new("out");
        let job = Job::for_vector(&suite, vector, "Fixed", Path::new("res"), out, &settings);
        assert_eq!(job.spec.timeout_ns, u64::MAX);
    }

    #[test]
    fn test_success_and_output_cleanup() {
        let tmp = tempfile::tempdir().unwrap();
        let job = job(tmp.path(), false, false);
        let report = run_job(&Fixed("deadbeef"), &job.spec);
        assert!(!Path::new(&job.spec.output_path).exists());

        let outcome = judge(&job, &report);
        assert_eq!(outcome.outcome, VectorOutcome::Success);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_keep_files_leaves_output() {
        let tmp = tempfile::tempdir().unwrap();
        let job = job(tmp.path(), true, false);
        run_job(&Fixed("deadbeef"), &job.spec);
        assert!(Path::new(&job.spec.output_path).exists());
    }

    #[test]
    fn test_mismatch_is_fail_with_record() {
        let tmp = tempfile::tempdir().unwrap();
        let job = job(tmp.path(), false, false);
        let outcome = judge(&job, &run_job(&Fixed("0badf00d"), &job.spec));
        assert_eq!(outcome.outcome, VectorOutcome::Fail);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].title, "one (Fixed.dummy)");
        assert!(outcome.errors[0].detail[0].contains("0badf00d"));
    }

    #[test]
    fn test_reference_records_output() {
        let tmp = tempfile::tempdir().unwrap();
        let job = job(tmp.path(), false, true);
        assert!(job.expected.is_none());
        let outcome = judge(&job, &run_job(&Fixed("0badf00d"), &job.spec));
        assert_eq!(outcome.outcome, VectorOutcome::Reference);
        assert_eq!(
            outcome.observed,
            Some(ExpectedResult::Checksum("0badf00d".to_string()))
        );
    }

    #[test]
    fn test_panic_becomes_error() {
        let tmp = tempfile::tempdir().unwrap();
        let job = job(tmp.path(), false, false);
        let report = run_job(&Panics, &job.spec);
        match &report.status {
            JobStatus::Errored { message, detail } => {
                assert_eq!(message, "decoder panicked: corrupt slice header");
                assert!(detail.is_empty());
            }
            other => panic!("unexpected status {other:?}"),
        }
        assert_eq!(judge(&job, &report).outcome, VectorOutcome::Error);
    }

    #[test]
    fn test_timeout_report_is_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        let job = job(tmp.path(), false, false);
        let report = JobReport::timed_out(&job.spec, Duration::from_secs(5));
        let outcome = judge(&job, &report);
        assert_eq!(outcome.outcome, VectorOutcome::Timeout);
        assert_eq!(outcome.errors[0].detail[0], "timed out after 5.000 secs");
    }
}
