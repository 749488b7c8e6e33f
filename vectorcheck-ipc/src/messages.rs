//! IPC Message Types
//!
//! All messages are serialized with rkyv and validated on receipt.

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use std::time::Duration;

/// Everything a worker needs to decode one test vector.
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct JobSpec {
    /// Test suite the vector belongs to
    pub suite: String,
    /// Test vector name (unique within the suite)
    pub vector: String,
    /// Registry name of the decoder to run
    pub decoder: String,
    /// Absolute or working-directory relative path of the encoded input
    pub input_path: String,
    /// Where the decoder writes its output
    pub output_path: String,
    /// Output format name (`yuv420p`, `fltp`, ...)
    pub output_format: String,
    /// Per-job timeout in nanoseconds
    pub timeout_ns: u64,
    /// Forward decoder diagnostics
    pub verbose: bool,
    /// Keep the decoded output file after the job
    pub keep_files: bool,
}

impl JobSpec {
    /// Per-job timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_nanos(self.timeout_ns)
    }
}

/// What a decoder produced for a vector.
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum DecodedOutput {
    /// A single checksum of the whole output
    Checksum(String),
    /// One checksum per decoded frame
    Frames(Vec<String>),
}

/// How a job ended, before comparison against the expected result.
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum JobStatus {
    /// The decoder finished and produced output
    Decoded(DecodedOutput),
    /// The decoder exceeded the per-job timeout
    TimedOut,
    /// The decoder failed or panicked
    Errored {
        /// One-line reason
        message: String,
        /// Extra lines (stderr tail, backtrace)
        detail: Vec<String>,
    },
}

/// Result of one job, sent from worker to supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct JobReport {
    /// Test vector name, used to merge the report back into its suite
    pub vector: String,
    /// Decoder that ran the job
    pub decoder: String,
    /// Outcome of the decode
    pub status: JobStatus,
    /// Wall-clock time spent in the decoder
    pub elapsed_ns: u64,
}

impl JobReport {
    /// Build a report for a job that never produced a decode result.
    pub fn errored(spec: &JobSpec, message: impl Into<String>, detail: Vec<String>) -> Self {
        Self {
            vector: spec.vector.clone(),
            decoder: spec.decoder.clone(),
            status: JobStatus::Errored {
                message: message.into(),
                detail,
            },
            elapsed_ns: 0,
        }
    }

    /// Build a report for a job that hit its timeout.
    pub fn timed_out(spec: &JobSpec, elapsed: Duration) -> Self {
        Self {
            vector: spec.vector.clone(),
            decoder: spec.decoder.clone(),
            status: JobStatus::TimedOut,
            elapsed_ns: elapsed.as_nanos() as u64,
        }
    }

    /// Wall-clock time spent in the decoder
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns)
    }
}

/// Handshake sent by a worker once its IPC channel is up.
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct WorkerHello {
    /// Protocol version for compatibility
    pub protocol_version: u32,
    /// Worker process id
    pub pid: u32,
    /// Names of the decoders the worker can run
    pub decoders: Vec<String>,
}

impl Default for WorkerHello {
    fn default() -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            pid: std::process::id(),
            decoders: Vec::new(),
        }
    }
}

/// Commands sent from Supervisor to Worker
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum SupervisorCommand {
    /// Decode one test vector
    Run(JobSpec),
    /// Request graceful shutdown
    Shutdown,
}

/// Messages sent from Worker to Supervisor
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum WorkerMessage {
    /// Initial handshake
    Hello(WorkerHello),
    /// Result of a `Run` command
    Report(JobReport),
}
