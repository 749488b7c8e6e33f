#![warn(missing_docs)]
//! vectorcheck IPC protocol
//!
//! Binary protocol between the scheduler and its worker processes.
//! Messages are rkyv archives carried in length-prefixed frames; a worker
//! receives one [`JobSpec`] at a time and answers with a typed [`JobReport`].

mod framing;
mod messages;

pub use framing::{FrameError, FrameReader, FrameWriter, MAX_FRAME_SIZE, read_frame, write_frame};
pub use messages::{
    DecodedOutput, JobReport, JobSpec, JobStatus, SupervisorCommand, WorkerHello, WorkerMessage,
};

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable carrying the inherited `<read_fd>,<write_fd>` pair
pub const IPC_FD_ENV: &str = "VECTORCHECK_IPC_FD";

/// Hidden command line flag that switches the binary into worker mode
pub const WORKER_FLAG: &str = "--worker";
