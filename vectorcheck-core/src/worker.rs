//! Worker Process Entry Point
//!
//! A worker decodes the jobs its supervisor sends, one at a time, and answers
//! each with a [`JobReport`]. On Unix it talks over fd 3/4 (announced via
//! `VECTORCHECK_IPC_FD`) and turns SIGTERM into a graceful stop; elsewhere it
//! falls back to stdin/stdout.

use crate::decoder::DecoderRegistry;
use crate::job::run_job;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use vectorcheck_ipc::{
    FrameError, FrameReader, FrameWriter, IPC_FD_ENV, JobReport, JobSpec, SupervisorCommand,
    WorkerHello, WorkerMessage,
};

#[cfg(unix)]
use std::os::unix::io::FromRawFd;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Whether SIGTERM has been received.
fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

#[cfg(unix)]
fn install_sigterm_handler() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigterm_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);
        libc::sigaction(libc::SIGTERM, &sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn sigterm_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

#[cfg(not(unix))]
fn install_sigterm_handler() {}

/// Parse `<read_fd>,<write_fd>`.
fn parse_fd_pair(value: &str) -> Option<(i32, i32)> {
    let (read, write) = value.split_once(',')?;
    Some((read.trim().parse().ok()?, write.trim().parse().ok()?))
}

type BoxedReader = FrameReader<Box<dyn Read>>;
type BoxedWriter = FrameWriter<Box<dyn Write>>;

fn open_transport() -> (BoxedReader, BoxedWriter) {
    #[cfg(unix)]
    if let Ok(value) = std::env::var(IPC_FD_ENV) {
        if let Some((read_fd, write_fd)) = parse_fd_pair(&value) {
            // The supervisor dup'd these descriptors for us and owns no copy.
            let read_file = unsafe { std::fs::File::from_raw_fd(read_fd) };
            let write_file = unsafe { std::fs::File::from_raw_fd(write_fd) };
            return (
                FrameReader::new(Box::new(read_file) as Box<dyn Read>),
                FrameWriter::new(Box::new(write_file) as Box<dyn Write>),
            );
        }
        warn!(
            "invalid {IPC_FD_ENV}={value:?} (expected <read_fd>,<write_fd>), falling back to stdio"
        );
    }
    (
        FrameReader::new(Box::new(std::io::stdin()) as Box<dyn Read>),
        FrameWriter::new(Box::new(std::io::stdout()) as Box<dyn Write>),
    )
}

/// Worker main loop
pub struct WorkerMain {
    registry: DecoderRegistry,
    reader: BoxedReader,
    writer: BoxedWriter,
}

impl WorkerMain {
    pub fn new(registry: DecoderRegistry) -> Self {
        let (reader, writer) = open_transport();
        Self {
            registry,
            reader,
            writer,
        }
    }

    /// Serve commands until `Shutdown`, SIGTERM, or the supervisor hangs up.
    pub fn run(&mut self) -> Result<(), FrameError> {
        install_sigterm_handler();

        self.writer.write(&WorkerMessage::Hello(WorkerHello {
            decoders: self.registry.names(),
            ..WorkerHello::default()
        }))?;

        while !shutdown_requested() {
            let command: SupervisorCommand = match self.reader.read() {
                Ok(command) => command,
                Err(FrameError::EndOfStream) => break,
                Err(e) => return Err(e),
            };

            match command {
                SupervisorCommand::Run(spec) => {
                    let report = self.run_spec(&spec);
                    self.writer.write(&WorkerMessage::Report(report))?;
                }
                SupervisorCommand::Shutdown => break,
            }
        }

        debug!("worker exiting");
        Ok(())
    }

    fn run_spec(&self, spec: &JobSpec) -> JobReport {
        match self.registry.get(&spec.decoder) {
            Some(entry) => run_job(entry.decoder().as_ref(), spec),
            None => JobReport::errored(
                spec,
                format!("Decoder not found in worker: {}", spec.decoder),
                Vec::new(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fd_pair() {
        assert_eq!(parse_fd_pair("3,4"), Some((3, 4)));
        assert_eq!(parse_fd_pair(" 5 , 6"), Some((5, 6)));
        assert_eq!(parse_fd_pair("3"), None);
        assert_eq!(parse_fd_pair("a,4"), None);
    }
}
