//! Supervisor Process
//!
//! Spawns one worker process per job, hands it the job over fd 3/4 and turns
//! whatever happens to the worker into a [`JobReport`].

use std::ffi::OsString;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};
use vectorcheck_ipc::{
    FrameError, FrameReader, FrameWriter, IPC_FD_ENV, JobReport, JobSpec, PROTOCOL_VERSION,
    SupervisorCommand, WORKER_FLAG, WorkerMessage,
};

/// Extra time a worker gets to report after the job timeout
pub const DEFAULT_GRACE: Duration = Duration::from_secs(1);

const POLL_STEP: Duration = Duration::from_millis(100);
const DRAIN_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("Worker protocol error: expected {expected}, got {got}")]
    ProtocolError { expected: String, got: String },
}

impl From<FrameError> for SupervisorError {
    fn from(e: FrameError) -> Self {
        SupervisorError::IpcError(e.to_string())
    }
}

#[derive(Debug)]
enum PollResult {
    DataAvailable,
    Timeout,
    PipeClosed,
    Error(std::io::Error),
}

fn wait_for_data(fd: RawFd, timeout: Duration) -> PollResult {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    let result = unsafe { libc::poll(&mut pollfd, 1, timeout.as_millis() as i32) };

    if result < 0 {
        PollResult::Error(std::io::Error::last_os_error())
    } else if result == 0 {
        PollResult::Timeout
    } else if pollfd.revents & libc::POLLIN != 0 {
        // A closing pipe may still hold the final report
        PollResult::DataAvailable
    } else if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        PollResult::PipeClosed
    } else {
        PollResult::Timeout
    }
}

/// Create a close-on-exec pipe, returning (read_fd, write_fd).
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

fn send_sigterm(pid: u32) -> Result<(), std::io::Error> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Worker process handle
pub struct WorkerHandle {
    child: Child,
    reader: FrameReader<std::fs::File>,
    writer: FrameWriter<std::fs::File>,
    msg_read_fd: RawFd,
}

impl WorkerHandle {
    /// Spawn `binary --worker <extra args>` with commands on fd 3 and reports on fd 4.
    pub fn spawn(binary: &Path, extra_args: &[OsString]) -> Result<Self, SupervisorError> {
        // cmd pipe: supervisor writes, worker reads fd 3
        let (cmd_read, cmd_write) = create_pipe()?;
        // msg pipe: worker writes fd 4, supervisor reads
        let (msg_read, msg_write) = match create_pipe() {
            Ok(fds) => fds,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        let mut command = Command::new(binary);
        command
            .arg(WORKER_FLAG)
            .args(extra_args)
            .env(IPC_FD_ENV, "3,4")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        unsafe {
            command.pre_exec(move || {
                if cmd_read != 3 {
                    libc::dup2(cmd_read, 3);
                    libc::close(cmd_read);
                }
                let flags = libc::fcntl(3, libc::F_GETFD);
                libc::fcntl(3, libc::F_SETFD, flags & !libc::FD_CLOEXEC);

                if msg_write != 4 {
                    libc::dup2(msg_write, 4);
                    libc::close(msg_write);
                }
                let flags = libc::fcntl(4, libc::F_GETFD);
                libc::fcntl(4, libc::F_SETFD, flags & !libc::FD_CLOEXEC);

                libc::close(cmd_write);
                libc::close(msg_read);
                Ok(())
            });
        }

        let child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                close_fd(msg_read);
                close_fd(msg_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        close_fd(cmd_read);
        close_fd(msg_write);

        let writer_file = unsafe { std::fs::File::from_raw_fd(cmd_write) };
        let reader_file = unsafe { std::fs::File::from_raw_fd(msg_read) };

        let mut handle = Self {
            child,
            reader: FrameReader::new(reader_file),
            writer: FrameWriter::new(writer_file),
            msg_read_fd: msg_read,
        };

        handle.wait_for_hello()?;
        Ok(handle)
    }

    fn wait_for_hello(&mut self) -> Result<(), SupervisorError> {
        match self.reader.read::<WorkerMessage>()? {
            WorkerMessage::Hello(hello) => {
                if hello.protocol_version != PROTOCOL_VERSION {
                    return Err(SupervisorError::ProtocolError {
                        expected: format!("protocol version {}", PROTOCOL_VERSION),
                        got: format!("protocol version {}", hello.protocol_version),
                    });
                }
                debug!(pid = hello.pid, decoders = hello.decoders.len(), "worker ready");
                Ok(())
            }
            other => Err(SupervisorError::ProtocolError {
                expected: "Hello".to_string(),
                got: format!("{:?}", other),
            }),
        }
    }

    /// Send a job and wait for its report.
    ///
    /// Past `spec.timeout() + grace` the worker is stopped and the job is
    /// reported as timed out.
    pub fn run_job(
        &mut self,
        spec: &JobSpec,
        grace: Duration,
    ) -> Result<JobReport, SupervisorError> {
        self.writer.write(&SupervisorCommand::Run(spec.clone()))?;

        let start = Instant::now();
        let deadline = spec.timeout() + grace;

        loop {
            let remaining = deadline.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return self.handle_timeout(spec, start);
            }

            // Buffered bytes may be a partial frame that never completes.
            if self.reader.has_buffered_data() {
                if !self.is_alive() {
                    return Err(SupervisorError::WorkerCrashed(
                        "Worker process crashed with partial data buffered".to_string(),
                    ));
                }
            } else {
                match wait_for_data(self.msg_read_fd, remaining.min(POLL_STEP)) {
                    PollResult::DataAvailable => {}
                    PollResult::Timeout => {
                        if !self.is_alive() {
                            return Err(SupervisorError::WorkerCrashed(self.exit_description()));
                        }
                        continue;
                    }
                    PollResult::PipeClosed => {
                        return Err(SupervisorError::WorkerCrashed(self.exit_description()));
                    }
                    PollResult::Error(e) => {
                        return Err(SupervisorError::WorkerCrashed(format!("Pipe error: {}", e)));
                    }
                }
            }

            let msg: WorkerMessage = match self.reader.read() {
                Ok(msg) => msg,
                Err(FrameError::EndOfStream) => {
                    return Err(SupervisorError::WorkerCrashed(self.exit_description()));
                }
                Err(e) => {
                    if !self.is_alive() {
                        return Err(SupervisorError::WorkerCrashed(
                            "Worker crashed during read".to_string(),
                        ));
                    }
                    return Err(SupervisorError::IpcError(e.to_string()));
                }
            };

            match msg {
                WorkerMessage::Report(report) => return Ok(report),
                WorkerMessage::Hello(_) => {
                    return Err(SupervisorError::ProtocolError {
                        expected: "Report".to_string(),
                        got: "Hello".to_string(),
                    });
                }
            }
        }
    }

    /// SIGTERM, drain for a short window, then SIGKILL.
    fn handle_timeout(
        &mut self,
        spec: &JobSpec,
        start: Instant,
    ) -> Result<JobReport, SupervisorError> {
        let _ = send_sigterm(self.child.id());

        let drain_deadline = Instant::now() + DRAIN_WINDOW;
        let mut late_report = None;
        loop {
            let remaining = drain_deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match wait_for_data(self.msg_read_fd, remaining) {
                PollResult::DataAvailable => {
                    if let Ok(WorkerMessage::Report(report)) = self.reader.read::<WorkerMessage>() {
                        late_report = Some(report);
                    }
                    break;
                }
                _ => break,
            }
        }

        if self.is_alive() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }

        if let Some(report) = late_report {
            debug!(vector = %report.vector, "worker reported while being stopped");
        }
        warn!(vector = %spec.vector, decoder = %spec.decoder, "job timed out, worker stopped");
        Ok(JobReport::timed_out(spec, start.elapsed()))
    }

    /// Shutdown the worker gracefully
    pub fn shutdown(mut self) -> Result<(), SupervisorError> {
        self.writer.write(&SupervisorCommand::Shutdown)?;
        let _ = self.child.wait();
        Ok(())
    }

    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn exit_description(&mut self) -> String {
        match self.child.try_wait() {
            Ok(Some(status)) => format!("Worker exited unexpectedly ({})", status),
            _ => "Worker closed connection unexpectedly".to_string(),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = send_sigterm(self.child.id());
            std::thread::sleep(Duration::from_millis(50));
            if self.is_alive() {
                let _ = self.child.kill();
            }
            let _ = self.child.wait();
        }
    }
}

/// Runs each job in a fresh worker process
pub struct Supervisor {
    binary: PathBuf,
    worker_args: Vec<OsString>,
    grace: Duration,
}

impl Supervisor {
    /// Supervise workers started from `binary`.
    ///
    /// `worker_args` follow `--worker` on the worker command line, so the
    /// worker can rebuild the same decoder registry.
    pub fn new(binary: impl Into<PathBuf>, worker_args: Vec<OsString>) -> Self {
        Self {
            binary: binary.into(),
            worker_args,
            grace: DEFAULT_GRACE,
        }
    }

    /// Supervise workers started from the running executable
    pub fn current_exe(worker_args: Vec<OsString>) -> Result<Self, SupervisorError> {
        let binary = std::env::current_exe()?;
        Ok(Self::new(binary, worker_args))
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run one job in its own worker; every failure becomes an errored report.
    pub fn run_job(&self, spec: &JobSpec) -> JobReport {
        let started = Instant::now();
        match self.run_isolated(spec) {
            Ok(report) => report,
            Err(e) => {
                warn!(vector = %spec.vector, error = %e, "worker failed");
                let mut report = JobReport::errored(spec, e.to_string(), Vec::new());
                report.elapsed_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
                report
            }
        }
    }

    fn run_isolated(&self, spec: &JobSpec) -> Result<JobReport, SupervisorError> {
        let mut worker = WorkerHandle::spawn(&self.binary, &self.worker_args)?;
        let report = worker.run_job(spec, self.grace)?;
        let _ = worker.shutdown();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use vectorcheck_ipc::{JobStatus, WorkerHello};

    /// Shell stand-in for a worker: says hello on fd 4, then runs `then`.
    fn scripted_worker(dir: &Path, then: &str) -> PathBuf {
        let hello = dir.join("hello.bin");
        let mut frame = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut frame);
            writer.write(&WorkerMessage::Hello(WorkerHello::default())).unwrap();
        }
        std::fs::write(&hello, frame).unwrap();

        let script = dir.join("worker.sh");
        std::fs::write(&script, format!("#!/bin/sh\ncat '{}' >&4\n{}\n", hello.display(), then))
            .unwrap();
        let mut permissions = std::fs::metadata(&script).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&script, permissions).unwrap();
        script
    }

    /// Other tests fork concurrently, so a freshly written script can be
    /// briefly busy.
    fn spawn_script(script: &Path) -> WorkerHandle {
        for _ in 0..50 {
            match WorkerHandle::spawn(script, &[]) {
                Ok(handle) => return handle,
                Err(SupervisorError::SpawnFailed(e)) if e.raw_os_error() == Some(libc::ETXTBSY) => {
                    std::thread::sleep(Duration::from_millis(20));
                }
                Err(e) => panic!("spawn failed: {e}"),
            }
        }
        panic!("worker script stayed busy");
    }

    fn spec() -> JobSpec {
        JobSpec {
            suite: "dummy".to_string(),
            vector: "one".to_string(),
            decoder: "Dummy".to_string(),
            input_path: "/nonexistent/one.bin".to_string(),
            output_path: "/nonexistent/one.out".to_string(),
            output_format: "yuv420p".to_string(),
            timeout_ns: 1_000_000_000,
            verbose: false,
            keep_files: true,
        }
    }

    #[test]
    fn test_missing_binary_is_errored_report() {
        let supervisor = Supervisor::new("/nonexistent/vectorcheck-worker", Vec::new());
        let report = supervisor.run_job(&spec());
        match report.status {
            JobStatus::Errored { message, .. } => assert!(message.contains("spawn")),
            other => panic!("expected errored report, got {:?}", other),
        }
    }

    #[test]
    fn test_worker_that_exits_is_errored_report() {
        // `true` ignores its arguments and exits before saying hello.
        let supervisor = Supervisor::new("true", Vec::new());
        let report = supervisor.run_job(&spec());
        assert!(matches!(report.status, JobStatus::Errored { .. }));
        assert_eq!(report.vector, "one");
    }

    #[test]
    fn test_hung_worker_is_stopped_and_timed_out() {
        let tmp = tempfile::tempdir().unwrap();
        let script = scripted_worker(tmp.path(), "exec sleep 30");
        let mut worker = spawn_script(&script);

        let mut spec = spec();
        spec.timeout_ns = 100_000_000;
        let started = Instant::now();
        let report = worker.run_job(&spec, Duration::from_millis(100)).unwrap();

        assert_eq!(report.status, JobStatus::TimedOut);
        assert_eq!(report.vector, "one");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!worker.is_alive());
    }

    #[test]
    fn test_worker_dying_mid_job_is_crash() {
        let tmp = tempfile::tempdir().unwrap();
        let script = scripted_worker(tmp.path(), "head -c 1 <&3 >/dev/null\nexit 3");
        let mut worker = spawn_script(&script);

        let err = worker.run_job(&spec(), DEFAULT_GRACE).unwrap_err();
        assert!(matches!(err, SupervisorError::WorkerCrashed(_)), "got {err}");
    }

    #[test]
    fn test_grace_override() {
        let supervisor = Supervisor::new("true", Vec::new()).with_grace(Duration::from_millis(10));
        assert_eq!(supervisor.grace, Duration::from_millis(10));
    }
}
