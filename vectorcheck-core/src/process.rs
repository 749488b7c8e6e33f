//! Running decoder commands with a hard deadline.

use crate::decoder::DecodeError;
use std::io::Read;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a command that finished before its deadline
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn stderr_lines(&self) -> Vec<String> {
        self.stderr.lines().map(str::to_string).collect()
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Kill the child's whole process group, so helpers it forked cannot keep
/// the output pipes open past the deadline.
fn kill_and_reap(child: &mut Child) {
    #[cfg(unix)]
    {
        let pgid = child.id() as libc::pid_t;
        if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
            debug!(pgid, error = %std::io::Error::last_os_error(), "killpg after timeout failed");
        }
    }
    if let Err(e) = child.kill() {
        debug!(pid = child.id(), error = %e, "kill after timeout failed");
    }
    if let Err(e) = child.wait() {
        warn!(pid = child.id(), error = %e, "reaping timed out child failed");
    }
}

/// Spawn `command`, capture its output and kill it once `timeout` elapses.
///
/// Stdout and stderr are drained on helper threads so a chatty decoder can
/// never block on a full pipe while we wait for it.
pub fn run_with_timeout(
    command: &mut Command,
    timeout: Duration,
) -> Result<ProcessOutput, DecodeError> {
    let started = Instant::now();
    #[cfg(unix)]
    command.process_group(0);
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if started.elapsed() >= timeout => {
                kill_and_reap(&mut child);
                let _ = stdout.join();
                let _ = stderr.join();
                return Err(DecodeError::Timeout(timeout));
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    let join = |handle: JoinHandle<String>| {
        handle
            .join()
            .map_err(|_| DecodeError::Other("output reader thread panicked".to_string()))
    };
    Ok(ProcessOutput {
        status,
        stdout: join(stdout)?,
        stderr: join(stderr)?,
        elapsed: started.elapsed(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stdout_and_status() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello; echo oops >&2; exit 3"]);
        let out = run_with_timeout(&mut cmd, Duration::from_secs(10)).unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr_lines(), vec!["oops".to_string()]);
        assert_eq!(out.status.code(), Some(3));
    }

    #[test]
    fn test_kills_on_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = Instant::now();
        let err = run_with_timeout(&mut cmd, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, DecodeError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_timeout_kills_grandchildren() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 3; true"]);
        let started = Instant::now();
        let err = run_with_timeout(&mut cmd, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, DecodeError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let mut cmd = Command::new("/nonexistent/vectorcheck-decoder");
        let err = run_with_timeout(&mut cmd, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }
}
