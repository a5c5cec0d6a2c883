use std::fmt;
use std::io;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

use super::capture::OutputCapture;

/// Outcome of one supervised command invocation.
///
/// Carries the raw exit information and the fully captured output; this
/// module performs no interpretation of the output content.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Exit code, absent when the process was killed (timeout or signal).
    pub exit_code: Option<i32>,
    /// True when the process was forcibly terminated on the deadline.
    pub timed_out: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// The command could not be supervised at all. Never conflated with a
/// nonzero exit code.
#[derive(Debug)]
pub enum RunError {
    /// The executable could not be started (not found, permission denied).
    Launch { program: String, source: io::Error },
    /// The process started but waiting for it failed.
    Wait { program: String, source: io::Error },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Launch { program, source } => {
                write!(f, "failed to launch \"{}\": {}", program, source)
            }
            RunError::Wait { program, source } => {
                write!(f, "failed waiting for \"{}\": {}", program, source)
            }
        }
    }
}

impl std::error::Error for RunError {}

/// Run an external command with the given argument vector, draining stdout
/// and stderr concurrently so the child cannot deadlock on pipe backpressure.
///
/// The program is executed directly, never through a shell. When `timeout`
/// is set and the process has not exited by the deadline, it is killed and
/// reaped, and the result reports `timed_out` instead of an exit code.
pub fn run_command(
    program: &str,
    args: &[String],
    timeout: Option<Duration>,
) -> Result<ExecutionResult, RunError> {
    let start = Instant::now();

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| RunError::Launch {
            program: program.to_string(),
            source,
        })?;

    let capture = OutputCapture::spawn(child.stdout.take(), child.stderr.take());

    let (status, timed_out) = match timeout {
        Some(limit) => {
            match child.wait_timeout(limit).map_err(|source| RunError::Wait {
                program: program.to_string(),
                source,
            })? {
                Some(status) => (Some(status), false),
                None => {
                    // Deadline passed: kill and reap so the drains see EOF.
                    let _ = child.kill();
                    let _ = child.wait();
                    (None, true)
                }
            }
        }
        None => {
            let status = child.wait().map_err(|source| RunError::Wait {
                program: program.to_string(),
                source,
            })?;
            (Some(status), false)
        }
    };

    // Both drains must be complete before the result is interpreted.
    let output = capture.join();

    Ok(ExecutionResult {
        exit_code: status.and_then(|s| s.code()),
        timed_out,
        stdout: output.stdout,
        stderr: output.stderr,
        duration: start.elapsed(),
    })
}
