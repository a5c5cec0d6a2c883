use std::io::Read;
use std::thread;

/// Captured child output, available only after both drains finished.
#[derive(Debug, Default)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// In-memory capture of a child process's stdout and stderr.
///
/// One drain thread per stream reads to EOF so the child is never blocked on
/// a full OS pipe buffer. The accumulated bytes are only exposed by `join`,
/// after both streams are confirmed closed.
pub struct OutputCapture {
    stdout: Option<thread::JoinHandle<Vec<u8>>>,
    stderr: Option<thread::JoinHandle<Vec<u8>>>,
}

impl OutputCapture {
    /// Start draining both streams. A `None` stream simply yields no bytes.
    pub fn spawn<O, E>(stdout: Option<O>, stderr: Option<E>) -> Self
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        Self {
            stdout: stdout.map(spawn_drain),
            stderr: stderr.map(spawn_drain),
        }
    }

    /// Wait for both drains to complete and return the captured bytes.
    ///
    /// Waits unconditionally; a drain that panicked yields empty output
    /// rather than aborting the run.
    pub fn join(self) -> CapturedOutput {
        CapturedOutput {
            stdout: join_drain(self.stdout),
            stderr: join_drain(self.stderr),
        }
    }
}

fn spawn_drain<R>(mut reader: R) -> thread::JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        // A read error ends the drain; whatever arrived so far is kept.
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn join_drain(handle: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    match handle {
        Some(handle) => handle.join().unwrap_or_default(),
        None => Vec::new(),
    }
}
