//! Subprocess execution for live gateways.
//!
//! Every live gateway shells out through a [`ProcessRunner`], which owns the
//! timeout policy. Pipelines never deal with timeouts directly.

use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Spawns external tools with a shared timeout and output bound.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ProcessRunner {
    pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            output_limit_bytes: Self::DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            output_limit_bytes: self.output_limit_bytes,
        }
    }

    /// Run `program args...` in `cwd`, capturing stdout/stderr.
    ///
    /// A non-zero exit is not an error here; callers classify it. Errors mean
    /// the process could not be spawned or waited on.
    #[instrument(skip_all, fields(program, cwd = %cwd.display()))]
    pub fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(args = ?args, "spawning child process");
        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                error!(err = %e, "failed to spawn command");
                return Err(e).with_context(|| format!("spawn {program} {}", args.join(" ")));
            }
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;
        let limit = self.output_limit_bytes;
        let stdout_handle = thread::spawn(move || read_stream_limited(stdout, limit));
        let stderr_handle = thread::spawn(move || read_stream_limited(stderr, limit));

        let mut timed_out = false;
        let status = match child.wait_timeout(self.timeout).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "command timed out, killing"
                );
                timed_out = true;
                child.kill().context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        };

        let stdout = join_output(stdout_handle).context("join stdout")?;
        let stderr = join_output(stderr_handle).context("join stderr")?;

        debug!(exit_code = ?status.code(), timed_out, "command finished");
        Ok(CommandOutput {
            status,
            stdout,
            stderr,
            timed_out,
        })
    }
}

fn join_output(handle: thread::JoinHandle<Result<Vec<u8>>>) -> Result<Vec<u8>> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Drain `reader` completely, keeping at most `limit` bytes.
fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..keep]);
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_status() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ProcessRunner::new(Duration::from_secs(10));
        let out = runner
            .run("sh", &["-c", "printf hello; exit 3"], temp.path())
            .expect("run");
        assert_eq!(out.stdout_text(), "hello");
        assert_eq!(out.status.code(), Some(3));
        assert!(!out.success());
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ProcessRunner::new(Duration::from_secs(10));
        let err = runner
            .run("erk-test-no-such-binary", &[], temp.path())
            .unwrap_err();
        assert!(err.to_string().contains("spawn erk-test-no-such-binary"));
    }

    #[test]
    fn output_is_bounded() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ProcessRunner {
            timeout: Duration::from_secs(10),
            output_limit_bytes: 4,
        };
        let out = runner
            .run("sh", &["-c", "printf 0123456789"], temp.path())
            .expect("run");
        assert_eq!(out.stdout_text(), "0123");
    }
}
