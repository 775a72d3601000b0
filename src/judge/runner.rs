//! Process runner - spawns a command under a wall-clock limit and output cap
//!
//! The child's stdout and stderr are drained by background tasks while the
//! runner polls process status on a short interval. Neither a silent program
//! nor one that floods its stderr pipe can stall the caller past the limit.

use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, timeout};

use crate::constants::{DRAIN_GRACE_MS, POLL_INTERVAL_MS, SPAWN_FAILED_EXIT_CODE};

use super::process_tree;

/// Limits applied to a single run
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    /// Wall-clock limit, counted from the moment stdin is closed
    pub timeout: Duration,
    /// Stdout size that triggers termination
    pub output_cap_bytes: usize,
}

impl RunLimits {
    pub fn new(timeout_ms: u64, output_cap_kb: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            output_cap_bytes: usize::try_from(output_cap_kb.saturating_mul(1024))
                .unwrap_or(usize::MAX),
        }
    }
}

/// Why the runner terminated a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KillReason {
    TimeLimit,
    OutputLimit,
}

/// Result of running a command
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// False if the process could not be spawned at all
    pub started: bool,
    /// Exit code; `-signal` when killed by a signal, `SPAWN_FAILED_EXIT_CODE`
    /// when never started
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Set whenever the runner had to force-kill the process
    pub timed_out: bool,
    pub kill_reason: Option<KillReason>,
    pub stdout_truncated: bool,
    pub elapsed: Duration,
}

impl RunOutput {
    fn not_started(message: String) -> Self {
        Self {
            started: false,
            exit_code: SPAWN_FAILED_EXIT_CODE,
            stdout: String::new(),
            stderr: message,
            timed_out: false,
            kill_reason: None,
            stdout_truncated: false,
            elapsed: Duration::ZERO,
        }
    }

    /// Started, finished on its own and exited with status 0
    pub fn success(&self) -> bool {
        self.started && !self.timed_out && self.exit_code == 0
    }

    pub fn elapsed_ms(&self) -> u64 {
        duration_ms(self.elapsed)
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// How the poll loop ended
enum PollEnd {
    Exited(ExitStatus),
    Killed(KillReason),
    WaitFailed(std::io::Error),
}

/// Run `command` (program followed by its arguments) in `working_dir`,
/// feeding it `stdin`.
///
/// Never returns an error: spawn failures come back as `started = false`.
pub async fn run<S: AsRef<OsStr>>(
    command: &[S],
    working_dir: &Path,
    stdin: &[u8],
    limits: &RunLimits,
) -> RunOutput {
    let Some((program, args)) = command.split_first() else {
        return RunOutput::not_started("empty command".to_string());
    };

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    process_tree::isolate_group(&mut cmd);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(
                program = %program.as_ref().to_string_lossy(),
                error = %e,
                "Failed to spawn process"
            );
            return RunOutput::not_started(format!(
                "failed to start {}: {}",
                program.as_ref().to_string_lossy(),
                e
            ));
        }
    };
    let pid = child.id();

    let cap = limits.output_cap_bytes;
    let stdout = Arc::new(Mutex::new(CappedBuffer::new(cap)));
    let stderr = Arc::new(Mutex::new(CappedBuffer::new(cap)));
    let stdout_task = spawn_reader(child.stdout.take(), Arc::clone(&stdout));
    let stderr_task = spawn_reader(child.stderr.take(), Arc::clone(&stderr));

    // Closing stdin lets programs that read until EOF proceed.
    let mut stdin_stalled = false;
    if let Some(mut pipe) = child.stdin.take() {
        let feed = async move {
            pipe.write_all(stdin).await?;
            pipe.shutdown().await
        };
        match timeout(limits.timeout, feed).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Process closed stdin early"),
            Err(_) => stdin_stalled = true,
        }
    }

    let start = Instant::now();
    let end = if stdin_stalled {
        PollEnd::Killed(KillReason::TimeLimit)
    } else {
        poll_until_done(&mut child, &stdout, start, limits).await
    };

    // Reap anything the program left behind, whichever way it ended.
    if let Some(pid) = pid {
        if let Err(e) = process_tree::terminate_tree(pid).await {
            tracing::warn!(pid, error = %e, "Failed to terminate process tree");
        }
    }

    let (exit_code, kill_reason, wait_error) = match end {
        PollEnd::Exited(status) => (exit_code_of(status), None, None),
        PollEnd::Killed(reason) => {
            let _ = child.start_kill();
            let code = match child.wait().await {
                Ok(status) => exit_code_of(status),
                Err(_) => -1,
            };
            (code, Some(reason), None)
        }
        PollEnd::WaitFailed(e) => {
            let _ = child.start_kill();
            (-1, None, Some(e))
        }
    };
    let elapsed = start.elapsed();

    drain(stdout_task).await;
    drain(stderr_task).await;

    let stdout = take_buffer(&stdout);
    let stderr = take_buffer(&stderr);
    let stdout_truncated = stdout.is_truncated();
    let mut stderr = stderr.into_string();
    if let Some(e) = wait_error {
        tracing::error!(error = %e, "Failed to poll process status");
        let _ = writeln!(stderr, "failed to poll process: {}", e);
    }

    if let Some(reason) = kill_reason {
        tracing::debug!(?reason, elapsed_ms = duration_ms(elapsed), "Process killed");
    }

    RunOutput {
        started: true,
        exit_code,
        stdout: stdout.into_string(),
        stderr,
        timed_out: kill_reason.is_some(),
        kill_reason,
        stdout_truncated,
        elapsed,
    }
}

async fn poll_until_done(
    child: &mut tokio::process::Child,
    stdout: &Mutex<CappedBuffer>,
    start: Instant,
    limits: &RunLimits,
) -> PollEnd {
    let mut ticker = tokio::time::interval(Duration::from_millis(POLL_INTERVAL_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        match child.try_wait() {
            Ok(Some(status)) => return PollEnd::Exited(status),
            Ok(None) => {}
            Err(e) => return PollEnd::WaitFailed(e),
        }

        let seen = stdout.lock().unwrap_or_else(PoisonError::into_inner).seen;
        if seen > limits.output_cap_bytes {
            return PollEnd::Killed(KillReason::OutputLimit);
        }
        if start.elapsed() >= limits.timeout {
            return PollEnd::Killed(KillReason::TimeLimit);
        }
    }
}

fn spawn_reader<R>(pipe: Option<R>, buffer: Arc<Mutex<CappedBuffer>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut pipe) = pipe else {
            return;
        };
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .append(&chunk[..n]),
            }
        }
    })
}

/// Wait briefly for a reader; a pipe held open by an escaped process is abandoned.
async fn drain(mut task: JoinHandle<()>) {
    if timeout(Duration::from_millis(DRAIN_GRACE_MS), &mut task)
        .await
        .is_err()
    {
        tracing::warn!("Output pipe still open after process exit, abandoning reader");
        task.abort();
    }
}

fn take_buffer(buffer: &Mutex<CappedBuffer>) -> CappedBuffer {
    let mut guard = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    let cap = guard.size_limit;
    std::mem::replace(&mut *guard, CappedBuffer::new(cap))
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => -signal,
        (None, None) => -1,
    }
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Byte buffer that keeps at most `size_limit` bytes but counts everything
struct CappedBuffer {
    size_limit: usize,
    bytes: Vec<u8>,
    seen: usize,
}

impl CappedBuffer {
    fn new(size_limit: usize) -> Self {
        Self {
            size_limit,
            bytes: Vec::new(),
            seen: 0,
        }
    }

    fn append(&mut self, chunk: &[u8]) {
        self.seen = self.seen.saturating_add(chunk.len());
        let room = self.size_limit.saturating_sub(self.bytes.len());
        let keep = room.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..keep]);
    }

    fn is_truncated(&self) -> bool {
        self.seen > self.size_limit
    }

    fn into_string(self) -> String {
        let truncated = self.is_truncated();
        let mut s = String::from_utf8_lossy(&self.bytes).into_owned();
        if truncated {
            if !s.ends_with('\n') {
                s.push('\n');
            }
            let _ = writeln!(s, "--- output capped at {} bytes ---", self.size_limit);
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capped_buffer_truncates_with_marker() {
        let mut buf = CappedBuffer::new(4);
        buf.append(b"abc");
        buf.append(b"defg");
        assert!(buf.is_truncated());
        assert_eq!(buf.seen, 7);
        assert_eq!(buf.into_string(), "abcd\n--- output capped at 4 bytes ---\n");

        let mut buf = CappedBuffer::new(4);
        buf.append(b"abcd");
        assert!(!buf.is_truncated());
        assert_eq!(buf.into_string(), "abcd");
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_micros(2_999)), 2);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_run_limits_from_kb() {
        let limits = RunLimits::new(2000, 256);
        assert_eq!(limits.timeout, Duration::from_millis(2000));
        assert_eq!(limits.output_cap_bytes, 256 * 1024);
    }

    #[cfg(unix)]
    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_echoes_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(&sh("cat"), dir.path(), b"hello\n", &RunLimits::new(2000, 64)).await;
        assert!(out.started);
        assert!(out.success());
        assert_eq!(out.stdout, "hello\n");
        assert!(!out.timed_out);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_exit_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(
            &sh("echo oops >&2; exit 3"),
            dir.path(),
            b"",
            &RunLimits::new(2000, 64),
        )
        .await;
        assert!(out.started);
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stderr, "oops\n");
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_signal_as_negative_code() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(&sh("kill -SEGV $$"), dir.path(), b"", &RunLimits::new(2000, 64)).await;
        assert_eq!(out.exit_code, -11);
        assert!(!out.timed_out);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out_infinite_loop() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let out = run(
            &sh("while :; do :; done"),
            dir.path(),
            b"",
            &RunLimits::new(300, 64),
        )
        .await;
        assert!(out.timed_out);
        assert_eq!(out.kill_reason, Some(KillReason::TimeLimit));
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(out.elapsed >= Duration::from_millis(300));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_kills_output_flood() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(&sh("yes"), dir.path(), b"", &RunLimits::new(5000, 4)).await;
        assert!(out.timed_out);
        assert_eq!(out.kill_reason, Some(KillReason::OutputLimit));
        assert!(out.stdout_truncated);
        assert!(out.stdout.ends_with("--- output capped at 4096 bytes ---\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_does_not_deadlock_on_stderr_flood() {
        let dir = tempfile::tempdir().unwrap();
        // 1 MiB on stderr would fill any pipe buffer if nobody drained it.
        let out = run(
            &sh("head -c 1048576 /dev/zero >&2; echo done"),
            dir.path(),
            b"",
            &RunLimits::new(5000, 16),
        )
        .await;
        assert!(!out.timed_out);
        assert_eq!(out.stdout, "done\n");
        assert!(out.stderr.contains("--- output capped at 16384 bytes ---"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_returns_when_background_child_holds_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let out = run(
            &sh("sleep 30 & echo parent"),
            dir.path(),
            b"",
            &RunLimits::new(2000, 64),
        )
        .await;
        assert!(out.success());
        assert_eq!(out.stdout, "parent\n");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_run_missing_program_not_started() {
        let dir = tempfile::tempdir().unwrap();
        let command = ["definitely-not-a-real-compiler-4242"];
        let out = run(&command, dir.path(), b"", &RunLimits::new(1000, 64)).await;
        assert!(!out.started);
        assert_eq!(out.exit_code, SPAWN_FAILED_EXIT_CODE);
        assert!(!out.stderr.is_empty());
        assert!(!out.success());
    }

    #[tokio::test]
    async fn test_run_empty_command_not_started() {
        let dir = tempfile::tempdir().unwrap();
        let command: [&str; 0] = [];
        let out = run(&command, dir.path(), b"", &RunLimits::new(1000, 64)).await;
        assert!(!out.started);
    }
}
