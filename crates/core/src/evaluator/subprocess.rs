//! Spawn, feed, drain and reap a single evaluator process.
//!
//! [`run_supervised`] owns the whole child lifecycle: the child is placed in
//! its own process group so that a timeout can take down every descendant,
//! not just the direct child.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::EvaluatorError;

/// Maximum stdout or stderr size kept per stream (10 MiB).
///
/// Output beyond the cap is still read and discarded so the child never
/// blocks on a full pipe.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// How long to keep draining output after the child itself has exited.
///
/// A descendant that inherited stdout/stderr can hold the pipes open past
/// the child's exit; after this grace period the process group is killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Upper bound on collecting output once the process group has been killed.
const DRAIN_AFTER_KILL: Duration = Duration::from_millis(500);

/// How a supervised process finished.
#[derive(Debug)]
pub(crate) enum ProcessExit {
    Exited {
        exit_code: i32,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    TimedOut,
}

/// Spawn `cmd`, write `payload` to its stdin, close stdin, and wait for exit
/// under `timeout` while draining stdout and stderr concurrently.
///
/// On timeout the child's process group is killed and the child reaped
/// before returning; captured output is discarded.
pub(crate) async fn run_supervised(
    cmd: &mut Command,
    payload: Vec<u8>,
    timeout: Duration,
) -> Result<ProcessExit, EvaluatorError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(EvaluatorError::Spawn)?;
    let pid = child.id();
    tracing::debug!(?pid, "Evaluator spawned");

    // Readers start before stdin is written so a child that prints before
    // consuming its input cannot deadlock against us.
    let mut stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let mut stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    let stdin_task = child.stdin.take().map(|mut stdin| {
        tokio::spawn(async move {
            // The evaluator may exit without reading; a broken pipe is fine.
            if let Err(e) = stdin.write_all(&payload).await {
                tracing::debug!(error = %e, "Evaluator closed stdin early");
            }
            let _ = stdin.shutdown().await;
        })
    });

    let wait_result = tokio::time::timeout(timeout, child.wait()).await;

    if let Some(task) = stdin_task {
        task.abort();
    }

    match wait_result {
        Ok(Ok(status)) => {
            let (stdout, stderr) = drain(&mut stdout_task, &mut stderr_task, pid).await;
            Ok(ProcessExit::Exited {
                exit_code: exit_code(status),
                stdout,
                stderr,
            })
        }
        Ok(Err(e)) => {
            kill_process_group(pid);
            if let Err(kill_err) = child.kill().await {
                tracing::warn!(
                    ?pid,
                    error = %kill_err,
                    "Failed to reap evaluator after wait error"
                );
            }
            stdout_task.abort();
            stderr_task.abort();
            Err(EvaluatorError::Io(e))
        }
        Err(_elapsed) => {
            tracing::warn!(
                ?pid,
                timeout_ms = timeout.as_millis() as u64,
                "Evaluator timed out, killing process group"
            );
            kill_process_group(pid);
            // `kill` also waits, so the child is reaped before we answer.
            if let Err(e) = child.kill().await {
                tracing::warn!(?pid, error = %e, "Failed to reap timed-out evaluator");
            }
            stdout_task.abort();
            stderr_task.abort();
            Ok(ProcessExit::TimedOut)
        }
    }
}

/// Collect both reader tasks after the child has exited.
///
/// If stragglers in the process group keep a pipe open past [`DRAIN_GRACE`],
/// the group is killed and whatever was captured so far is returned. Each
/// handle is awaited until it completes at most once; a stream that finished
/// within the grace period keeps its output.
async fn drain(
    stdout_task: &mut JoinHandle<Vec<u8>>,
    stderr_task: &mut JoinHandle<Vec<u8>>,
    pid: Option<u32>,
) -> (Vec<u8>, Vec<u8>) {
    let grace = Instant::now() + DRAIN_GRACE;
    let mut stdout = collect(stdout_task, grace).await;
    let mut stderr = collect(stderr_task, grace).await;

    if stdout.is_none() || stderr.is_none() {
        tracing::warn!(
            ?pid,
            stdout_open = stdout.is_none(),
            stderr_open = stderr.is_none(),
            "Evaluator descendants still hold output pipes, killing process group"
        );
        kill_process_group(pid);

        let after_kill = Instant::now() + DRAIN_AFTER_KILL;
        if stdout.is_none() {
            stdout = collect(stdout_task, after_kill).await;
        }
        if stderr.is_none() {
            stderr = collect(stderr_task, after_kill).await;
        }
    }

    if stdout.is_none() {
        stdout_task.abort();
    }
    if stderr.is_none() {
        stderr_task.abort();
    }
    (stdout.unwrap_or_default(), stderr.unwrap_or_default())
}

/// Wait for a reader task until `deadline`. `None` means it is still running.
async fn collect(task: &mut JoinHandle<Vec<u8>>, deadline: Instant) -> Option<Vec<u8>> {
    match tokio::time::timeout_at(deadline, task).await {
        Ok(joined) => Some(joined.unwrap_or_default()),
        Err(_) => None,
    }
}

/// Read a stream to EOF, keeping at most [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    let Some(mut reader) = handle else {
        return buf;
    };
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = MAX_OUTPUT_BYTES.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    buf
}

/// Exit code, or the negated signal number if the process was killed.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };
    // The child was spawned with `process_group(0)`, so its pgid is its pid.
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!(pid, error = %err, "killpg failed");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
