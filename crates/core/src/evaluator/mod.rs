//! Supervised, one-shot evaluator invocation.
//!
//! The evaluator is an opaque external process: it receives one JSON
//! document on stdin and answers with one JSON document on stdout.
//! [`EvaluatorClient::execute`] starts exactly one such process per call,
//! enforces the request's wall-clock budget and classifies what came back
//! into an [`ExecutionOutcome`].

mod subprocess;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::process::Command;

use crate::request::ExecutionRequest;

use self::subprocess::ProcessExit;

/// How to launch the evaluator.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Executable to run (an interpreter or the evaluator binary itself).
    pub program: String,
    /// Arguments passed to `program`, typically the evaluator script path.
    pub args: Vec<String>,
    /// Working directory for the child process.
    pub working_directory: PathBuf,
}

/// Failures that prevent an outcome from being produced at all.
#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    /// The evaluator process could not be started.
    #[error("Failed to launch evaluator: {0}")]
    Spawn(#[source] std::io::Error),

    /// Waiting on the evaluator failed.
    #[error("Evaluator I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// The request could not be encoded as JSON.
    #[error("Failed to encode evaluator payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result of one supervised evaluator run.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// The evaluator exited and printed a JSON object.
    Completed {
        output: Map<String, Value>,
        exit_code: i32,
        stderr: String,
        elapsed_ms: u64,
    },
    /// The deadline fired first; the process group was killed.
    TimedOut { elapsed_ms: u64, timeout_sec: u64 },
    /// The evaluator exited without printing anything.
    EmptyOutput {
        exit_code: i32,
        stderr: String,
        elapsed_ms: u64,
    },
    /// The evaluator printed something that is not a JSON object.
    MalformedOutput {
        exit_code: i32,
        stdout: String,
        stderr: String,
        elapsed_ms: u64,
    },
}

impl ExecutionOutcome {
    pub fn elapsed_ms(&self) -> u64 {
        match self {
            Self::Completed { elapsed_ms, .. }
            | Self::TimedOut { elapsed_ms, .. }
            | Self::EmptyOutput { elapsed_ms, .. }
            | Self::MalformedOutput { elapsed_ms, .. } => *elapsed_ms,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::TimedOut { .. } => "timed_out",
            Self::EmptyOutput { .. } => "empty_output",
            Self::MalformedOutput { .. } => "malformed_output",
        }
    }
}

/// Launches the evaluator once per request. Holds no per-request state.
#[derive(Debug, Clone)]
pub struct EvaluatorClient {
    config: EvaluatorConfig,
}

impl EvaluatorClient {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    /// Run the evaluator for `req`, bounded by `req.timeout_sec`.
    pub async fn execute(
        &self,
        req: &ExecutionRequest,
    ) -> Result<ExecutionOutcome, EvaluatorError> {
        self.run(req, Duration::from_secs(req.timeout_sec)).await
    }

    async fn run(
        &self,
        req: &ExecutionRequest,
        deadline: Duration,
    ) -> Result<ExecutionOutcome, EvaluatorError> {
        let payload = req.evaluator_payload()?;

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .current_dir(&self.config.working_directory);

        tracing::debug!(
            program = %self.config.program,
            mode = %req.mode,
            timeout_sec = req.timeout_sec,
            payload_bytes = payload.len(),
            "Launching evaluator"
        );

        let start = Instant::now();
        let exit = subprocess::run_supervised(&mut cmd, payload, deadline).await?;

        let outcome = match exit {
            ProcessExit::TimedOut => ExecutionOutcome::TimedOut {
                elapsed_ms: elapsed_ms(start),
                timeout_sec: req.timeout_sec,
            },
            ProcessExit::Exited {
                exit_code,
                stdout,
                stderr,
            } => classify(exit_code, &stdout, &stderr, start),
        };

        tracing::debug!(
            outcome = outcome.kind(),
            elapsed_ms = outcome.elapsed_ms(),
            "Evaluator finished"
        );
        Ok(outcome)
    }
}

/// Classify the captured output of an evaluator that exited on its own.
fn classify(exit_code: i32, stdout: &[u8], stderr: &[u8], start: Instant) -> ExecutionOutcome {
    let stdout = String::from_utf8_lossy(stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(stderr).trim().to_string();

    if stdout.is_empty() {
        return ExecutionOutcome::EmptyOutput {
            exit_code,
            stderr,
            elapsed_ms: elapsed_ms(start),
        };
    }

    let parsed = serde_json::from_str::<Map<String, Value>>(&stdout);
    let elapsed_ms = elapsed_ms(start);
    match parsed {
        Ok(output) => ExecutionOutcome::Completed {
            output,
            exit_code,
            stderr,
            elapsed_ms,
        },
        Err(_) => ExecutionOutcome::MalformedOutput {
            exit_code,
            stdout,
            stderr,
            elapsed_ms,
        },
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::request::normalize;

    /// Write a `/bin/sh` script standing in for the evaluator.
    fn write_temp_script(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new()
            .suffix(".sh")
            .tempfile()
            .expect("create temp file");
        write!(f, "{body}").expect("write body");
        f
    }

    fn client_for(script: &tempfile::NamedTempFile) -> EvaluatorClient {
        EvaluatorClient::new(EvaluatorConfig {
            program: "sh".to_string(),
            args: vec![script.path().to_str().expect("path").to_string()],
            working_directory: std::env::temp_dir(),
        })
    }

    fn request(raw: Value) -> ExecutionRequest {
        match raw {
            Value::Object(map) => normalize(&map).expect("valid request"),
            other => panic!("expected object, got {other}"),
        }
    }

    fn rce(cmd: &str) -> ExecutionRequest {
        request(json!({"mode": "rce", "cmd": cmd}))
    }

    #[tokio::test]
    async fn completed_with_json_object() {
        let script = write_temp_script(r#"echo '{"ok": true, "result": "abc"}'"#);
        let outcome = client_for(&script).execute(&rce("1+1")).await.expect("execute");
        assert_matches!(outcome, ExecutionOutcome::Completed { output, exit_code: 0, stderr, .. } => {
            assert_eq!(output["ok"], true);
            assert_eq!(output["result"], "abc");
            assert!(stderr.is_empty());
        });
    }

    #[tokio::test]
    async fn evaluator_receives_payload_without_timeout() {
        let script = write_temp_script("printf '{\"ok\": true, \"echo\": '; cat; printf '}'\n");
        let req = request(json!({"mode": "rce", "cmd": "print('é')", "timeout_sec": 42}));
        let outcome = client_for(&script).execute(&req).await.expect("execute");
        assert_matches!(outcome, ExecutionOutcome::Completed { output, .. } => {
            let echoed = &output["echo"];
            assert_eq!(echoed["mode"], "rce");
            assert_eq!(echoed["cmd"], "print('é')");
            assert_eq!(echoed["options"]["depth"], 5);
            assert!(echoed.get("timeout_sec").is_none());
        });
    }

    #[tokio::test]
    async fn empty_stdout_keeps_stderr_and_exit_code() {
        let script = write_temp_script("echo 'Traceback: boom' >&2\nexit 3\n");
        let outcome = client_for(&script).execute(&rce("x")).await.expect("execute");
        assert_matches!(outcome, ExecutionOutcome::EmptyOutput { exit_code: 3, stderr, .. } => {
            assert_eq!(stderr, "Traceback: boom");
        });
    }

    #[tokio::test]
    async fn whitespace_only_stdout_is_empty() {
        let script = write_temp_script("printf '  \\n\\n'\n");
        let outcome = client_for(&script).execute(&rce("x")).await.expect("execute");
        assert_matches!(outcome, ExecutionOutcome::EmptyOutput { exit_code: 0, .. });
    }

    #[tokio::test]
    async fn unparsable_stdout_is_malformed() {
        let script = write_temp_script("echo 'not json at all'\necho warn >&2\nexit 1\n");
        let outcome = client_for(&script).execute(&rce("x")).await.expect("execute");
        assert_matches!(outcome, ExecutionOutcome::MalformedOutput { exit_code: 1, stdout, stderr, .. } => {
            assert_eq!(stdout, "not json at all");
            assert_eq!(stderr, "warn");
        });
    }

    #[tokio::test]
    async fn non_object_json_is_malformed() {
        let script = write_temp_script("echo '[1, 2, 3]'\n");
        let outcome = client_for(&script).execute(&rce("x")).await.expect("execute");
        assert_matches!(outcome, ExecutionOutcome::MalformedOutput { stdout, .. } => {
            assert_eq!(stdout, "[1, 2, 3]");
        });
    }

    #[tokio::test]
    async fn deadline_kills_the_evaluator() {
        let script = write_temp_script("sleep 30\n");
        let started = Instant::now();
        let outcome = client_for(&script)
            .run(&rce("x"), Duration::from_millis(200))
            .await
            .expect("execute");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_matches!(outcome, ExecutionOutcome::TimedOut { timeout_sec: 90, elapsed_ms } => {
            assert!(elapsed_ms >= 200);
        });
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn deadline_kills_descendants() {
        let pid_file = tempfile::NamedTempFile::new().expect("pid file");
        let pid_path = pid_file.path().to_str().expect("path").to_string();
        let script = write_temp_script(&format!("sleep 30 &\necho $! > {pid_path}\nwait\n"));

        let outcome = client_for(&script)
            .run(&rce("x"), Duration::from_millis(300))
            .await
            .expect("execute");
        assert_matches!(outcome, ExecutionOutcome::TimedOut { .. });

        let pid = std::fs::read_to_string(&pid_path).expect("read pid");
        let proc_stat = format!("/proc/{}/stat", pid.trim());
        let mut gone = false;
        for _ in 0..40 {
            // A killed grandchild is either reaped (no /proc entry) or a zombie.
            match std::fs::read_to_string(&proc_stat) {
                Err(_) => gone = true,
                Ok(stat) => gone = stat.contains(") Z "),
            }
            if gone {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(gone, "background sleep should have been killed with its group");
    }

    #[tokio::test]
    async fn descendant_holding_stderr_does_not_lose_stdout() {
        let script = write_temp_script("sleep 6 >/dev/null &\necho '{\"ok\": true}'\n");
        let started = Instant::now();
        let outcome = client_for(&script).execute(&rce("x")).await.expect("execute");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_matches!(outcome, ExecutionOutcome::Completed { output, exit_code: 0, .. } => {
            assert_eq!(output["ok"], true);
        });
    }

    #[tokio::test]
    async fn descendant_holding_stdout_keeps_partial_output() {
        let script =
            write_temp_script("sleep 6 2>/dev/null &\necho '{\"ok\": true}'\necho note >&2\n");
        let started = Instant::now();
        let outcome = client_for(&script).execute(&rce("x")).await.expect("execute");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_matches!(outcome, ExecutionOutcome::Completed { output, stderr, .. } => {
            assert_eq!(output["ok"], true);
            assert_eq!(stderr, "note");
        });
    }

    #[tokio::test]
    async fn signal_death_reports_negative_exit_code() {
        let script = write_temp_script("kill -9 $$\n");
        let outcome = client_for(&script).execute(&rce("x")).await.expect("execute");
        assert_matches!(outcome, ExecutionOutcome::EmptyOutput { exit_code: -9, .. });
    }

    #[tokio::test]
    async fn large_payload_and_output_do_not_deadlock() {
        let big_cmd = "a".repeat(512 * 1024);
        let script = write_temp_script("printf '{\"ok\": true, \"echo\": '; cat; printf '}'\n");
        let outcome = client_for(&script).execute(&rce(&big_cmd)).await.expect("execute");
        assert_matches!(outcome, ExecutionOutcome::Completed { output, .. } => {
            assert_eq!(output["echo"]["cmd"].as_str().map(str::len), Some(big_cmd.len()));
        });
    }

    #[tokio::test]
    async fn runs_in_configured_working_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let script = write_temp_script("printf '{\"ok\": true, \"cwd\": \"%s\"}' \"$(pwd -P)\"\n");
        let mut client = client_for(&script);
        client.config.working_directory = dir.path().to_path_buf();

        let outcome = client.execute(&rce("x")).await.expect("execute");
        let expected = dir.path().canonicalize().expect("canonicalize dir");
        assert_matches!(outcome, ExecutionOutcome::Completed { output, .. } => {
            assert_eq!(output["cwd"], expected.to_str().expect("path"));
        });
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let client = EvaluatorClient::new(EvaluatorConfig {
            program: "/nonexistent/evaluator".to_string(),
            args: vec![],
            working_directory: std::env::temp_dir(),
        });
        let result = client.execute(&rce("x")).await;
        assert_matches!(result, Err(EvaluatorError::Spawn(_)));
    }

    #[test]
    fn outcome_accessors() {
        let outcome = ExecutionOutcome::TimedOut {
            elapsed_ms: 5001,
            timeout_sec: 5,
        };
        assert_eq!(outcome.elapsed_ms(), 5001);
        assert_eq!(outcome.kind(), "timed_out");
    }
}
