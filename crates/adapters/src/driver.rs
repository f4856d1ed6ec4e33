// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! The Agent Driver (spec §4.4): spawns the agent subprocess, streams its
//! stdout/stderr as coalesced chunks, and exposes best-effort cancellation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Chunks are coalesced up to this size or until a newline/idle deadline,
/// whichever comes first (SPEC_FULL §4.4 decision record).
const COALESCE_MAX_BYTES: usize = 64 * 1024;
const COALESCE_IDLE: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum AgentDriverError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("driver already started")]
    AlreadyStarted,
    #[error("driver not started")]
    NotStarted,
}

/// How the hook script should reach this run's Interaction Coordinator.
#[derive(Debug, Clone)]
pub struct HookConfig {
    pub run_id: pm_core::RunId,
    pub base_url: String,
    pub bearer_token: String,
    pub timeout: Duration,
    pub approval_tools: Vec<String>,
    pub input_tools: Vec<String>,
}

impl HookConfig {
    /// Environment variables injected into the agent subprocess (spec §4.4).
    pub fn as_env(&self, scripts_dir: &std::path::Path) -> Vec<(String, String)> {
        vec![
            ("PM_RUN_ID".into(), self.run_id.to_string()),
            ("PM_HOOK_URL".into(), format!("{}/api/internal/interaction-request", self.base_url)),
            ("PM_HOOK_BEARER".into(), self.bearer_token.clone()),
            ("PM_HOOK_TIMEOUT_MS".into(), self.timeout.as_millis().to_string()),
            ("PM_HOOK_APPROVAL_TOOLS".into(), self.approval_tools.join(",")),
            ("PM_HOOK_INPUT_TOOLS".into(), self.input_tools.join(",")),
            ("PM_HOOK_SCRIPTS_DIR".into(), scripts_dir.display().to_string()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub command: String,
    pub args: Vec<String>,
    pub workspace_path: PathBuf,
    pub hook: HookConfig,
    pub hook_scripts_dir: PathBuf,
    /// Credential-bearing env vars to strip before the subprocess inherits
    /// the daemon's environment (spec §4.4 "strips credentials that would
    /// bypass the intended subscription authentication mode").
    pub strip_env: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exit code 0.
    Success,
    /// Non-zero exit code, or the process could not be waited on.
    Failure(String),
    /// Killed by a signal.
    Signaled(String),
}

/// One coalesced chunk of output, guaranteed to be valid UTF-8 (no split
/// code points — spec §4.4).
pub type OutputChunk = String;

/// Bound to exactly one run (spec §4.4). Not `Clone`: the Run Manager's
/// supervisor task owns the single instance for a run's lifetime.
#[async_trait]
pub trait AgentDriver: Send {
    async fn start(&mut self) -> Result<(), AgentDriverError>;

    /// Takes the stdout channel; returns `None` if already taken or not started.
    fn take_stdout(&mut self) -> Option<mpsc::Receiver<OutputChunk>>;

    /// Takes the stderr channel; returns `None` if already taken or not started.
    fn take_stderr(&mut self) -> Option<mpsc::Receiver<OutputChunk>>;

    /// Blocks until the process exits.
    async fn wait(&mut self) -> ExitOutcome;

    /// Best-effort termination: SIGINT, then SIGKILL after a grace period.
    async fn cancel(&mut self);

    /// Releases the child's pipes. Idempotent.
    async fn close(&mut self);
}

/// Spawns the agent as a real OS subprocess (spec §4.4).
pub struct LocalDriver {
    config: DriverConfig,
    child: Option<Child>,
    stdout_rx: Option<mpsc::Receiver<OutputChunk>>,
    stderr_rx: Option<mpsc::Receiver<OutputChunk>>,
}

impl LocalDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self { config, child: None, stdout_rx: None, stderr_rx: None }
    }

    fn build_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .current_dir(&self.config.workspace_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        for key in &self.config.strip_env {
            cmd.env_remove(key);
        }
        let env: HashMap<String, String> =
            self.config.hook.as_env(&self.config.hook_scripts_dir).into_iter().collect();
        for (key, value) in env {
            cmd.env(key, value);
        }
        cmd
    }
}

#[async_trait]
impl AgentDriver for LocalDriver {
    async fn start(&mut self) -> Result<(), AgentDriverError> {
        if self.child.is_some() {
            return Err(AgentDriverError::AlreadyStarted);
        }
        let mut cmd = self.build_command();
        let mut child =
            cmd.spawn().map_err(|e| AgentDriverError::SpawnFailed(e.to_string()))?;

        // Allow expect here: `build_command` always sets stdout/stderr to
        // `Stdio::piped()`, so a successful spawn guarantees both handles.
        #[allow(clippy::expect_used)]
        let stdout = child.stdout.take().expect("stdout piped at spawn");
        #[allow(clippy::expect_used)]
        let stderr = child.stderr.take().expect("stderr piped at spawn");
        self.stdout_rx = Some(spawn_coalescer(stdout));
        self.stderr_rx = Some(spawn_coalescer(stderr));
        self.child = Some(child);
        Ok(())
    }

    fn take_stdout(&mut self) -> Option<mpsc::Receiver<OutputChunk>> {
        self.stdout_rx.take()
    }

    fn take_stderr(&mut self) -> Option<mpsc::Receiver<OutputChunk>> {
        self.stderr_rx.take()
    }

    async fn wait(&mut self) -> ExitOutcome {
        let Some(child) = self.child.as_mut() else {
            return ExitOutcome::Failure("driver not started".into());
        };
        match child.wait().await {
            Ok(status) if status.success() => ExitOutcome::Success,
            Ok(status) => match status.code() {
                Some(code) => ExitOutcome::Failure(format!("exit code {code}")),
                None => ExitOutcome::Signaled(format!("{status}")),
            },
            Err(e) => ExitOutcome::Failure(format!("wait failed: {e}")),
        }
    }

    async fn cancel(&mut self) {
        let Some(child) = self.child.as_mut() else { return };
        let Some(pid) = child.id() else { return };
        let pid = nix::unistd::Pid::from_raw(pid as i32);
        let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGINT);

        let grace = tokio::time::sleep(Duration::from_secs(5));
        tokio::select! {
            _ = child.wait() => {}
            _ = grace => {
                let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL);
                let _ = child.wait().await;
            }
        }
    }

    async fn close(&mut self) {
        self.stdout_rx = None;
        self.stderr_rx = None;
        self.child = None;
    }
}

/// Reads a pipe, coalescing consecutive small reads into chunks up to
/// `COALESCE_MAX_BYTES`, flushed early on a line boundary or idle timeout.
/// Never splits a UTF-8 code point: a read that ends mid-character is held
/// back until the rest of the character arrives.
fn spawn_coalescer(pipe: impl AsyncRead + Send + Unpin + 'static) -> mpsc::Receiver<OutputChunk> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut pending: Vec<u8> = Vec::new();
        let mut deadline: Option<Instant> = None;

        loop {
            let idle = async {
                match deadline {
                    Some(d) => tokio::time::sleep_until(d).await,
                    None => std::future::pending::<()>().await,
                }
            };
            let mut buf = [0u8; 4096];
            tokio::select! {
                biased;
                n = reader.read(&mut buf) => {
                    match n {
                        Ok(0) => break,
                        Ok(n) => {
                            pending.extend_from_slice(&buf[..n]);
                            let had_newline = buf[..n].contains(&b'\n');
                            if pending.len() >= COALESCE_MAX_BYTES || had_newline {
                                if !flush(&mut pending, &tx).await {
                                    return;
                                }
                                deadline = None;
                            } else {
                                deadline = Some(Instant::now() + COALESCE_IDLE);
                            }
                        }
                        Err(_) => break,
                    }
                }
                _ = idle => {
                    if !flush(&mut pending, &tx).await {
                        return;
                    }
                    deadline = None;
                }
            }
        }
        let _ = flush(&mut pending, &tx).await;
    });
    rx
}

/// Splits `pending` at the last valid UTF-8 boundary, sends the valid
/// prefix, and leaves any trailing partial code point for the next read.
async fn flush(pending: &mut Vec<u8>, tx: &mpsc::Sender<OutputChunk>) -> bool {
    if pending.is_empty() {
        return true;
    }
    let valid_len = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) => e.valid_up_to(),
    };
    if valid_len == 0 {
        return true;
    }
    let chunk: Vec<u8> = pending.drain(..valid_len).collect();
    // Allow expect here: `valid_len` came from `valid_up_to()` on this same
    // byte slice, so the prefix it names is guaranteed valid UTF-8.
    #[allow(clippy::expect_used)]
    let text = String::from_utf8(chunk).expect("valid_up_to guarantees valid UTF-8");
    tx.send(text).await.is_ok()
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{AgentDriver, AgentDriverError, ExitOutcome, OutputChunk};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FakeCall {
        Started,
        Cancelled,
        Closed,
    }

    struct FakeState {
        calls: Vec<FakeCall>,
    }

    /// A scripted driver for kernel tests: the test pushes stdout/stderr
    /// lines and sets the exit outcome before `start()`; no subprocess runs.
    pub struct FakeDriver {
        stdout_tx: mpsc::Sender<OutputChunk>,
        stdout_rx: Option<mpsc::Receiver<OutputChunk>>,
        stderr_tx: mpsc::Sender<OutputChunk>,
        stderr_rx: Option<mpsc::Receiver<OutputChunk>>,
        exit_outcome: ExitOutcome,
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeDriver {
        pub fn new(exit_outcome: ExitOutcome) -> Self {
            let (stdout_tx, stdout_rx) = mpsc::channel(64);
            let (stderr_tx, stderr_rx) = mpsc::channel(64);
            Self {
                stdout_tx,
                stdout_rx: Some(stdout_rx),
                stderr_tx,
                stderr_rx: Some(stderr_rx),
                exit_outcome,
                state: Arc::new(Mutex::new(FakeState { calls: Vec::new() })),
            }
        }

        pub async fn push_stdout(&self, chunk: impl Into<OutputChunk>) {
            let _ = self.stdout_tx.send(chunk.into()).await;
        }

        pub async fn push_stderr(&self, chunk: impl Into<OutputChunk>) {
            let _ = self.stderr_tx.send(chunk.into()).await;
        }

        pub fn calls(&self) -> Vec<FakeCall> {
            self.state.lock().calls.clone()
        }
    }

    #[async_trait]
    impl AgentDriver for FakeDriver {
        async fn start(&mut self) -> Result<(), AgentDriverError> {
            self.state.lock().calls.push(FakeCall::Started);
            Ok(())
        }

        fn take_stdout(&mut self) -> Option<mpsc::Receiver<OutputChunk>> {
            self.stdout_rx.take()
        }

        fn take_stderr(&mut self) -> Option<mpsc::Receiver<OutputChunk>> {
            self.stderr_rx.take()
        }

        async fn wait(&mut self) -> ExitOutcome {
            self.exit_outcome.clone()
        }

        async fn cancel(&mut self) {
            self.state.lock().calls.push(FakeCall::Cancelled);
        }

        async fn close(&mut self) {
            self.state.lock().calls.push(FakeCall::Closed);
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeCall, FakeDriver};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn coalesces_up_to_a_newline() {
        let data = b"hello\nworld".to_vec();
        let rx = spawn_coalescer(Cursor::new(data));
        let mut rx = rx;
        let first = rx.recv().await.unwrap();
        assert_eq!(first, "hello\n");
        let second = rx.recv().await.unwrap();
        assert_eq!(second, "world");
    }

    #[tokio::test]
    async fn never_splits_a_utf8_code_point() {
        // "é" is 2 bytes (0xC3 0xA9); Cursor delivers it whole here, but the
        // flush() boundary logic is exercised directly for a split case.
        let mut pending = vec![b'h', b'i', 0xC3];
        let (tx, mut rx) = mpsc::channel(4);
        assert!(flush(&mut pending, &tx).await);
        let chunk = rx.recv().await.unwrap();
        assert_eq!(chunk, "hi");
        assert_eq!(pending, vec![0xC3]);
    }
}
