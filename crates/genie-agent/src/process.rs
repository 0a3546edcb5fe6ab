use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::Instant;

use crate::runtime::AgentRuntime;
use crate::stream::DeltaStream;
use crate::types::AgentCall;
use crate::{AgentError, Result};

// ─── CommandRuntime ───────────────────────────────────────────────────────

/// Runs each agent call through a local program.
///
/// The program receives the [`AgentCall`] as one JSON line on stdin, after
/// which stdin is closed. Every stdout line is forwarded as a text delta.
/// A non-zero exit is reported with the captured stderr.
#[derive(Debug, Clone)]
pub struct CommandRuntime {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl CommandRuntime {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

#[async_trait]
impl AgentRuntime for CommandRuntime {
    fn name(&self) -> &str {
        &self.program
    }

    async fn stream(&self, call: &AgentCall) -> Result<DeltaStream> {
        let mut process = AgentProcess::spawn(self.command())?;
        let payload = serde_json::to_vec(call)
            .map_err(|e| AgentError::Process(format!("failed to serialize agent call: {e}")))?;
        process.send_and_close(&payload).await?;

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let program = self.program.clone();
        let (tx, stream) = DeltaStream::channel();

        tokio::spawn(async move {
            loop {
                let read = async {
                    match deadline {
                        Some(at) => tokio::time::timeout_at(at, process.next_line())
                            .await
                            .map_err(|_| ()),
                        None => Ok(process.next_line().await),
                    }
                };
                let line = tokio::select! {
                    _ = tx.closed() => None,
                    read = read => Some(read),
                };

                let line = match line {
                    // Receiver dropped while the program was silent.
                    None => {
                        process.kill().await;
                        return;
                    }
                    Some(Err(())) => {
                        process.kill().await;
                        let _ = tx
                            .send(Err(AgentError::Process(format!(
                                "agent command '{program}' timed out"
                            ))))
                            .await;
                        return;
                    }
                    Some(Ok(line)) => line,
                };

                match line {
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                    Ok(None) => break,
                    Ok(Some(mut line)) => {
                        line.push('\n');
                        if tx.send(Ok(line)).await.is_err() {
                            // Receiver dropped: abandon the call.
                            process.kill().await;
                            return;
                        }
                    }
                }
            }

            if let Some(exit_err) = process.wait_exit_error().await {
                let _ = tx.send(Err(exit_err)).await;
            }
        });

        Ok(stream)
    }
}

// ─── AgentProcess ─────────────────────────────────────────────────────────

/// A spawned agent program with piped stdio. Stderr is drained by a
/// background task and surfaced on exit errors.
struct AgentProcess {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stderr_buf: Arc<Mutex<String>>,
}

impl AgentProcess {
    fn spawn(mut cmd: Command) -> Result<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Process("stdout not captured".into()))?;

        let stderr_buf = Arc::new(Mutex::new(String::new()));
        if let Some(stderr) = child.stderr.take() {
            let buf = Arc::clone(&stderr_buf);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if let Ok(mut b) = buf.lock() {
                        if !b.is_empty() {
                            b.push('\n');
                        }
                        b.push_str(&line);
                    }
                }
            });
        }

        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
            stderr_buf,
        })
    }

    /// Write `payload` plus a newline, then close stdin.
    async fn send_and_close(&mut self, payload: &[u8]) -> Result<()> {
        let mut stdin = self
            .child
            .stdin
            .take()
            .ok_or_else(|| AgentError::Process("stdin not captured".into()))?;
        // A program that ignores stdin may exit before reading it.
        match stdin.write_all(payload).await {
            Ok(()) => {
                stdin.write_all(b"\n").await.ok();
                stdin.flush().await.ok();
            }
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Err(e) => return Err(AgentError::Io(e)),
        }
        drop(stdin);
        Ok(())
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        self.lines.next_line().await.map_err(AgentError::Io)
    }

    async fn wait_exit_error(&mut self) -> Option<AgentError> {
        let status = match self.child.wait().await {
            Ok(s) => s,
            Err(e) => return Some(AgentError::Io(e)),
        };

        if status.success() {
            return None;
        }

        let stderr = self
            .stderr_buf
            .lock()
            .ok()
            .map(|b| b.clone())
            .unwrap_or_default();

        let head = match status.code() {
            Some(code) => format!("agent command exited with code {code}"),
            None => "agent command terminated by signal".to_string(),
        };
        let msg = if stderr.is_empty() {
            head
        } else {
            format!("{head}\nstderr: {stderr}")
        };
        Some(AgentError::Process(msg))
    }

    async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
