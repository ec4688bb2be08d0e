//! Subprocess transport: newline-delimited JSON-RPC over a child's stdin/stdout.

use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use super::error::McpError;
use super::transport::{Inbound, Transport, INBOUND_CAPACITY};

pub struct StdioTransport {
    label: String,
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
}

impl StdioTransport {
    /// Spawn `command` and start reading its stdout.
    pub fn spawn(
        label: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<(Self, Inbound), McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let spawn_err = |reason: String| McpError::Spawn {
            command: command.to_string(),
            reason,
        };
        let mut child = cmd.spawn().map_err(|e| spawn_err(e.to_string()))?;
        let stdin = child.stdin.take().ok_or_else(|| spawn_err("no stdin".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| spawn_err("no stdout".into()))?;

        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        tokio::spawn(read_frames(stdout, tx, label.to_string()));

        debug!(provider = label, command, "spawned tool provider");
        Ok((
            Self {
                label: label.to_string(),
                stdin: Mutex::new(Some(stdin)),
                child: Mutex::new(Some(child)),
            },
            rx,
        ))
    }
}

/// Forward each JSON line on stdout; ends (dropping `tx`) when stdout closes.
async fn read_frames(stdout: ChildStdout, tx: mpsc::Sender<Value>, label: String) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match serde_json::from_str::<Value>(&line) {
                Ok(frame) => {
                    if tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(provider = %label, error = %e, "unparseable frame from provider"),
            },
            Ok(None) => {
                debug!(provider = %label, "provider stdout closed");
                break;
            }
            Err(e) => {
                error!(provider = %label, error = %e, "provider read error");
                break;
            }
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, frame: &Value) -> Result<(), McpError> {
        let mut line =
            serde_json::to_string(frame).map_err(|e| McpError::Protocol(e.to_string()))?;
        line.push('\n');

        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(McpError::Closed)?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))
    }

    async fn close(&self) -> Result<(), McpError> {
        // Closing stdin asks the provider to exit; kill it if it lingers.
        self.stdin.lock().await.take();
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        match tokio::time::timeout(std::time::Duration::from_secs(2), child.wait()).await {
            Ok(Ok(status)) => {
                debug!(provider = %self.label, %status, "provider exited");
                Ok(())
            }
            Ok(Err(e)) => Err(McpError::Transport(e.to_string())),
            Err(_) => child
                .kill()
                .await
                .map_err(|e| McpError::Transport(e.to_string())),
        }
    }
}
