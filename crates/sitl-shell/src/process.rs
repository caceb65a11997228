use async_trait::async_trait;
use sitl_proto::ShellCommand;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{CommandChannel, Match, Pattern, ShellError};

/// Forwards every output line of a child to the log, and optionally to `tx`.
fn drain<R>(name: String, reader: R, tx: Option<mpsc::UnboundedSender<String>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    debug!(target: "sitl::output", "{}: {}", name, line);
                    if let Some(tx) = &tx {
                        // receiver gone means the owner shut down; keep draining
                        let _ = tx.send(line);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("{}: output read failed: {}", name, e);
                    break;
                }
            }
        }
    });
}

fn spawn_child(name: &str, program: &str, args: &[String]) -> Result<Child, ShellError> {
    info!("spawn {}: {} {}", name, program, args.join(" "));
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;
    Ok(child)
}

async fn kill_child(name: &str, child: &mut Child) {
    match child.try_wait() {
        Ok(Some(status)) => {
            info!("{} already exited ({})", name, status);
            return;
        }
        Ok(None) => {}
        Err(e) => warn!("{}: status check failed: {}", name, e),
    }
    if let Err(e) = child.kill().await {
        warn!("{}: kill failed: {}", name, e);
    } else {
        info!("{} stopped", name);
    }
}

/// The SITL firmware binary. Output is only logged.
pub struct SimulatorProcess {
    name: String,
    child: Child,
}

impl SimulatorProcess {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, ShellError> {
        let name = "sitl".to_string();
        let mut child = spawn_child(&name, program, args)?;
        if let Some(out) = child.stdout.take() {
            drain(name.clone(), out, None);
        }
        if let Some(err) = child.stderr.take() {
            drain(name.clone(), err, None);
        }
        Ok(Self { name, child })
    }

    pub async fn shutdown(&mut self) {
        kill_child(&self.name, &mut self.child).await;
    }
}

/// Interactive ground-control shell driven over stdin/stdout.
pub struct ProcessShell {
    name: String,
    child: Child,
    stdin: ChildStdin,
    lines: mpsc::UnboundedReceiver<String>,
    last: Option<Match>,
}

impl ProcessShell {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, ShellError> {
        let name = "gcs".to_string();
        let mut child = spawn_child(&name, program, args)?;
        let stdin = child.stdin.take().ok_or_else(|| ShellError::Closed(name.clone()))?;

        let (tx, lines) = mpsc::unbounded_channel();
        if let Some(out) = child.stdout.take() {
            drain(name.clone(), out, Some(tx.clone()));
        }
        if let Some(err) = child.stderr.take() {
            drain(name.clone(), err, Some(tx));
        }
        Ok(Self { name, child, stdin, lines, last: None })
    }

    pub async fn shutdown(&mut self) {
        kill_child(&self.name, &mut self.child).await;
    }
}

fn describe(patterns: &[&Pattern]) -> String {
    patterns.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(" | ")
}

pub(crate) fn timeout_error(patterns: &[&Pattern], timeout: Duration) -> ShellError {
    ShellError::Timeout { pattern: describe(patterns), secs: timeout.as_secs_f64() }
}

#[async_trait]
impl CommandChannel for ProcessShell {
    async fn send(&mut self, cmd: &ShellCommand) -> Result<(), ShellError> {
        debug!("{} <- {}", self.name, cmd);
        let line = format!("{}\n", cmd);
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn expect_any(&mut self, patterns: &[&Pattern], timeout: Duration) -> Result<(usize, Match), ShellError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let line = match tokio::time::timeout_at(deadline, self.lines.recv()).await {
                Err(_) => return Err(timeout_error(patterns, timeout)),
                Ok(None) => return Err(ShellError::Closed(self.name.clone())),
                Ok(Some(line)) => line,
            };
            for (i, p) in patterns.iter().enumerate() {
                if let Some(m) = p.find(&line) {
                    debug!("{}: matched {:?}", self.name, p.as_str());
                    self.last = Some(m.clone());
                    return Ok((i, m));
                }
            }
        }
    }

    fn last_match(&self) -> Option<&Match> {
        self.last.as_ref()
    }

    async fn close(&mut self) {
        self.shutdown().await;
    }
}
