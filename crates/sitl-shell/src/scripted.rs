use async_trait::async_trait;
use sitl_proto::ShellCommand;
use std::collections::VecDeque;
use std::time::Duration;

use crate::process::timeout_error;
use crate::{CommandChannel, Match, Pattern, ShellError};

/// In-memory shell for exercising scenario logic without processes.
///
/// Replies are queued by rules keyed on the rendered command prefix; an
/// `expect` that finds nothing queued times out immediately.
#[derive(Debug, Default)]
pub struct ScriptedShell {
    sent: Vec<ShellCommand>,
    pending: VecDeque<String>,
    rules: Vec<(String, Vec<String>)>,
    last: Option<Match>,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `lines` every time a command starting with `prefix` is sent.
    pub fn on(mut self, prefix: &str, lines: &[&str]) -> Self {
        self.rules.push((prefix.to_string(), lines.iter().map(|l| l.to_string()).collect()));
        self
    }

    pub fn push_line(&mut self, line: &str) {
        self.pending.push_back(line.to_string());
    }

    pub fn sent(&self) -> &[ShellCommand] {
        &self.sent
    }

    pub fn sent_lines(&self) -> Vec<String> {
        self.sent.iter().map(|c| c.to_string()).collect()
    }
}

#[async_trait]
impl CommandChannel for ScriptedShell {
    async fn send(&mut self, cmd: &ShellCommand) -> Result<(), ShellError> {
        let line = cmd.to_string();
        for (prefix, replies) in &self.rules {
            if line.starts_with(prefix.as_str()) {
                self.pending.extend(replies.iter().cloned());
            }
        }
        self.sent.push(cmd.clone());
        Ok(())
    }

    async fn expect_any(&mut self, patterns: &[&Pattern], timeout: Duration) -> Result<(usize, Match), ShellError> {
        while let Some(line) = self.pending.pop_front() {
            for (i, p) in patterns.iter().enumerate() {
                if let Some(m) = p.find(&line) {
                    self.last = Some(m.clone());
                    return Ok((i, m));
                }
            }
        }
        Err(timeout_error(patterns, timeout))
    }

    fn last_match(&self) -> Option<&Match> {
        self.last.as_ref()
    }
}
