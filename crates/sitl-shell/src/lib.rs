pub mod pattern;
pub mod process;
pub mod scripted;

use async_trait::async_trait;
use serde::Deserialize;
use sitl_proto::{Location, ShellCommand};
use std::path::PathBuf;
use std::time::Duration;

pub use pattern::{Match, Pattern};
pub use process::{ProcessShell, SimulatorProcess};
pub use scripted::ScriptedShell;

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("timed out after {secs:.0}s waiting for {pattern:?}")]
    Timeout { pattern: String, secs: f64 },

    #[error("{0}: output closed")]
    Closed(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid launch config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShellError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ShellError::Timeout { .. })
    }
}

/// Line-oriented session with the ground-control shell.
///
/// Commands are fire-and-forget; the only acknowledgement is text that a
/// later `expect` matches. Lines read while waiting for a match are consumed.
#[async_trait]
pub trait CommandChannel: Send {
    async fn send(&mut self, cmd: &ShellCommand) -> Result<(), ShellError>;

    /// Waits for the first line matching any of `patterns`, returning the
    /// index of the pattern that matched.
    async fn expect_any(&mut self, patterns: &[&Pattern], timeout: Duration) -> Result<(usize, Match), ShellError>;

    /// Captures of the last successful match.
    fn last_match(&self) -> Option<&Match>;

    async fn expect(&mut self, pattern: &Pattern, timeout: Duration) -> Result<Match, ShellError> {
        let (_, m) = self.expect_any(&[pattern], timeout).await?;
        Ok(m)
    }

    /// Stops whatever sits behind the channel. Nothing to do for in-memory shells.
    async fn close(&mut self) {}
}

fn default_frame() -> String { "+".into() }
fn default_speedup() -> u32 { 10 }
fn default_program() -> String { "mavproxy.py".into() }
fn default_master() -> String { "tcp:127.0.0.1:5760".into() }
fn default_sitl_addr() -> String { "127.0.0.1:5501".into() }
fn default_out() -> String { "127.0.0.1:19550".into() }
fn default_vehicle() -> String { "ArduCopter".into() }
fn default_options() -> Vec<String> { vec!["--quadcopter".into()] }
fn default_expect_timeout() -> u64 { 30 }
fn default_param_timeout() -> u64 { 60 }

/// Simulator binary launch settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SitlConfig {
    pub binary: PathBuf,
    #[serde(default = "default_frame")]
    pub frame: String,
    /// `lat,lon,alt,heading`
    pub home: String,
    #[serde(default = "default_speedup")]
    pub speedup: u32,
    /// Parameter files loaded during the configure pass, relative to `defaults_dir`.
    #[serde(default)]
    pub defaults: Vec<String>,
    #[serde(default)]
    pub defaults_dir: PathBuf,
}

impl SitlConfig {
    pub fn home_location(&self) -> Result<Location, ShellError> {
        Location::parse(&self.home)
            .filter(Location::is_valid)
            .ok_or_else(|| ShellError::Config(format!("sitl.home not lat,lon,alt,heading: {}", self.home)))
    }

    pub fn args(&self, wipe: bool) -> Result<Vec<String>, ShellError> {
        let home = self.home_location()?;
        let mut args = vec![
            "-S".to_string(),
            "-I0".to_string(),
            "--home".to_string(),
            home.to_home_arg(),
            "--model".to_string(),
            self.frame.clone(),
            "--speedup".to_string(),
            self.speedup.to_string(),
        ];
        if wipe {
            args.push("-w".into());
        }
        Ok(args)
    }

    pub fn defaults_paths(&self) -> Vec<PathBuf> {
        self.defaults.iter().map(|f| self.defaults_dir.join(f)).collect()
    }
}

/// GCS shell launch settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_master")]
    pub master: String,
    #[serde(default = "default_sitl_addr")]
    pub sitl_addr: String,
    /// Where the shell forwards telemetry; the harness listens here.
    #[serde(default = "default_out")]
    pub out: String,
    #[serde(default = "default_vehicle")]
    pub vehicle: String,
    #[serde(default = "default_options")]
    pub options: Vec<String>,
    pub streamrate: Option<u32>,
    #[serde(default = "default_expect_timeout")]
    pub expect_timeout_s: u64,
    #[serde(default = "default_param_timeout")]
    pub param_timeout_s: u64,
}

impl ShellConfig {
    pub fn args(&self, flight: bool) -> Vec<String> {
        let mut args = vec![
            format!("--master={}", self.master),
            format!("--sitl={}", self.sitl_addr),
            format!("--out={}", self.out),
            format!("--aircraft=test.{}", self.vehicle),
        ];
        args.extend(self.options.iter().cloned());
        if flight {
            args.push(format!("--streamrate={}", self.streamrate.unwrap_or(5)));
        }
        args
    }

    pub fn expect_timeout(&self) -> Duration {
        Duration::from_secs(self.expect_timeout_s)
    }

    pub fn param_timeout(&self) -> Duration {
        Duration::from_secs(self.param_timeout_s)
    }
}
