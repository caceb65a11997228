use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

use sitl_flight::{doctor as flight_doctor, FlightOptions, Scenario};
use sitl_shell::{ShellConfig, SitlConfig};

mod report;
mod runner;

use runner::{ProcessLauncher, Runner};

#[derive(Debug, Parser)]
#[command(name = "sitl-autotest", version, about = "Scripted SITL flight tests for a multicopter")]
struct Cli {
    #[arg(long, default_value = "config/autotest.toml")]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the config, simulator paths and stock missions.
    Doctor,
    /// Print the scenario catalogue.
    List,
    /// Launch the simulator and fly one scenario.
    Run { scenario: String },
}

fn default_telemetry_url() -> String { "udpin:127.0.0.1:19550".into() }
fn default_capacity() -> usize { 1024 }

#[derive(Debug, serde::Deserialize)]
struct Config {
    sitl: SitlConfig,
    shell: ShellConfig,
    #[serde(default)]
    telemetry: TelemetryCfg,
    #[serde(default)]
    flight: FlightOptions,
    #[serde(default)]
    report: ReportCfg,
}

#[derive(Debug, serde::Deserialize)]
struct TelemetryCfg {
    #[serde(default = "default_telemetry_url")]
    url: String,
    #[serde(default = "default_capacity")]
    capacity: usize,
}

impl Default for TelemetryCfg {
    fn default() -> Self {
        Self { url: default_telemetry_url(), capacity: default_capacity() }
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct ReportCfg {
    path: Option<PathBuf>,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::List => {
            list();
            Ok(ExitCode::SUCCESS)
        }
        Command::Doctor => {
            let cfg = load_config(&cli.config)?;
            doctor(&cfg)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Run { scenario } => {
            let cfg = load_config(&cli.config)?;
            let scenario: Scenario = scenario.parse()?;
            run(&cfg, scenario).await
        }
    }
}

fn list() {
    for sc in Scenario::ALL {
        println!("{:<18} {}", sc.name(), sc.description());
    }
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    flight_doctor::check_sitl(&cfg.sitl)?;
    flight_doctor::check_shell(&cfg.shell)?;
    flight_doctor::check_missions(&cfg.flight)?;

    anyhow::ensure!(!cfg.telemetry.url.is_empty(), "telemetry.url missing");
    anyhow::ensure!(cfg.telemetry.capacity > 0, "telemetry.capacity must be > 0");
    if let Some(path) = &cfg.report.path {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            anyhow::ensure!(dir.is_dir(), "report directory not found: {}", dir.display());
        }
    }

    info!("doctor: OK");
    Ok(())
}

async fn run(cfg: &Config, scenario: Scenario) -> Result<ExitCode> {
    info!("run: {} ({})", scenario, scenario.description());

    let launcher = ProcessLauncher::new(
        cfg.sitl.clone(),
        cfg.shell.clone(),
        cfg.telemetry.url.clone(),
        cfg.telemetry.capacity,
    );
    let mut runner = Runner::new(launcher, &cfg.sitl, &cfg.shell, cfg.flight.clone())?;
    let outcome = runner.run_and_report(scenario, cfg.report.path.as_deref()).await?;

    if outcome.passed {
        info!("run: {} PASSED", scenario);
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("run: {} FAILED: {}", scenario, outcome.reason.as_deref().unwrap_or("unknown"));
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_config_parses() {
        let cfg: Config = toml::from_str(include_str!("../../../config/autotest.toml")).unwrap();
        assert_eq!(cfg.sitl.speedup, 10);
        assert_eq!(cfg.shell.streamrate, Some(5));
        assert!(cfg.sitl.home_location().is_ok());
        assert_eq!(cfg.flight.mission_dir, PathBuf::from("missions"));
    }

    #[test]
    fn sections_default_when_omitted() {
        let cfg: Config = toml::from_str(
            r#"
            [sitl]
            binary = "/opt/sitl/arducopter"
            home = "-35.362938,149.165085,584,270"

            [shell]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.telemetry.url, "udpin:127.0.0.1:19550");
        assert_eq!(cfg.telemetry.capacity, 1024);
        assert!(cfg.report.path.is_none());
        assert!(!cfg.flight.use_map);
        assert_eq!(cfg.shell.expect_timeout_s, 30);
    }

    #[test]
    fn doctor_rejects_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let text = format!(
            "[sitl]\nbinary = \"{}\"\nhome = \"-35.36,149.16,584,0\"\n[shell]\n[flight]\nmission_dir = \"{}\"\n",
            dir.path().join("arducopter").display(),
            dir.path().display()
        );
        let cfg: Config = toml::from_str(&text).unwrap();
        let err = doctor(&cfg).unwrap_err();
        assert!(err.to_string().contains("sitl.binary not found"));
    }
}
