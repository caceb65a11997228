use anyhow::{Context, Result};
use async_trait::async_trait;
use sitl_flight::preflight::preflight;
use sitl_flight::{FlightOptions, Outcome, Scenario, Session};
use sitl_link::{MavlinkSource, TelemetryReader};
use sitl_proto::{Location, ShellCommand};
use sitl_shell::pattern::{LOADED_PARAMS, READY_TO_FLY, RECEIVED_PARAMS, TELEMETRY_LOG};
use sitl_shell::{CommandChannel, ProcessShell, ShellConfig, ShellError, SimulatorProcess, SitlConfig};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::report::RunReport;

/// Time the vehicle gets to persist freshly set parameters before the reboot.
const PARAM_SETTLE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    SpawnForParams,
    Configure,
    Teardown,
    RespawnForFlight,
    ConnectTelemetry,
    Arm,
    RunScenario,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::SpawnForParams => "spawn-for-params",
            Phase::Configure => "configure",
            Phase::Teardown => "teardown",
            Phase::RespawnForFlight => "respawn-for-flight",
            Phase::ConnectTelemetry => "connect-telemetry",
            Phase::Arm => "arm",
            Phase::RunScenario => "run-scenario",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Wiped simulator; parameters get loaded and saved.
    Params,
    /// Simulator rebooted with the saved parameters, telemetry streaming.
    Flight,
}

/// Starts and stops the simulator/shell pair and opens the telemetry link.
#[async_trait]
pub trait Launcher: Send {
    async fn spawn(&mut self, pass: Pass) -> Result<Box<dyn CommandChannel>>;
    async fn connect(&mut self) -> Result<TelemetryReader>;
    /// Stops the simulator. Must be safe to call with nothing running.
    async fn teardown(&mut self);
}

pub struct ProcessLauncher {
    sitl: SitlConfig,
    shell: ShellConfig,
    url: String,
    capacity: usize,
    sim: Option<SimulatorProcess>,
}

impl ProcessLauncher {
    pub fn new(sitl: SitlConfig, shell: ShellConfig, url: String, capacity: usize) -> Self {
        Self { sitl, shell, url, capacity, sim: None }
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn spawn(&mut self, pass: Pass) -> Result<Box<dyn CommandChannel>> {
        let args = self.sitl.args(pass == Pass::Params)?;
        let binary = self.sitl.binary.to_string_lossy().into_owned();
        self.sim = Some(SimulatorProcess::spawn(&binary, &args).context("spawn simulator")?);
        let shell = ProcessShell::spawn(&self.shell.program, &self.shell.args(pass == Pass::Flight))
            .context("spawn gcs shell")?;
        Ok(Box::new(shell))
    }

    async fn connect(&mut self) -> Result<TelemetryReader> {
        let source = MavlinkSource::connect(&self.url, self.capacity)?;
        Ok(TelemetryReader::new(source))
    }

    async fn teardown(&mut self) {
        if let Some(mut sim) = self.sim.take() {
            sim.shutdown().await;
        }
    }
}

fn is_expect_timeout(err: &anyhow::Error) -> bool {
    err.chain().any(|c| c.downcast_ref::<ShellError>().map_or(false, ShellError::is_timeout))
}

/// Drives one scenario through both simulator launches.
pub struct Runner<L> {
    launcher: L,
    defaults: Vec<PathBuf>,
    home: Location,
    flight: FlightOptions,
    expect_timeout: Duration,
    param_timeout: Duration,
    settle: Duration,
    phase: Option<Phase>,
    telemetry_log: Option<String>,
}

impl<L: Launcher> Runner<L> {
    pub fn new(launcher: L, sitl: &SitlConfig, shell: &ShellConfig, flight: FlightOptions) -> Result<Self> {
        Ok(Self {
            launcher,
            defaults: sitl.defaults_paths(),
            home: sitl.home_location()?,
            flight,
            expect_timeout: shell.expect_timeout(),
            param_timeout: shell.param_timeout(),
            settle: PARAM_SETTLE,
            phase: None,
            telemetry_log: None,
        })
    }

    pub fn telemetry_log(&self) -> Option<&str> {
        self.telemetry_log.as_deref()
    }

    fn enter(&mut self, next: Phase) {
        match self.phase {
            Some(prev) => info!("runner: {} -> {}", prev, next),
            None => info!("runner: {}", next),
        }
        self.phase = Some(next);
    }

    /// Runs `scenario` once. Expectation timeouts come back as a failed
    /// outcome with reason `time out`; any other failure is an error. Every
    /// launch is torn down whichever way the run ends.
    pub async fn run(&mut self, scenario: Scenario) -> Result<Outcome> {
        match self.run_passes(scenario).await {
            Ok(out) => Ok(out),
            Err(e) if is_expect_timeout(&e) => {
                warn!("runner: {:#}", e);
                Ok(Outcome::fail("time out"))
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`Runner::run`], then writes a JSON report to `report` when set.
    /// A run that errors out is reported as failed with the error chain as
    /// its reason before the error is returned.
    pub async fn run_and_report(&mut self, scenario: Scenario, report: Option<&Path>) -> Result<Outcome> {
        let started = OffsetDateTime::now_utc();
        let res = self.run(scenario).await;
        let Some(path) = report else {
            return res;
        };

        let outcome = match &res {
            Ok(out) => out.clone(),
            Err(e) => Outcome::fail(format!("{:#}", e)),
        };
        let written = RunReport::new(scenario.name(), &outcome, self.telemetry_log(), started, OffsetDateTime::now_utc())
            .and_then(|r| r.write(path));
        match written {
            Ok(()) => info!("run: report written to {}", path.display()),
            Err(e) if res.is_ok() => return Err(e),
            Err(e) => warn!("run: {:#}", e),
        }
        res
    }

    async fn run_passes(&mut self, scenario: Scenario) -> Result<Outcome> {
        self.enter(Phase::SpawnForParams);
        let mut shell = self.spawn(Pass::Params).await?;
        let res = self.configure(shell.as_mut()).await;
        // parameters only take effect after a reboot
        self.teardown(shell).await;
        res?;

        self.enter(Phase::RespawnForFlight);
        let shell = self.spawn(Pass::Flight).await?;
        let (shell, res) = self.fly(shell, scenario).await;
        self.teardown(shell).await;
        res
    }

    async fn spawn(&mut self, pass: Pass) -> Result<Box<dyn CommandChannel>> {
        match self.launcher.spawn(pass).await {
            Ok(shell) => Ok(shell),
            Err(e) => {
                self.enter(Phase::Teardown);
                self.launcher.teardown().await;
                Err(e)
            }
        }
    }

    async fn teardown(&mut self, mut shell: Box<dyn CommandChannel>) {
        self.enter(Phase::Teardown);
        shell.close().await;
        self.launcher.teardown().await;
    }

    async fn configure(&mut self, shell: &mut dyn CommandChannel) -> Result<()> {
        shell.expect(&RECEIVED_PARAMS, self.param_timeout).await.context("waiting for parameters")?;
        self.enter(Phase::Configure);
        for path in &self.defaults {
            shell.send(&ShellCommand::ParamLoad(path.clone())).await?;
            shell
                .expect(&LOADED_PARAMS, self.param_timeout)
                .await
                .with_context(|| format!("param load {}", path.display()))?;
        }
        shell.send(&ShellCommand::param("LOG_REPLAY", 1)).await?;
        shell.send(&ShellCommand::param("LOG_DISARMED", 1)).await?;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    async fn await_ready(&mut self, shell: &mut dyn CommandChannel) -> Result<()> {
        let m = shell.expect(&TELEMETRY_LOG, self.expect_timeout).await.context("waiting for telemetry log")?;
        self.telemetry_log = m.group(1).map(str::to_string);
        info!("runner: telemetry log {}", self.telemetry_log.as_deref().unwrap_or("?"));

        // parameter fetch and readiness arrive in either order
        for _ in 0..2 {
            let (i, m) = shell
                .expect_any(&[&*RECEIVED_PARAMS, &*READY_TO_FLY], self.param_timeout)
                .await
                .context("waiting for vehicle ready")?;
            debug!("runner: ready signal {} ({})", i, m.line);
        }
        Ok(())
    }

    async fn fly(
        &mut self,
        mut shell: Box<dyn CommandChannel>,
        scenario: Scenario,
    ) -> (Box<dyn CommandChannel>, Result<Outcome>) {
        if let Err(e) = self.await_ready(shell.as_mut()).await {
            return (shell, Err(e));
        }
        self.enter(Phase::ConnectTelemetry);
        let vehicle = match self.launcher.connect().await {
            Ok(v) => v,
            Err(e) => return (shell, Err(e)),
        };

        let mut session = Session::new(shell, vehicle, self.home, self.flight.clone(), self.expect_timeout);
        let res = self.fly_session(&mut session, scenario).await;
        (session.shell, res)
    }

    async fn fly_session(&mut self, s: &mut Session, scenario: Scenario) -> Result<Outcome> {
        self.enter(Phase::Arm);
        let armed = preflight(s).await?;
        if !armed.passed {
            return Ok(armed);
        }
        self.enter(Phase::RunScenario);
        scenario.run(s).await
    }
}
