use anyhow::{Context, Result};
use serde::Deserialize;
use sitl_link::TelemetryReader;
use sitl_proto::{Location, ModeSwitch, ShellCommand};
use sitl_shell::{CommandChannel, Match, Pattern};
use std::path::PathBuf;
use std::time::Duration;

use crate::glitch::GlitchSchedule;

fn default_mission_dir() -> PathBuf { PathBuf::from("missions") }

#[derive(Debug, Clone, Deserialize)]
pub struct FlightOptions {
    #[serde(default = "default_mission_dir")]
    pub mission_dir: PathBuf,
    /// Toggle the map's GPS/simulator position overlays during glitch tests.
    #[serde(default)]
    pub use_map: bool,
}

impl Default for FlightOptions {
    fn default() -> Self {
        Self { mission_dir: default_mission_dir(), use_map: false }
    }
}

/// Everything one flight owns: both vehicle channels plus the bits of state
/// scenario steps hand to each other (home, mission size, glitch injection).
pub struct Session {
    pub shell: Box<dyn CommandChannel>,
    pub vehicle: TelemetryReader,
    pub home: Location,
    /// Waypoints on the vehicle, home included. Refreshed on every load/save.
    pub num_wp: usize,
    pub glitch: GlitchSchedule,
    pub options: FlightOptions,
    pub expect_timeout: Duration,
}

impl Session {
    pub fn new(
        shell: Box<dyn CommandChannel>,
        vehicle: TelemetryReader,
        home: Location,
        options: FlightOptions,
        expect_timeout: Duration,
    ) -> Self {
        Self { shell, vehicle, home, num_wp: 0, glitch: GlitchSchedule::standard(), options, expect_timeout }
    }

    pub async fn send(&mut self, cmd: ShellCommand) -> Result<()> {
        self.shell.send(&cmd).await.with_context(|| format!("send `{}`", cmd))
    }

    pub async fn rc(&mut self, channel: u8, pwm: u16) -> Result<()> {
        self.send(ShellCommand::rc(channel, pwm)).await
    }

    pub async fn switch(&mut self, mode: ModeSwitch) -> Result<()> {
        self.send(ShellCommand::switch(mode)).await
    }

    pub async fn param(&mut self, name: &str, value: impl std::fmt::Display) -> Result<()> {
        self.send(ShellCommand::param(name, value)).await
    }

    /// Waits for `pattern` with the configured expectation timeout.
    pub async fn expect(&mut self, pattern: &Pattern) -> Result<Match> {
        let m = self.shell.expect(pattern, self.expect_timeout).await?;
        Ok(m)
    }

    /// Sequence number of the last waypoint on the vehicle.
    pub fn last_wp(&self) -> Result<u16> {
        let last = self.num_wp.saturating_sub(1);
        u16::try_from(last).with_context(|| format!("mission of {} waypoints exceeds the sequence range", self.num_wp))
    }

    pub fn mission_path(&self, name: &str) -> PathBuf {
        self.options.mission_dir.join(name)
    }

    /// Distance from home of the next fresh position fix.
    pub async fn home_distance(&mut self) -> Result<(f64, Location)> {
        let pos = self.vehicle.location().await?;
        Ok((self.home.distance_to(&pos), pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitl_link::ScriptedTelemetry;
    use sitl_shell::ScriptedShell;

    fn session() -> Session {
        let vehicle = TelemetryReader::new(ScriptedTelemetry::default());
        let home = Location::new(-35.362938, 149.165085, 584.0, 270.0);
        Session::new(Box::new(ScriptedShell::new()), vehicle, home, FlightOptions::default(), Duration::from_secs(1))
    }

    #[test]
    fn last_waypoint_fits_the_sequence_range() {
        let mut s = session();
        assert_eq!(s.last_wp().unwrap(), 0);
        s.num_wp = 8;
        assert_eq!(s.last_wp().unwrap(), 7);
        s.num_wp = usize::from(u16::MAX) + 1;
        assert_eq!(s.last_wp().unwrap(), u16::MAX);
        s.num_wp = usize::from(u16::MAX) + 2;
        let err = s.last_wp().unwrap_err();
        assert!(err.to_string().contains("exceeds the sequence range"));
    }
}
