use sitl_proto::{FlightMode, GlobalPosition, Heartbeat, Location, MessageKind, RcChannels, Telemetry, VfrHud};
use tracing::info;

use crate::{LinkError, TelemetrySource, VehicleState};

/// Blocking-style reads over the telemetry stream.
///
/// Every read consumes messages in arrival order until one of the wanted
/// type shows up; skipped messages still update [`VehicleState`]. There is no
/// timeout here, callers bound reads with their own simulated-time loops.
pub struct TelemetryReader {
    source: Box<dyn TelemetrySource>,
    state: VehicleState,
}

impl TelemetryReader {
    pub fn new(source: impl TelemetrySource + 'static) -> Self {
        Self { source: Box::new(source), state: VehicleState::default() }
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn flight_mode(&self) -> Option<FlightMode> {
        self.state.mode
    }

    pub fn armed(&self) -> bool {
        self.state.armed
    }

    pub async fn next(&mut self) -> Result<Telemetry, LinkError> {
        let msg = self.source.next_message().await?;
        self.state.apply(&msg);
        if let Telemetry::StatusText(text) = &msg {
            info!("vehicle: {}", text);
        }
        Ok(msg)
    }

    pub async fn recv(&mut self, kind: MessageKind) -> Result<Telemetry, LinkError> {
        self.recv_match(kind, |_| true).await
    }

    /// Next message of `kind` for which `pred` holds.
    pub async fn recv_match<F>(&mut self, kind: MessageKind, pred: F) -> Result<Telemetry, LinkError>
    where
        F: Fn(&Telemetry) -> bool,
    {
        loop {
            let msg = self.next().await?;
            if msg.kind() == kind && pred(&msg) {
                return Ok(msg);
            }
        }
    }

    pub async fn wait_heartbeat(&mut self) -> Result<Heartbeat, LinkError> {
        loop {
            if let Telemetry::Heartbeat(hb) = self.next().await? {
                return Ok(hb);
            }
        }
    }

    pub async fn vfr_hud(&mut self) -> Result<VfrHud, LinkError> {
        loop {
            if let Telemetry::VfrHud(h) = self.next().await? {
                return Ok(h);
            }
        }
    }

    pub async fn global_position(&mut self) -> Result<GlobalPosition, LinkError> {
        loop {
            if let Telemetry::GlobalPosition(p) = self.next().await? {
                return Ok(p);
            }
        }
    }

    pub async fn rc_channels(&mut self) -> Result<RcChannels, LinkError> {
        loop {
            if let Telemetry::RcChannels(rc) = self.next().await? {
                return Ok(rc);
            }
        }
    }

    /// Simulated seconds since boot, from the next SYSTEM_TIME.
    pub async fn sim_time(&mut self) -> Result<f64, LinkError> {
        loop {
            if let Telemetry::SystemTime { time_boot_ms } = self.next().await? {
                return Ok(time_boot_ms as f64 * 1e-3);
            }
        }
    }

    /// Fresh GPS-derived location: waits for a HUD update, then a position.
    pub async fn location(&mut self) -> Result<Location, LinkError> {
        let hud = self.vfr_hud().await?;
        let p = self.global_position().await?;
        Ok(Location::new(p.lat, p.lon, p.alt, hud.heading as f64))
    }

    /// True simulator position, unaffected by GPS glitch injection.
    pub async fn sim_location(&mut self) -> Result<Location, LinkError> {
        loop {
            if let Telemetry::SimState { lat, lon } = self.next().await? {
                let alt = self.state.position.map(|p| p.alt).unwrap_or_default();
                let heading = self.state.hud.map(|h| h.heading as f64).unwrap_or_default();
                return Ok(Location::new(lat, lon, alt, heading));
            }
        }
    }

    pub async fn waypoint_current(&mut self) -> Result<u16, LinkError> {
        loop {
            if let Telemetry::MissionCurrent { seq } = self.next().await? {
                return Ok(seq);
            }
        }
    }

    pub async fn wp_dist(&mut self) -> Result<u16, LinkError> {
        loop {
            if let Telemetry::NavController { wp_dist } = self.next().await? {
                return Ok(wp_dist);
            }
        }
    }
}
