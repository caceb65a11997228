use sitl_proto::{FlightMode, GlobalPosition, Location, RcChannels, Telemetry, VfrHud};

/// Latest value of everything the link has reported so far.
#[derive(Debug, Clone, Default)]
pub struct VehicleState {
    pub mode: Option<FlightMode>,
    pub armed: bool,
    pub heartbeats: u64,
    pub messages: u64,
    pub time_boot_ms: Option<u32>,
    pub hud: Option<VfrHud>,
    pub position: Option<GlobalPosition>,
    pub sim_position: Option<(f64, f64)>,
    pub rc: Option<RcChannels>,
    pub mission_seq: Option<u16>,
    pub wp_dist: Option<u16>,
    pub last_text: Option<String>,
}

impl VehicleState {
    pub fn apply(&mut self, msg: &Telemetry) {
        self.messages += 1;
        if let Some(t) = msg.time_boot_ms() {
            self.time_boot_ms = Some(t);
        }
        match msg {
            Telemetry::Heartbeat(hb) => {
                self.heartbeats += 1;
                self.mode = Some(hb.mode);
                self.armed = hb.armed;
            }
            Telemetry::VfrHud(h) => self.hud = Some(*h),
            Telemetry::RcChannels(rc) => self.rc = Some(*rc),
            Telemetry::GlobalPosition(p) => self.position = Some(*p),
            Telemetry::SimState { lat, lon } => self.sim_position = Some((*lat, *lon)),
            Telemetry::SystemTime { .. } => {}
            Telemetry::MissionCurrent { seq } => self.mission_seq = Some(*seq),
            Telemetry::NavController { wp_dist } => self.wp_dist = Some(*wp_dist),
            Telemetry::StatusText(t) => self.last_text = Some(t.clone()),
        }
    }

    pub fn sim_time_s(&self) -> Option<f64> {
        self.time_boot_ms.map(|ms| ms as f64 * 1e-3)
    }

    /// Last reported position combined with the last HUD heading.
    pub fn location(&self) -> Option<Location> {
        let p = self.position?;
        let heading = self.hud.map(|h| h.heading as f64).unwrap_or(p.heading);
        Some(Location::new(p.lat, p.lon, p.alt, heading))
    }
}
