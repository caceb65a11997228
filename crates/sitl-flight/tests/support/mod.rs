#![allow(dead_code)]

//! A small kinematic copter behind both vehicle channels.
//!
//! Telemetry is produced lazily: every time the harness drains the queue the
//! simulation steps 100 ms and emits one cycle of messages. Shell waits that
//! find nothing queued step the simulation too, without emitting telemetry.

use async_trait::async_trait;
use sitl_flight::mission::{Mission, MissionItem, MAV_CMD_NAV_LAND, MAV_CMD_NAV_RETURN_TO_LAUNCH, MAV_CMD_NAV_TAKEOFF, MAV_CMD_NAV_WAYPOINT};
use sitl_flight::{FlightOptions, Session};
use sitl_link::{LinkError, TelemetryReader, TelemetrySource};
use sitl_proto::{FlightMode, GlobalPosition, Heartbeat, Location, ModeSwitch, RcChannels, ShellCommand, Telemetry, VfrHud};
use sitl_shell::{CommandChannel, Match, Pattern, ShellError};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const HOME: &str = "-35.362938,149.165085,584,270";

const DT: f64 = 0.1;
const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// Four simulated hours; past this the link reports closed so a stuck test fails.
const MAX_SIM_MS: u32 = 4 * 3600 * 1000;
/// Simulated time a shell wait may burn before timing out.
const EXPECT_STEPS: usize = 600;
const AUTO_DISARM_S: f64 = 10.0;
const FENCE_RADIUS_M: f64 = 50.0;

pub fn home() -> Location {
    Location::parse(HOME).unwrap()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Quirks {
    /// Throttle below 950 no longer triggers RTL.
    pub no_throttle_failsafe: bool,
    /// LOITER flies toward the glitched fix instead of holding the true position.
    pub chases_gps_glitch: bool,
    /// The roll channel has no effect.
    pub dead_roll: bool,
    /// Mode switches take 500 ms to apply; a newer switch replaces a pending one.
    pub switch_settle: bool,
}

pub struct Sim {
    pub home: Location,
    pub quirks: Quirks,
    pub time_ms: u32,
    pub north: f64,
    pub east: f64,
    pub alt: f64,
    pub heading: f64,
    pub groundspeed: f64,
    pub climb: f64,
    pub mode: FlightMode,
    /// Every mode entered, in order.
    pub modes: Vec<FlightMode>,
    pub armed: bool,
    pub rc: [u16; 8],
    pub params: HashMap<String, f64>,
    pub mission: Vec<MissionItem>,
    pub seq: u16,
    pub lines: VecDeque<String>,
    pub sent: Vec<String>,
    reported: Option<u16>,
    landed_for: f64,
    pending_switch: Option<(FlightMode, u32)>,
    telemetry: VecDeque<Telemetry>,
}

impl Sim {
    pub fn new(home: Location, quirks: Quirks) -> Self {
        Self {
            home,
            quirks,
            time_ms: 0,
            north: 0.0,
            east: 0.0,
            alt: 0.0,
            heading: home.heading,
            groundspeed: 0.0,
            climb: 0.0,
            mode: FlightMode::Stabilize,
            modes: Vec::new(),
            armed: false,
            rc: [1500; 8],
            params: HashMap::new(),
            mission: vec![MissionItem::nav(0, MAV_CMD_NAV_WAYPOINT, home.lat, home.lon, home.alt)],
            seq: 0,
            lines: VecDeque::from(vec!["GPS lock at 0 meters".to_string(), "IMU0 is using GPS".to_string()]),
            sent: Vec::new(),
            reported: None,
            landed_for: 0.0,
            pending_switch: None,
            telemetry: VecDeque::new(),
        }
    }

    fn param_or(&self, name: &str, default: f64) -> f64 {
        self.params.get(name).copied().unwrap_or(default)
    }

    fn local(&self, lat: f64, lon: f64) -> (f64, f64) {
        let n = (lat - self.home.lat).to_radians() * EARTH_RADIUS_M;
        let e = (lon - self.home.lon).to_radians() * EARTH_RADIUS_M * self.home.lat.to_radians().cos();
        (n, e)
    }

    pub fn position(&self) -> Location {
        let mut p = self.home.offset(self.north, self.east);
        p.alt = self.home.alt + self.alt;
        p.heading = self.heading;
        p
    }

    pub fn home_distance(&self) -> f64 {
        self.north.hypot(self.east)
    }

    fn set_mode(&mut self, mode: FlightMode) {
        self.mode = mode;
        self.modes.push(mode);
        if mode == FlightMode::Auto {
            if self.seq == 0 {
                self.seq = 1;
            }
            self.reported = None;
        }
        self.lines.push_back(format!("Mode {}", mode));
    }

    fn check_failsafes(&mut self) {
        if !self.armed {
            return;
        }
        let recovering = matches!(self.mode, FlightMode::Rtl | FlightMode::Land);
        if !self.quirks.no_throttle_failsafe && self.rc[2] < 950 && !recovering {
            self.lines.push_back("APM: Failsafe: throttle".into());
            self.set_mode(FlightMode::Rtl);
        }
        if self.param_or("FS_BATT_ENABLE", 0.0) == 1.0
            && self.param_or("SIM_BATT_VOLTAGE", 12.6) < 11.0
            && self.mode != FlightMode::Land
        {
            self.lines.push_back("APM: Failsafe: battery".into());
            self.set_mode(FlightMode::Land);
        }
        let recovering = matches!(self.mode, FlightMode::Rtl | FlightMode::Land);
        if self.param_or("FENCE_ENABLE", 0.0) == 1.0 && self.home_distance() > FENCE_RADIUS_M && !recovering {
            self.lines.push_back("APM: Fence breach".into());
            self.set_mode(FlightMode::Rtl);
        }
    }

    fn sticks(&mut self) -> (f64, f64, f64) {
        let raw = self.rc;
        let rc = |i: usize| raw[i] as f64;
        self.heading = (self.heading + (rc(3) - 1500.0) * 0.5 * DT).rem_euclid(360.0);
        let h = self.heading.to_radians();
        let fwd = (1500.0 - rc(1)) / 400.0 * 10.0;
        let right = if self.quirks.dead_roll { 0.0 } else { (rc(0) - 1500.0) / 400.0 * 10.0 };
        let climb = ((rc(2) - 1500.0) / 500.0 * 5.0).clamp(-5.0, 5.0);
        (fwd * h.cos() - right * h.sin(), fwd * h.sin() + right * h.cos(), climb)
    }

    fn toward(&self, n: f64, e: f64, speed: f64) -> (f64, f64, f64) {
        let dn = n - self.north;
        let de = e - self.east;
        let d = dn.hypot(de);
        if d < 1e-9 {
            return (0.0, 0.0, 0.0);
        }
        let v = speed.min(d / DT);
        (dn / d * v, de / d * v, d)
    }

    fn vertical_toward(&self, alt: f64, rate: f64) -> f64 {
        let diff = alt - self.alt;
        diff.signum() * rate.min(diff.abs() / DT)
    }

    fn rtl(&self) -> (f64, f64, f64) {
        if self.home_distance() > 0.5 {
            let (vn, ve, _) = self.toward(0.0, 0.0, 5.0);
            (vn, ve, 0.0)
        } else {
            (0.0, 0.0, -2.0)
        }
    }

    fn auto(&mut self) -> (f64, f64, f64) {
        let Some(item) = self.mission.get(self.seq as usize).cloned() else {
            return (0.0, 0.0, 0.0);
        };
        let (vn, ve, climb, reached) = match item.command {
            MAV_CMD_NAV_TAKEOFF => {
                let climb = self.vertical_toward(item.alt, 3.0);
                (0.0, 0.0, climb, (self.alt + climb * DT - item.alt).abs() < 0.5)
            }
            MAV_CMD_NAV_RETURN_TO_LAUNCH => {
                let (vn, ve, climb) = self.rtl();
                (vn, ve, climb, false)
            }
            MAV_CMD_NAV_LAND => (0.0, 0.0, -2.0, false),
            _ => {
                let (n, e) = self.local(item.lat, item.lon);
                let (vn, ve, d) = self.toward(n, e, 8.0);
                let climb = self.vertical_toward(item.alt, 3.0);
                let left = (d - vn.hypot(ve) * DT).max(0.0);
                (vn, ve, climb, left < 1.0 && (self.alt + climb * DT - item.alt).abs() < 0.5)
            }
        };
        if reached && self.reported != Some(self.seq) {
            self.lines.push_back(format!("Reached command #{}", self.seq));
            self.reported = Some(self.seq);
            if (self.seq as usize) + 1 < self.mission.len() {
                self.seq += 1;
            }
        }
        (vn, ve, climb)
    }

    fn circle(&mut self) -> (f64, f64, f64) {
        let radius = (self.param_or("CIRCLE_RADIUS", 500.0) / 100.0).max(1.0);
        let speed = 5.0;
        self.heading = (self.heading + (speed / radius).to_degrees() * DT).rem_euclid(360.0);
        let h = self.heading.to_radians();
        (speed * h.cos(), speed * h.sin(), 0.0)
    }

    /// Pull toward the glitched fix, 10 m/s along the offset.
    fn glitch_chase(&self) -> (f64, f64) {
        let x = self.param_or("SIM_GPS_GLITCH_X", 0.0);
        let y = self.param_or("SIM_GPS_GLITCH_Y", 0.0);
        let norm = x.hypot(y);
        if !self.quirks.chases_gps_glitch || self.mode != FlightMode::Loiter || norm == 0.0 {
            return (0.0, 0.0);
        }
        (-10.0 * x / norm, -10.0 * y / norm)
    }

    pub fn step(&mut self) {
        self.time_ms += 100;
        if let Some((mode, due)) = self.pending_switch {
            if self.time_ms >= due {
                self.pending_switch = None;
                self.set_mode(mode);
            }
        }
        self.check_failsafes();

        let (mut vn, mut ve, climb) = if self.armed {
            match self.mode {
                FlightMode::Rtl => self.rtl(),
                FlightMode::Land => (0.0, 0.0, -2.0),
                FlightMode::Auto => self.auto(),
                FlightMode::Circle => self.circle(),
                _ => self.sticks(),
            }
        } else {
            (0.0, 0.0, 0.0)
        };
        if self.armed {
            let (cn, ce) = self.glitch_chase();
            vn += cn;
            ve += ce;
        }
        if self.alt <= 0.0 && climb <= 0.0 {
            vn = 0.0;
            ve = 0.0;
        }
        self.north += vn * DT;
        self.east += ve * DT;
        self.alt = (self.alt + climb * DT).max(0.0);
        self.groundspeed = vn.hypot(ve);
        self.climb = if self.alt > 0.0 { climb } else { 0.0 };

        if self.armed && self.alt <= 0.05 && self.rc[2] <= 1100 {
            self.landed_for += DT;
            if self.landed_for >= AUTO_DISARM_S {
                self.armed = false;
                self.lines.push_back("APM: Disarming motors".into());
            }
        } else {
            self.landed_for = 0.0;
        }
    }

    fn current_wp_dist(&self) -> f64 {
        if self.mode != FlightMode::Auto {
            return 0.0;
        }
        match self.mission.get(self.seq as usize) {
            Some(item) if item.command == MAV_CMD_NAV_WAYPOINT => {
                let (n, e) = self.local(item.lat, item.lon);
                (n - self.north).hypot(e - self.east)
            }
            _ => 0.0,
        }
    }

    fn emit(&mut self) {
        let t = self.time_ms;
        let truth = self.position();
        let heading = (self.heading.round() as i16).rem_euclid(360);
        let gps_lat = truth.lat + self.param_or("SIM_GPS_GLITCH_X", 0.0);
        let gps_lon = truth.lon + self.param_or("SIM_GPS_GLITCH_Y", 0.0);
        let cycle = [
            Telemetry::Heartbeat(Heartbeat { mode: self.mode, armed: self.armed }),
            Telemetry::SystemTime { time_boot_ms: t },
            Telemetry::VfrHud(VfrHud {
                airspeed: self.groundspeed as f32,
                groundspeed: self.groundspeed as f32,
                alt: self.alt as f32,
                climb: self.climb as f32,
                heading,
                throttle: (self.rc[2].saturating_sub(1000) / 10).min(100),
            }),
            Telemetry::GlobalPosition(GlobalPosition {
                time_boot_ms: t,
                lat: gps_lat,
                lon: gps_lon,
                alt: truth.alt,
                relative_alt: self.alt,
                heading: self.heading,
            }),
            Telemetry::SimState { lat: truth.lat, lon: truth.lon },
            Telemetry::RcChannels(RcChannels { time_boot_ms: t, raw: self.rc }),
            Telemetry::MissionCurrent { seq: self.seq },
            Telemetry::NavController { wp_dist: self.current_wp_dist().round().min(u16::MAX as f64) as u16 },
        ];
        self.telemetry.extend(cycle);
    }

    fn save_wp(&mut self) {
        let pos = self.position();
        if self.mission.len() <= 1 {
            let seq = self.mission.len() as u16;
            self.mission.push(MissionItem::nav(seq, MAV_CMD_NAV_TAKEOFF, pos.lat, pos.lon, self.alt));
        }
        let seq = self.mission.len() as u16;
        self.mission.push(MissionItem::nav(seq, MAV_CMD_NAV_WAYPOINT, pos.lat, pos.lon, self.alt));
        self.lines.push_back(format!("Added waypoint {}", seq));
    }

    fn check_arming(&mut self) {
        if self.mode != FlightMode::Stabilize || self.rc[2] > 1000 {
            return;
        }
        if !self.armed && self.rc[3] >= 2000 {
            self.armed = true;
            self.landed_for = 0.0;
            self.lines.push_back("APM: Arming motors".into());
        } else if self.armed && self.rc[3] <= 1000 && self.alt < 0.5 {
            self.armed = false;
            self.lines.push_back("APM: Disarming motors".into());
        }
    }

    fn handle(&mut self, cmd: &ShellCommand) {
        self.sent.push(cmd.to_string());
        match cmd {
            ShellCommand::Switch(n) => {
                if let Some(sw) = ModeSwitch::from_position(*n) {
                    if self.quirks.switch_settle {
                        self.pending_switch = Some((sw.mode(), self.time_ms + 500));
                    } else {
                        self.set_mode(sw.mode());
                    }
                }
            }
            ShellCommand::Rc { channel, pwm } => {
                let Some(i) = (*channel as usize).checked_sub(1).filter(|i| *i < 8) else {
                    return;
                };
                let prev = self.rc[i];
                self.rc[i] = *pwm;
                if *channel == 7 && prev < 1800 && *pwm >= 1800 {
                    self.save_wp();
                }
                self.check_arming();
            }
            ShellCommand::ParamSet { name, value } => {
                if let Ok(v) = value.parse::<f64>() {
                    self.params.insert(name.clone(), v);
                }
            }
            ShellCommand::ParamLoad(_) => self.lines.push_back("Loaded 412 parameters from file".into()),
            ShellCommand::WpLoad(path) => match Mission::load(path) {
                Ok(m) => {
                    self.lines.push_back(format!("Loaded {} waypoints from {}", m.count(), path.display()));
                    self.mission = m.items;
                    self.lines.push_back("Flight plan received".into());
                }
                Err(e) => self.lines.push_back(format!("Unable to load {}: {}", path.display(), e)),
            },
            ShellCommand::WpList => {
                self.lines.push_back(format!("Requesting {} waypoints t=0 now=0", self.mission.len()));
            }
            ShellCommand::WpSave(path) => {
                let m = Mission { items: self.mission.clone() };
                match m.save(path) {
                    Ok(()) => self.lines.push_back(format!("Saved {} waypoints to {}", m.count(), path.display())),
                    Err(e) => self.lines.push_back(format!("Failed to save {}: {}", path.display(), e)),
                }
            }
            ShellCommand::WpSet(n) => {
                self.seq = *n;
                self.reported = None;
            }
            ShellCommand::MapSet { .. } => {}
        }
    }
}

fn lock(sim: &Arc<Mutex<Sim>>) -> MutexGuard<'_, Sim> {
    sim.lock().unwrap()
}

pub struct FakeShell {
    sim: Arc<Mutex<Sim>>,
    last: Option<Match>,
}

impl FakeShell {
    fn expect_lines(&mut self, patterns: &[&Pattern], timeout: Duration) -> Result<(usize, Match), ShellError> {
        let mut sim = lock(&self.sim);
        for _ in 0..EXPECT_STEPS {
            while let Some(line) = sim.lines.pop_front() {
                for (i, p) in patterns.iter().enumerate() {
                    if let Some(m) = p.find(&line) {
                        self.last = Some(m.clone());
                        return Ok((i, m));
                    }
                }
            }
            sim.step();
        }
        let pattern = patterns.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(" | ");
        Err(ShellError::Timeout { pattern, secs: timeout.as_secs_f64() })
    }
}

#[async_trait]
impl CommandChannel for FakeShell {
    async fn send(&mut self, cmd: &ShellCommand) -> Result<(), ShellError> {
        lock(&self.sim).handle(cmd);
        Ok(())
    }

    async fn expect_any(&mut self, patterns: &[&Pattern], timeout: Duration) -> Result<(usize, Match), ShellError> {
        self.expect_lines(patterns, timeout)
    }

    fn last_match(&self) -> Option<&Match> {
        self.last.as_ref()
    }
}

pub struct FakeTelemetry {
    sim: Arc<Mutex<Sim>>,
}

impl FakeTelemetry {
    fn pop(&mut self) -> Result<Telemetry, LinkError> {
        let mut sim = lock(&self.sim);
        if sim.telemetry.is_empty() {
            if sim.time_ms >= MAX_SIM_MS {
                return Err(LinkError::Closed);
            }
            sim.step();
            sim.emit();
        }
        sim.telemetry.pop_front().ok_or(LinkError::Closed)
    }
}

#[async_trait]
impl TelemetrySource for FakeTelemetry {
    async fn next_message(&mut self) -> Result<Telemetry, LinkError> {
        self.pop()
    }
}

/// A session wired to a fresh fake vehicle sitting disarmed at [`HOME`].
pub fn session(quirks: Quirks, mission_dir: &Path) -> (Session, Arc<Mutex<Sim>>) {
    let sim = Arc::new(Mutex::new(Sim::new(home(), quirks)));
    let shell = FakeShell { sim: sim.clone(), last: None };
    let link = TelemetryReader::new(FakeTelemetry { sim: sim.clone() });
    let options = FlightOptions { mission_dir: mission_dir.to_path_buf(), use_map: false };
    let session = Session::new(Box::new(shell), link, home(), options, Duration::from_secs(30));
    (session, sim)
}

/// Copies one of the repository's stock missions into `dir`.
pub fn copy_stock_mission(dir: &Path, name: &str) -> std::path::PathBuf {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../missions").join(name);
    let dst = dir.join(name);
    std::fs::copy(&src, &dst).unwrap();
    dst
}

pub fn sent(sim: &Arc<Mutex<Sim>>) -> Vec<String> {
    lock(sim).sent.clone()
}

/// Writes a small survey mission: takeoff, a 60 m box to the north-east, RTL.
pub fn write_box_mission(dir: &Path, name: &str) -> std::path::PathBuf {
    let h = home();
    let corners = [(0.0, 0.0), (60.0, 0.0), (60.0, 60.0), (0.0, 60.0)];
    let mut items = vec![
        MissionItem::nav(0, MAV_CMD_NAV_WAYPOINT, h.lat, h.lon, h.alt),
        MissionItem::nav(1, MAV_CMD_NAV_TAKEOFF, h.lat, h.lon, 20.0),
    ];
    for (n, e) in corners {
        let p = h.offset(n, e);
        let seq = items.len() as u16;
        items.push(MissionItem::nav(seq, MAV_CMD_NAV_WAYPOINT, p.lat, p.lon, 20.0));
    }
    let seq = items.len() as u16;
    items.push(MissionItem::nav(seq, MAV_CMD_NAV_RETURN_TO_LAUNCH, 0.0, 0.0, 0.0));
    let path = dir.join(name);
    Mission { items }.save(&path).unwrap();
    path
}
