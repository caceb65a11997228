use serde::{Deserialize, Serialize};

use crate::mode::FlightMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Heartbeat,
    VfrHud,
    RcChannels,
    GlobalPosition,
    SimState,
    SystemTime,
    MissionCurrent,
    NavController,
    StatusText,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub mode: FlightMode,
    pub armed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VfrHud {
    pub airspeed: f32,
    pub groundspeed: f32,
    /// Altitude relative to home, metres.
    pub alt: f32,
    pub climb: f32,
    pub heading: i16,
    pub throttle: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RcChannels {
    pub time_boot_ms: u32,
    pub raw: [u16; 8],
}

impl RcChannels {
    /// 1-based channel accessor, matching the `rc <chan> <pwm>` numbering.
    pub fn chan(&self, n: usize) -> Option<u16> {
        n.checked_sub(1).and_then(|i| self.raw.get(i).copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GlobalPosition {
    pub time_boot_ms: u32,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub relative_alt: f64,
    pub heading: f64,
}

/// One message off the vehicle link, already decoded to SI-ish units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Telemetry {
    Heartbeat(Heartbeat),
    VfrHud(VfrHud),
    RcChannels(RcChannels),
    GlobalPosition(GlobalPosition),
    /// True simulator position, unaffected by injected GPS glitches.
    SimState { lat: f64, lon: f64 },
    SystemTime { time_boot_ms: u32 },
    MissionCurrent { seq: u16 },
    NavController { wp_dist: u16 },
    StatusText(String),
}

impl Telemetry {
    pub fn kind(&self) -> MessageKind {
        match self {
            Telemetry::Heartbeat(_) => MessageKind::Heartbeat,
            Telemetry::VfrHud(_) => MessageKind::VfrHud,
            Telemetry::RcChannels(_) => MessageKind::RcChannels,
            Telemetry::GlobalPosition(_) => MessageKind::GlobalPosition,
            Telemetry::SimState { .. } => MessageKind::SimState,
            Telemetry::SystemTime { .. } => MessageKind::SystemTime,
            Telemetry::MissionCurrent { .. } => MessageKind::MissionCurrent,
            Telemetry::NavController { .. } => MessageKind::NavController,
            Telemetry::StatusText(_) => MessageKind::StatusText,
        }
    }

    /// Boot-relative timestamp carried by the message, if any.
    pub fn time_boot_ms(&self) -> Option<u32> {
        match self {
            Telemetry::RcChannels(rc) => Some(rc.time_boot_ms),
            Telemetry::GlobalPosition(p) => Some(p.time_boot_ms),
            Telemetry::SystemTime { time_boot_ms } => Some(*time_boot_ms),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rc_channel_numbering_is_one_based() {
        let rc = RcChannels { time_boot_ms: 0, raw: [1100, 1200, 1300, 1400, 1500, 1600, 1700, 1800] };
        assert_eq!(rc.chan(1), Some(1100));
        assert_eq!(rc.chan(8), Some(1800));
        assert_eq!(rc.chan(0), None);
        assert_eq!(rc.chan(9), None);
    }

    #[test]
    fn kind_and_time() {
        let m = Telemetry::SystemTime { time_boot_ms: 1500 };
        assert_eq!(m.kind(), MessageKind::SystemTime);
        assert_eq!(m.time_boot_ms(), Some(1500));
        assert_eq!(Telemetry::MissionCurrent { seq: 2 }.time_boot_ms(), None);
    }
}
