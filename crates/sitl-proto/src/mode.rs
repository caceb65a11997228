use serde::{Deserialize, Serialize};
use std::fmt;

/// ArduCopter flight modes as reported in HEARTBEAT.custom_mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlightMode {
    Stabilize,
    Acro,
    AltHold,
    Auto,
    Guided,
    Loiter,
    Rtl,
    Circle,
    Land,
    Drift,
    Sport,
    Flip,
    AutoTune,
    PosHold,
    Brake,
    Other(u32),
}

impl FlightMode {
    pub fn from_custom_mode(n: u32) -> Self {
        match n {
            0 => Self::Stabilize,
            1 => Self::Acro,
            2 => Self::AltHold,
            3 => Self::Auto,
            4 => Self::Guided,
            5 => Self::Loiter,
            6 => Self::Rtl,
            7 => Self::Circle,
            9 => Self::Land,
            11 => Self::Drift,
            13 => Self::Sport,
            14 => Self::Flip,
            15 => Self::AutoTune,
            16 => Self::PosHold,
            17 => Self::Brake,
            n => Self::Other(n),
        }
    }

    pub fn custom_mode(self) -> u32 {
        match self {
            Self::Stabilize => 0,
            Self::Acro => 1,
            Self::AltHold => 2,
            Self::Auto => 3,
            Self::Guided => 4,
            Self::Loiter => 5,
            Self::Rtl => 6,
            Self::Circle => 7,
            Self::Land => 9,
            Self::Drift => 11,
            Self::Sport => 13,
            Self::Flip => 14,
            Self::AutoTune => 15,
            Self::PosHold => 16,
            Self::Brake => 17,
            Self::Other(n) => n,
        }
    }
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stabilize => "STABILIZE",
            Self::Acro => "ACRO",
            Self::AltHold => "ALT_HOLD",
            Self::Auto => "AUTO",
            Self::Guided => "GUIDED",
            Self::Loiter => "LOITER",
            Self::Rtl => "RTL",
            Self::Circle => "CIRCLE",
            Self::Land => "LAND",
            Self::Drift => "DRIFT",
            Self::Sport => "SPORT",
            Self::Flip => "FLIP",
            Self::AutoTune => "AUTOTUNE",
            Self::PosHold => "POSHOLD",
            Self::Brake => "BRAKE",
            Self::Other(n) => return write!(f, "Mode({})", n),
        };
        f.write_str(s)
    }
}

/// Transmitter mode-switch positions configured in the SITL test parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSwitch {
    Circle = 1,
    Land = 2,
    Rtl = 3,
    Auto = 4,
    Loiter = 5,
    Stabilize = 6,
}

impl ModeSwitch {
    pub fn position(self) -> u8 {
        self as u8
    }

    pub fn from_position(n: u8) -> Option<Self> {
        Some(match n {
            1 => Self::Circle,
            2 => Self::Land,
            3 => Self::Rtl,
            4 => Self::Auto,
            5 => Self::Loiter,
            6 => Self::Stabilize,
            _ => return None,
        })
    }

    pub fn mode(self) -> FlightMode {
        match self {
            Self::Circle => FlightMode::Circle,
            Self::Land => FlightMode::Land,
            Self::Rtl => FlightMode::Rtl,
            Self::Auto => FlightMode::Auto,
            Self::Loiter => FlightMode::Loiter,
            Self::Stabilize => FlightMode::Stabilize,
        }
    }
}
