//! Flight scenarios and the named compositions the runner can select.
//!
//! Steps inside a composition are chained with [`step!`]: the first step that
//! does not pass ends the composition with a failed [`Outcome`].

use anyhow::Result;
use serde::Serialize;
use sitl_proto::{ModeSwitch, ShellCommand};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::controls::{self, STICK_CENTRE};
use crate::session::Session;
use crate::wait;

pub mod auto;
pub mod circle;
pub mod failsafe;
pub mod fence;
pub mod glitch;
pub mod hold;
pub mod regression;
pub mod simple;
pub mod square;

pub(crate) const TAKEOFF_THROTTLE: u16 = 1700;
pub(crate) const CLIMB_THROTTLE: u16 = 1920;
pub(crate) const DESCEND_THROTTLE: u16 = 1080;
pub(crate) const RTL_TIMEOUT: f64 = 250.0;

const RESTORE_MODE_TIMEOUT: f64 = 30.0;
const HEADING_TOLERANCE: f64 = 5.0;
const HEADING_TIMEOUT: f64 = 30.0;
pub(crate) const DISTANCE_TOLERANCE: f64 = 5.0;
pub(crate) const DISTANCE_TIMEOUT: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub passed: bool,
    pub reason: Option<String>,
}

impl Outcome {
    pub fn pass() -> Self {
        Self { passed: true, reason: None }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self { passed: false, reason: Some(reason.into()) }
    }
}

/// Short-circuit AND over `Result<bool>` steps inside a function returning
/// `Result<Outcome>`.
macro_rules! step {
    ($name:expr, $ok:expr) => {
        if !$ok {
            tracing::warn!("step {} failed", $name);
            return Ok($crate::scenario::Outcome::fail(format!("{} failed", $name)));
        }
        tracing::info!("step {} passed", $name);
    };
}
pub(crate) use step;

/// Yaws right in place until facing `heading`, then centres the yaw stick.
pub(crate) async fn turn_to_heading(s: &mut Session, heading: f64) -> Result<bool> {
    info!("turning to {}", heading);
    s.rc(4, 1580).await?;
    let ok = wait::wait_heading(&mut s.vehicle, heading, HEADING_TOLERANCE, HEADING_TIMEOUT).await?.passed();
    s.rc(4, STICK_CENTRE).await?;
    Ok(ok)
}

/// Holds one stick at `pwm` until `metres` travelled, then centres it.
pub(crate) async fn fly_leg(s: &mut Session, channel: u8, pwm: u16, metres: f64, timeout: f64) -> Result<bool> {
    s.rc(channel, pwm).await?;
    let ok = wait::wait_distance(&mut s.vehicle, metres, DISTANCE_TOLERANCE, timeout).await?.passed();
    s.rc(channel, STICK_CENTRE).await?;
    Ok(ok)
}

/// Holds one stick at `pwm` for `secs` of simulated time, then centres it.
pub(crate) async fn fly_for(s: &mut Session, channel: u8, pwm: u16, secs: f64) -> Result<()> {
    s.rc(channel, pwm).await?;
    wait::wait_seconds(&mut s.vehicle, secs).await?;
    s.rc(channel, STICK_CENTRE).await
}

/// Sends restoring commands; failures are logged, never propagated.
pub(crate) async fn restore(s: &mut Session, what: &str, cmds: Vec<ShellCommand>) {
    for cmd in cmds {
        if let Err(e) = s.send(cmd).await {
            warn!("cleanup {}: {:#}", what, e);
        }
    }
}

/// Cleanup mode switch, done once the heartbeat reports the new mode or the
/// wait runs out. Failures are logged, never propagated.
pub(crate) async fn restore_mode(s: &mut Session, what: &str, mode: ModeSwitch) {
    if let Err(e) = s.switch(mode).await {
        warn!("cleanup {}: {:#}", what, e);
        return;
    }
    match wait::wait_mode(&mut s.vehicle, mode.mode(), RESTORE_MODE_TIMEOUT).await {
        Ok(r) if r.passed() => {}
        Ok(_) => warn!("cleanup {}: vehicle never entered {}", what, mode.mode()),
        Err(e) => warn!("cleanup {}: {:#}", what, e),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    SquareStabilize,
    GpsLoiter,
    StabilityPatch,
    ThrottleFailsafe,
    BatteryFailsafe,
    HorizontalFence,
    Loiter,
    Simple,
    SuperSimple,
    Circle,
    AutoMission,
    FullRegression,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown scenario {0:?} (see `list`)")]
pub struct UnknownScenario(pub String);

impl Scenario {
    pub const ALL: [Scenario; 12] = [
        Scenario::SquareStabilize,
        Scenario::GpsLoiter,
        Scenario::StabilityPatch,
        Scenario::ThrottleFailsafe,
        Scenario::BatteryFailsafe,
        Scenario::HorizontalFence,
        Scenario::Loiter,
        Scenario::Simple,
        Scenario::SuperSimple,
        Scenario::Circle,
        Scenario::AutoMission,
        Scenario::FullRegression,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::SquareStabilize => "square_stabilize",
            Scenario::GpsLoiter => "gps_loiter",
            Scenario::StabilityPatch => "stability_patch",
            Scenario::ThrottleFailsafe => "throttle_failsafe",
            Scenario::BatteryFailsafe => "battery_failsafe",
            Scenario::HorizontalFence => "horizontal_fence",
            Scenario::Loiter => "loiter",
            Scenario::Simple => "simple",
            Scenario::SuperSimple => "super_simple",
            Scenario::Circle => "circle",
            Scenario::AutoMission => "auto_mission",
            Scenario::FullRegression => "full_regression",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Scenario::SquareStabilize => "fly a 50 m box in STABILIZE, save it and fly it back in AUTO",
            Scenario::GpsLoiter => "GPS glitch recovery in LOITER and during an AUTO mission",
            Scenario::StabilityPatch => "hold LOITER with one motor at 60% efficiency",
            Scenario::ThrottleFailsafe => "lose throttle 60 m out and expect a return home",
            Scenario::BatteryFailsafe => "low battery voltage must trigger LAND",
            Scenario::HorizontalFence => "breach the circular fence and expect a return home",
            Scenario::Loiter => "hold LOITER within 5 m for 10 s",
            Scenario::Simple => "fly a pattern in SIMPLE mode",
            Scenario::SuperSimple => "circle home in SUPER_SIMPLE mode",
            Scenario::Circle => "CIRCLE mode with a 30 m radius",
            Scenario::AutoMission => "fly the stock AUTO mission through to disarm",
            Scenario::FullRegression => "every manual-mode scenario plus the AUTO mission",
        }
    }

    pub async fn run(self, s: &mut Session) -> Result<Outcome> {
        info!("scenario {}: starting", self);
        let out = self.compose(s).await?;
        info!("scenario {}: passed={} {}", self, out.passed, out.reason.as_deref().unwrap_or(""));
        Ok(out)
    }

    async fn compose(self, s: &mut Session) -> Result<Outcome> {
        step!("takeoff", controls::takeoff(s, 10.0, TAKEOFF_THROTTLE).await?);
        match self {
            Scenario::SquareStabilize => {
                step!("fly_square", square::fly_square(s, 50.0, 300.0).await?);
                let path = s.mission_path("ch7_mission.txt");
                step!("save_mission", controls::save_mission_to_file(s, &path).await?);
                step!("fly_mission", controls::fly_mission(s, 0.5, Some(10.0)).await?);
            }
            Scenario::GpsLoiter => {
                step!("gps_glitch_loiter", glitch::gps_glitch_loiter(s, 30.0, 20.0).await?);
                step!("rtl", controls::fly_rtl(s, RTL_TIMEOUT).await?);
                step!("gps_glitch_auto", glitch::gps_glitch_auto(s, 120.0).await?);
            }
            Scenario::StabilityPatch => {
                step!("stability_patch", hold::stability_patch(s, 30.0, 5.0, 10.0).await?);
                step!("rtl", controls::fly_rtl(s, RTL_TIMEOUT).await?);
            }
            Scenario::ThrottleFailsafe => {
                step!("throttle_failsafe", failsafe::throttle_failsafe(s, 60.0, 180.0).await?);
            }
            Scenario::BatteryFailsafe => {
                step!("battery_failsafe", failsafe::battery_failsafe(s, 30.0).await?);
            }
            Scenario::HorizontalFence => {
                step!("fence", fence::fly_fence(s, 180.0).await?);
            }
            Scenario::Loiter => {
                step!("loiter", hold::loiter(s, 10.0, 5.0, 5.0).await?);
                step!("rtl", controls::fly_rtl(s, RTL_TIMEOUT).await?);
            }
            Scenario::Simple => {
                step!("simple", simple::fly_simple(s, 50.0).await?);
                step!("rtl", controls::fly_rtl(s, RTL_TIMEOUT).await?);
            }
            Scenario::SuperSimple => {
                step!("super_simple", simple::fly_super_simple(s, 45.0).await?);
                step!("rtl", controls::fly_rtl(s, RTL_TIMEOUT).await?);
            }
            Scenario::Circle => {
                step!("circle", circle::fly_circle(s, 36.0).await?);
                step!("rtl", controls::fly_rtl(s, RTL_TIMEOUT).await?);
            }
            Scenario::AutoMission => {
                step!("auto_mission", auto::fly_auto_test(s).await?);
            }
            Scenario::FullRegression => return regression::full_regression(s).await,
        }
        Ok(Outcome::pass())
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.name() == wanted)
            .ok_or_else(|| UnknownScenario(s.to_string()))
    }
}
