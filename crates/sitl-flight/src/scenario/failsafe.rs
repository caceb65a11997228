use anyhow::Result;
use sitl_proto::{FlightMode, ModeSwitch, ShellCommand};
use tracing::{debug, info, warn};

use super::{fly_leg, restore, restore_mode, turn_to_heading};
use crate::controls::{self, change_mode, in_mode, STICK_CENTRE};
use crate::session::Session;
use crate::wait::{self, SimClock};

/// Flies out, drops throttle below the failsafe threshold and expects the
/// vehicle to return and land at home on its own.
pub async fn throttle_failsafe(s: &mut Session, side: f64, timeout: f64) -> Result<bool> {
    let res = throttle_failsafe_body(s, side, timeout).await;
    restore(s, "throttle failsafe", vec![ShellCommand::rc(3, 1100)]).await;
    restore_mode(s, "throttle failsafe", ModeSwitch::Land).await;
    restore_mode(s, "throttle failsafe", ModeSwitch::Stabilize).await;
    res
}

async fn throttle_failsafe_body(s: &mut Session, side: f64, timeout: f64) -> Result<bool> {
    if !change_mode(s, ModeSwitch::Loiter).await? {
        return Ok(false);
    }
    if !turn_to_heading(s, 135.0).await? {
        return Ok(false);
    }
    // a little extra throttle so the mode change does not sink us
    s.rc(3, 1600).await?;
    if !change_mode(s, ModeSwitch::Stabilize).await? {
        return Ok(false);
    }
    controls::hover(s, STICK_CENTRE).await?;

    info!("throttle failsafe: going out {}m", side);
    let mut ok = fly_leg(s, 2, 1350, side, 60.0).await?;

    info!("throttle failsafe: pulling throttle");
    s.rc(3, 900).await?;

    let clock = SimClock::start(&mut s.vehicle, timeout).await?;
    let mut recovering = false;
    loop {
        let alt = s.vehicle.vfr_hud().await?.alt;
        let (home_distance, _) = s.home_distance().await?;
        if !recovering && in_mode(s, &[FlightMode::Rtl, FlightMode::Land]) {
            info!("throttle failsafe: vehicle in {:?}", s.vehicle.flight_mode());
            recovering = true;
        }
        debug!("throttle failsafe: alt {:.0} home distance {:.0}", alt, home_distance);
        if alt <= 1.0 && home_distance < 10.0 {
            if !recovering {
                warn!("throttle failsafe: home without a failsafe mode");
            }
            ok &= recovering;
            break;
        }
        if clock.expired(&mut s.vehicle).await? {
            warn!("throttle failsafe: not home after {}s", timeout);
            ok = false;
            break;
        }
    }
    Ok(ok)
}

/// Low battery voltage must switch the vehicle to LAND.
pub async fn battery_failsafe(s: &mut Session, timeout: f64) -> Result<bool> {
    if !change_mode(s, ModeSwitch::Loiter).await? {
        return Ok(false);
    }
    s.rc(3, STICK_CENTRE).await?;

    let res = battery_failsafe_body(s, timeout).await;
    restore(s, "battery failsafe", vec![ShellCommand::param("FS_BATT_ENABLE", 0)]).await;
    let ok = res?;
    if ok {
        info!("battery failsafe: entered LAND");
    } else {
        warn!("battery failsafe: LAND not entered");
    }
    Ok(ok)
}

async fn battery_failsafe_body(s: &mut Session, timeout: f64) -> Result<bool> {
    s.param("FS_BATT_ENABLE", 1).await?;
    s.param("SIM_BATT_VOLTAGE", 10).await?;
    Ok(wait::wait_mode(&mut s.vehicle, FlightMode::Land, timeout).await?.passed())
}
