use anyhow::{Context, Result};
use sitl_proto::{FlightMode, MessageKind, ModeSwitch, ShellCommand, Telemetry};
use sitl_shell::pattern::{self, ARMING, DISARMING, FLIGHT_PLAN_RECEIVED, REQUESTING_WAYPOINTS, SAVED_WAYPOINTS};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::mission::Mission;
use crate::session::Session;
use crate::wait::{self, SimClock, WaypointWait};

pub const THROTTLE_MIN: u16 = 1000;
pub const STICK_CENTRE: u16 = 1500;

const MODE_TIMEOUT: f64 = 60.0;
const ARM_TIMEOUT: f64 = 60.0;
const WAIT_TIMEOUT: f64 = 30.0;

/// Switches mode through the transmitter preset and waits for the heartbeat to agree.
pub async fn change_mode(s: &mut Session, mode: ModeSwitch) -> Result<bool> {
    s.switch(mode).await?;
    Ok(wait::wait_mode(&mut s.vehicle, mode.mode(), MODE_TIMEOUT).await?.passed())
}

pub async fn setup_rc(s: &mut Session) -> Result<()> {
    for chan in 1..=8 {
        s.rc(chan, STICK_CENTRE).await?;
    }
    s.rc(3, THROTTLE_MIN).await
}

pub async fn hover(s: &mut Session, throttle: u16) -> Result<bool> {
    s.rc(3, throttle).await?;
    Ok(true)
}

pub async fn arm_motors(s: &mut Session) -> Result<bool> {
    info!("arming motors");
    if !change_mode(s, ModeSwitch::Stabilize).await? {
        return Ok(false);
    }
    s.rc(3, THROTTLE_MIN).await?;
    s.rc(4, 2000).await?;
    s.expect(&ARMING).await?;
    s.rc(4, STICK_CENTRE).await?;
    let armed = wait::wait_armed(&mut s.vehicle, true, ARM_TIMEOUT).await?.passed();
    if armed {
        info!("motors armed");
    }
    Ok(armed)
}

pub async fn disarm_motors(s: &mut Session) -> Result<bool> {
    info!("disarming motors");
    if !change_mode(s, ModeSwitch::Stabilize).await? {
        return Ok(false);
    }
    s.rc(3, THROTTLE_MIN).await?;
    s.rc(4, 1000).await?;
    s.expect(&DISARMING).await?;
    s.rc(4, STICK_CENTRE).await?;
    Ok(wait::wait_armed(&mut s.vehicle, false, ARM_TIMEOUT).await?.passed())
}

/// Climbs in STABILIZE until at least `alt_min` metres, then hovers.
pub async fn takeoff(s: &mut Session, alt_min: f64, throttle: u16) -> Result<bool> {
    if !change_mode(s, ModeSwitch::Stabilize).await? {
        return Ok(false);
    }
    s.rc(3, throttle).await?;
    let alt = s.vehicle.vfr_hud().await?.alt as f64;
    let mut ok = true;
    if alt < alt_min {
        ok = wait::wait_altitude(&mut s.vehicle, alt_min, alt_min + 5.0, WAIT_TIMEOUT).await?.passed();
    }
    hover(s, STICK_CENTRE).await?;
    info!("takeoff: complete={}", ok);
    Ok(ok)
}

/// Climbs into `[alt, alt+5]` or descends into `[alt-5, alt]`.
pub async fn change_alt(s: &mut Session, alt: f64, climb: u16, descend: u16) -> Result<bool> {
    let now = s.vehicle.vfr_hud().await?.alt as f64;
    let ok = if now < alt {
        s.rc(3, climb).await?;
        wait::wait_altitude(&mut s.vehicle, alt, alt + 5.0, WAIT_TIMEOUT).await?.passed()
    } else {
        s.rc(3, descend).await?;
        wait::wait_altitude(&mut s.vehicle, alt - 5.0, alt, WAIT_TIMEOUT).await?.passed()
    };
    hover(s, STICK_CENTRE).await?;
    Ok(ok)
}

pub async fn land(s: &mut Session, timeout: f64) -> Result<bool> {
    info!("land: starting");
    if !change_mode(s, ModeSwitch::Land).await? {
        return Ok(false);
    }
    let ok = wait::wait_altitude(&mut s.vehicle, -5.0, 1.0, timeout).await?.passed();
    info!("land: ok={}", ok);
    Ok(ok)
}

async fn set_rc7(s: &mut Session, pwm: u16) -> Result<()> {
    s.rc(7, pwm).await?;
    s.vehicle
        .recv_match(MessageKind::RcChannels, |m| matches!(m, Telemetry::RcChannels(rc) if rc.chan(7) == Some(pwm)))
        .await?;
    wait::wait_seconds(&mut s.vehicle, 1.0).await?;
    Ok(())
}

/// Records the current position as a waypoint by toggling channel 7.
pub async fn save_wp(s: &mut Session) -> Result<()> {
    set_rc7(s, 1000).await?;
    set_rc7(s, 2000).await?;
    set_rc7(s, 1000).await
}

/// Map overlays of the glitched GPS fix and the true simulator position.
pub async fn show_gps_and_sim_positions(s: &mut Session, on: bool) -> Result<()> {
    if !s.options.use_map {
        return Ok(());
    }
    s.send(ShellCommand::map_set("showgpspos", on)).await?;
    s.send(ShellCommand::map_set("showsimpos", on)).await
}

/// RTL until on the ground within 10 m of home.
pub async fn fly_rtl(s: &mut Session, timeout: f64) -> Result<bool> {
    info!("rtl: entering");
    s.switch(ModeSwitch::Rtl).await?;
    let clock = SimClock::start(&mut s.vehicle, timeout).await?;
    loop {
        let alt = s.vehicle.vfr_hud().await?.alt;
        let (home_distance, _) = s.home_distance().await?;
        debug!("rtl: alt {:.0} home distance {:.0}", alt, home_distance);
        if alt <= 1.0 && home_distance < 10.0 {
            info!("rtl: landed at home");
            return Ok(true);
        }
        if clock.expired(&mut s.vehicle).await? {
            warn!("rtl: not home after {}s (alt {:.0}, {:.0}m out)", timeout, alt, home_distance);
            return Ok(false);
        }
    }
}

pub async fn load_mission_from_file(s: &mut Session, path: &Path) -> Result<bool> {
    let mission = Mission::load(path).with_context(|| format!("read mission {}", path.display()))?;
    s.send(ShellCommand::WpLoad(path.to_path_buf())).await?;
    s.expect(&FLIGHT_PLAN_RECEIVED).await?;
    s.send(ShellCommand::WpList).await?;
    s.expect(&REQUESTING_WAYPOINTS).await?;
    s.num_wp = mission.count();
    info!("mission: loaded {} ({} waypoints)", path.display(), s.num_wp);
    Ok(true)
}

pub async fn save_mission_to_file(s: &mut Session, path: &Path) -> Result<bool> {
    s.send(ShellCommand::WpSave(path.to_path_buf())).await?;
    let m = s.expect(&SAVED_WAYPOINTS).await?;
    s.num_wp = m
        .group(1)
        .context("saved waypoint count missing")?
        .parse()
        .context("saved waypoint count")?;
    info!("mission: saved {} ({} waypoints)", path.display(), s.num_wp);
    Ok(true)
}

/// Flies the loaded mission in AUTO from waypoint 1, then returns to LOITER.
///
/// With a `target_alt`, the arrival altitude must also be within `height_accuracy`.
pub async fn fly_mission(s: &mut Session, height_accuracy: f64, target_alt: Option<f64>) -> Result<bool> {
    let last = s.last_wp()?;
    info!("mission: flying 1..{}", last);
    s.send(ShellCommand::WpSet(1)).await?;
    let mut ok = change_mode(s, ModeSwitch::Auto).await?;
    if ok {
        let opts = WaypointWait { timeout: 500.0, ..Default::default() };
        ok = wait::wait_waypoint(&mut s.vehicle, 0, last, opts).await?.passed();
    }
    if ok {
        s.expect(&pattern::reached_command(last.into())).await?;
        if let Some(target) = target_alt {
            if height_accuracy > 0.0 {
                let alt = s.vehicle.vfr_hud().await?.alt as f64;
                if (alt - target).abs() > height_accuracy {
                    warn!("mission: arrived at {:.1}m, wanted {}±{}", alt, target, height_accuracy);
                    ok = false;
                }
            }
        }
    }
    info!("mission: complete, passed={}", ok);
    let loiter = change_mode(s, ModeSwitch::Loiter).await?;
    Ok(ok && loiter)
}

pub(crate) fn in_mode(s: &Session, modes: &[FlightMode]) -> bool {
    s.vehicle.flight_mode().map_or(false, |m| modes.contains(&m))
}
