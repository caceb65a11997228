use anyhow::Result;
use sitl_proto::{ModeSwitch, ShellCommand};
use tracing::{debug, info, warn};

use super::{fly_leg, restore, turn_to_heading, DISTANCE_TIMEOUT, DISTANCE_TOLERANCE};
use crate::controls::{self, change_mode};
use crate::session::Session;
use crate::wait::{self, SimClock, WaypointWait};

/// Sends whatever the glitch schedule wants for `elapsed` seconds.
async fn step_glitch(s: &mut Session, elapsed: f64) -> Result<()> {
    for cmd in s.glitch.advance(elapsed) {
        s.send(cmd).await?;
    }
    Ok(())
}

async fn stop_glitch(s: &mut Session) {
    let cmds = s.glitch.stop();
    restore(s, "gps glitch", cmds).await;
}

/// Glitches the GPS while loitering; once the schedule completes, the true
/// position must stay within `max_distance` of where the hold began.
pub async fn gps_glitch_loiter(s: &mut Session, timeout: f64, max_distance: f64) -> Result<bool> {
    let res = glitch_loiter_body(s, timeout, max_distance).await;
    stop_glitch(s).await;
    if let Err(e) = controls::show_gps_and_sim_positions(s, false).await {
        warn!("cleanup map overlays: {:#}", e);
    }
    res
}

async fn glitch_loiter_body(s: &mut Session, timeout: f64, max_distance: f64) -> Result<bool> {
    controls::show_gps_and_sim_positions(s, true).await?;
    if !change_mode(s, ModeSwitch::Loiter).await? {
        return Ok(false);
    }
    if !turn_to_heading(s, 150.0).await? {
        return Ok(false);
    }
    if !fly_leg(s, 2, 1100, 60.0, DISTANCE_TIMEOUT).await? {
        return Ok(false);
    }
    if !wait::wait_groundspeed(&mut s.vehicle, 0.0, 1.0, 30.0).await?.passed() {
        return Ok(false);
    }

    let start = s.vehicle.sim_location().await?;
    let clock = SimClock::start(&mut s.vehicle, timeout).await?;
    info!("gps glitch loiter: applying {} glitches", s.glitch.len());
    for cmd in s.glitch.start() {
        s.send(cmd).await?;
    }

    let mut ok = true;
    loop {
        let elapsed = clock.elapsed(&mut s.vehicle).await?;
        if elapsed >= timeout {
            break;
        }
        let was_active = s.glitch.is_active();
        step_glitch(s, elapsed).await?;
        if was_active && !s.glitch.is_active() {
            info!("gps glitch loiter: glitches complete");
        }
        if !s.glitch.is_active() {
            let alt = s.vehicle.vfr_hud().await?.alt;
            let pos = s.vehicle.sim_location().await?;
            let moved = pos.distance_to(&start);
            debug!("gps glitch loiter: alt {:.0} moved {:.0}m", alt, moved);
            if moved > max_distance {
                warn!("gps glitch loiter: moved {:.0}m (> {})", moved, max_distance);
                ok = false;
            }
        }
    }
    info!("gps glitch loiter: ok={}", ok);
    Ok(ok)
}

/// Glitches the GPS during an AUTO mission; the mission must still finish
/// and bring the vehicle back within 5 m of home before `timeout`.
pub async fn gps_glitch_auto(s: &mut Session, timeout: f64) -> Result<bool> {
    let res = glitch_auto_body(s, timeout).await;
    stop_glitch(s).await;
    if let Err(e) = controls::show_gps_and_sim_positions(s, false).await {
        warn!("cleanup map overlays: {:#}", e);
    }
    res
}

async fn glitch_auto_body(s: &mut Session, timeout: f64) -> Result<bool> {
    let path = s.mission_path("copter_glitch_mission.txt");
    if !controls::load_mission_from_file(s, &path).await? {
        return Ok(false);
    }
    controls::show_gps_and_sim_positions(s, true).await?;

    info!("gps glitch auto: flying 1..{}", s.num_wp);
    s.send(ShellCommand::WpSet(1)).await?;
    if !change_mode(s, ModeSwitch::Auto).await? {
        return Ok(false);
    }
    s.rc(3, 1500).await?;
    if !wait::wait_distance(&mut s.vehicle, 100.0, DISTANCE_TOLERANCE, 60.0).await?.passed() {
        return Ok(false);
    }

    let clock = SimClock::start(&mut s.vehicle, timeout).await?;
    info!("gps glitch auto: applying glitches");
    for cmd in s.glitch.start() {
        s.send(cmd).await?;
    }
    while s.glitch.is_active() {
        let elapsed = clock.elapsed(&mut s.vehicle).await?;
        step_glitch(s, elapsed).await?;
    }
    info!("gps glitch auto: glitches complete");

    let last = s.last_wp()?;
    let opts = WaypointWait { timeout: 500.0, ..Default::default() };
    let mut ok = wait::wait_waypoint(&mut s.vehicle, 0, last, opts).await?.passed();

    loop {
        let (home_distance, _) = s.home_distance().await?;
        debug!("gps glitch auto: {:.0}m from home", home_distance);
        if home_distance <= 5.0 {
            break;
        }
        if clock.expired(&mut s.vehicle).await? {
            warn!("gps glitch auto: still {:.0}m from home after {}s", home_distance, timeout);
            ok = false;
            break;
        }
    }
    info!("gps glitch auto: ok={}", ok);
    Ok(ok)
}
