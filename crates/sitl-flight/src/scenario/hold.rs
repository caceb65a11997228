use anyhow::Result;
use sitl_proto::{ModeSwitch, ShellCommand};
use tracing::info;

use super::{fly_leg, restore, turn_to_heading, DISTANCE_TIMEOUT};
use crate::controls::change_mode;
use crate::session::Session;
use crate::wait;

const STOP_TIMEOUT: f64 = 30.0;

/// Loiters, heads out, stops and then holds position.
async fn fly_out_and_stop(s: &mut Session, heading: f64, distance: f64) -> Result<bool> {
    if !change_mode(s, ModeSwitch::Loiter).await? {
        return Ok(false);
    }
    if !turn_to_heading(s, heading).await? {
        return Ok(false);
    }
    if !fly_leg(s, 2, 1100, distance, DISTANCE_TIMEOUT).await? {
        return Ok(false);
    }
    Ok(wait::wait_groundspeed(&mut s.vehicle, 0.0, 2.0, STOP_TIMEOUT).await?.passed())
}

/// Holds LOITER within `max_dist_change` metres and `max_alt_change` metres of
/// altitude for `holdtime` seconds.
pub async fn loiter(s: &mut Session, holdtime: f64, max_alt_change: f64, max_dist_change: f64) -> Result<bool> {
    if !fly_out_and_stop(s, 170.0, 50.0).await? {
        return Ok(false);
    }
    Ok(wait::wait_hold(&mut s.vehicle, holdtime, max_alt_change, max_dist_change).await?.passed())
}

/// Loiter hold with motor 1 cut to 60% efficiency for the hold window.
pub async fn stability_patch(s: &mut Session, holdtime: f64, max_alt_change: f64, max_dist_change: f64) -> Result<bool> {
    if !fly_out_and_stop(s, 180.0, 80.0).await? {
        return Ok(false);
    }
    info!("stability patch: cutting motor 1 to 60% efficiency");
    s.param("SIM_ENGINE_MUL", "0.60").await?;
    let held = wait::wait_hold(&mut s.vehicle, holdtime, max_alt_change, max_dist_change).await;
    restore(s, "engine", vec![ShellCommand::param("SIM_ENGINE_MUL", "1.0")]).await;
    let ok = held?.passed();
    info!("stability patch: ok={}", ok);
    Ok(ok)
}
