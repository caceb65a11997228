use anyhow::Result;
use sitl_proto::{ModeSwitch, ShellCommand};
use tracing::{debug, info, warn};

use super::{restore, restore_mode, turn_to_heading, DISTANCE_TIMEOUT, DISTANCE_TOLERANCE};
use crate::controls::{change_mode, STICK_CENTRE};
use crate::session::Session;
use crate::wait::{self, SimClock};

/// Keeps pitching away from home until the circular fence turns the vehicle
/// round; passes once it has landed back at home.
pub async fn fly_fence(s: &mut Session, timeout: f64) -> Result<bool> {
    let res = fly_fence_body(s, timeout).await;
    restore(
        s,
        "fence",
        vec![
            ShellCommand::param("FENCE_ENABLE", 0),
            ShellCommand::param("AVOID_ENABLE", 1),
            ShellCommand::rc(2, STICK_CENTRE),
            ShellCommand::rc(3, 1000),
        ],
    )
    .await;
    restore_mode(s, "fence", ModeSwitch::Land).await;
    restore_mode(s, "fence", ModeSwitch::Stabilize).await;
    res
}

async fn fly_fence_body(s: &mut Session, timeout: f64) -> Result<bool> {
    if !change_mode(s, ModeSwitch::Loiter).await? {
        return Ok(false);
    }
    s.param("FENCE_ENABLE", 1).await?;
    s.param("AVOID_ENABLE", 0).await?;

    if !turn_to_heading(s, 160.0).await? {
        return Ok(false);
    }

    s.rc(2, 1100).await?;
    if !wait::wait_distance(&mut s.vehicle, 20.0, DISTANCE_TOLERANCE, DISTANCE_TIMEOUT).await?.passed() {
        return Ok(false);
    }

    let mut pitching = true;
    let clock = SimClock::start(&mut s.vehicle, timeout).await?;
    loop {
        let alt = s.vehicle.vfr_hud().await?.alt;
        let (home_distance, _) = s.home_distance().await?;
        debug!("fence: alt {:.0} home distance {:.0}", alt, home_distance);
        if pitching && home_distance < 10.0 {
            info!("fence: back home, centring pitch");
            pitching = false;
            s.rc(2, STICK_CENTRE).await?;
            s.param("FENCE_ENABLE", 0).await?;
        }
        if alt <= 1.0 && home_distance < 10.0 {
            info!("fence: landed at home");
            return Ok(true);
        }
        if clock.expired(&mut s.vehicle).await? {
            warn!("fence: not home after {}s", timeout);
            return Ok(false);
        }
    }
}
