use anyhow::Result;
use sitl_proto::ModeSwitch;
use tracing::{debug, info};

use super::{fly_leg, turn_to_heading, DISTANCE_TIMEOUT};
use crate::controls::change_mode;
use crate::session::Session;
use crate::wait::SimClock;

pub async fn fly_circle(s: &mut Session, holdtime: f64) -> Result<bool> {
    if !change_mode(s, ModeSwitch::Loiter).await? {
        return Ok(false);
    }
    if !turn_to_heading(s, 270.0).await? {
        return Ok(false);
    }
    s.param("CIRCLE_RADIUS", 3000).await?;
    if !fly_leg(s, 2, 1100, 100.0, DISTANCE_TIMEOUT).await? {
        return Ok(false);
    }
    if !change_mode(s, ModeSwitch::Circle).await? {
        return Ok(false);
    }

    let start_alt = s.vehicle.vfr_hud().await?.alt;
    info!("circle: at {:.0}m for {}s", start_alt, holdtime);
    let clock = SimClock::start(&mut s.vehicle, holdtime).await?;
    loop {
        let hud = s.vehicle.vfr_hud().await?;
        debug!("circle: heading {}", hud.heading);
        if clock.expired(&mut s.vehicle).await? {
            break;
        }
    }
    info!("circle: ok for {}s", holdtime);
    Ok(true)
}
