use anyhow::Result;
use sitl_proto::{MessageKind, ModeSwitch, Telemetry};
use tracing::{info, warn};

use super::{fly_leg, turn_to_heading, DISTANCE_TIMEOUT};
use crate::controls::{self, change_mode, STICK_CENTRE};
use crate::session::Session;
use crate::wait::{self, SimClock};

/// Flies a `side`-metre box N, E, S, W in STABILIZE, saving a waypoint at
/// every corner, then descends to 10 m in LOITER and saves the last one.
///
/// Every leg is flown even after an earlier one fails; the result is the AND.
pub async fn fly_square(s: &mut Session, side: f64, timeout: f64) -> Result<bool> {
    let clock = SimClock::start(&mut s.vehicle, timeout).await?;
    let mut ok = true;

    for chan in 1..=4 {
        s.rc(chan, STICK_CENTRE).await?;
    }
    // loiter so the vehicle does not climb while turning
    ok &= change_mode(s, ModeSwitch::Loiter).await?;

    info!("square: turning north");
    if !turn_to_heading(s, 10.0).await? {
        warn!("square: failed to reach heading");
        ok = false;
    }
    s.vehicle
        .recv_match(MessageKind::RcChannels, |m| matches!(m, Telemetry::RcChannels(rc) if rc.chan(4) == Some(STICK_CENTRE)))
        .await?;
    controls::save_wp(s).await?;

    s.rc(3, STICK_CENTRE).await?;
    ok &= change_mode(s, ModeSwitch::Stabilize).await?;

    let legs: [(&str, u8, u16); 4] = [("north", 2, 1300), ("east", 1, 1700), ("south", 2, 1700), ("west", 1, 1300)];
    for (dir, chan, pwm) in legs {
        info!("square: going {} {}m", dir, side);
        if !fly_leg(s, chan, pwm, side, DISTANCE_TIMEOUT).await? {
            warn!("square: failed to fly {}m {}", side, dir);
            ok = false;
        }
        controls::save_wp(s).await?;
    }

    info!("square: descending to 10m in loiter");
    ok &= change_mode(s, ModeSwitch::Loiter).await?;
    s.rc(3, 1300).await?;
    let left = (timeout - clock.elapsed(&mut s.vehicle).await?).max(20.0);
    if !wait::wait_altitude(&mut s.vehicle, -10.0, 10.0, left).await?.passed() {
        warn!("square: failed to reach 10m");
        ok = false;
    }
    controls::hover(s, STICK_CENTRE).await?;
    controls::save_wp(s).await?;

    Ok(ok)
}
