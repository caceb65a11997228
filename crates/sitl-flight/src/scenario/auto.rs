use anyhow::Result;
use sitl_proto::{ModeSwitch, ShellCommand};
use tracing::{info, warn};

use crate::controls::{self, change_mode, THROTTLE_MIN};
use crate::session::Session;
use crate::wait::{self, WaypointWait};

const DISARM_TIMEOUT: f64 = 120.0;

/// Flies `copter_mission.txt` in AUTO; lands on failure and waits for the
/// motors to disarm either way.
pub async fn fly_auto_test(s: &mut Session) -> Result<bool> {
    let path = s.mission_path("copter_mission.txt");
    if !controls::load_mission_from_file(s, &path).await? {
        warn!("auto: loading {} failed", path.display());
        return Ok(false);
    }

    info!("auto: flying 1..{}", s.num_wp);
    s.send(ShellCommand::WpSet(1)).await?;
    let mut ok = change_mode(s, ModeSwitch::Auto).await?;
    s.rc(3, 1500).await?;

    if ok {
        let last = s.last_wp()?;
        let opts = WaypointWait { timeout: 500.0, ..Default::default() };
        ok = wait::wait_waypoint(&mut s.vehicle, 0, last, opts).await?.passed();
    }
    if !ok {
        controls::land(s, 60.0).await?;
    }

    s.rc(3, THROTTLE_MIN).await?;
    let disarmed = wait::wait_armed(&mut s.vehicle, false, DISARM_TIMEOUT).await?.passed();
    if disarmed {
        info!("auto: motors disarmed");
    }
    info!("auto: mission passed={}", ok);
    Ok(ok && disarmed)
}
