use anyhow::Result;
use sitl_shell::pattern::READY_TO_ARM;
use tracing::{info, warn};

use crate::controls;
use crate::scenario::Outcome;
use crate::session::Session;

/// Brings a freshly connected vehicle to armed-on-the-ground: centres the
/// sticks, records home, waits for the GPS to be in use and arms.
pub async fn preflight(s: &mut Session) -> Result<Outcome> {
    let hb = s.vehicle.wait_heartbeat().await?;
    info!("preflight: heartbeat, mode {}", hb.mode);
    controls::setup_rc(s).await?;

    s.home = s.vehicle.location().await?;
    info!("preflight: home {:.7},{:.7} alt {:.1}", s.home.lat, s.home.lon, s.home.alt);

    s.expect(&READY_TO_ARM).await?;
    if !controls::arm_motors(s).await? {
        warn!("preflight: failed to arm motors");
        return Ok(Outcome::fail("failed to arm motors"));
    }
    Ok(Outcome::pass())
}
