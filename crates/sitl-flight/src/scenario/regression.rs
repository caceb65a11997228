use anyhow::Result;
use tracing::{info, warn};

use super::{auto, circle, hold, simple, Outcome, CLIMB_THROTTLE, DESCEND_THROTTLE, RTL_TIMEOUT, TAKEOFF_THROTTLE};
use crate::controls;
use crate::session::Session;

fn record(failed: &mut Vec<&'static str>, name: &'static str, ok: bool) {
    if ok {
        info!("regression: {} passed", name);
    } else {
        warn!("regression: {} failed", name);
        failed.push(name);
    }
}

/// Runs every step regardless of earlier failures; passes only if none failed.
/// Expects to start airborne.
pub async fn full_regression(s: &mut Session) -> Result<Outcome> {
    let mut failed = Vec::new();

    let ok = hold::loiter(s, 10.0, 5.0, 5.0).await?;
    record(&mut failed, "loiter", ok);
    let ok = controls::change_alt(s, 30.0, CLIMB_THROTTLE, DESCEND_THROTTLE).await?;
    record(&mut failed, "change_alt climb", ok);
    let ok = controls::change_alt(s, 20.0, CLIMB_THROTTLE, DESCEND_THROTTLE).await?;
    record(&mut failed, "change_alt descend", ok);
    let ok = controls::fly_rtl(s, RTL_TIMEOUT).await?;
    record(&mut failed, "rtl after loiter", ok);

    let ok = controls::takeoff(s, 10.0, TAKEOFF_THROTTLE).await?;
    record(&mut failed, "takeoff", ok);
    let ok = simple::fly_simple(s, 50.0).await?;
    record(&mut failed, "simple", ok);
    let ok = controls::fly_rtl(s, RTL_TIMEOUT).await?;
    record(&mut failed, "rtl after simple", ok);

    let ok = controls::takeoff(s, 10.0, TAKEOFF_THROTTLE).await?;
    record(&mut failed, "takeoff", ok);
    let ok = simple::fly_super_simple(s, 45.0).await?;
    record(&mut failed, "super_simple", ok);
    let ok = controls::fly_rtl(s, RTL_TIMEOUT).await?;
    record(&mut failed, "rtl after super_simple", ok);

    let ok = controls::takeoff(s, 10.0, TAKEOFF_THROTTLE).await?;
    record(&mut failed, "takeoff", ok);
    let ok = circle::fly_circle(s, 36.0).await?;
    record(&mut failed, "circle", ok);
    let ok = controls::fly_rtl(s, RTL_TIMEOUT).await?;
    record(&mut failed, "rtl after circle", ok);

    let ok = auto::fly_auto_test(s).await?;
    record(&mut failed, "auto_mission", ok);

    if failed.is_empty() {
        Ok(Outcome::pass())
    } else {
        Ok(Outcome::fail(format!("failed: {}", failed.join(", "))))
    }
}
