//! Polling waits over the telemetry stream.
//!
//! Every wait times itself in simulated seconds: each poll reads the sample it
//! needs and then the next SYSTEM_TIME, so a stalled simulator stalls the wait
//! rather than failing it.

use serde::Serialize;
use sitl_link::{LinkError, TelemetryReader};
use sitl_proto::{heading_error, FlightMode};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WaitStatus {
    Polling,
    Satisfied,
    TimedOut,
    /// The condition can no longer be met (mode left, waypoint skipped, bound broken).
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitResult<T> {
    pub status: WaitStatus,
    /// Last observed value, if any sample arrived.
    pub observed: Option<T>,
}

impl<T> WaitResult<T> {
    fn new(status: WaitStatus, observed: Option<T>) -> Self {
        Self { status, observed }
    }

    pub fn passed(&self) -> bool {
        self.status == WaitStatus::Satisfied
    }
}

type Wait<T> = Result<WaitResult<T>, LinkError>;

/// Simulated-time budget for one wait.
#[derive(Debug, Clone, Copy)]
pub struct SimClock {
    start: f64,
    timeout: f64,
}

impl SimClock {
    pub async fn start(link: &mut TelemetryReader, timeout: f64) -> Result<Self, LinkError> {
        Ok(Self { start: link.sim_time().await?, timeout })
    }

    /// Reads the next SYSTEM_TIME and reports whether the budget is spent.
    pub async fn expired(&self, link: &mut TelemetryReader) -> Result<bool, LinkError> {
        Ok(self.elapsed(link).await? >= self.timeout)
    }

    pub async fn elapsed(&self, link: &mut TelemetryReader) -> Result<f64, LinkError> {
        Ok(link.sim_time().await? - self.start)
    }

    pub async fn restart(&mut self, link: &mut TelemetryReader) -> Result<(), LinkError> {
        self.start = link.sim_time().await?;
        Ok(())
    }
}

pub async fn wait_heading(link: &mut TelemetryReader, target: f64, tolerance: f64, timeout: f64) -> Wait<f64> {
    let clock = SimClock::start(link, timeout).await?;
    loop {
        let heading = link.vfr_hud().await?.heading as f64;
        debug!("wait_heading: heading {} (want {})", heading, target);
        if heading_error(target, heading) <= tolerance {
            info!("wait_heading: attained heading {}", heading);
            return Ok(WaitResult::new(WaitStatus::Satisfied, Some(heading)));
        }
        if clock.expired(link).await? {
            warn!("wait_heading: timed out after {}s at heading {} (want {})", timeout, heading, target);
            return Ok(WaitResult::new(WaitStatus::TimedOut, Some(heading)));
        }
    }
}

/// Waits for the vehicle to move `target` metres from where the wait began.
pub async fn wait_distance(link: &mut TelemetryReader, target: f64, tolerance: f64, timeout: f64) -> Wait<f64> {
    let clock = SimClock::start(link, timeout).await?;
    let start = link.location().await?;
    loop {
        let pos = link.location().await?;
        let delta = start.distance_to(&pos);
        debug!("wait_distance: {:.1}m (want {})", delta, target);
        if delta >= target - tolerance {
            info!("wait_distance: attained {:.1}m", delta);
            return Ok(WaitResult::new(WaitStatus::Satisfied, Some(delta)));
        }
        if clock.expired(link).await? {
            warn!("wait_distance: timed out after {}s at {:.1}m (want {})", timeout, delta, target);
            return Ok(WaitResult::new(WaitStatus::TimedOut, Some(delta)));
        }
    }
}

/// Relative (VFR_HUD) altitude inside `[min, max]`.
pub async fn wait_altitude(link: &mut TelemetryReader, min: f64, max: f64, timeout: f64) -> Wait<f64> {
    let clock = SimClock::start(link, timeout).await?;
    loop {
        let alt = link.vfr_hud().await?.alt as f64;
        debug!("wait_altitude: {:.1}m (want {}..{})", alt, min, max);
        if alt >= min && alt <= max {
            info!("wait_altitude: attained {:.1}m", alt);
            return Ok(WaitResult::new(WaitStatus::Satisfied, Some(alt)));
        }
        if clock.expired(link).await? {
            warn!("wait_altitude: timed out after {}s at {:.1}m (want {}..{})", timeout, alt, min, max);
            return Ok(WaitResult::new(WaitStatus::TimedOut, Some(alt)));
        }
    }
}

pub async fn wait_groundspeed(link: &mut TelemetryReader, target: f64, tolerance: f64, timeout: f64) -> Wait<f64> {
    let clock = SimClock::start(link, timeout).await?;
    loop {
        let gs = link.vfr_hud().await?.groundspeed as f64;
        debug!("wait_groundspeed: {:.1}m/s (want {}±{})", gs, target, tolerance);
        if (gs - target).abs() <= tolerance {
            info!("wait_groundspeed: attained {:.1}m/s", gs);
            return Ok(WaitResult::new(WaitStatus::Satisfied, Some(gs)));
        }
        if clock.expired(link).await? {
            warn!("wait_groundspeed: timed out after {}s at {:.1}m/s", timeout, gs);
            return Ok(WaitResult::new(WaitStatus::TimedOut, Some(gs)));
        }
    }
}

pub async fn wait_mode(link: &mut TelemetryReader, target: FlightMode, timeout: f64) -> Wait<FlightMode> {
    let clock = SimClock::start(link, timeout).await?;
    loop {
        let hb = link.wait_heartbeat().await?;
        if hb.mode == target {
            info!("wait_mode: got {}", target);
            return Ok(WaitResult::new(WaitStatus::Satisfied, Some(hb.mode)));
        }
        debug!("wait_mode: in {} (want {})", hb.mode, target);
        if clock.expired(link).await? {
            warn!("wait_mode: timed out after {}s, still {} (want {})", timeout, hb.mode, target);
            return Ok(WaitResult::new(WaitStatus::TimedOut, Some(hb.mode)));
        }
    }
}

pub async fn wait_armed(link: &mut TelemetryReader, armed: bool, timeout: f64) -> Wait<bool> {
    let clock = SimClock::start(link, timeout).await?;
    loop {
        let hb = link.wait_heartbeat().await?;
        if hb.armed == armed {
            info!("wait_armed: motors {}", if armed { "armed" } else { "disarmed" });
            return Ok(WaitResult::new(WaitStatus::Satisfied, Some(hb.armed)));
        }
        if clock.expired(link).await? {
            warn!("wait_armed: timed out after {}s (want armed={})", timeout, armed);
            return Ok(WaitResult::new(WaitStatus::TimedOut, Some(hb.armed)));
        }
    }
}

/// Lets `secs` of simulated time pass, returning the time actually elapsed.
pub async fn wait_seconds(link: &mut TelemetryReader, secs: f64) -> Result<f64, LinkError> {
    let clock = SimClock::start(link, secs).await?;
    loop {
        let elapsed = clock.elapsed(link).await?;
        if elapsed >= secs {
            return Ok(elapsed);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WaypointWait {
    pub timeout: f64,
    pub max_dist: f64,
    pub allow_skip: bool,
}

impl Default for WaypointWait {
    fn default() -> Self {
        Self { timeout: 400.0, max_dist: 2.0, allow_skip: true }
    }
}

/// Follows MISSION_CURRENT from `first` up to `last`.
///
/// Each new waypoint restarts the timer. Satisfied on reaching `last` within
/// `max_dist`, or once the sequence hits 255; aborted if the flight mode
/// changes or a waypoint is skipped when skipping is not allowed.
pub async fn wait_waypoint(link: &mut TelemetryReader, first: u16, last: u16, opts: WaypointWait) -> Wait<u16> {
    let mut clock = SimClock::start(link, opts.timeout).await?;
    let mut current = link.waypoint_current().await?;
    let mode = link.flight_mode();
    info!("wait_waypoint: range {}..={} starting at {}", first, last, current);

    loop {
        let seq = link.waypoint_current().await?;
        let wp_dist = link.wp_dist().await? as f64;
        let alt = link.vfr_hud().await?.alt;

        if mode.is_some() && link.flight_mode() != mode {
            warn!("wait_waypoint: left {:?}, now {:?}", mode, link.flight_mode());
            return Ok(WaitResult::new(WaitStatus::Aborted, Some(seq)));
        }
        debug!("wait_waypoint: wp {} dist {}m alt {:.0} current {} last {}", seq, wp_dist, alt, current, last);

        let skipped = |current: u16| current.checked_add(1).map_or(false, |next| seq > next);
        if current.checked_add(1) == Some(seq) || (skipped(current) && opts.allow_skip) {
            info!("wait_waypoint: starting waypoint {}", seq);
            clock.restart(link).await?;
            current = seq;
        }
        if current == last && wp_dist < opts.max_dist {
            info!("wait_waypoint: reached final waypoint {}", seq);
            return Ok(WaitResult::new(WaitStatus::Satisfied, Some(seq)));
        }
        if seq >= 255 {
            info!("wait_waypoint: mission ended at {}", seq);
            return Ok(WaitResult::new(WaitStatus::Satisfied, Some(seq)));
        }
        if skipped(current) {
            warn!("wait_waypoint: skipped waypoint, got {} after {}", seq, current);
            return Ok(WaitResult::new(WaitStatus::Aborted, Some(seq)));
        }
        if clock.expired(link).await? {
            warn!("wait_waypoint: timed out waiting for waypoint {}", last);
            return Ok(WaitResult::new(WaitStatus::TimedOut, Some(current)));
        }
    }
}

/// Drift observed over a position hold.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Drift {
    pub max_dist: f64,
    pub max_alt: f64,
    pub violations: u32,
}

/// Holds for `holdtime` simulated seconds, checking every sample against the
/// start position and altitude. A violation is logged and counted but the
/// window is always observed in full; any violation aborts the result.
pub async fn wait_hold(link: &mut TelemetryReader, holdtime: f64, max_alt_change: f64, max_dist_change: f64) -> Wait<Drift> {
    let start = link.location().await?;
    let start_alt = link.state().hud.map(|h| h.alt as f64).unwrap_or_default();
    let clock = SimClock::start(link, holdtime).await?;
    info!("hold: at {:.0}m for {}s", start_alt, holdtime);

    let mut drift = Drift::default();
    loop {
        let pos = link.location().await?;
        let alt = link.state().hud.map(|h| h.alt as f64).unwrap_or_default();
        let delta = start.distance_to(&pos);
        let alt_delta = (alt - start_alt).abs();
        drift.max_dist = drift.max_dist.max(delta);
        drift.max_alt = drift.max_alt.max(alt_delta);
        debug!("hold: dist {:.2}m alt {:.1}m", delta, alt);

        if alt_delta > max_alt_change {
            warn!("hold: altitude shifted {:.1}m (> limit of {})", alt_delta, max_alt_change);
            drift.violations += 1;
        }
        if delta > max_dist_change {
            warn!("hold: position shifted {:.1}m (> limit of {})", delta, max_dist_change);
            drift.violations += 1;
        }
        if clock.expired(link).await? {
            break;
        }
    }

    if drift.violations == 0 {
        info!("hold: ok for {}s", holdtime);
        Ok(WaitResult::new(WaitStatus::Satisfied, Some(drift)))
    } else {
        warn!("hold: {} violations", drift.violations);
        Ok(WaitResult::new(WaitStatus::Aborted, Some(drift)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_satisfied_passes() {
        assert!(WaitResult::new(WaitStatus::Satisfied, Some(1.0)).passed());
        assert!(!WaitResult::new(WaitStatus::TimedOut, Some(1.0)).passed());
        assert!(!WaitResult::<f64>::new(WaitStatus::Aborted, None).passed());
        assert!(!WaitResult::<f64>::new(WaitStatus::Polling, None).passed());
    }
}
