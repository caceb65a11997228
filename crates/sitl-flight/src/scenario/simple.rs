use anyhow::Result;
use sitl_proto::{ModeSwitch, ShellCommand};
use tracing::info;

use super::{fly_for, fly_leg, restore};
use crate::controls::{self, change_mode, STICK_CENTRE};
use crate::session::Session;

/// SIMPLE mode: stick directions are relative to the takeoff heading.
pub async fn fly_simple(s: &mut Session, side: f64) -> Result<bool> {
    if !change_mode(s, ModeSwitch::Loiter).await? {
        return Ok(false);
    }
    s.param("SIMPLE", 63).await?;
    let res = simple_pattern(s, side).await;
    restore(s, "simple", vec![ShellCommand::param("SIMPLE", 0), ShellCommand::rc(3, STICK_CENTRE)]).await;
    res
}

async fn simple_pattern(s: &mut Session, side: f64) -> Result<bool> {
    if !change_mode(s, ModeSwitch::Stabilize).await? {
        return Ok(false);
    }
    s.rc(3, 1500).await?;
    let mut ok = true;

    info!("simple: {}m on roll left", side);
    ok &= fly_leg(s, 1, 1300, side, 60.0).await?;
    info!("simple: 8s on pitch forward");
    fly_for(s, 2, 1300, 8.0).await?;
    info!("simple: {}m on roll right", side / 2.0);
    ok &= fly_leg(s, 1, 1700, side / 2.0, 60.0).await?;
    info!("simple: 8s on pitch back");
    fly_for(s, 2, 1700, 8.0).await?;
    Ok(ok)
}

/// SUPER_SIMPLE mode: stick directions are relative to home, so rolling
/// while slowly yawing circles the home point.
pub async fn fly_super_simple(s: &mut Session, duration: f64) -> Result<bool> {
    if !change_mode(s, ModeSwitch::Loiter).await? {
        return Ok(false);
    }
    info!("super simple: 20m forward");
    let mut ok = fly_leg(s, 2, 1300, 20.0, 60.0).await?;

    s.param("SUPER_SIMPLE", 63).await?;
    let res = super_simple_circle(s, duration).await;
    restore(
        s,
        "super simple",
        vec![
            ShellCommand::rc(1, STICK_CENTRE),
            ShellCommand::rc(4, STICK_CENTRE),
            ShellCommand::param("SUPER_SIMPLE", 0),
        ],
    )
    .await;
    ok &= res?;
    controls::hover(s, STICK_CENTRE).await?;
    Ok(ok)
}

async fn super_simple_circle(s: &mut Session, duration: f64) -> Result<bool> {
    if !change_mode(s, ModeSwitch::Stabilize).await? {
        return Ok(false);
    }
    s.rc(3, 1500).await?;
    s.rc(4, 1550).await?;
    info!("super simple: rolling left for {}s", duration);
    s.rc(1, 1300).await?;
    crate::wait::wait_seconds(&mut s.vehicle, duration).await?;
    Ok(true)
}
