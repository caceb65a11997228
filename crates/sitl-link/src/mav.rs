use async_trait::async_trait;
use mavlink::{
    ardupilotmega::{MavMessage, MavModeFlag, MavType},
    error::MessageReadError,
    MavConnection,
};
use sitl_proto::{FlightMode, GlobalPosition, Heartbeat, RcChannels, Telemetry, VfrHud};
use std::io::ErrorKind;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{LinkError, TelemetrySource};

type Connection = Box<dyn MavConnection<MavMessage> + Send>;

/// MAVLink connection to the vehicle (through the GCS shell's `--out`).
///
/// `recv` on the underlying connection blocks, so a dedicated reader thread
/// decodes frames and forwards them over a bounded channel.
pub struct MavlinkSource {
    url: String,
    rx: mpsc::Receiver<Telemetry>,
}

impl MavlinkSource {
    pub fn connect(url: &str, capacity: usize) -> Result<Self, LinkError> {
        let conn = mavlink::connect::<MavMessage>(url)
            .map_err(|source| LinkError::Connect { url: url.to_string(), source })?;

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let tag = url.to_string();
        std::thread::Builder::new()
            .name("mav-reader".into())
            .spawn(move || reader_loop(conn, tx, tag))
            .map_err(|source| LinkError::Connect { url: url.to_string(), source })?;

        info!("telemetry: listening on {}", url);
        Ok(Self { url: url.to_string(), rx })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TelemetrySource for MavlinkSource {
    async fn next_message(&mut self) -> Result<Telemetry, LinkError> {
        self.rx.recv().await.ok_or(LinkError::Closed)
    }
}

fn reader_loop(conn: Connection, tx: mpsc::Sender<Telemetry>, url: String) {
    loop {
        match conn.recv() {
            Ok((_hdr, msg)) => {
                let Some(t) = decode(&msg) else { continue };
                if tx.blocking_send(t).is_err() {
                    debug!("telemetry: reader for {} stopped, consumer gone", url);
                    return;
                }
            }
            Err(MessageReadError::Io(e)) => match e.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => continue,
                _ => {
                    warn!("telemetry: {} read failed: {}", url, e);
                    return;
                }
            },
            // robust parsing: drop the frame, keep the link
            Err(e) => debug!("telemetry: skipping bad frame: {:?}", e),
        }
    }
}

/// Maps the messages the harness consumes; everything else is dropped.
pub fn decode(msg: &MavMessage) -> Option<Telemetry> {
    let t = match msg {
        MavMessage::HEARTBEAT(hb) => {
            if hb.mavtype == MavType::MAV_TYPE_GCS {
                return None;
            }
            Telemetry::Heartbeat(Heartbeat {
                mode: FlightMode::from_custom_mode(hb.custom_mode),
                armed: hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED),
            })
        }
        MavMessage::VFR_HUD(v) => Telemetry::VfrHud(VfrHud {
            airspeed: v.airspeed,
            groundspeed: v.groundspeed,
            alt: v.alt,
            climb: v.climb,
            heading: v.heading,
            throttle: v.throttle,
        }),
        MavMessage::RC_CHANNELS(rc) => Telemetry::RcChannels(RcChannels {
            time_boot_ms: rc.time_boot_ms,
            raw: [
                rc.chan1_raw, rc.chan2_raw, rc.chan3_raw, rc.chan4_raw,
                rc.chan5_raw, rc.chan6_raw, rc.chan7_raw, rc.chan8_raw,
            ],
        }),
        MavMessage::GLOBAL_POSITION_INT(p) => Telemetry::GlobalPosition(GlobalPosition {
            time_boot_ms: p.time_boot_ms,
            lat: p.lat as f64 * 1e-7,
            lon: p.lon as f64 * 1e-7,
            alt: p.alt as f64 * 1e-3,
            relative_alt: p.relative_alt as f64 * 1e-3,
            heading: p.hdg as f64 * 1e-2,
        }),
        MavMessage::SIMSTATE(s) => Telemetry::SimState { lat: s.lat as f64 * 1e-7, lon: s.lng as f64 * 1e-7 },
        MavMessage::SYSTEM_TIME(t) => Telemetry::SystemTime { time_boot_ms: t.time_boot_ms },
        MavMessage::MISSION_CURRENT(m) => Telemetry::MissionCurrent { seq: m.seq },
        MavMessage::NAV_CONTROLLER_OUTPUT(n) => Telemetry::NavController { wp_dist: n.wp_dist },
        MavMessage::STATUSTEXT(s) => {
            let text: String = s.text.iter().take_while(|&&c| c != 0).map(|&c| c as char).collect();
            Telemetry::StatusText(text)
        }
        _ => return None,
    };
    Some(t)
}
