pub mod mav;
pub mod reader;
pub mod scripted;
pub mod state;

use async_trait::async_trait;
use sitl_proto::Telemetry;

pub use mav::MavlinkSource;
pub use reader::TelemetryReader;
pub use scripted::ScriptedTelemetry;
pub use state::VehicleState;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("telemetry connect {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("telemetry link closed")]
    Closed,
}

/// Ordered stream of decoded vehicle messages.
#[async_trait]
pub trait TelemetrySource: Send {
    async fn next_message(&mut self) -> Result<Telemetry, LinkError>;
}
