pub mod command;
pub mod location;
pub mod mode;
pub mod telemetry;

pub use command::ShellCommand;
pub use location::{heading_error, Location};
pub use mode::{FlightMode, ModeSwitch};
pub use telemetry::{GlobalPosition, Heartbeat, MessageKind, RcChannels, Telemetry, VfrHud};
