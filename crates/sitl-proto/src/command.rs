use std::fmt;
use std::path::PathBuf;

use crate::mode::ModeSwitch;

/// One line of the GCS shell command protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Switch(u8),
    Rc { channel: u8, pwm: u16 },
    ParamSet { name: String, value: String },
    ParamLoad(PathBuf),
    WpLoad(PathBuf),
    WpList,
    WpSave(PathBuf),
    WpSet(u16),
    MapSet { key: String, on: bool },
}

impl ShellCommand {
    pub fn switch(mode: ModeSwitch) -> Self {
        Self::Switch(mode.position())
    }

    pub fn rc(channel: u8, pwm: u16) -> Self {
        Self::Rc { channel, pwm }
    }

    pub fn param(name: &str, value: impl fmt::Display) -> Self {
        Self::ParamSet { name: name.to_string(), value: value.to_string() }
    }

    pub fn map_set(key: &str, on: bool) -> Self {
        Self::MapSet { key: key.to_string(), on }
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch(n) => write!(f, "switch {}", n),
            Self::Rc { channel, pwm } => write!(f, "rc {} {}", channel, pwm),
            Self::ParamSet { name, value } => write!(f, "param set {} {}", name, value),
            Self::ParamLoad(p) => write!(f, "param load {}", p.display()),
            Self::WpLoad(p) => write!(f, "wp load {}", p.display()),
            Self::WpList => f.write_str("wp list"),
            Self::WpSave(p) => write!(f, "wp save {}", p.display()),
            Self::WpSet(n) => write!(f, "wp set {}", n),
            Self::MapSet { key, on } => write!(f, "map set {} {}", key, u8::from(*on)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_protocol_lines() {
        assert_eq!(ShellCommand::switch(ModeSwitch::Loiter).to_string(), "switch 5");
        assert_eq!(ShellCommand::rc(3, 900).to_string(), "rc 3 900");
        assert_eq!(ShellCommand::param("SIM_ENGINE_MUL", 0.6).to_string(), "param set SIM_ENGINE_MUL 0.6");
        assert_eq!(
            ShellCommand::param("SIM_GPS_GLITCH_X", format!("{:.7}", 0.0002996)).to_string(),
            "param set SIM_GPS_GLITCH_X 0.0002996"
        );
        assert_eq!(ShellCommand::WpSave("/tmp/ch7.txt".into()).to_string(), "wp save /tmp/ch7.txt");
        assert_eq!(ShellCommand::WpList.to_string(), "wp list");
        assert_eq!(ShellCommand::WpSet(1).to_string(), "wp set 1");
        assert_eq!(ShellCommand::map_set("showgpspos", true).to_string(), "map set showgpspos 1");
    }
}
