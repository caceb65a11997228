use once_cell::sync::Lazy;
use regex::Regex;

use crate::ShellError;

/// Text the harness waits for on the shell output.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

/// A matched line plus its capture groups (group 0 is the whole match).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub line: String,
    pub groups: Vec<Option<String>>,
}

impl Match {
    pub fn group(&self, i: usize) -> Option<&str> {
        self.groups.get(i).and_then(|g| g.as_deref())
    }
}

impl Pattern {
    pub fn literal(text: &str) -> Self {
        Self(Regex::new(&regex::escape(text)).expect("escaped literal is a valid regex"))
    }

    pub fn regex(re: &str) -> Result<Self, ShellError> {
        Ok(Self(Regex::new(re)?))
    }

    /// For patterns built from constants; these are known-good regexes.
    fn fixed(re: &str) -> Self {
        Self(Regex::new(re).expect("constant shell pattern"))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn find(&self, line: &str) -> Option<Match> {
        let caps = self.0.captures(line)?;
        Some(Match {
            line: line.to_string(),
            groups: caps.iter().map(|g| g.map(|m| m.as_str().to_string())).collect(),
        })
    }
}

/// `Reached command #N`, not matching longer numbers with the same prefix.
pub fn reached_command(n: usize) -> Pattern {
    Pattern::fixed(&format!(r"Reached command #{}\b", n))
}

pub static READY_TO_ARM: Lazy<Pattern> = Lazy::new(|| Pattern::literal("IMU0 is using GPS"));
pub static ARMING: Lazy<Pattern> = Lazy::new(|| Pattern::literal("APM: Arming motors"));
pub static DISARMING: Lazy<Pattern> = Lazy::new(|| Pattern::literal("APM: Disarming motors"));
pub static FLIGHT_PLAN_RECEIVED: Lazy<Pattern> = Lazy::new(|| Pattern::literal("Flight plan received"));
pub static REQUESTING_WAYPOINTS: Lazy<Pattern> = Lazy::new(|| Pattern::fixed(r"Requesting [0-9]+ waypoints"));
pub static SAVED_WAYPOINTS: Lazy<Pattern> = Lazy::new(|| Pattern::fixed(r"Saved ([0-9]+) waypoints"));
pub static RECEIVED_PARAMS: Lazy<Pattern> = Lazy::new(|| Pattern::fixed(r"Received [0-9]+ parameters"));
pub static LOADED_PARAMS: Lazy<Pattern> = Lazy::new(|| Pattern::fixed(r"Loaded [0-9]+ parameters"));
pub static TELEMETRY_LOG: Lazy<Pattern> = Lazy::new(|| Pattern::fixed(r"Telemetry log: (\S+)"));
pub static READY_TO_FLY: Lazy<Pattern> = Lazy::new(|| Pattern::literal("Ready to FLY"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_saved_count() {
        let m = SAVED_WAYPOINTS.find("Saved 8 waypoints to /tmp/ch7_mission.txt").unwrap();
        assert_eq!(m.group(1), Some("8"));
        assert_eq!(m.group(2), None);
    }

    #[test]
    fn captures_log_path() {
        let m = TELEMETRY_LOG.find("Telemetry log: logs/flight3.tlog").unwrap();
        assert_eq!(m.group(1), Some("logs/flight3.tlog"));
    }

    #[test]
    fn literal_escapes_metacharacters() {
        let p = Pattern::literal("rate (Hz) 5.0");
        assert!(p.find("rate (Hz) 5.0").is_some());
        assert!(p.find("rate Hz 5x0").is_none());
        assert!(ARMING.find("APM: Arming motors").is_some());
        assert!(REQUESTING_WAYPOINTS.find("Requesting 12 waypoints t=1").is_some());
        assert!(REQUESTING_WAYPOINTS.find("Requesting waypoints").is_none());
    }

    #[test]
    fn reached_command_is_exact_number() {
        let p = reached_command(1);
        assert!(p.find("APM: Reached command #1").is_some());
        assert!(p.find("APM: Reached command #12").is_none());
    }
}
