use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

const HEADER: &str = "QGC WPL 110";

pub const MAV_CMD_NAV_WAYPOINT: u16 = 16;
pub const MAV_CMD_NAV_RETURN_TO_LAUNCH: u16 = 20;
pub const MAV_CMD_NAV_LAND: u16 = 21;
pub const MAV_CMD_NAV_TAKEOFF: u16 = 22;

#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a waypoint file (expected `QGC WPL 110`, got {0:?})")]
    Header(String),

    #[error("line {line}: {reason}")]
    Line { line: usize, reason: String },
}

/// One row of a waypoint file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionItem {
    pub seq: u16,
    pub current: bool,
    pub frame: u8,
    pub command: u16,
    pub params: [f64; 4],
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub autocontinue: bool,
}

impl MissionItem {
    pub fn nav(seq: u16, command: u16, lat: f64, lon: f64, alt: f64) -> Self {
        Self {
            seq,
            current: seq == 0,
            // home is absolute, everything else relative to home
            frame: if seq == 0 { 0 } else { 3 },
            command,
            params: [0.0; 4],
            lat,
            lon,
            alt,
            autocontinue: true,
        }
    }
}

/// Waypoint list in QGC WPL 110 text form. Item 0 is home.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mission {
    pub items: Vec<MissionItem>,
}

impl Mission {
    pub fn load(path: &Path) -> Result<Self, MissionError> {
        let s = std::fs::read_to_string(path)?;
        Self::parse(&s)
    }

    pub fn parse(text: &str) -> Result<Self, MissionError> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        match lines.next() {
            Some((_, l)) if l.trim() == HEADER => {}
            Some((_, l)) => return Err(MissionError::Header(l.trim().to_string())),
            None => return Err(MissionError::Header(String::new())),
        }

        let mut items = Vec::new();
        for (n, line) in lines {
            items.push(parse_item(line).map_err(|reason| MissionError::Line { line: n + 1, reason })?);
        }
        Ok(Self { items })
    }

    pub fn render(&self) -> String {
        let mut out = format!("{}\n", HEADER);
        for it in &self.items {
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{}",
                it.seq,
                u8::from(it.current),
                it.frame,
                it.command,
                it.params[0],
                it.params[1],
                it.params[2],
                it.params[3],
                it.lat,
                it.lon,
                it.alt,
                u8::from(it.autocontinue),
            );
        }
        out
    }

    pub fn save(&self, path: &Path) -> Result<(), MissionError> {
        std::fs::write(path, self.render())?;
        Ok(())
    }

    /// Number of items, home included.
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

fn parse_item(line: &str) -> Result<MissionItem, String> {
    let f: Vec<&str> = line.split_whitespace().collect();
    if f.len() != 12 {
        return Err(format!("expected 12 fields, got {}", f.len()));
    }
    let num = |i: usize| f[i].parse::<f64>().map_err(|e| format!("field {}: {}", i + 1, e));
    let int = |i: usize| f[i].parse::<u16>().map_err(|e| format!("field {}: {}", i + 1, e));

    Ok(MissionItem {
        seq: int(0)?,
        current: int(1)? != 0,
        frame: u8::try_from(int(2)?).map_err(|e| format!("field 3: {}", e))?,
        command: int(3)?,
        params: [num(4)?, num(5)?, num(6)?, num(7)?],
        lat: num(8)?,
        lon: num(9)?,
        alt: num(10)?,
        autocontinue: int(11)? != 0,
    })
}
