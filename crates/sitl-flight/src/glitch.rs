use sitl_proto::ShellCommand;

const GLITCH_LAT: [f64; 7] = [0.0002996, 0.0006958, 0.0009431, 0.0009991, 0.0009444, 0.0007716, 0.0006221];
const GLITCH_LON: [f64; 7] = [0.0000717, 0.0000912, 0.0002761, 0.0002626, 0.0002807, 0.0002049, 0.0001304];

/// Entries applied per simulated second.
pub const GLITCH_RATE: f64 = 2.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlitchState {
    Active(usize),
    Inactive,
}

/// Scripted sequence of simulated GPS position offsets (degrees).
///
/// Entries only move forward. Reaching the end of the list, or stopping
/// early, always writes a zero offset.
#[derive(Debug, Clone)]
pub struct GlitchSchedule {
    offsets: Vec<(f64, f64)>,
    rate: f64,
    state: GlitchState,
}

impl GlitchSchedule {
    pub fn new(offsets: Vec<(f64, f64)>, rate: f64) -> Self {
        Self { offsets, rate, state: GlitchState::Inactive }
    }

    pub fn standard() -> Self {
        Self::new(GLITCH_LAT.iter().copied().zip(GLITCH_LON.iter().copied()).collect(), GLITCH_RATE)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn state(&self) -> GlitchState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, GlitchState::Active(_))
    }

    /// `floor(elapsed * rate)`, clamped to `[0, len]`.
    pub fn desired_index(&self, elapsed: f64) -> usize {
        let raw = (elapsed * self.rate).floor();
        if raw <= 0.0 {
            0
        } else {
            (raw as usize).min(self.offsets.len())
        }
    }

    /// Activates the first entry.
    pub fn start(&mut self) -> Vec<ShellCommand> {
        match self.offsets.first() {
            Some(&(lat, lon)) => {
                self.state = GlitchState::Active(0);
                offset_params(lat, lon)
            }
            None => self.stop(),
        }
    }

    /// Commands to send for `elapsed` seconds since [`start`](Self::start);
    /// empty when nothing changes.
    pub fn advance(&mut self, elapsed: f64) -> Vec<ShellCommand> {
        let GlitchState::Active(current) = self.state else { return Vec::new() };
        let desired = self.desired_index(elapsed);
        if desired <= current {
            return Vec::new();
        }
        match self.offsets.get(desired) {
            Some(&(lat, lon)) => {
                self.state = GlitchState::Active(desired);
                offset_params(lat, lon)
            }
            None => self.stop(),
        }
    }

    pub fn stop(&mut self) -> Vec<ShellCommand> {
        self.state = GlitchState::Inactive;
        vec![ShellCommand::param("SIM_GPS_GLITCH_X", 0), ShellCommand::param("SIM_GPS_GLITCH_Y", 0)]
    }
}

fn offset_params(lat: f64, lon: f64) -> Vec<ShellCommand> {
    vec![
        ShellCommand::param("SIM_GPS_GLITCH_X", format!("{:.7}", lat)),
        ShellCommand::param("SIM_GPS_GLITCH_Y", format!("{:.7}", lon)),
    ]
}
