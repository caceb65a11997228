use async_trait::async_trait;
use sitl_proto::Telemetry;
use std::collections::VecDeque;

use crate::{LinkError, TelemetrySource};

/// Finite, pre-recorded telemetry feed. Exhaustion reads as a closed link.
#[derive(Debug, Default, Clone)]
pub struct ScriptedTelemetry {
    queue: VecDeque<Telemetry>,
}

impl ScriptedTelemetry {
    pub fn new(msgs: impl IntoIterator<Item = Telemetry>) -> Self {
        Self { queue: msgs.into_iter().collect() }
    }

    pub fn push(&mut self, msg: Telemetry) {
        self.queue.push_back(msg);
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

#[async_trait]
impl TelemetrySource for ScriptedTelemetry {
    async fn next_message(&mut self) -> Result<Telemetry, LinkError> {
        self.queue.pop_front().ok_or(LinkError::Closed)
    }
}
