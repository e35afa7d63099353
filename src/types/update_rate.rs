//! Update rate control for snapshot streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate at which a stream delivers snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every row the producer publishes (the header's tick rate)
    #[default]
    Native,

    /// Throttled to at most this many snapshots per second.
    /// A rate at or above the tick rate is treated as Native.
    Max(u32),
}

impl UpdateRate {
    /// Normalize against the producer's tick rate.
    pub fn normalize(self, tick_rate: f64) -> Self {
        match self {
            UpdateRate::Native => UpdateRate::Native,
            UpdateRate::Max(0) => UpdateRate::Native,
            UpdateRate::Max(hz) if f64::from(hz) >= tick_rate => UpdateRate::Native,
            UpdateRate::Max(hz) => UpdateRate::Max(hz),
        }
    }

    /// Minimum spacing between snapshots, if throttled.
    pub fn throttle_interval(self, tick_rate: f64) -> Option<Duration> {
        match self.normalize(tick_rate) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
        }
    }
}
