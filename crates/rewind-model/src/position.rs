//! Pre-reset playback positions kept for restore.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::target::TargetIdentity;

/// The position a target was at just before it was rewound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub target: TargetIdentity,
    pub prior_position_secs: f64,
    pub saved_at: SystemTime,
}

impl PositionSnapshot {
    pub fn new(target: TargetIdentity, prior_position_secs: f64) -> Self {
        Self {
            target,
            prior_position_secs,
            saved_at: SystemTime::now(),
        }
    }

    /// Usable for a restore: a finite, non-negative position.
    pub fn is_valid(&self) -> bool {
        self.prior_position_secs.is_finite() && self.prior_position_secs >= 0.0
    }

    pub fn time_text(&self) -> String {
        format_time(self.prior_position_secs)
    }
}

/// Whether a position read from the media element is worth keeping.
/// Zero carries nothing to restore; NaN and infinities are host noise.
pub fn is_restorable_position(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0
}

/// `MM:SS` of the whole seconds in `secs`. Minutes are not wrapped into
/// hours; anything non-finite or negative formats as `00:00`.
pub fn format_time(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}
