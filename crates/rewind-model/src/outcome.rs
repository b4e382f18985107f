//! Why a handling attempt did nothing, and how it can fail.

use serde::Serialize;

/// Expected, silent drops. None of these is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Configuration changed between scheduling and running.
    StaleGeneration,
    Disabled,
    TargetNotWatched,
    /// Re-enabled while this target was already playing.
    ResumedWhilePlaying,
    AlreadyHandled,
    /// The page moved on while this attempt waited for the element.
    TargetChanged,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::StaleGeneration => "stale_generation",
            SkipReason::Disabled => "disabled",
            SkipReason::TargetNotWatched => "target_not_watched",
            SkipReason::ResumedWhilePlaying => "resumed_while_playing",
            SkipReason::AlreadyHandled => "already_handled",
            SkipReason::TargetChanged => "target_changed",
        }
    }
}

/// Failures of a single handling attempt. Terminal for that attempt only.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResetError {
    #[error("media element did not appear within {timeout_ms} ms")]
    ElementTimeout { timeout_ms: u64 },

    #[error("wait abandoned after a configuration change")]
    Cancelled,

    #[error("media element rejected position {position}: {message}")]
    ApplyFailed { position: f64, message: String },

    #[error("settings read failed: {0}")]
    SettingsReadFailed(String),
}
