//! Media host contract.
//!
//! The host page owns the media element; the engine only finds it, reads
//! and writes its position, and listens for two lifecycle events.

use std::sync::Arc;

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEvent {
    MetadataLoaded,
    PlaybackStarted,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MediaError {
    #[error("position rejected: {0}")]
    Rejected(String),

    #[error("media element detached")]
    Detached,
}

pub trait MediaElement: Send + Sync {
    /// Current position in seconds. May be NaN while nothing is loaded.
    fn position(&self) -> f64;

    fn set_position(&self, secs: f64) -> Result<(), MediaError>;

    fn is_paused(&self) -> bool;

    fn is_ended(&self) -> bool;

    /// A fresh subscription to the element's lifecycle events.
    fn events(&self) -> broadcast::Receiver<MediaEvent>;

    fn is_playing(&self) -> bool {
        !self.is_paused() && !self.is_ended()
    }
}

pub trait MediaHost: Send + Sync {
    /// Locator of the page currently shown.
    fn current_locator(&self) -> String;

    fn find_element(&self) -> Option<Arc<dyn MediaElement>>;
}
