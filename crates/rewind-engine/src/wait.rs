//! Bounded, cancellable wait for the media element.

use std::sync::Arc;
use std::time::Duration;

use rewind_model::ResetError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::media::{MediaElement, MediaHost};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Poll `host` every `interval` until the element shows up, `timeout`
/// elapses, or `cancel` fires. The first probe happens immediately.
pub async fn wait_for_element(
    host: &dyn MediaHost,
    timeout: Duration,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<Arc<dyn MediaElement>, ResetError> {
    let poll = async {
        let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(element) = host.find_element() {
                return element;
            }
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ResetError::Cancelled),
        found = tokio::time::timeout(timeout, poll) => found.map_err(|_| ResetError::ElementTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
