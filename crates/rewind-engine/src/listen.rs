//! Listen-once combinator.

use tokio::sync::broadcast::{self, error::RecvError};

/// Resolve with the first event matching `wanted`, dropping the
/// subscription with it. `None` if the sender goes away first.
///
/// Lagging past events is not fatal: the listener keeps waiting for the
/// next match.
pub async fn listen_once<T, F>(mut events: broadcast::Receiver<T>, wanted: F) -> Option<T>
where
    T: Clone,
    F: Fn(&T) -> bool,
{
    loop {
        match events.recv().await {
            Ok(event) if wanted(&event) => return Some(event),
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return None,
        }
    }
}
