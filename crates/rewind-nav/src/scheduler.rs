//! Debounce scheduler.
//!
//! Each incoming signal aborts the armed timer and arms a new one, so a
//! burst collapses into a single downstream call once the burst goes quiet.
//! The generation is captured when a timer is armed, never when it fires.
//! The handler runs on its own task: a later signal can supersede a timer,
//! but never an invocation already under way.
//!
//! Must be used from inside a Tokio runtime.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use rewind_model::GenerationReader;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::aggregator::{NavigationSignal, SignalSink};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Receiver of debounced signals.
pub trait SignalHandler: Send + Sync + 'static {
    fn handle(self: Arc<Self>, signal: NavigationSignal) -> impl Future<Output = ()> + Send;
}

struct Armed {
    seq: u64,
    signal: NavigationSignal,
    timer: JoinHandle<()>,
}

pub struct DebounceScheduler<H> {
    delay: Duration,
    generation: GenerationReader,
    handler: Arc<H>,
    armed: Mutex<Option<Armed>>,
    next_seq: AtomicU64,
    fired: AtomicU64,
    this: Weak<Self>,
}

impl<H: SignalHandler> DebounceScheduler<H> {
    pub fn new(delay: Duration, generation: GenerationReader, handler: Arc<H>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            delay,
            generation,
            handler,
            armed: Mutex::new(None),
            next_seq: AtomicU64::new(0),
            fired: AtomicU64::new(0),
            this: this.clone(),
        })
    }

    /// Cancel any armed timer and arm a fresh one for `signal`.
    pub fn schedule(&self, signal: NavigationSignal) {
        let signal = NavigationSignal {
            observed_at: self.generation.current(),
            ..signal
        };
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let this = self.this.clone();
        let delay = self.delay;

        let mut armed = self.lock_armed();
        if let Some(previous) = armed.take() {
            previous.timer.abort();
            debug!(
                superseded = %previous.signal.reason,
                by = %signal.reason,
                "debounce timer re-armed"
            );
        }
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(scheduler) = this.upgrade() {
                scheduler.fire(seq);
            }
        });
        *armed = Some(Armed { seq, signal, timer });
    }

    /// Abort the armed timer, if any. Returns whether one was armed.
    pub fn cancel(&self) -> bool {
        match self.lock_armed().take() {
            Some(armed) => {
                armed.timer.abort();
                debug!(reason = %armed.signal.reason, "debounce timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.lock_armed().is_some()
    }

    /// Number of downstream invocations so far.
    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn fire(&self, seq: u64) {
        let signal = {
            let mut armed = self.lock_armed();
            // Superseded or cancelled between wake-up and here.
            if !armed.as_ref().is_some_and(|current| current.seq == seq) {
                return;
            }
            match armed.take() {
                Some(current) => current.signal,
                None => return,
            }
        };
        self.fired.fetch_add(1, Ordering::Relaxed);
        debug!(reason = %signal.reason, generation = %signal.observed_at, "debounce fired");
        tokio::spawn(Arc::clone(&self.handler).handle(signal));
    }

    fn lock_armed(&self) -> MutexGuard<'_, Option<Armed>> {
        self.armed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<H: SignalHandler> SignalSink for DebounceScheduler<H> {
    fn accept(&self, signal: NavigationSignal) {
        self.schedule(signal);
    }
}
