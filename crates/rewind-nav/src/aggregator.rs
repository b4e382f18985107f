//! Navigation aggregator.
//!
//! History mutations, back/forward, the host's "navigation finished" event
//! and document mutations all mean the same thing here: something may have
//! changed. Each is tagged with its origin and handed to one sink. No
//! filtering happens at this layer.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rewind_model::{Generation, GenerationReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Origin of a navigation hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationReason {
    /// Startup pass.
    Initial,
    HistoryPush,
    HistoryReplace,
    /// Browser back/forward.
    PopState,
    /// The host application's own "navigation finished" event.
    NavigateFinish,
    /// Structural change observed in the document.
    Mutation,
    /// Emitted after an off→on settings transition.
    SettingsEnabled,
}

impl NavigationReason {
    pub fn tag(self) -> &'static str {
        match self {
            NavigationReason::Initial => "initial",
            NavigationReason::HistoryPush => "history.pushState",
            NavigationReason::HistoryReplace => "history.replaceState",
            NavigationReason::PopState => "popstate",
            NavigationReason::NavigateFinish => "yt-navigate-finish",
            NavigationReason::Mutation => "mutation",
            NavigationReason::SettingsEnabled => "settings-enabled",
        }
    }
}

impl fmt::Display for NavigationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A "possible navigation" hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationSignal {
    pub reason: NavigationReason,
    pub observed_at: Generation,
}

/// Downstream consumer of aggregated signals.
pub trait SignalSink: Send + Sync {
    fn accept(&self, signal: NavigationSignal);
}

pub struct NavigationAggregator {
    generation: GenerationReader,
    sink: Arc<dyn SignalSink>,
    closed: AtomicBool,
}

impl NavigationAggregator {
    pub fn new(generation: GenerationReader, sink: Arc<dyn SignalSink>) -> Self {
        Self {
            generation,
            sink,
            closed: AtomicBool::new(false),
        }
    }

    /// Tag and forward one hint. Returns false once closed.
    pub fn emit(&self, reason: NavigationReason) -> bool {
        if self.is_closed() {
            return false;
        }
        let signal = NavigationSignal {
            reason,
            observed_at: self.generation.current(),
        };
        trace!(reason = %reason, generation = %signal.observed_at, "navigation hint");
        self.sink.accept(signal);
        true
    }

    /// A cloneable handle a host event listener can hold on to.
    pub fn source(self: &Arc<Self>, reason: NavigationReason) -> SourceHandle {
        SourceHandle {
            aggregator: Arc::clone(self),
            reason,
        }
    }

    /// Handles for the event-driven sources. History interception goes
    /// through [`crate::InterceptedHistory`] instead.
    pub fn sources(self: &Arc<Self>) -> NavigationSources {
        NavigationSources {
            pop_state: self.source(NavigationReason::PopState),
            navigate_finish: self.source(NavigationReason::NavigateFinish),
            mutation: self.source(NavigationReason::Mutation),
        }
    }

    /// Emit `reason` for every message on `events` until the channel closes
    /// or the aggregator does. For hosts that deliver observations on a
    /// channel rather than through a callback.
    pub fn forward(
        self: &Arc<Self>,
        reason: NavigationReason,
        mut events: mpsc::UnboundedReceiver<()>,
    ) -> JoinHandle<()> {
        let aggregator = Arc::clone(self);
        tokio::spawn(async move {
            while events.recv().await.is_some() {
                if !aggregator.emit(reason) {
                    break;
                }
            }
        })
    }

    /// Stop emitting. Pending downstream work is not touched.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// One navigation source bound to its reason tag.
#[derive(Clone)]
pub struct SourceHandle {
    aggregator: Arc<NavigationAggregator>,
    reason: NavigationReason,
}

impl SourceHandle {
    pub fn notify(&self) -> bool {
        self.aggregator.emit(self.reason)
    }

    pub fn reason(&self) -> NavigationReason {
        self.reason
    }
}

#[derive(Clone)]
pub struct NavigationSources {
    pub pop_state: SourceHandle,
    pub navigate_finish: SourceHandle,
    pub mutation: SourceHandle,
}
