//! Navigation signal plumbing: the aggregator that reduces independent
//! change sources to one tagged stream, the history-API decorator, and the
//! debounce scheduler in front of the reset engine.

pub mod aggregator;
pub mod history;
pub mod scheduler;

pub use aggregator::{
    NavigationAggregator, NavigationReason, NavigationSignal, NavigationSources, SignalSink,
    SourceHandle,
};
pub use history::{History, InterceptedHistory};
pub use scheduler::{DebounceScheduler, SignalHandler, DEFAULT_DEBOUNCE};
