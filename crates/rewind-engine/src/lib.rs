//! Reset engine: consumes debounced navigation signals and rewinds playback
//! exactly once per distinct watched target, while settings may change
//! underneath it at any point.

pub mod config;
pub mod control;
pub mod engine;
pub mod listen;
pub mod media;
pub mod notifier;
pub mod runtime;
pub mod snapshot;
pub mod wait;

pub use config::{ConfigError, EngineConfig};
pub use control::{ControlRequest, ControlResponse, ControlSurface};
pub use engine::{
    ForceFailure, ForceReport, HandleOutcome, ResetEngine, ResetPhase, RestoreFailure,
    RestoreReport, RetryPoint, TargetPredicate,
};
pub use media::{MediaElement, MediaError, MediaEvent, MediaHost};
pub use notifier::{LogSurface, Notifier, NotifyOutcome, Suppression, Toast, ToastSurface};
pub use runtime::Runtime;
pub use snapshot::SnapshotStore;
