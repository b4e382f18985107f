//! Shared data model for the rewind workspace: navigation targets, the
//! configuration generation counter, user settings, position snapshots and
//! the skip/failure taxonomy every other crate reports through.

pub mod generation;
pub mod outcome;
pub mod position;
pub mod settings;
pub mod target;

pub use generation::{Generation, GenerationCounter, GenerationReader};
pub use outcome::{ResetError, SkipReason};
pub use position::{format_time, is_restorable_position, PositionSnapshot};
pub use settings::{Entries, NotificationStyle, Settings, ToastAnimation, ToastColors, ToastPosition};
pub use target::{is_watch_locator, TargetIdentity};
