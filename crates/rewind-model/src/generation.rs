//! Process-wide configuration generation.
//!
//! The counter has exactly one writer (the settings cache). Everyone else
//! holds a [`GenerationReader`] and compares the value they captured when
//! work was scheduled against the live value before acting on it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A point-in-time value of the generation counter.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    pub const INITIAL: Generation = Generation(0);

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Owning handle; the only way to advance the generation.
#[derive(Debug, Default)]
pub struct GenerationCounter {
    value: Arc<AtomicU64>,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one and return the new generation.
    pub fn bump(&self) -> Generation {
        let previous = self.value.fetch_add(1, Ordering::AcqRel);
        Generation(previous.wrapping_add(1))
    }

    pub fn current(&self) -> Generation {
        Generation(self.value.load(Ordering::Acquire))
    }

    /// A read-only view sharing the same counter.
    pub fn reader(&self) -> GenerationReader {
        GenerationReader {
            value: Arc::clone(&self.value),
        }
    }
}

/// Read-only view of a [`GenerationCounter`].
#[derive(Debug, Clone)]
pub struct GenerationReader {
    value: Arc<AtomicU64>,
}

impl GenerationReader {
    pub fn current(&self) -> Generation {
        Generation(self.value.load(Ordering::Acquire))
    }

    /// True when `captured` is still the live generation.
    pub fn is_current(&self, captured: Generation) -> bool {
        self.current() == captured
    }
}
