//! Configuration storage contract and the locally readable settings cache.

pub mod cache;
pub mod store;

pub use cache::SettingsCache;
pub use store::{MemoryStore, SettingsStore, StorageArea, StoreChange, StoreError, ValueChange};
