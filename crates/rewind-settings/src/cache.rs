//! Settings cache.
//!
//! Holds the validated settings for synchronous reads and owns the
//! generation counter. A change of `enabled` is an accepted change: it
//! remembers the previous flag, bumps the generation, rotates the
//! generation's cancellation token and runs the transition hooks
//! synchronously, before `apply_change` returns, so a disable is observable
//! by pending work at once. Toast display keys are recached in place and
//! leave in-flight work alone.

use std::sync::{Arc, Mutex, PoisonError};

use rewind_model::{Entries, Generation, GenerationCounter, GenerationReader, ResetError, Settings};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::{SettingsStore, StorageArea, StoreChange, StoreError};

type Hook = Box<dyn Fn() + Send + Sync>;

#[derive(Debug)]
struct CacheState {
    current: Settings,
    previous_enabled: bool,
    /// Set by an off→on transition, consumed by the next handling pass.
    resume_pending: bool,
}

#[derive(Default)]
struct Hooks {
    on_disabled: Vec<Hook>,
    on_enabled: Vec<Hook>,
}

pub struct SettingsCache {
    area: StorageArea,
    state: Mutex<CacheState>,
    generation: GenerationCounter,
    token: Mutex<CancellationToken>,
    hooks: Mutex<Hooks>,
}

impl SettingsCache {
    /// A cache following `area` of the store, starting from defaults.
    pub fn new(area: StorageArea) -> Self {
        Self::with_settings(area, Settings::default())
    }

    pub fn with_settings(area: StorageArea, settings: Settings) -> Self {
        Self {
            area,
            state: Mutex::new(CacheState {
                previous_enabled: settings.enabled,
                current: settings,
                resume_pending: false,
            }),
            generation: GenerationCounter::new(),
            token: Mutex::new(CancellationToken::new()),
            hooks: Mutex::new(Hooks::default()),
        }
    }

    /// Initial read from the store's area. A failing store yields the
    /// default settings (enabled, default style) instead of an error.
    pub async fn load<S: SettingsStore>(store: &S) -> Self {
        let area = store.area();
        match read_settings(store).await {
            Ok(settings) => {
                debug!(?area, enabled = settings.enabled, "settings loaded");
                Self::with_settings(area, settings)
            }
            Err(e) => {
                warn!(?area, error = %e, "settings read failed, using defaults");
                Self::new(area)
            }
        }
    }

    pub fn area(&self) -> StorageArea {
        self.area
    }

    /// Re-read the whole configuration and install it as one change. On a
    /// failed read the current settings stay in place.
    pub async fn refresh<S: SettingsStore>(&self, store: &S) -> Result<Generation, ResetError> {
        let settings = read_settings(store)
            .await
            .map_err(|e| ResetError::SettingsReadFailed(e.to_string()))?;
        Ok(self.install(settings))
    }

    /// Write a partial update through the store. The cache picks the result
    /// up from the change feed like any other change.
    pub async fn update<S: SettingsStore>(&self, store: &S, partial: Entries) -> Result<(), StoreError> {
        store.set(partial).await
    }

    pub fn settings(&self) -> Settings {
        self.lock_state().current.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.lock_state().current.enabled
    }

    /// `enabled` as it was before the most recent accepted change.
    pub fn previous_enabled(&self) -> bool {
        self.lock_state().previous_enabled
    }

    /// Consume the off→on marker. Returns true once per re-enable.
    pub fn take_resume_pending(&self) -> bool {
        std::mem::take(&mut self.lock_state().resume_pending)
    }

    pub fn generation(&self) -> Generation {
        self.generation.current()
    }

    pub fn generation_reader(&self) -> GenerationReader {
        self.generation.reader()
    }

    /// Token cancelled as soon as the current generation is superseded.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run `hook` on every on→off transition. Hooks must not register
    /// further hooks.
    pub fn on_disabled(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.lock_hooks().on_disabled.push(Box::new(hook));
    }

    /// Run `hook` on every off→on transition, after the generation bump.
    pub fn on_enabled(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.lock_hooks().on_enabled.push(Box::new(hook));
    }

    /// Apply one store notification and return the generation in force
    /// afterwards. Changes for other areas, or touching no settings key,
    /// are ignored and return `None`.
    pub fn apply_change(&self, change: &StoreChange) -> Option<Generation> {
        if change.area != self.area {
            debug!(area = ?change.area, "ignoring change in foreign storage area");
            return None;
        }
        let relevant: Vec<_> = change
            .changes
            .iter()
            .filter(|(key, _)| Settings::is_known_key(key))
            .map(|(key, value)| (key.as_str(), value.new_value.as_ref()))
            .collect();
        if relevant.is_empty() {
            return None;
        }
        let next = self.lock_state().current.with_changes(relevant);
        Some(self.install(next))
    }

    /// Install a new settings value. Only a flip of `enabled` advances the
    /// generation; anything else is recached under the current one.
    pub fn install(&self, settings: Settings) -> Generation {
        let was_enabled = {
            let mut state = self.lock_state();
            let was_enabled = state.current.enabled;
            let now_enabled = settings.enabled;
            state.current = settings;
            if was_enabled == now_enabled {
                let generation = self.generation.current();
                debug!(%generation, "display settings recached");
                return generation;
            }
            state.previous_enabled = was_enabled;
            // Set on off→on, cleared by on→off.
            state.resume_pending = now_enabled;
            was_enabled
        };

        let generation = self.generation.bump();
        {
            let mut token = self.token.lock().unwrap_or_else(PoisonError::into_inner);
            token.cancel();
            *token = CancellationToken::new();
        }

        let hooks = self.lock_hooks();
        if was_enabled {
            info!(%generation, "disabled");
            for hook in &hooks.on_disabled {
                hook();
            }
        } else {
            info!(%generation, "re-enabled");
            for hook in &hooks.on_enabled {
                hook();
            }
        }
        generation
    }

    /// Follow the store's change feed until it closes. A lagging receiver
    /// falls back to a full refresh.
    pub fn watch<S: SettingsStore + 'static>(self: &Arc<Self>, store: Arc<S>) -> JoinHandle<()> {
        let mut changes = store.subscribe();
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        cache.apply_change(&change);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "settings change feed lagged, refreshing");
                        if let Err(e) = cache.refresh(store.as_ref()).await {
                            warn!(error = %e, "settings refresh failed, keeping current values");
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("settings change feed closed");
        })
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_hooks(&self) -> std::sync::MutexGuard<'_, Hooks> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SettingsCache {
    fn default() -> Self {
        Self::new(StorageArea::default())
    }
}

async fn read_settings<S: SettingsStore>(store: &S) -> Result<Settings, StoreError> {
    let defaults = Settings::default().to_entries();
    let entries = store.get(&defaults).await?;
    Ok(Settings::from_entries(&entries))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::store::ValueChange;

    fn change(area: StorageArea, key: &str, new_value: serde_json::Value) -> StoreChange {
        let mut changes = BTreeMap::new();
        changes.insert(
            key.to_string(),
            ValueChange {
                old_value: None,
                new_value: Some(new_value),
            },
        );
        StoreChange { area, changes }
    }

    #[test]
    fn enabled_flip_bumps_generation_once() {
        let cache = SettingsCache::new(StorageArea::Sync);
        let before = cache.generation();
        let after = cache
            .apply_change(&change(StorageArea::Sync, "enabled", json!(false)))
            .unwrap();
        assert_eq!(after.value(), before.value() + 1);
        assert_eq!(cache.generation(), after);
    }

    #[test]
    fn display_change_keeps_generation_and_token() {
        let cache = SettingsCache::new(StorageArea::Sync);
        let token = cache.cancellation_token();
        let after = cache
            .apply_change(&change(StorageArea::Sync, "toastScale", json!(1.2)))
            .unwrap();
        assert_eq!(after, Generation::INITIAL);
        assert_eq!(cache.settings().notification.scale, 1.2);
        assert!(!token.is_cancelled());
        assert!(cache.previous_enabled());
    }

    #[test]
    fn foreign_area_and_unknown_keys_are_ignored() {
        let cache = SettingsCache::new(StorageArea::Sync);
        assert!(cache
            .apply_change(&change(StorageArea::Local, "enabled", json!(false)))
            .is_none());
        assert!(cache
            .apply_change(&change(StorageArea::Sync, "theme", json!("dark")))
            .is_none());
        assert_eq!(cache.generation(), Generation::INITIAL);
        assert!(cache.is_enabled());
    }

    #[test]
    fn disable_runs_hooks_and_remembers_previous_flag() {
        let cache = SettingsCache::new(StorageArea::Sync);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        cache.on_disabled(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cache.apply_change(&change(StorageArea::Sync, "enabled", json!(false)));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(cache.previous_enabled());
        assert!(!cache.is_enabled());

        // Still off: no transition, no hook.
        cache.apply_change(&change(StorageArea::Sync, "showToast", json!(false)));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reenable_sets_resume_marker_once() {
        let cache = SettingsCache::new(StorageArea::Sync);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let reader = cache.generation_reader();
        cache.on_enabled(move || {
            log.lock().unwrap().push(reader.current());
        });

        cache.apply_change(&change(StorageArea::Sync, "enabled", json!(false)));
        assert!(!cache.take_resume_pending());

        let generation = cache
            .apply_change(&change(StorageArea::Sync, "enabled", json!(true)))
            .unwrap();
        // Hook observes the bumped generation.
        assert_eq!(*seen.lock().unwrap(), vec![generation]);
        assert!(cache.take_resume_pending());
        assert!(!cache.take_resume_pending());
    }

    #[test]
    fn disable_clears_unconsumed_resume_marker() {
        let cache = SettingsCache::new(StorageArea::Sync);
        cache.apply_change(&change(StorageArea::Sync, "enabled", json!(false)));
        cache.apply_change(&change(StorageArea::Sync, "enabled", json!(true)));
        cache.apply_change(&change(StorageArea::Sync, "enabled", json!(false)));
        assert!(!cache.take_resume_pending());
    }

    #[test]
    fn change_cancels_previous_generation_token() {
        let cache = SettingsCache::new(StorageArea::Sync);
        let token = cache.cancellation_token();
        assert!(!token.is_cancelled());
        cache.apply_change(&change(StorageArea::Sync, "enabled", json!(false)));
        assert!(token.is_cancelled());
        assert!(!cache.cancellation_token().is_cancelled());
    }
}
