//! Wires the pieces together for a host.
//!
//! Startup order: validate the config, load settings (defaults on failure),
//! follow the change feed, build engine → scheduler → aggregator, hook
//! disable to the scheduler and re-enable to the aggregator, then emit the
//! initial hint.

use std::sync::Arc;

use rewind_nav::{
    DebounceScheduler, History, InterceptedHistory, NavigationAggregator, NavigationReason,
    NavigationSources,
};
use rewind_settings::{SettingsCache, SettingsStore};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{ConfigError, EngineConfig};
use crate::control::ControlSurface;
use crate::engine::{ResetEngine, TargetPredicate};
use crate::media::MediaHost;
use crate::notifier::{Notifier, ToastSurface};
use crate::snapshot::SnapshotStore;

pub struct Runtime {
    cache: Arc<SettingsCache>,
    engine: Arc<ResetEngine>,
    scheduler: Arc<DebounceScheduler<ResetEngine>>,
    aggregator: Arc<NavigationAggregator>,
    control: ControlSurface,
    watch: JoinHandle<()>,
}

impl Runtime {
    pub async fn start<S: SettingsStore + 'static>(
        config: EngineConfig,
        store: Arc<S>,
        host: Arc<dyn MediaHost>,
        surface: Arc<dyn ToastSurface>,
    ) -> Result<Self, ConfigError> {
        Self::start_with_predicate(config, store, host, surface, None).await
    }

    pub async fn start_with_predicate<S: SettingsStore + 'static>(
        config: EngineConfig,
        store: Arc<S>,
        host: Arc<dyn MediaHost>,
        surface: Arc<dyn ToastSurface>,
        predicate: Option<TargetPredicate>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let cache = Arc::new(SettingsCache::load(store.as_ref()).await);
        let watch = cache.watch(store);

        let notifier = Arc::new(Notifier::new(surface, config.notify_cooldown()));
        let mut engine = ResetEngine::new(
            config.clone(),
            Arc::clone(&cache),
            Arc::new(SnapshotStore::new()),
            notifier,
            host,
        );
        if let Some(predicate) = predicate {
            engine = engine.with_predicate(predicate);
        }
        let engine = Arc::new(engine);

        let scheduler = DebounceScheduler::new(
            config.debounce(),
            cache.generation_reader(),
            Arc::clone(&engine),
        );
        let aggregator = Arc::new(NavigationAggregator::new(
            cache.generation_reader(),
            scheduler.clone(),
        ));

        let pending = Arc::downgrade(&scheduler);
        cache.on_disabled(move || {
            if let Some(scheduler) = pending.upgrade() {
                scheduler.cancel();
            }
        });
        let hints = Arc::downgrade(&aggregator);
        cache.on_enabled(move || {
            if let Some(aggregator) = hints.upgrade() {
                aggregator.emit(NavigationReason::SettingsEnabled);
            }
        });

        info!(enabled = cache.is_enabled(), "runtime started");
        aggregator.emit(NavigationReason::Initial);

        Ok(Self {
            control: ControlSurface::new(Arc::clone(&engine)),
            cache,
            engine,
            scheduler,
            aggregator,
            watch,
        })
    }

    pub fn sources(&self) -> NavigationSources {
        self.aggregator.sources()
    }

    /// Wrap the host's history object so its mutations become hints.
    pub fn intercept_history<H: History>(&self, history: H) -> InterceptedHistory<H> {
        InterceptedHistory::new(history, Arc::clone(&self.aggregator))
    }

    pub fn aggregator(&self) -> &Arc<NavigationAggregator> {
        &self.aggregator
    }

    pub fn scheduler(&self) -> &Arc<DebounceScheduler<ResetEngine>> {
        &self.scheduler
    }

    pub fn engine(&self) -> &Arc<ResetEngine> {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<SettingsCache> {
        &self.cache
    }

    pub fn control(&self) -> &ControlSurface {
        &self.control
    }

    /// Stop accepting hints, drop pending work and stop following settings.
    pub fn shutdown(self) {
        self.aggregator.close();
        self.scheduler.cancel();
        self.engine.detach_retries();
        self.watch.abort();
        info!("runtime stopped");
    }
}
