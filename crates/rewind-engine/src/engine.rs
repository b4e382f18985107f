//! Reset engine.
//!
//! A debounced signal walks `Scheduled → AwaitingTarget → AwaitingMedia →
//! Applying → Done`. It is dropped at the first guard that fails:
//!
//! 1. the generation captured when its timer was armed is stale;
//! 2. the engine is disabled;
//! 3. the current page is not a watched target (this also re-arms);
//! 4. the engine was just re-enabled while this target is playing, in which
//!    case the target is marked handled;
//! 5. the target was already handled.
//!
//! Surviving signals claim the target, wait for the media element, and
//! zero its position at up to three points: immediately, on metadata load
//! and on playback start. Each point re-checks generation, enablement and
//! target identity on its own because any of them may have changed while
//! the sequence was suspended. Only the first successful point notifies,
//! and only the first restorable position is kept as the snapshot. An
//! attempt whose immediate point finds the page already changed ends there
//! without arming retries.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rewind_model::{
    format_time, is_restorable_position, is_watch_locator, Generation, GenerationReader,
    PositionSnapshot, ResetError, SkipReason, TargetIdentity,
};
use rewind_nav::{NavigationSignal, SignalHandler};
use rewind_settings::SettingsCache;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::listen::listen_once;
use crate::media::{MediaElement, MediaEvent, MediaHost};
use crate::notifier::Notifier;
use crate::snapshot::SnapshotStore;
use crate::wait::wait_for_element;

/// Decides whether a locator is a page the engine acts on.
pub type TargetPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPhase {
    Idle,
    Scheduled,
    /// Polling for the media element.
    AwaitingTarget,
    /// Retry points armed on the element.
    AwaitingMedia,
    Applying,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryPoint {
    Immediate,
    MetadataLoaded,
    PlaybackStarted,
}

impl RetryPoint {
    pub fn tag(self) -> &'static str {
        match self {
            RetryPoint::Immediate => "immediate",
            RetryPoint::MetadataLoaded => "loadedmetadata",
            RetryPoint::PlaybackStarted => "playing",
        }
    }
}

/// Result of handling one debounced signal.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    Skipped(SkipReason),
    Failed(ResetError),
    /// The target was claimed and the retry points are armed. `applied`
    /// tells whether the immediate point zeroed the position.
    Armed { target: TargetIdentity, applied: bool },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForceFailure {
    #[error("current page is not a watch page")]
    NotWatchPage,

    #[error("no media element found")]
    NoElement,

    #[error("settings changed during the reset")]
    Cancelled,

    #[error("media element rejected the new position")]
    ApplyFailed,
}

impl ForceFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            ForceFailure::NotWatchPage => "not_watch_page",
            ForceFailure::NoElement => "no_element",
            ForceFailure::Cancelled => "cancelled",
            ForceFailure::ApplyFailed => "apply_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForceReport {
    pub target: TargetIdentity,
    /// Formatted position before the reset, when it was worth keeping.
    pub prior_time_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RestoreFailure {
    #[error("no saved position for this page")]
    NoSnapshot,

    #[error("no media element found")]
    NoElement,

    #[error("media element rejected the saved position")]
    ApplyFailed,
}

impl RestoreFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            RestoreFailure::NoSnapshot => "no_snapshot",
            RestoreFailure::NoElement => "no_element",
            RestoreFailure::ApplyFailed => "apply_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreReport {
    pub restored_secs: f64,
    pub time_text: String,
}

/// What one retry point did.
#[derive(Debug, Clone, PartialEq)]
enum PointOutcome {
    Applied { prior: f64 },
    Dropped(SkipReason),
    /// The page moved on; the sequence no longer applies.
    TargetChanged,
    Failed(ResetError),
}

/// State shared by the retry points of one handling sequence.
struct ApplySequence {
    target: TargetIdentity,
    generation: Generation,
    element: Arc<dyn MediaElement>,
    /// Forced sequences skip the enablement check and notify on their own.
    forced: bool,
    notified: AtomicBool,
    /// Only the first restorable position of a sequence is kept.
    captured: AtomicBool,
}

pub struct ResetEngine {
    config: EngineConfig,
    cache: Arc<SettingsCache>,
    generation: GenerationReader,
    snapshots: Arc<SnapshotStore>,
    notifier: Arc<Notifier>,
    host: Arc<dyn MediaHost>,
    is_watched: TargetPredicate,
    last_handled: Mutex<Option<TargetIdentity>>,
    retries: Mutex<Option<CancellationToken>>,
    phase: Mutex<ResetPhase>,
    applied: AtomicU64,
}

impl ResetEngine {
    pub fn new(
        config: EngineConfig,
        cache: Arc<SettingsCache>,
        snapshots: Arc<SnapshotStore>,
        notifier: Arc<Notifier>,
        host: Arc<dyn MediaHost>,
    ) -> Self {
        Self {
            config,
            generation: cache.generation_reader(),
            cache,
            snapshots,
            notifier,
            host,
            is_watched: Arc::new(is_watch_locator),
            last_handled: Mutex::new(None),
            retries: Mutex::new(None),
            phase: Mutex::new(ResetPhase::Idle),
            applied: AtomicU64::new(0),
        }
    }

    /// Replace the default watch-page predicate.
    pub fn with_predicate(mut self, predicate: TargetPredicate) -> Self {
        self.is_watched = predicate;
        self
    }

    pub fn phase(&self) -> ResetPhase {
        *lock(&self.phase)
    }

    pub fn last_handled(&self) -> Option<TargetIdentity> {
        lock(&self.last_handled).clone()
    }

    /// Forget the last handled target so it can be handled again.
    pub fn rearm(&self) {
        if lock(&self.last_handled).take().is_some() {
            debug!("re-armed");
        }
    }

    /// Successful position writes so far, across all retry points.
    pub fn applied_count(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    /// Stop listening on the current sequence's retry points.
    pub fn detach_retries(&self) {
        if let Some(token) = lock(&self.retries).take() {
            token.cancel();
        }
    }

    /// The stored snapshot, if it belongs to the page currently shown.
    pub fn snapshot_for_current_target(&self) -> Option<PositionSnapshot> {
        let target = TargetIdentity::from_locator(&self.host.current_locator())?;
        self.snapshots.for_target(&target)
    }

    /// Handle one debounced navigation signal.
    pub async fn handle_signal(self: &Arc<Self>, signal: NavigationSignal) -> HandleOutcome {
        self.set_phase(ResetPhase::Scheduled);
        let outcome = self.run_guarded(signal).await;
        match &outcome {
            HandleOutcome::Skipped(reason) => {
                debug!(reason = reason.as_str(), trigger = %signal.reason, "signal dropped");
                self.set_phase(ResetPhase::Done);
            }
            HandleOutcome::Failed(ResetError::Cancelled) => {
                debug!(trigger = %signal.reason, "element wait cancelled");
                self.set_phase(ResetPhase::Done);
            }
            HandleOutcome::Failed(e) => {
                warn!(error = %e, trigger = %signal.reason, "reset abandoned");
                self.set_phase(ResetPhase::Done);
            }
            HandleOutcome::Armed { target, applied } => {
                info!(url = %target, applied, trigger = %signal.reason, "reset sequence armed");
            }
        }
        outcome
    }

    async fn run_guarded(self: &Arc<Self>, signal: NavigationSignal) -> HandleOutcome {
        if !self.generation.is_current(signal.observed_at) {
            return HandleOutcome::Skipped(SkipReason::StaleGeneration);
        }
        if !self.cache.is_enabled() {
            return HandleOutcome::Skipped(SkipReason::Disabled);
        }
        let Some(target) = self.watched_target() else {
            self.rearm();
            return HandleOutcome::Skipped(SkipReason::TargetNotWatched);
        };
        if self.cache.take_resume_pending() && self.is_target_playing() {
            *lock(&self.last_handled) = Some(target);
            return HandleOutcome::Skipped(SkipReason::ResumedWhilePlaying);
        }
        {
            let mut last = lock(&self.last_handled);
            if last.as_ref() == Some(&target) {
                return HandleOutcome::Skipped(SkipReason::AlreadyHandled);
            }
            *last = Some(target.clone());
        }

        self.set_phase(ResetPhase::AwaitingTarget);
        let token = self.cache.cancellation_token();
        let element = match wait_for_element(
            self.host.as_ref(),
            self.config.element_timeout(),
            self.config.poll_interval(),
            &token,
        )
        .await
        {
            Ok(element) => element,
            Err(e) => return HandleOutcome::Failed(e),
        };

        let sequence = Arc::new(ApplySequence {
            target: target.clone(),
            generation: signal.observed_at,
            element,
            forced: false,
            notified: AtomicBool::new(false),
            captured: AtomicBool::new(false),
        });
        // A run that lost the race to a newer one must not take over the
        // retry slot.
        let applied = match self.apply(&sequence, RetryPoint::Immediate) {
            PointOutcome::Applied { .. } => true,
            PointOutcome::Failed(_) => false,
            PointOutcome::Dropped(reason) => return HandleOutcome::Skipped(reason),
            PointOutcome::TargetChanged => return HandleOutcome::Skipped(SkipReason::TargetChanged),
        };
        self.arm_retries(sequence, &token);
        HandleOutcome::Armed { target, applied }
    }

    /// Reset the current page now, bypassing the debounce and the passive
    /// guards. Always notifies, on success and on failure. The target is
    /// claimed only once its element is found.
    pub async fn force_reset(self: &Arc<Self>) -> Result<ForceReport, ForceFailure> {
        let result = self.run_forced().await;
        let settings = self.cache.settings();
        let message = match &result {
            Ok(report) => match &report.prior_time_text {
                Some(prior) => format!("Rewound to 00:00 (was {prior})"),
                None => "Rewound to 00:00".to_string(),
            },
            Err(e) => format!("Could not rewind: {e}"),
        };
        self.notifier.notify_forced(message, &settings);
        match &result {
            Ok(report) => info!(url = %report.target, "forced reset applied"),
            Err(e) => warn!(reason = e.reason(), "forced reset failed"),
        }
        result
    }

    async fn run_forced(self: &Arc<Self>) -> Result<ForceReport, ForceFailure> {
        let target = self.watched_target().ok_or(ForceFailure::NotWatchPage)?;

        let generation = self.generation.current();
        let token = self.cache.cancellation_token();
        self.set_phase(ResetPhase::AwaitingTarget);
        let element = wait_for_element(
            self.host.as_ref(),
            self.config.element_timeout(),
            self.config.poll_interval(),
            &token,
        )
        .await
        .map_err(|e| {
            self.set_phase(ResetPhase::Done);
            match e {
                ResetError::Cancelled => ForceFailure::Cancelled,
                _ => ForceFailure::NoElement,
            }
        })?;
        *lock(&self.last_handled) = Some(target.clone());

        let sequence = Arc::new(ApplySequence {
            target: target.clone(),
            generation,
            element,
            forced: true,
            notified: AtomicBool::new(true),
            captured: AtomicBool::new(false),
        });
        match self.apply(&sequence, RetryPoint::Immediate) {
            PointOutcome::Applied { prior } => {
                self.arm_retries(sequence, &token);
                Ok(ForceReport {
                    target,
                    prior_time_text: is_restorable_position(prior).then(|| format_time(prior)),
                })
            }
            PointOutcome::Failed(_) => {
                self.arm_retries(sequence, &token);
                Err(ForceFailure::ApplyFailed)
            }
            PointOutcome::Dropped(_) | PointOutcome::TargetChanged => Err(ForceFailure::Cancelled),
        }
    }

    /// Put the current page back at its saved position. Touches neither
    /// the generation nor the last handled target.
    pub async fn restore(&self) -> Result<RestoreReport, RestoreFailure> {
        let snapshot = self
            .snapshot_for_current_target()
            .ok_or(RestoreFailure::NoSnapshot)?;
        let element = wait_for_element(
            self.host.as_ref(),
            self.config.element_timeout(),
            self.config.poll_interval(),
            &CancellationToken::new(),
        )
        .await
        .map_err(|_| RestoreFailure::NoElement)?;

        if let Err(e) = element.set_position(snapshot.prior_position_secs) {
            warn!(error = %e, "restore rejected by media element");
            return Err(RestoreFailure::ApplyFailed);
        }
        let time_text = snapshot.time_text();
        info!(url = %snapshot.target, time = %time_text, "position restored");
        self.notifier
            .notify_forced(format!("Restored to {time_text}"), &self.cache.settings());
        Ok(RestoreReport {
            restored_secs: snapshot.prior_position_secs,
            time_text,
        })
    }

    fn watched_target(&self) -> Option<TargetIdentity> {
        let locator = self.host.current_locator();
        if !(self.is_watched)(&locator) {
            return None;
        }
        TargetIdentity::from_locator(&locator)
    }

    fn is_target_playing(&self) -> bool {
        self.host
            .find_element()
            .is_some_and(|element| element.is_playing())
    }

    /// One retry point: re-check, snapshot, zero.
    fn apply(&self, sequence: &ApplySequence, point: RetryPoint) -> PointOutcome {
        if !self.generation.is_current(sequence.generation) {
            return PointOutcome::Dropped(SkipReason::StaleGeneration);
        }
        if !sequence.forced && !self.cache.is_enabled() {
            return PointOutcome::Dropped(SkipReason::Disabled);
        }
        match TargetIdentity::from_locator(&self.host.current_locator()) {
            Some(current) if current == sequence.target => {}
            _ => return PointOutcome::TargetChanged,
        }

        self.set_phase(ResetPhase::Applying);
        let prior = sequence.element.position();
        if !sequence.captured.load(Ordering::Acquire) && self.snapshots.record(&sequence.target, prior) {
            sequence.captured.store(true, Ordering::Release);
            debug!(url = %sequence.target, prior, "position snapshot saved");
        }
        if let Err(e) = sequence.element.set_position(0.0) {
            warn!(point = point.tag(), error = %e, "reset rejected by media element");
            return PointOutcome::Failed(ResetError::ApplyFailed {
                position: 0.0,
                message: e.to_string(),
            });
        }
        self.applied.fetch_add(1, Ordering::Relaxed);
        debug!(point = point.tag(), url = %sequence.target, "position reset to 0");

        if !sequence.notified.swap(true, Ordering::AcqRel) {
            let message = if is_restorable_position(prior) {
                format!("Rewound to 00:00 (was {})", format_time(prior))
            } else {
                "Rewound to 00:00".to_string()
            };
            self.notifier.notify(message, &self.cache.settings());
        }
        PointOutcome::Applied { prior }
    }

    /// Listen once each for metadata load and playback start. The listeners
    /// go away when they fire, when a newer sequence starts, or when the
    /// generation is superseded.
    fn arm_retries(self: &Arc<Self>, sequence: Arc<ApplySequence>, generation_token: &CancellationToken) {
        let token = generation_token.child_token();
        if let Some(previous) = lock(&self.retries).replace(token.clone()) {
            previous.cancel();
        }

        // Subscribe before spawning so nothing fired from here on is missed.
        let metadata = listen_once(sequence.element.events(), |e| *e == MediaEvent::MetadataLoaded);
        let playing = listen_once(sequence.element.events(), |e| *e == MediaEvent::PlaybackStarted);
        self.set_phase(ResetPhase::AwaitingMedia);

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let on_metadata = async {
                if metadata.await.is_some() {
                    engine.retry(&sequence, RetryPoint::MetadataLoaded);
                }
            };
            let on_playing = async {
                if playing.await.is_some() {
                    engine.retry(&sequence, RetryPoint::PlaybackStarted);
                }
            };
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(url = %sequence.target, "retry points detached");
                }
                _ = async { tokio::join!(on_metadata, on_playing) } => {
                    engine.set_phase(ResetPhase::Done);
                }
            }
        });
    }

    fn retry(&self, sequence: &ApplySequence, point: RetryPoint) {
        match self.apply(sequence, point) {
            PointOutcome::Applied { .. } | PointOutcome::Failed(_) => {}
            PointOutcome::Dropped(reason) => {
                debug!(point = point.tag(), reason = reason.as_str(), "retry point dropped");
            }
            PointOutcome::TargetChanged => {
                debug!(point = point.tag(), url = %sequence.target, "retry point for a stale target");
            }
        }
    }

    fn set_phase(&self, phase: ResetPhase) {
        let mut current = lock(&self.phase);
        if *current != phase {
            debug!(from = ?*current, to = ?phase, "phase");
            *current = phase;
        }
    }
}

impl SignalHandler for ResetEngine {
    async fn handle(self: Arc<Self>, signal: NavigationSignal) {
        self.handle_signal(signal).await;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
