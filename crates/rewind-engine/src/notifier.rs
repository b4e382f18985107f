//! Transient acknowledgment toasts.
//!
//! A shown toast hides itself after the configured duration. Showing opens
//! a cooldown window; requests inside it are dropped rather than queued so
//! rapid triggers never stack animations. The forced variant ignores the
//! user's show/hide preference but not the cooldown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rewind_model::{NotificationStyle, Settings};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub style: NotificationStyle,
}

/// The host's visual layer.
pub trait ToastSurface: Send + Sync {
    fn show(&self, toast: &Toast);
    fn hide(&self, id: u64);
}

/// Surface for hosts without a visual layer: toasts go to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSurface;

impl ToastSurface for LogSurface {
    fn show(&self, toast: &Toast) {
        info!(id = toast.id, message = %toast.message, "toast");
    }

    fn hide(&self, id: u64) {
        debug!(id, "toast hidden");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// The user turned notifications off.
    Preference,
    Cooldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Shown(u64),
    Suppressed(Suppression),
}

impl NotifyOutcome {
    pub fn is_shown(self) -> bool {
        matches!(self, NotifyOutcome::Shown(_))
    }
}

#[derive(Default)]
struct NotifierState {
    cooling_until: Option<Instant>,
    visible: Option<(u64, JoinHandle<()>)>,
}

pub struct Notifier {
    surface: Arc<dyn ToastSurface>,
    cooldown: Duration,
    state: Arc<Mutex<NotifierState>>,
    next_id: AtomicU64,
}

impl Notifier {
    pub fn new(surface: Arc<dyn ToastSurface>, cooldown: Duration) -> Self {
        Self {
            surface,
            cooldown,
            state: Arc::new(Mutex::new(NotifierState::default())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Show `message` if the user wants notifications and no cooldown is
    /// running.
    pub fn notify(&self, message: impl Into<String>, settings: &Settings) -> NotifyOutcome {
        if !settings.show_notification {
            return NotifyOutcome::Suppressed(Suppression::Preference);
        }
        self.show(message.into(), &settings.notification)
    }

    /// Show `message` regardless of the user's preference. Cooldown applies.
    pub fn notify_forced(&self, message: impl Into<String>, settings: &Settings) -> NotifyOutcome {
        self.show(message.into(), &settings.notification)
    }

    pub fn is_cooling_down(&self) -> bool {
        lock(&self.state)
            .cooling_until
            .is_some_and(|until| Instant::now() < until)
    }

    fn show(&self, message: String, style: &NotificationStyle) -> NotifyOutcome {
        let now = Instant::now();
        let mut state = lock(&self.state);
        if state.cooling_until.is_some_and(|until| now < until) {
            debug!(%message, "toast suppressed by cooldown");
            return NotifyOutcome::Suppressed(Suppression::Cooldown);
        }
        state.cooling_until = Some(now + self.cooldown);

        // A toast outliving the cooldown is replaced, not stacked.
        if let Some((previous, hide)) = state.visible.take() {
            hide.abort();
            self.surface.hide(previous);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let toast = Toast {
            id,
            message,
            style: style.clone(),
        };
        self.surface.show(&toast);

        let surface = Arc::clone(&self.surface);
        let shared = Arc::clone(&self.state);
        let duration = Duration::from_millis(style.duration_ms);
        let hide = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let mut state = lock(&shared);
            if state.visible.as_ref().is_some_and(|(visible, _)| *visible == id) {
                state.visible = None;
                surface.hide(id);
            }
        });
        state.visible = Some((id, hide));
        NotifyOutcome::Shown(id)
    }
}

fn lock(state: &Mutex<NotifierState>) -> MutexGuard<'_, NotifierState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
