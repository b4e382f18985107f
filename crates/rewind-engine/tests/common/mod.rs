#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rewind_engine::{
    EngineConfig, MediaElement, MediaError, MediaEvent, MediaHost, Notifier, ResetEngine,
    SnapshotStore, Toast, ToastSurface,
};
use rewind_nav::{NavigationReason, NavigationSignal};
use rewind_settings::SettingsCache;
use tokio::sync::broadcast;

pub const WATCH_A: &str = "https://www.youtube.com/watch?v=aaaaaaaaaaa";
pub const WATCH_B: &str = "https://www.youtube.com/watch?v=bbbbbbbbbbb";
pub const HOME: &str = "https://www.youtube.com/";

pub struct FakeElement {
    position: Mutex<f64>,
    paused: AtomicBool,
    ended: AtomicBool,
    reject: AtomicBool,
    writes: Mutex<Vec<f64>>,
    events: broadcast::Sender<MediaEvent>,
}

impl FakeElement {
    pub fn new(position: f64) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            position: Mutex::new(position),
            paused: AtomicBool::new(true),
            ended: AtomicBool::new(false),
            reject: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
            events,
        })
    }

    /// Simulate the host moving the playhead on its own.
    pub fn seek(&self, position: f64) {
        *self.position.lock().unwrap() = position;
    }

    pub fn set_playing(&self, playing: bool) {
        self.paused.store(!playing, Ordering::SeqCst);
    }

    pub fn reject_writes(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn emit(&self, event: MediaEvent) {
        let _ = self.events.send(event);
    }

    pub fn writes(&self) -> Vec<f64> {
        self.writes.lock().unwrap().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }
}

impl MediaElement for FakeElement {
    fn position(&self) -> f64 {
        *self.position.lock().unwrap()
    }

    fn set_position(&self, secs: f64) -> Result<(), MediaError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(MediaError::Rejected("not seekable".into()));
        }
        *self.position.lock().unwrap() = secs;
        self.writes.lock().unwrap().push(secs);
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    fn events(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }
}

pub struct FakeHost {
    locator: Mutex<String>,
    element: Mutex<Option<Arc<FakeElement>>>,
}

impl FakeHost {
    pub fn new(locator: &str) -> Arc<Self> {
        Arc::new(Self {
            locator: Mutex::new(locator.to_string()),
            element: Mutex::new(None),
        })
    }

    pub fn navigate(&self, locator: &str) {
        *self.locator.lock().unwrap() = locator.to_string();
    }

    pub fn attach(&self, element: Arc<FakeElement>) {
        *self.element.lock().unwrap() = Some(element);
    }

    pub fn detach(&self) {
        *self.element.lock().unwrap() = None;
    }
}

impl MediaHost for FakeHost {
    fn current_locator(&self) -> String {
        self.locator.lock().unwrap().clone()
    }

    fn find_element(&self) -> Option<Arc<dyn MediaElement>> {
        self.element
            .lock()
            .unwrap()
            .clone()
            .map(|element| element as Arc<dyn MediaElement>)
    }
}

#[derive(Default)]
pub struct RecordingSurface {
    pub shown: Mutex<Vec<Toast>>,
    pub hidden: Mutex<Vec<u64>>,
}

impl RecordingSurface {
    pub fn messages(&self) -> Vec<String> {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.message.clone())
            .collect()
    }

    pub fn shown_count(&self) -> usize {
        self.shown.lock().unwrap().len()
    }
}

impl ToastSurface for RecordingSurface {
    fn show(&self, toast: &Toast) {
        self.shown.lock().unwrap().push(toast.clone());
    }

    fn hide(&self, id: u64) {
        self.hidden.lock().unwrap().push(id);
    }
}

pub struct Harness {
    pub cache: Arc<SettingsCache>,
    pub host: Arc<FakeHost>,
    pub surface: Arc<RecordingSurface>,
    pub snapshots: Arc<SnapshotStore>,
    pub engine: Arc<ResetEngine>,
}

impl Harness {
    pub fn new(locator: &str) -> Self {
        let cache = Arc::new(SettingsCache::default());
        let host = FakeHost::new(locator);
        let surface = Arc::new(RecordingSurface::default());
        let snapshots = Arc::new(SnapshotStore::new());
        // No cooldown, so single notifications are down to the engine.
        let config = EngineConfig {
            notify_cooldown_ms: 0,
            ..EngineConfig::default()
        };
        let notifier = Arc::new(Notifier::new(surface.clone(), config.notify_cooldown()));
        let engine = Arc::new(ResetEngine::new(
            config,
            Arc::clone(&cache),
            Arc::clone(&snapshots),
            notifier,
            host.clone(),
        ));
        Self {
            cache,
            host,
            surface,
            snapshots,
            engine,
        }
    }

    /// A signal as the scheduler would deliver it right now.
    pub fn signal(&self) -> NavigationSignal {
        NavigationSignal {
            reason: NavigationReason::Mutation,
            observed_at: self.cache.generation(),
        }
    }
}

/// Let every ready task run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
