use std::sync::{Arc, Mutex};
use std::time::Duration;

use rewind_model::{Generation, GenerationCounter};
use rewind_nav::{
    DebounceScheduler, NavigationAggregator, NavigationReason, NavigationSignal, SignalHandler,
    DEFAULT_DEBOUNCE,
};

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<NavigationSignal>>,
}

impl Recorder {
    fn calls(&self) -> Vec<NavigationSignal> {
        self.calls.lock().unwrap().clone()
    }
}

impl SignalHandler for Recorder {
    async fn handle(self: Arc<Self>, signal: NavigationSignal) {
        self.calls.lock().unwrap().push(signal);
    }
}

/// Handler that takes a while, to overlap with new timers.
struct Slow {
    started: Mutex<u32>,
    finished: Mutex<u32>,
}

impl SignalHandler for Slow {
    async fn handle(self: Arc<Self>, _signal: NavigationSignal) {
        *self.started.lock().unwrap() += 1;
        tokio::time::sleep(Duration::from_millis(500)).await;
        *self.finished.lock().unwrap() += 1;
    }
}

#[tokio::test(start_paused = true)]
async fn test_burst_collapses_to_last_signal() {
    let counter = GenerationCounter::new();
    let recorder = Arc::new(Recorder::default());
    let scheduler = DebounceScheduler::new(DEFAULT_DEBOUNCE, counter.reader(), recorder.clone());
    let aggregator = Arc::new(NavigationAggregator::new(counter.reader(), scheduler.clone()));
    let sources = aggregator.sources();

    sources.pop_state.notify();
    tokio::time::sleep(Duration::from_millis(30)).await;
    sources.mutation.notify();
    tokio::time::sleep(Duration::from_millis(30)).await;
    sources.navigate_finish.notify();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(recorder.calls().is_empty());

    tokio::time::sleep(Duration::from_millis(30)).await;
    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].reason, NavigationReason::NavigateFinish);
    assert_eq!(scheduler.fired_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_generation_is_captured_at_arming() {
    let counter = GenerationCounter::new();
    let recorder = Arc::new(Recorder::default());
    let scheduler = DebounceScheduler::new(DEFAULT_DEBOUNCE, counter.reader(), recorder.clone());

    let stale = NavigationSignal {
        reason: NavigationReason::Mutation,
        observed_at: Generation::INITIAL,
    };
    counter.bump();
    scheduler.schedule(stale);
    let armed_at = counter.current();
    counter.bump();

    tokio::time::sleep(Duration::from_millis(60)).await;
    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].observed_at, armed_at);
    assert_ne!(calls[0].observed_at, counter.current());
}

#[tokio::test(start_paused = true)]
async fn test_running_handler_is_not_cancelled_by_new_signal() {
    let counter = GenerationCounter::new();
    let slow = Arc::new(Slow {
        started: Mutex::new(0),
        finished: Mutex::new(0),
    });
    let scheduler = DebounceScheduler::new(DEFAULT_DEBOUNCE, counter.reader(), slow.clone());
    let signal = NavigationSignal {
        reason: NavigationReason::Initial,
        observed_at: Generation::INITIAL,
    };

    scheduler.schedule(signal);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(*slow.started.lock().unwrap(), 1);

    scheduler.schedule(signal);
    assert!(scheduler.cancel());
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(*slow.finished.lock().unwrap(), 1);
    assert_eq!(scheduler.fired_count(), 1);
}
