//! History-API interception.
//!
//! The host's history object is wrapped rather than patched: every call
//! goes through to the wrapped implementation first and only then emits a
//! navigation hint.

use std::sync::Arc;

use serde_json::Value;

use crate::aggregator::{NavigationAggregator, NavigationReason};

/// The history-mutation surface of the host.
pub trait History {
    fn push_state(&mut self, state: Value, url: Option<&str>);
    fn replace_state(&mut self, state: Value, url: Option<&str>);
}

pub struct InterceptedHistory<H> {
    inner: H,
    aggregator: Arc<NavigationAggregator>,
}

impl<H: History> InterceptedHistory<H> {
    pub fn new(inner: H, aggregator: Arc<NavigationAggregator>) -> Self {
        Self { inner, aggregator }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn into_inner(self) -> H {
        self.inner
    }
}

impl<H: History> History for InterceptedHistory<H> {
    fn push_state(&mut self, state: Value, url: Option<&str>) {
        self.inner.push_state(state, url);
        self.aggregator.emit(NavigationReason::HistoryPush);
    }

    fn replace_state(&mut self, state: Value, url: Option<&str>) {
        self.inner.replace_state(state, url);
        self.aggregator.emit(NavigationReason::HistoryReplace);
    }
}
