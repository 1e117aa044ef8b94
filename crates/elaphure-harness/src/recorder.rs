//! Listener that records every notification.

use std::sync::{Mutex, PoisonError};

use elaphure_core::ProxyListener;

/// One listener notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// `on_connect` fired
    Connected(String),
    /// `on_disconnect` fired
    Disconnected(String),
}

/// Records notifications in arrival order.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events so far.
    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Messages passed to `on_connect`.
    pub fn connected(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ListenerEvent::Connected(message) => Some(message),
                ListenerEvent::Disconnected(_) => None,
            })
            .collect()
    }

    /// Messages passed to `on_disconnect`.
    pub fn disconnected(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ListenerEvent::Disconnected(message) => Some(message),
                ListenerEvent::Connected(_) => None,
            })
            .collect()
    }

    fn push(&self, event: ListenerEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

impl ProxyListener for RecordingListener {
    fn on_connect(&self, message: &str) {
        self.push(ListenerEvent::Connected(message.to_string()));
    }

    fn on_disconnect(&self, message: &str) {
        self.push(ListenerEvent::Disconnected(message.to_string()));
    }
}
