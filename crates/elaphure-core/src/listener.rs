//! Host-facing connect/disconnect notifications.
//!
//! Every error that reaches the embedding host does so through these two
//! callbacks, so the message is the only diagnostic surface and is meant to
//! be logged verbatim.

use std::sync::{Arc, PoisonError, RwLock};

/// Receives session lifecycle events.
pub trait ProxyListener: Send + Sync {
    /// Session finished setup and is relaying.
    fn on_connect(&self, _message: &str) {}

    /// Session failed or ended with an error.
    fn on_disconnect(&self, _message: &str) {}
}

/// Plain callback registered by the host.
pub type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Registered callbacks plus any number of listeners.
///
/// Registration may happen at any time, including while a session runs;
/// the next event sees the new registration.
#[derive(Default)]
pub struct Listeners {
    on_connect: RwLock<Option<StatusCallback>>,
    on_disconnect: RwLock<Option<StatusCallback>>,
    listeners: RwLock<Vec<Arc<dyn ProxyListener>>>,
}

impl Listeners {
    /// No callbacks, no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the connect callback.
    pub fn set_on_connect(&self, callback: Option<StatusCallback>) {
        *self.on_connect.write().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    /// Replace the disconnect callback.
    pub fn set_on_disconnect(&self, callback: Option<StatusCallback>) {
        *self.on_disconnect.write().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    /// Add a listener.
    pub fn add(&self, listener: Arc<dyn ProxyListener>) {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner).push(listener);
    }

    fn snapshot(&self) -> Vec<Arc<dyn ProxyListener>> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ProxyListener for Listeners {
    fn on_connect(&self, message: &str) {
        let callback = self.on_connect.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(callback) = callback {
            callback(message);
        }
        for listener in self.snapshot() {
            listener.on_connect(message);
        }
    }

    fn on_disconnect(&self, message: &str) {
        let callback = self.on_disconnect.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(callback) = callback {
            callback(message);
        }
        for listener in self.snapshot() {
            listener.on_disconnect(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ProxyListener for Recorder {
        fn on_disconnect(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn callbacks_and_listeners_both_fire() {
        let listeners = Listeners::new();
        let connected = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::new(Recorder::default());

        let sink = Arc::clone(&connected);
        listeners.set_on_connect(Some(Arc::new(move |msg: &str| {
            sink.lock().unwrap().push(msg.to_string());
        })));
        listeners.add(recorder.clone());

        listeners.on_connect("connect succeeded");
        listeners.on_disconnect("connection closed by peer");

        assert_eq!(*connected.lock().unwrap(), vec!["connect succeeded".to_string()]);
        assert_eq!(*recorder.0.lock().unwrap(), vec!["connection closed by peer".to_string()]);
    }

    #[test]
    fn replacing_a_callback_takes_effect() {
        let listeners = Listeners::new();
        let hits = Arc::new(Mutex::new(0));

        let first = Arc::clone(&hits);
        listeners.set_on_disconnect(Some(Arc::new(move |_: &str| *first.lock().unwrap() += 1)));
        listeners.set_on_disconnect(None);
        listeners.on_disconnect("ignored");

        assert_eq!(*hits.lock().unwrap(), 0);
    }
}
