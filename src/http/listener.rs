use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// A heart-rate reading pushed by the wearable
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeartRateEvent {
    /// Beats per minute
    pub heart_rate: f64,
    /// When the collector received the reading
    pub received_at: DateTime<Utc>,
}

impl HeartRateEvent {
    pub fn new(heart_rate: f64) -> Self {
        Self {
            heart_rate,
            received_at: Utc::now(),
        }
    }
}

/// Consumer of decoded heart-rate events.
///
/// Called synchronously from the request-serving task, so implementations
/// should return quickly.
pub trait HeartRateListener: Send + Sync {
    fn on_heart_rate_changed(&self, event: HeartRateEvent);
}

impl<F> HeartRateListener for F
where
    F: Fn(HeartRateEvent) + Send + Sync,
{
    fn on_heart_rate_changed(&self, event: HeartRateEvent) {
        self(event)
    }
}

/// Slot holding at most one registered [`HeartRateListener`].
///
/// Cloning yields another handle to the same slot; the last registration wins.
#[derive(Clone, Default)]
pub struct HeartRateRegistry {
    slot: Arc<RwLock<Option<Arc<dyn HeartRateListener>>>>,
}

impl HeartRateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`, replacing any previous one.
    pub fn register(&self, listener: impl HeartRateListener + 'static) {
        self.register_arc(Arc::new(listener));
    }

    pub fn register_arc(&self, listener: Arc<dyn HeartRateListener>) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if slot.replace(listener).is_some() {
            debug!("Replaced registered heart rate listener");
        }
    }

    /// Remove the registered listener, if any.
    pub fn unregister(&self) {
        self.slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_registered(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Hand `event` to the registered listener.
    ///
    /// Returns `false` when nobody is registered; the event is dropped.
    pub fn dispatch(&self, event: HeartRateEvent) -> bool {
        // Clone out of the lock so a slow consumer never blocks registration.
        let listener = self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match listener {
            Some(listener) => {
                listener.on_heart_rate_changed(event);
                true
            }
            None => {
                debug!(
                    "No heart rate listener registered, dropping {} bpm",
                    event.heart_rate
                );
                false
            }
        }
    }
}

impl fmt::Debug for HeartRateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeartRateRegistry")
            .field("registered", &self.is_registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatch_without_listener_drops_event() {
        let registry = HeartRateRegistry::new();
        assert!(!registry.dispatch(HeartRateEvent::new(60.0)));
    }

    #[test]
    fn last_registration_wins() {
        let registry = HeartRateRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        registry.register(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&second);
        registry.register(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(registry.dispatch(HeartRateEvent::new(80.0)));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregister_clears_slot() {
        let registry = HeartRateRegistry::new();
        registry.register(|_| {});
        assert!(registry.is_registered());

        let handle = registry.clone();
        handle.unregister();
        assert!(!registry.is_registered());
    }
}
