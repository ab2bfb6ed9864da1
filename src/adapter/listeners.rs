//! State-change listener registry

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::error;

/// Callback with no payload; listeners re-read adapter state themselves.
pub type StateChangeListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    listeners: Mutex<BTreeMap<u64, StateChangeListener>>,
    next_id: AtomicU64,
}

/// Registered listeners, notified in subscription order.
#[derive(Default, Clone)]
pub struct ListenerRegistry {
    inner: Arc<Registry>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().insert(id, Arc::new(listener));
        ListenerHandle {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener once.
    ///
    /// The set is snapshotted first, so listeners may subscribe or
    /// unsubscribe while being notified. A panicking listener is logged and
    /// skipped.
    pub fn notify(&self) {
        let snapshot: Vec<(u64, StateChangeListener)> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();

        for (id, listener) in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener())) {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(listener = id, panic = %message, "State listener panicked");
            }
        }
    }
}

/// Removes its listener when [`unsubscribe`](ListenerHandle::unsubscribe)d.
///
/// Dropping the handle keeps the listener registered.
#[derive(Debug)]
pub struct ListenerHandle {
    id: u64,
    registry: Weak<Registry>,
}

impl ListenerHandle {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.listeners.lock().remove(&self.id);
        }
    }
}
