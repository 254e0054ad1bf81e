//! Subscriber registry with concurrent, independent delivery.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{Instrument, Span, trace};

use crate::Snapshot;

/// Callback invoked with every newly merged snapshot.
pub type Callback = Arc<dyn Fn(Arc<Snapshot>) + Send + Sync>;

struct Entry {
    callback: Callback,
    active: Arc<AtomicBool>,
}

#[derive(Default)]
pub(crate) struct Registry {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<u64, Entry>>,
}

impl Registry {
    pub(crate) fn subscribe(self: &Arc<Self>, callback: Callback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.entries.lock().insert(
            id,
            Entry {
                callback,
                active: Arc::clone(&active),
            },
        );
        trace!(subscription = id, "subscriber registered");
        Subscription {
            id,
            active,
            registry: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) {
        if self.entries.lock().remove(&id).is_some() {
            trace!(subscription = id, "subscriber removed");
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Spawn one delivery task per subscriber.
    ///
    /// The entry set is captured under the lock, so a subscriber registered
    /// after this call only sees later snapshots. Each task re-checks the
    /// subscriber's flag before invoking it, so nothing starts after
    /// [`Subscription::unsubscribe`] returns.
    pub(crate) fn notify(&self, snapshot: &Arc<Snapshot>, span: &Span) {
        let targets: Vec<(Callback, Arc<AtomicBool>)> = self
            .entries
            .lock()
            .values()
            .map(|entry| (Arc::clone(&entry.callback), Arc::clone(&entry.active)))
            .collect();
        for (callback, active) in targets {
            let delivered = Arc::clone(snapshot);
            tokio::spawn(
                async move {
                    if active.load(Ordering::Acquire) {
                        callback(delivered);
                    }
                }
                .instrument(span.clone()),
            );
        }
    }
}

/// Handle returned by [`Manager::on_update`](crate::Manager::on_update).
///
/// Dropping the handle does not unsubscribe; call
/// [`Subscription::unsubscribe`] to stop deliveries.
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    registry: std::sync::Weak<Registry>,
}

impl Subscription {
    /// Stop all future deliveries. Idempotent.
    ///
    /// A delivery already running is not interrupted, but no queued delivery
    /// starts once this returns.
    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::Release);
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }

    /// Indicates whether the subscription still receives deliveries.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Identifier unique within the owning manager.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
