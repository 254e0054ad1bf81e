//! In-process remote store.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{HotconfResult, Snapshot};

use super::{RemoteEvent, RemoteStore};

type ResourceKey = (String, String);

/// [`RemoteStore`] keeping resources in memory.
///
/// Watch streams only report changes made after they were opened, matching
/// the behaviour of resource-version based cluster watches.
///
/// # Examples
///
/// ```
/// use hotconf::{MemoryStore, Snapshot};
///
/// let store = MemoryStore::new();
/// store.put("prod", "app", [("LOG_LEVEL", "debug")].into_iter().collect::<Snapshot>());
/// assert_eq!(
///     store.get("prod", "app").and_then(|s| s.get("LOG_LEVEL").map(str::to_owned)),
///     Some(String::from("debug"))
/// );
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    resources: Mutex<HashMap<ResourceKey, watch::Sender<Option<Snapshot>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace `namespace/name`.
    pub fn put(&self, namespace: &str, name: &str, contents: Snapshot) {
        self.set(namespace, name, Some(contents));
    }

    /// Remove `namespace/name`.
    pub fn delete(&self, namespace: &str, name: &str) {
        self.set(namespace, name, None);
    }

    /// Current contents of `namespace/name`.
    #[must_use]
    pub fn get(&self, namespace: &str, name: &str) -> Option<Snapshot> {
        self.resources
            .lock()
            .get(&key(namespace, name))
            .and_then(|tx| tx.borrow().clone())
    }

    fn set(&self, namespace: &str, name: &str, contents: Option<Snapshot>) {
        let mut resources = self.resources.lock();
        resources
            .entry(key(namespace, name))
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(contents);
    }

    fn subscribe(&self, namespace: &str, name: &str) -> watch::Receiver<Option<Snapshot>> {
        self.resources
            .lock()
            .entry(key(namespace, name))
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }
}

fn key(namespace: &str, name: &str) -> ResourceKey {
    (namespace.to_owned(), name.to_owned())
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn fetch(&self, namespace: &str, name: &str) -> HotconfResult<Option<Snapshot>> {
        Ok(self.get(namespace, name))
    }

    async fn watch(
        &self,
        namespace: &str,
        name: &str,
    ) -> HotconfResult<BoxStream<'static, RemoteEvent>> {
        let rx = self.subscribe(namespace, name);
        let events = stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let current = rx.borrow_and_update().clone();
            let event = match current {
                Some(snapshot) => RemoteEvent::Applied(snapshot),
                None => RemoteEvent::Deleted,
            };
            Some((event, rx))
        });
        Ok(events.boxed())
    }
}
