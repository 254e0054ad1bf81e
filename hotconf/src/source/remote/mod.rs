//! Remote key/value source over a pluggable store client.
//!
//! The transport (a cluster API client, an HTTP poller, ...) lives behind
//! [`RemoteStore`]. [`RemoteSource`] only funnels the store's events into
//! the snapshot channel shape the merge engine expects.

mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{HotconfResult, ShutdownSignal, Snapshot};

use super::{Source, UPDATE_CHANNEL_CAPACITY, Updates};

pub use memory::MemoryStore;

/// Default delay before re-opening a remote watch that ended.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Change observed on a remote resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteEvent {
    /// The resource was created or updated; carries its full contents.
    Applied(Snapshot),
    /// The resource was removed.
    Deleted,
}

/// Client for a remote configuration store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the current contents of `namespace/name`.
    ///
    /// Returns `Ok(None)` when the resource does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be reached.
    async fn fetch(&self, namespace: &str, name: &str) -> HotconfResult<Option<Snapshot>>;

    /// Open a change stream for `namespace/name`.
    ///
    /// # Errors
    ///
    /// Returns an error when the watch cannot be established.
    async fn watch(
        &self,
        namespace: &str,
        name: &str,
    ) -> HotconfResult<BoxStream<'static, RemoteEvent>>;
}

/// Options for [`RemoteSource`].
#[derive(Clone)]
pub struct RemoteOptions {
    /// Name of the remote resource.
    pub resource_name: String,
    /// Namespace holding the resource.
    pub namespace: String,
    /// Store client used to fetch and watch.
    pub store: Arc<dyn RemoteStore>,
    /// Delay before re-opening a watch stream that ended.
    pub retry_interval: Duration,
}

impl RemoteOptions {
    /// Options for `namespace/resource_name` on `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn RemoteStore>,
        namespace: impl Into<String>,
        resource_name: impl Into<String>,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            namespace: namespace.into(),
            store,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    /// Override the delay before re-opening an ended watch.
    #[must_use]
    pub const fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }
}

impl std::fmt::Debug for RemoteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteOptions")
            .field("resource_name", &self.resource_name)
            .field("namespace", &self.namespace)
            .field("retry_interval", &self.retry_interval)
            .finish_non_exhaustive()
    }
}

/// Source backed by a resource in a [`RemoteStore`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use hotconf::{MemoryStore, RemoteOptions, RemoteSource, Source};
///
/// let store = Arc::new(MemoryStore::new());
/// let source = RemoteSource::new(RemoteOptions::new(store, "prod", "orders-config"));
/// assert_eq!(source.name(), "remote:prod/orders-config");
/// ```
#[derive(Clone, Debug)]
pub struct RemoteSource {
    options: RemoteOptions,
    /// Contents returned by the latest successful `load`.
    loaded: Arc<Mutex<Option<Snapshot>>>,
}

impl RemoteSource {
    /// Create a source with `options`.
    #[must_use]
    pub fn new(options: RemoteOptions) -> Self {
        Self {
            options,
            loaded: Arc::new(Mutex::new(None)),
        }
    }

    async fn open(&self) -> HotconfResult<BoxStream<'static, RemoteEvent>> {
        self.options
            .store
            .watch(&self.options.namespace, &self.options.resource_name)
            .await
    }

    /// Forward store events until shutdown, re-opening ended streams.
    async fn forward(
        self,
        mut stream: BoxStream<'static, RemoteEvent>,
        tx: mpsc::Sender<Snapshot>,
        signal: ShutdownSignal,
    ) {
        let name = self.name();
        info!(source = %name, "watching remote resource");
        // The stream only reports changes made after it opened; catch up on
        // anything written since the last load.
        let baseline = self.loaded.lock().clone();
        if let Some(seen) = baseline {
            match self.load().await {
                Ok(current) if current != seen => {
                    debug!(source = %name, "remote resource changed before watch opened");
                    if tx.send(current).await.is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(err) => warn!(source = %name, error = %err, "cannot refresh remote resource"),
            }
        }
        loop {
            let event = tokio::select! {
                () = signal.cancelled() => break,
                event = stream.next() => event,
            };
            let snapshot = match event {
                Some(RemoteEvent::Applied(snapshot)) => snapshot,
                Some(RemoteEvent::Deleted) => {
                    debug!(source = %name, "remote resource deleted");
                    Snapshot::new()
                }
                None => {
                    let Some(reopened) = self.reopen(&signal).await else {
                        break;
                    };
                    stream = reopened;
                    // Changes made while the stream was down are only visible
                    // through a fresh fetch.
                    match self.load().await {
                        Ok(snapshot) => snapshot,
                        Err(err) => {
                            warn!(source = %name, error = %err, "cannot refresh remote resource");
                            continue;
                        }
                    }
                }
            };
            if tx.send(snapshot).await.is_err() {
                break;
            }
        }
        debug!(source = %name, "remote watch stopped");
    }

    /// Re-open the watch after the retry interval; `None` on shutdown.
    async fn reopen(&self, signal: &ShutdownSignal) -> Option<BoxStream<'static, RemoteEvent>> {
        let name = self.name();
        loop {
            warn!(
                source = %name,
                retry_in = ?self.options.retry_interval,
                "remote watch ended, re-opening"
            );
            tokio::select! {
                () = signal.cancelled() => return None,
                () = tokio::time::sleep(self.options.retry_interval) => {}
            }
            match self.open().await {
                Ok(stream) => return Some(stream),
                Err(err) => warn!(source = %name, error = %err, "cannot re-open remote watch"),
            }
        }
    }
}

#[async_trait]
impl Source for RemoteSource {
    fn name(&self) -> String {
        format!(
            "remote:{}/{}",
            self.options.namespace, self.options.resource_name
        )
    }

    async fn load(&self) -> HotconfResult<Snapshot> {
        let fetched = self
            .options
            .store
            .fetch(&self.options.namespace, &self.options.resource_name)
            .await?;
        let snapshot = fetched.unwrap_or_else(|| {
            debug!(source = %self.name(), "remote resource absent, contributing no keys");
            Snapshot::new()
        });
        *self.loaded.lock() = Some(snapshot.clone());
        Ok(snapshot)
    }

    async fn watch(&self, signal: ShutdownSignal) -> HotconfResult<Updates> {
        let stream = self.open().await?;
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        tokio::spawn(self.clone().forward(stream, tx, signal));
        Ok(rx)
    }
}
