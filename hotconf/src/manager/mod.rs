//! The configuration manager: startup aggregation, hot reload and the
//! consumer-facing read, bind and subscribe operations.

mod options;
mod orchestrator;
mod registry;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{Span, warn};

use crate::{Bind, HotconfResult, Snapshot, Source};

pub use options::{
    DEFAULT_DEBOUNCE, DEFAULT_LOAD_TIMEOUT, DEFAULT_RELOAD_TIMEOUT, ManagerBuilder,
    RemergeStrategy, WatchFailurePolicy,
};
pub use registry::{Callback, Subscription};

use options::Settings;
use registry::Registry;

/// Per-source caches guarded by the merge lock.
struct MergeState {
    /// Last snapshot successfully obtained from each source, in list order.
    last_known: Vec<Snapshot>,
    /// Bumped whenever the matching `last_known` slot is replaced.
    versions: Vec<u64>,
    /// Sequence number of the newest delivery applied per source.
    applied: Vec<u64>,
    generation: u64,
}

struct Inner {
    sources: Vec<Arc<dyn Source>>,
    names: Vec<String>,
    current: ArcSwap<Snapshot>,
    state: Mutex<MergeState>,
    generation: AtomicU64,
    registry: Arc<Registry>,
    settings: Settings,
    span: Span,
}

/// Aggregates configuration from ordered sources and keeps it current.
///
/// Sources later in the list take precedence. Reads never block on a merge:
/// the published snapshot is swapped atomically and readers see either the
/// previous or the new one in full.
///
/// `Manager` is cheap to clone; clones share the same state.
///
/// # Examples
///
/// ```no_run
/// use hotconf::{Bind, EnvSource, Manager, Shutdown};
///
/// #[derive(Debug, Default, Bind)]
/// struct Settings {
///     #[bind(key = "APP_PORT", default = "8080")]
///     port: u16,
/// }
///
/// # async fn run() -> hotconf::HotconfResult<()> {
/// let shutdown = Shutdown::new();
/// let manager = Manager::builder()
///     .source(EnvSource::raw())
///     .build(shutdown.signal())
///     .await?;
/// let settings: Settings = manager.bind()?;
/// let _subscription = manager.on_bind(|settings: Settings| {
///     println!("port is now {}", settings.port);
/// });
/// # let _ = settings;
/// shutdown.trigger();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Manager {
    inner: Arc<Inner>,
}

impl Manager {
    /// Start configuring a manager.
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    /// Copy of the current merged configuration.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.inner.current.load().as_ref().clone()
    }

    /// Shared handle to the current merged configuration.
    #[must_use]
    pub fn current(&self) -> Arc<Snapshot> {
        self.inner.current.load_full()
    }

    /// Current value of `key`, if any source provides it.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.inner.current.load().get(key).map(str::to_owned)
    }

    /// Bind a fresh `T::default()` from the current configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HotconfError::Bind`](crate::HotconfError::Bind) when a field
    /// value cannot be parsed.
    pub fn bind<T: Bind + Default>(&self) -> HotconfResult<T> {
        crate::bind_from(&self.current())
    }

    /// Bind the current configuration onto an existing value.
    ///
    /// # Errors
    ///
    /// Returns [`HotconfError::Bind`](crate::HotconfError::Bind) when a field
    /// value cannot be parsed.
    pub fn bind_into<T: Bind>(&self, target: &mut T) -> HotconfResult<()> {
        target.bind(&self.current())
    }

    /// Register `callback` for every subsequent merge.
    ///
    /// Callbacks run on their own task per merge, concurrently with each
    /// other and possibly with an earlier invocation of themselves.
    pub fn on_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Arc<Snapshot>) + Send + Sync + 'static,
    {
        self.inner.registry.subscribe(Arc::new(callback))
    }

    /// Register `callback` with a freshly bound `T` after every merge.
    ///
    /// Merges whose snapshot does not bind are logged and skipped.
    pub fn on_bind<T, F>(&self, callback: F) -> Subscription
    where
        T: Bind + Default + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.on_update(move |snapshot| match crate::bind_from::<T>(&snapshot) {
            Ok(value) => callback(value),
            Err(err) => warn!(
                target_type = std::any::type_name::<T>(),
                error = %err,
                "skipping update that does not bind"
            ),
        })
    }

    /// Number of merges published since startup; the initial merge is `0`.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Names of the configured sources in precedence order.
    #[must_use]
    pub fn source_names(&self) -> Vec<String> {
        self.inner.names.clone()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("sources", &self.inner.names)
            .field("generation", &self.generation())
            .field("keys", &self.inner.current.load().len())
            .finish_non_exhaustive()
    }
}
