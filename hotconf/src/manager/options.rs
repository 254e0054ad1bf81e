//! Construction options for [`Manager`](super::Manager).

use std::sync::Arc;
use std::time::Duration;

use tracing::Span;

use crate::{HotconfResult, ShutdownSignal, Source};

use super::Manager;

/// Default quiet period before a burst of updates triggers a re-merge.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);
/// Default budget for each source's initial load.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);
/// Default budget for each non-triggering source's reload during a re-merge.
pub const DEFAULT_RELOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// What to do when a source cannot start watching during construction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WatchFailurePolicy {
    /// Abort construction with [`HotconfError::SourceWatch`](crate::HotconfError::SourceWatch).
    #[default]
    Fatal,
    /// Log the failure and keep the source's initial snapshot without
    /// watching it.
    Degrade,
}

/// How the contributions of non-triggering sources are refreshed on a
/// re-merge.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RemergeStrategy {
    /// Re-load every other source, falling back to its last-known snapshot
    /// when the reload fails.
    #[default]
    ReloadOthers,
    /// Merge from each source's last-known snapshot without reloading.
    Cached,
}

/// Tunables shared by every orchestrator task.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Settings {
    pub(crate) debounce: Duration,
    pub(crate) reload_timeout: Duration,
    pub(crate) remerge: RemergeStrategy,
}

/// Builder for [`Manager`].
///
/// Sources are merged in the order they are added; later sources take
/// precedence.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use hotconf::{EnvSource, FileOptions, FileSource, Manager, Shutdown};
///
/// # async fn run() -> hotconf::HotconfResult<()> {
/// let shutdown = Shutdown::new();
/// let manager = Manager::builder()
///     .source(FileSource::new(FileOptions::new("config.toml").watch(true)))
///     .source(EnvSource::prefixed("APP_"))
///     .debounce(Duration::from_millis(500))
///     .build(shutdown.signal())
///     .await?;
/// println!("{:?}", manager.value("PORT"));
/// # Ok(())
/// # }
/// ```
#[must_use]
pub struct ManagerBuilder {
    pub(crate) sources: Vec<Arc<dyn Source>>,
    pub(crate) debounce: Duration,
    pub(crate) load_timeout: Duration,
    pub(crate) reload_timeout: Duration,
    pub(crate) watch_failure: WatchFailurePolicy,
    pub(crate) remerge: RemergeStrategy,
    pub(crate) span: Option<Span>,
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            debounce: DEFAULT_DEBOUNCE,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            reload_timeout: DEFAULT_RELOAD_TIMEOUT,
            watch_failure: WatchFailurePolicy::default(),
            remerge: RemergeStrategy::default(),
            span: None,
        }
    }
}

impl ManagerBuilder {
    /// Create a builder with default settings and no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source with the highest precedence so far.
    pub fn source<S: Source + 'static>(mut self, source: S) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Append shared sources in order.
    pub fn sources<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Source>>,
    {
        self.sources.extend(sources);
        self
    }

    /// Quiet period before a burst of updates from one source is merged.
    pub const fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Budget for each source's initial load.
    pub const fn load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Budget for each non-triggering source's reload during a re-merge.
    pub const fn reload_timeout(mut self, timeout: Duration) -> Self {
        self.reload_timeout = timeout;
        self
    }

    /// Policy for sources whose `watch` fails during construction.
    pub const fn watch_failure(mut self, policy: WatchFailurePolicy) -> Self {
        self.watch_failure = policy;
        self
    }

    /// Strategy for refreshing non-triggering sources on a re-merge.
    pub const fn remerge(mut self, strategy: RemergeStrategy) -> Self {
        self.remerge = strategy;
        self
    }

    /// Span every log event of the manager is recorded under.
    ///
    /// Defaults to an `info`-level span named `hotconf`.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Load every source, start watching, and return the manager.
    ///
    /// Watch tasks stop once `signal` fires.
    ///
    /// # Errors
    ///
    /// Returns [`HotconfError::SourceLoad`](crate::HotconfError::SourceLoad)
    /// when any initial load fails or times out, and
    /// [`HotconfError::SourceWatch`](crate::HotconfError::SourceWatch) when a
    /// source cannot start watching under [`WatchFailurePolicy::Fatal`].
    pub async fn build(self, signal: ShutdownSignal) -> HotconfResult<Manager> {
        Manager::start(self, signal).await
    }

    pub(crate) const fn settings(&self) -> Settings {
        Settings {
            debounce: self.debounce,
            reload_timeout: self.reload_timeout,
            remerge: self.remerge,
        }
    }
}
