//! Multi-source, hot-reloading configuration for long-running services.
//!
//! A [`Manager`] aggregates key/value [`Snapshot`]s from an ordered list of
//! [`Source`]s (environment variables, files, remote stores or custom
//! providers), merges them with later sources taking precedence, and keeps
//! the merged view current as sources change. Consumers read values, bind
//! them onto typed structs with `#[derive(Bind)]`, or subscribe to updates.
//!
//! ```no_run
//! use std::time::Duration;
//! use hotconf::{Bind, EnvSource, FileOptions, FileSource, Manager, Shutdown};
//!
//! #[derive(Debug, Default, Bind)]
//! struct Settings {
//!     #[bind(key = "SERVICE_NAME", default = "orders")]
//!     service_name: String,
//!     #[bind(key = "REQUEST_TIMEOUT", default = "5s")]
//!     request_timeout: Duration,
//! }
//!
//! # async fn run() -> hotconf::HotconfResult<()> {
//! let shutdown = Shutdown::new();
//! let manager = Manager::builder()
//!     .source(FileSource::new(FileOptions::new("service.toml").watch(true)))
//!     .source(EnvSource::raw())
//!     .build(shutdown.signal())
//!     .await?;
//!
//! let settings: Settings = manager.bind()?;
//! let subscription = manager.on_bind(|settings: Settings| {
//!     tracing::info!(timeout = ?settings.request_timeout, "settings reloaded");
//! });
//! # let _ = settings;
//! subscription.unsubscribe();
//! shutdown.trigger();
//! # Ok(())
//! # }
//! ```
//!
//! The derive macro lives in the companion `hotconf_macros` crate and is
//! re-exported here.

extern crate self as hotconf;

pub use hotconf_macros::Bind;

mod bind;
mod error;
mod manager;
mod merge;
mod result_ext;
mod shutdown;
mod snapshot;
mod source;

use std::sync::Arc;

pub use bind::{Bind, FromConfigValue, bind_from, parse_duration, resolve};
#[doc(hidden)]
pub use bind::bind_leaf;
pub use error::HotconfError;
pub use manager::{
    Callback, DEFAULT_DEBOUNCE, DEFAULT_LOAD_TIMEOUT, DEFAULT_RELOAD_TIMEOUT, Manager,
    ManagerBuilder, RemergeStrategy, Subscription, WatchFailurePolicy,
};
pub use merge::merge_snapshots;
pub use result_ext::HotconfResultExt;
pub use shutdown::{Shutdown, ShutdownSignal};
pub use snapshot::Snapshot;
pub use source::{
    EnvOptions, EnvSource, FileFormat, FileOptions, FileSource, MemoryStore, RemoteEvent,
    RemoteOptions, RemoteSource, RemoteStore, Source, UPDATE_CHANNEL_CAPACITY, Updates,
    idle_updates,
};

/// Result alias used throughout the crate.
///
/// Errors are shared so that a single failure can be logged, wrapped and
/// returned without cloning its source chain.
pub type HotconfResult<T> = Result<T, Arc<HotconfError>>;
