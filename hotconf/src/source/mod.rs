//! Configuration providers and the contract the merge engine relies on.
//!
//! A [`Source`] yields complete snapshots: once through [`Source::load`] and
//! repeatedly through the channel returned by [`Source::watch`]. Every value
//! pushed on that channel replaces the source's previous contribution
//! wholesale; there are no deltas.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{HotconfResult, ShutdownSignal, Snapshot};

mod env;
mod file;
mod remote;

pub use env::{EnvOptions, EnvSource};
pub use file::{FileFormat, FileOptions, FileSource};
pub use remote::{MemoryStore, RemoteEvent, RemoteOptions, RemoteSource, RemoteStore};

/// Capacity of the update channel handed out by the built-in adapters.
pub const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Receiving half of a source's update stream.
pub type Updates = mpsc::Receiver<Snapshot>;

/// A configuration provider.
///
/// Implementations must hand ownership of loaded snapshots to the caller and
/// must drop the sending half of the update channel once `signal` fires, so
/// that the consuming task observes the stream ending.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use hotconf::{HotconfResult, ShutdownSignal, Snapshot, Source, Updates, idle_updates};
///
/// struct Fixed(Snapshot);
///
/// #[async_trait]
/// impl Source for Fixed {
///     fn name(&self) -> String {
///         "fixed".into()
///     }
///
///     async fn load(&self) -> HotconfResult<Snapshot> {
///         Ok(self.0.clone())
///     }
///
///     async fn watch(&self, signal: ShutdownSignal) -> HotconfResult<Updates> {
///         Ok(idle_updates(signal))
///     }
/// }
/// ```
#[async_trait]
pub trait Source: Send + Sync {
    /// Human-readable identifier used in logs and errors.
    fn name(&self) -> String;

    /// Read a complete snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot be read or parsed.
    async fn load(&self) -> HotconfResult<Snapshot>;

    /// Start monitoring the backing store.
    ///
    /// # Errors
    ///
    /// Returns an error immediately when monitoring cannot start; a source
    /// must never silently hand back a stream that will not deliver.
    async fn watch(&self, signal: ShutdownSignal) -> HotconfResult<Updates>;
}

/// An update stream that never delivers and closes when `signal` fires.
///
/// Static sources return this from [`Source::watch`].
#[must_use]
pub fn idle_updates(signal: ShutdownSignal) -> Updates {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        tokio::select! {
            () = signal.cancelled() => {}
            () = tx.closed() => {}
        }
    });
    rx
}
