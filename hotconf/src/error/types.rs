//! Primary error enum for loading, watching and binding configuration.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while aggregating or binding configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HotconfError {
    /// A source failed its initial load while the manager was being built.
    #[error("failed to load configuration source '{source_name}': {error}")]
    SourceLoad {
        /// Name reported by the failing source.
        source_name: String,
        /// Underlying failure reported by the source.
        #[source]
        error: Arc<HotconfError>,
    },

    /// A source could not start watching while the manager was being built.
    #[error("failed to watch configuration source '{source_name}': {error}")]
    SourceWatch {
        /// Name reported by the failing source.
        source_name: String,
        /// Underlying failure reported by the source.
        #[source]
        error: Arc<HotconfError>,
    },

    /// A bounded source operation did not finish in time.
    #[error("{operation} of configuration source '{source_name}' timed out after {after:?}")]
    Timeout {
        /// Name reported by the slow source.
        source_name: String,
        /// Operation that exceeded its budget (`load` or `reload`).
        operation: &'static str,
        /// Budget that was exceeded.
        after: Duration,
    },

    /// Error originating from a configuration file.
    #[error("configuration file error in '{path}': {error}")]
    File {
        /// Path that triggered the failure.
        path: Utf8PathBuf,
        /// Underlying I/O or parse error.
        #[source]
        error: Box<dyn Error + Send + Sync>,
    },

    /// Error reported by a remote store.
    #[error("remote configuration '{namespace}/{name}' failed: {error}")]
    Remote {
        /// Namespace holding the remote resource.
        namespace: String,
        /// Name of the remote resource.
        name: String,
        /// Underlying transport error.
        #[source]
        error: Box<dyn Error + Send + Sync>,
    },

    /// A source was configured with contradictory options.
    #[error("invalid options for configuration source '{source_name}': {message}")]
    InvalidOptions {
        /// Name of the misconfigured source.
        source_name: String,
        /// Human-readable explanation.
        message: String,
    },

    /// A snapshot value could not be coerced into a typed field.
    #[error("cannot bind '{value}' from key '{key}' into field '{field}': {reason}")]
    Bind {
        /// Dotted path of the failing field.
        field: String,
        /// Configuration key the value was read from.
        key: String,
        /// Raw value that failed to parse.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Failure reported by a custom [`Source`](crate::Source) implementation.
    #[error(transparent)]
    Custom(Box<dyn Error + Send + Sync>),
}
