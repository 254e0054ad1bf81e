//! Constructors for `HotconfError`.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;

use super::HotconfError;

impl HotconfError {
    /// Wrap a failed initial load of the named source.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use hotconf::HotconfError;
    ///
    /// let inner = Arc::new(HotconfError::custom("boom"));
    /// let err = HotconfError::source_load("env", inner);
    /// assert!(matches!(err, HotconfError::SourceLoad { .. }));
    /// ```
    #[must_use]
    pub fn source_load(name: impl Into<String>, error: Arc<Self>) -> Self {
        Self::SourceLoad {
            source_name: name.into(),
            error,
        }
    }

    /// Wrap a failed `watch` call of the named source.
    #[must_use]
    pub fn source_watch(name: impl Into<String>, error: Arc<Self>) -> Self {
        Self::SourceWatch {
            source_name: name.into(),
            error,
        }
    }

    /// Report that `operation` on the named source exceeded `after`.
    #[must_use]
    pub fn timeout(name: impl Into<String>, operation: &'static str, after: Duration) -> Self {
        Self::Timeout {
            source_name: name.into(),
            operation,
            after,
        }
    }

    /// Construct a file error for `path`, returned as shared.
    #[must_use]
    pub fn file(path: &Utf8Path, error: impl Into<Box<dyn Error + Send + Sync>>) -> Arc<Self> {
        Arc::new(Self::File {
            path: path.to_path_buf(),
            error: error.into(),
        })
    }

    /// Construct a remote store error, returned as shared.
    #[must_use]
    pub fn remote(
        namespace: impl Into<String>,
        name: impl Into<String>,
        error: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Arc<Self> {
        Arc::new(Self::Remote {
            namespace: namespace.into(),
            name: name.into(),
            error: error.into(),
        })
    }

    /// Report contradictory options on the named source, returned as shared.
    #[must_use]
    pub fn invalid_options(name: impl Into<String>, message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::InvalidOptions {
            source_name: name.into(),
            message: message.into(),
        })
    }

    /// Report a value that could not be bound into `field`.
    #[must_use]
    pub fn bind(
        field: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self::Bind {
            field: field.into(),
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        })
    }

    /// Wrap an arbitrary error raised by a custom source.
    ///
    /// # Examples
    ///
    /// ```
    /// use hotconf::HotconfError;
    /// let err = HotconfError::custom("backend unavailable");
    /// assert_eq!(err.to_string(), "backend unavailable");
    /// ```
    #[must_use]
    pub fn custom(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Custom(error.into())
    }

    /// Returns the field path when this is a binding error.
    #[must_use]
    pub fn bind_field(&self) -> Option<&str> {
        match self {
            Self::Bind { field, .. } => Some(field.as_str()),
            _ => None,
        }
    }
}
