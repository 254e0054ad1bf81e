//! Environment variable source.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{HotconfError, HotconfResult, ShutdownSignal, Snapshot};

use super::{Source, UPDATE_CHANNEL_CAPACITY, Updates, idle_updates};

/// Options for [`EnvSource`].
#[derive(Clone, Debug, Default)]
pub struct EnvOptions {
    /// Only variables starting with this prefix are read; the prefix is
    /// stripped from the resulting key.
    pub prefix: Option<String>,
    /// Fold keys to lower case.
    pub lowercase: bool,
    /// Fold keys to upper case.
    pub uppercase: bool,
    /// Re-read the environment on this interval while watching.
    pub poll_interval: Option<Duration>,
}

impl EnvOptions {
    /// Restrict the source to variables starting with `prefix`.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Fold keys to lower case.
    #[must_use]
    pub const fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    /// Fold keys to upper case.
    #[must_use]
    pub const fn uppercase(mut self) -> Self {
        self.uppercase = true;
        self
    }

    /// Poll the environment for changes while watching.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }
}

/// Source reading the process environment.
///
/// # Examples
///
/// ```
/// use hotconf::{EnvOptions, EnvSource, Source};
///
/// let source = EnvSource::new(EnvOptions::default().prefix("APP_"));
/// assert_eq!(source.name(), "env:APP_");
/// ```
#[derive(Clone, Debug)]
pub struct EnvSource {
    options: EnvOptions,
    /// Variables returned by the latest successful `load`.
    loaded: Arc<Mutex<Option<Snapshot>>>,
}

impl EnvSource {
    /// Create a source with `options`.
    #[must_use]
    pub fn new(options: EnvOptions) -> Self {
        Self {
            options,
            loaded: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a source reading every variable unchanged.
    #[must_use]
    pub fn raw() -> Self {
        Self::new(EnvOptions::default())
    }

    /// Create a source reading variables starting with `prefix`.
    #[must_use]
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self::new(EnvOptions::default().prefix(prefix))
    }

    fn validate(&self) -> HotconfResult<()> {
        if self.options.lowercase && self.options.uppercase {
            return Err(HotconfError::invalid_options(
                self.name(),
                "lowercase and uppercase are mutually exclusive",
            ));
        }
        Ok(())
    }

    /// Map a variable name to a snapshot key, or `None` when filtered out.
    fn key_for(&self, name: &str) -> Option<String> {
        let stripped = match self.options.prefix.as_deref() {
            Some(prefix) => name.strip_prefix(prefix).filter(|rest| !rest.is_empty())?,
            None => name,
        };
        let key = if self.options.lowercase {
            stripped.to_lowercase()
        } else if self.options.uppercase {
            stripped.to_uppercase()
        } else {
            stripped.to_owned()
        };
        Some(key)
    }

    fn read(&self) -> Snapshot {
        std::env::vars_os()
            .filter_map(|(os_name, os_value)| {
                let name = os_name.into_string().ok()?;
                let value = os_value.into_string().ok()?;
                Some((self.key_for(&name)?, value))
            })
            .collect()
    }
}

#[async_trait]
impl Source for EnvSource {
    fn name(&self) -> String {
        match self.options.prefix.as_deref() {
            Some(prefix) => format!("env:{prefix}"),
            None => String::from("env"),
        }
    }

    async fn load(&self) -> HotconfResult<Snapshot> {
        self.validate()?;
        let snapshot = self.read();
        *self.loaded.lock() = Some(snapshot.clone());
        Ok(snapshot)
    }

    async fn watch(&self, signal: ShutdownSignal) -> HotconfResult<Updates> {
        self.validate()?;
        let Some(interval) = self.options.poll_interval else {
            return Ok(idle_updates(signal));
        };

        // Compare against what the manager loaded, not the environment at
        // watch time, so changes in between are still reported.
        let seen = self.loaded.lock().clone();
        let mut last = seen.unwrap_or_else(|| self.read());

        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let source = self.clone();
        let name = self.name();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            info!(source = %name, ?interval, "polling environment");
            loop {
                tokio::select! {
                    () = signal.cancelled() => break,
                    _ = ticker.tick() => {
                        let current = source.read();
                        if current == last {
                            continue;
                        }
                        debug!(source = %name, "environment changed");
                        last = current.clone();
                        if tx.send(current).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(source = %name, "environment watch stopped");
        });
        Ok(rx)
    }
}
