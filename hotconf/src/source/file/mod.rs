//! Structured file source with optional polling.

mod flatten;
mod parser;

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{HotconfError, HotconfResult, ShutdownSignal, Snapshot};

use super::{Source, UPDATE_CHANNEL_CAPACITY, Updates, idle_updates};

/// Default interval between modification checks while watching.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Supported document formats.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum FileFormat {
    /// TOML document.
    Toml,
    /// JSON document.
    Json,
    /// YAML document (requires the `yaml` feature).
    Yaml,
}

impl FileFormat {
    /// Detect the format from the file extension, defaulting to TOML.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use hotconf::FileFormat;
    ///
    /// assert_eq!(FileFormat::from_path(Utf8Path::new("app.yml")), FileFormat::Yaml);
    /// assert_eq!(FileFormat::from_path(Utf8Path::new("app.conf")), FileFormat::Toml);
    /// ```
    #[must_use]
    pub fn from_path(path: &Utf8Path) -> Self {
        match path.extension().map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Self::Json,
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Toml,
        }
    }
}

/// Options for [`FileSource`].
#[derive(Clone, Debug)]
pub struct FileOptions {
    /// Location of the document.
    pub path: Utf8PathBuf,
    /// Poll the file for changes while watching.
    pub watch: bool,
    /// Explicit format; detected from the extension when `None`.
    pub format: Option<FileFormat>,
    /// Interval between modification checks.
    pub poll_interval: Duration,
    /// Treat a missing file as an empty document.
    pub optional: bool,
}

impl FileOptions {
    /// Options for reading `path` once, with format detection.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            watch: false,
            format: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            optional: false,
        }
    }

    /// Poll the file for changes.
    #[must_use]
    pub const fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Force a document format.
    #[must_use]
    pub const fn format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Override the interval between modification checks.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Treat a missing file as empty instead of failing.
    #[must_use]
    pub const fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }
}

/// Fingerprint used to skip re-reading an untouched file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

/// Source reading a TOML, JSON or YAML document and flattening it into
/// dotted keys.
///
/// # Examples
///
/// ```
/// use hotconf::{FileOptions, FileSource, Source};
///
/// let source = FileSource::new(FileOptions::new("config/app.toml").watch(true));
/// assert_eq!(source.name(), "file:config/app.toml");
/// ```
#[derive(Clone, Debug)]
pub struct FileSource {
    options: Arc<FileOptions>,
    /// Contents returned by the latest successful `load`.
    loaded: Arc<Mutex<Option<Snapshot>>>,
}

impl FileSource {
    /// Create a source with `options`.
    #[must_use]
    pub fn new(options: FileOptions) -> Self {
        Self {
            options: Arc::new(options),
            loaded: Arc::new(Mutex::new(None)),
        }
    }

    fn path(&self) -> &Utf8Path {
        &self.options.path
    }

    fn format(&self) -> FileFormat {
        self.options
            .format
            .unwrap_or_else(|| FileFormat::from_path(self.path()))
    }

    async fn stamp(&self) -> std::io::Result<Option<FileStamp>> {
        match tokio::fs::metadata(self.path()).await {
            Ok(meta) => Ok(Some(FileStamp {
                modified: meta.modified().ok(),
                len: meta.len(),
            })),
            Err(err) if err.kind() == ErrorKind::NotFound && self.options.optional => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn read(&self) -> HotconfResult<Snapshot> {
        let data = match tokio::fs::read_to_string(self.path()).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound && self.options.optional => {
                debug!(path = %self.path(), "optional configuration file is absent");
                return Ok(Snapshot::new());
            }
            Err(err) => return Err(HotconfError::file(self.path(), err)),
        };
        let document = parser::parse(self.path(), self.format(), &data)?;
        flatten::flatten(&document)
            .ok_or_else(|| HotconfError::file(self.path(), "document root must be a table of keys"))
    }

    /// Report content changes until shutdown.
    ///
    /// The baseline is what `load` last returned, and the first tick reads
    /// the file whatever its stamp says, so an edit made between `load` and
    /// `watch` is still reported.
    async fn poll(
        self,
        tx: mpsc::Sender<Snapshot>,
        signal: ShutdownSignal,
        mut stamp: Option<FileStamp>,
    ) {
        let mut last = self.loaded.lock().clone();
        if last.is_none() {
            last = self.read().await.ok();
        }
        let mut verified = false;
        let mut ticker = tokio::time::interval(self.options.poll_interval);
        ticker.tick().await;
        info!(
            path = %self.path(),
            interval = ?self.options.poll_interval,
            "polling configuration file"
        );
        loop {
            tokio::select! {
                () = signal.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let current = match self.stamp().await {
                Ok(current) => current,
                Err(err) => {
                    warn!(path = %self.path(), error = %err, "cannot stat configuration file");
                    continue;
                }
            };
            if verified && current == stamp {
                continue;
            }
            verified = true;
            stamp = current;
            let snapshot = match self.read().await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(path = %self.path(), error = %err, "keeping previous file contents");
                    continue;
                }
            };
            if last.as_ref() == Some(&snapshot) {
                debug!(path = %self.path(), "file touched without content change");
                continue;
            }
            debug!(path = %self.path(), keys = snapshot.len(), "file changed");
            last = Some(snapshot.clone());
            if tx.send(snapshot).await.is_err() {
                break;
            }
        }
        debug!(path = %self.path(), "file watch stopped");
    }
}

#[async_trait]
impl Source for FileSource {
    fn name(&self) -> String {
        format!("file:{}", self.path())
    }

    async fn load(&self) -> HotconfResult<Snapshot> {
        let snapshot = self.read().await?;
        *self.loaded.lock() = Some(snapshot.clone());
        Ok(snapshot)
    }

    async fn watch(&self, signal: ShutdownSignal) -> HotconfResult<Updates> {
        if !self.options.watch {
            return Ok(idle_updates(signal));
        }
        let stamp = self
            .stamp()
            .await
            .map_err(|err| HotconfError::file(self.path(), err))?;
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        tokio::spawn(self.clone().poll(tx, signal, stamp));
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for format detection and option builders.

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("app.toml", FileFormat::Toml)]
    #[case("app.JSON", FileFormat::Json)]
    #[case("app.yaml", FileFormat::Yaml)]
    #[case("app.yml", FileFormat::Yaml)]
    #[case("app", FileFormat::Toml)]
    fn detects_format_from_extension(#[case] path: &str, #[case] expected: FileFormat) {
        assert_eq!(FileFormat::from_path(Utf8Path::new(path)), expected);
    }

    #[rstest]
    fn explicit_format_wins_over_extension() {
        let source = FileSource::new(FileOptions::new("app.toml").format(FileFormat::Json));
        assert_eq!(source.format(), FileFormat::Json);
    }
}
