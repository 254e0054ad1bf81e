//! Temporary configuration directories for file-source tests.
//!
//! File sources detect changes by modification time and length, so
//! [`ConfigDir::rewrite`] moves the modification time forward on every call
//! to keep quick successive edits observable on coarse-grained filesystems.
//!
//! # Examples
//!
//! ```
//! use hotconf_test_helpers::fs::ConfigDir;
//!
//! let dir = ConfigDir::new()?;
//! let path = dir.write("app.toml", "port = 8080\n")?;
//! assert!(path.as_str().ends_with("app.toml"));
//! # Ok::<_, anyhow::Error>(())
//! ```

use std::fs::{self, File};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

/// A temporary directory removed on drop.
#[derive(Debug)]
pub struct ConfigDir {
    _dir: TempDir,
    root: Utf8PathBuf,
    bumps: AtomicU64,
}

impl ConfigDir {
    /// Create a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created or its path is
    /// not valid UTF-8.
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temporary config dir")?;
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|path| anyhow!("temporary dir is not UTF-8: {}", path.display()))?;
        Ok(Self {
            _dir: dir,
            root,
            bumps: AtomicU64::new(0),
        })
    }

    /// Directory root.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.root
    }

    /// Absolute path of `name` inside the directory, whether or not it exists.
    #[must_use]
    pub fn join(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// Write `contents` to `name`, returning its path.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn write(&self, name: &str, contents: &str) -> Result<Utf8PathBuf> {
        let path = self.join(name);
        fs::write(&path, contents).with_context(|| format!("write {path}"))?;
        Ok(path)
    }

    /// Replace `name` and push its modification time past any earlier write.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written or its timestamp
    /// cannot be updated.
    pub fn rewrite(&self, name: &str, contents: &str) -> Result<Utf8PathBuf> {
        let path = self.write(name, contents)?;
        let bump = self.bumps.fetch_add(1, Ordering::Relaxed) + 1;
        let stamp = SystemTime::now() + Duration::from_secs(bump * 10);
        File::options()
            .write(true)
            .open(&path)
            .and_then(|file| file.set_modified(stamp))
            .with_context(|| format!("bump modification time of {path}"))?;
        Ok(path)
    }

    /// Delete `name`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be removed.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.join(name);
        fs::remove_file(&path).with_context(|| format!("remove {path}"))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the temporary directory helper.

    use super::*;

    #[test]
    fn rewrite_moves_modification_time_forward() -> Result<()> {
        let dir = ConfigDir::new()?;
        let path = dir.write("a.json", "{}")?;
        let before = fs::metadata(&path)?.modified()?;
        dir.rewrite("a.json", "{}")?;
        let after = fs::metadata(&path)?.modified()?;
        anyhow::ensure!(after > before, "modification time did not advance");
        Ok(())
    }

    #[test]
    fn remove_deletes_file() -> Result<()> {
        let dir = ConfigDir::new()?;
        dir.write("gone.toml", "")?;
        dir.remove("gone.toml")?;
        anyhow::ensure!(!dir.join("gone.toml").exists(), "file still present");
        Ok(())
    }
}
