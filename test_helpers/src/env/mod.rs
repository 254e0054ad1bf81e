//! Helpers for safely mutating environment variables in tests.
//!
//! Every mutation takes a process-wide re-entrant lock and returns an RAII
//! guard that restores the previous state when dropped. Guards for the same
//! key restore in LIFO order.
//!
//! Environment sources snapshot the whole process environment, so tests that
//! assert on the exact contents of a prefix should hold an [`EnvScope`] from
//! [`isolate_prefix`] for their whole body.
//!
//! # Examples
//!
//! ```
//! use hotconf_test_helpers::env;
//!
//! let _g = env::set_var("HOTCONF_DOC_KEY", "VALUE");
//! assert_eq!(std::env::var("HOTCONF_DOC_KEY").ok().as_deref(), Some("VALUE"));
//! ```

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::env;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::sync::LazyLock;

static ENV_MUTEX: LazyLock<ReentrantMutex<()>> = LazyLock::new(ReentrantMutex::default);

/// Applies `value` to `key`, or removes `key` when `value` is `None`.
///
/// # Safety
///
/// Callers must hold `ENV_MUTEX`.
unsafe fn apply(key: &str, value: Option<&OsStr>) {
    match value {
        // SAFETY: Upheld by the caller.
        Some(v) => unsafe { env::set_var(key, v) },
        // SAFETY: Upheld by the caller.
        None => unsafe { env::remove_var(key) },
    }
}

fn mutate(key: String, value: Option<&OsStr>) -> EnvVarGuard {
    let _guard = ENV_MUTEX.lock();
    let original = env::var_os(&key);
    // SAFETY: `ENV_MUTEX` is held for the duration of the mutation.
    unsafe { apply(&key, value) };
    EnvVarGuard { key, original }
}

/// RAII guard restoring an environment variable to its prior value on drop.
#[must_use = "dropping restores the prior value"]
pub struct EnvVarGuard {
    key: String,
    original: Option<OsString>,
}

impl EnvVarGuard {
    /// Name of the guarded variable.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for EnvVarGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvVarGuard")
            .field("key", &self.key)
            .field("had_original", &self.original.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        let _guard = ENV_MUTEX.lock();
        // SAFETY: `ENV_MUTEX` is held during restoration.
        unsafe { apply(&self.key, self.original.as_deref()) };
    }
}

/// Sets an environment variable and returns a guard restoring its prior value.
///
/// # Examples
///
/// ```
/// use hotconf_test_helpers::env;
///
/// let _g = env::set_var("HOTCONF_DOC_SET", "bar");
/// assert_eq!(std::env::var("HOTCONF_DOC_SET").ok().as_deref(), Some("bar"));
/// ```
pub fn set_var<K, V>(key: K, value: V) -> EnvVarGuard
where
    K: Into<String>,
    V: AsRef<OsStr>,
{
    mutate(key.into(), Some(value.as_ref()))
}

/// Removes an environment variable and returns a guard restoring its prior
/// value.
pub fn remove_var<K>(key: K) -> EnvVarGuard
where
    K: Into<String>,
{
    mutate(key.into(), None)
}

/// RAII scope that holds the environment lock while retaining guards.
///
/// Other threads using these helpers block until the scope is dropped; the
/// guards are restored before the lock is released.
#[must_use = "dropping releases the environment lock and restores guards"]
pub struct EnvScope {
    guards: Vec<EnvVarGuard>,
    _lock: ReentrantMutexGuard<'static, ()>,
}

impl EnvScope {
    /// Add a variable to the scope, restored when the scope drops.
    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: AsRef<OsStr>,
    {
        self.guards.push(set_var(key, value));
        self
    }

    /// Remove a variable for the lifetime of the scope.
    pub fn remove_var<K>(&mut self, key: K) -> &mut Self
    where
        K: Into<String>,
    {
        self.guards.push(remove_var(key));
        self
    }
}

impl Drop for EnvScope {
    fn drop(&mut self) {
        // Restore in LIFO order while the lock is still held.
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

/// Acquire the lock and clear every variable whose name starts with
/// `prefix`, restoring them when the returned scope drops.
///
/// # Examples
///
/// ```
/// use hotconf_test_helpers::env;
///
/// let mut scope = env::isolate_prefix("HOTCONF_DOC_ISOLATED_");
/// scope.set_var("HOTCONF_DOC_ISOLATED_PORT", "8080");
/// ```
pub fn isolate_prefix(prefix: &str) -> EnvScope {
    let lock = ENV_MUTEX.lock();
    let guards = env::vars_os()
        .filter_map(|(name, _)| name.into_string().ok())
        .filter(|name| name.starts_with(prefix))
        .map(remove_var)
        .collect();
    EnvScope {
        guards,
        _lock: lock,
    }
}
