//! Projection of snapshots onto statically typed configuration structs.
//!
//! The field walk is generated by `#[derive(Bind)]`; this module holds the
//! trait it implements and the coercion table it calls into.
//!
//! ```
//! use std::time::Duration;
//! use hotconf::{Bind, Snapshot, bind_from};
//!
//! #[derive(Debug, Default, Bind)]
//! struct Cache {
//!     #[bind(key = "CACHE_TTL", default = "30s")]
//!     ttl: Duration,
//! }
//!
//! #[derive(Debug, Default, Bind)]
//! struct Settings {
//!     #[bind(key = "SERVICE_NAME", default = "app")]
//!     service_name: String,
//!     #[bind(key = "HTTP_PORT")]
//!     port: u16,
//!     #[bind(nested)]
//!     cache: Cache,
//! }
//!
//! let snapshot: Snapshot = [("CACHE_TTL", "5m"), ("HTTP_PORT", "8080")].into_iter().collect();
//! let settings: Settings = bind_from(&snapshot)?;
//! assert_eq!(settings.service_name, "app");
//! assert_eq!(settings.port, 8080);
//! assert_eq!(settings.cache.ttl, Duration::from_secs(300));
//! # Ok::<_, std::sync::Arc<hotconf::HotconfError>>(())
//! ```

mod duration;
mod value;

pub use duration::parse_duration;
pub use value::FromConfigValue;

use crate::{HotconfError, HotconfResult, Snapshot};

/// A struct whose fields can be populated from a [`Snapshot`].
///
/// Derive it with `#[derive(Bind)]` rather than implementing it by hand:
///
/// - `#[bind(key = "K")]` binds the field from key `K`;
/// - `#[bind(key = "K", default = "lit")]` falls back to `lit` when `K` is
///   absent or empty;
/// - `#[bind(nested)]` recurses into a field whose type also implements
///   `Bind`, using the same snapshot;
/// - fields without either attribute are left untouched.
///
/// Binding performs no I/O. A field keeps its current value when neither the
/// key nor a default resolves, so binding onto a freshly defaulted value is
/// idempotent.
pub trait Bind {
    /// Populate `self` from `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`HotconfError::Bind`] naming the first field whose value
    /// could not be parsed. Fields visited before the failure may already
    /// have been assigned.
    fn bind(&mut self, snapshot: &Snapshot) -> HotconfResult<()>;

    /// Populate `self` from `snapshot`, reporting failing fields below `path`.
    ///
    /// # Errors
    ///
    /// As [`Bind::bind`].
    fn bind_at(&mut self, snapshot: &Snapshot, path: &str) -> HotconfResult<()>;
}

/// Bind a fresh `T::default()` from `snapshot`.
///
/// # Errors
///
/// Returns [`HotconfError::Bind`] when a field value cannot be parsed.
pub fn bind_from<T: Bind + Default>(snapshot: &Snapshot) -> HotconfResult<T> {
    let mut target = T::default();
    target.bind(snapshot)?;
    Ok(target)
}

/// Resolve the raw text for a key: the snapshot value when present and
/// non-empty, else the default literal.
#[must_use]
pub fn resolve<'a>(snapshot: &'a Snapshot, key: &str, default: Option<&'a str>) -> Option<&'a str> {
    snapshot.get_non_empty(key).or(default)
}

/// Bind one leaf field. Called by derived implementations.
///
/// # Errors
///
/// Returns [`HotconfError::Bind`] when the resolved text fails to parse.
#[doc(hidden)]
pub fn bind_leaf<T: FromConfigValue>(
    target: &mut T,
    snapshot: &Snapshot,
    key: &str,
    default: Option<&str>,
    path: &str,
    field: &str,
) -> HotconfResult<()> {
    let Some(raw) = resolve(snapshot, key, default) else {
        return Ok(());
    };
    *target = T::from_config_value(raw)
        .map_err(|reason| HotconfError::bind(format!("{path}.{field}"), key, raw, reason))?;
    Ok(())
}
