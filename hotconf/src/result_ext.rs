//! Extensions for mapping errors to `HotconfResult` concisely.
//!
//! These helpers reduce repetitive `.map_err(|e| Arc::new(...))` patterns
//! when converting external error types into the crate's
//! `HotconfResult<T>` alias (`Result<T, Arc<HotconfError>>`).
//!
//! # Examples
//!
//! ```
//! use hotconf::{HotconfResult, HotconfResultExt};
//!
//! fn parse_port(raw: &str) -> HotconfResult<u16> {
//!     raw.parse::<u16>().into_hotconf()
//! }
//!
//! assert!(parse_port("8080").is_ok());
//! assert!(parse_port("eighty").is_err());
//! ```

use std::error::Error;
use std::sync::Arc;

use crate::{HotconfError, HotconfResult};

/// Generic extension mapping any `Result<T, E>` into a `HotconfResult<T>`.
pub trait HotconfResultExt<T> {
    /// Convert the error into [`HotconfError::Custom`] wrapped in `Arc`.
    ///
    /// # Errors
    ///
    /// Propagates the original error after conversion.
    fn into_hotconf(self) -> HotconfResult<T>;
}

impl<T, E> HotconfResultExt<T> for Result<T, E>
where
    E: Error + Send + Sync + 'static,
{
    fn into_hotconf(self) -> HotconfResult<T> {
        self.map_err(|e| Arc::new(HotconfError::custom(e)))
    }
}
