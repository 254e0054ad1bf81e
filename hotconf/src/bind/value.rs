//! Coercion of snapshot strings into typed field values.

use std::time::Duration;

use super::duration::parse_duration;

/// Types a bound field may have.
///
/// Implemented for `String`, every primitive integer, `bool`, `f32`, `f64`,
/// [`Duration`] and `Option<T>` of any of those. The error is a
/// human-readable reason; the binder attaches the field, key and raw value.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use hotconf::FromConfigValue;
///
/// assert_eq!(u16::from_config_value("8080"), Ok(8080));
/// assert_eq!(bool::from_config_value("T"), Ok(true));
/// assert_eq!(Duration::from_config_value("5m"), Ok(Duration::from_secs(300)));
/// ```
pub trait FromConfigValue: Sized {
    /// Parse `raw` into `Self`.
    ///
    /// # Errors
    ///
    /// Returns the reason `raw` is not a valid value of this type.
    fn from_config_value(raw: &str) -> Result<Self, String>;
}

impl FromConfigValue for String {
    fn from_config_value(raw: &str) -> Result<Self, String> {
        Ok(raw.to_owned())
    }
}

macro_rules! impl_from_str_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromConfigValue for $ty {
                fn from_config_value(raw: &str) -> Result<Self, String> {
                    raw.parse::<$ty>().map_err(|err| err.to_string())
                }
            }
        )*
    };
}

impl_from_str_value!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
);

impl FromConfigValue for bool {
    fn from_config_value(raw: &str) -> Result<Self, String> {
        match raw {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            other => Err(format!("'{other}' is not a boolean literal")),
        }
    }
}

impl FromConfigValue for Duration {
    fn from_config_value(raw: &str) -> Result<Self, String> {
        parse_duration(raw)
    }
}

impl<T: FromConfigValue> FromConfigValue for Option<T> {
    fn from_config_value(raw: &str) -> Result<Self, String> {
        T::from_config_value(raw).map(Some)
    }
}
