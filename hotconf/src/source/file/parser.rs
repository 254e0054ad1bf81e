//! Format-specific parsing of configuration files.

use std::sync::Arc;

use camino::Utf8Path;
use serde_json::Value as JsonValue;

use crate::HotconfError;

use super::FileFormat;

/// Parse `data` as `format` into a JSON tree.
///
/// TOML and JSON go through Figment providers; YAML uses `serde-saphyr` with
/// strict boolean semantics. A format whose cargo feature is disabled is
/// reported as a file error rather than silently parsed as something else.
///
/// # Errors
///
/// Returns a [`HotconfError::File`] when the contents fail to parse.
pub(super) fn parse(
    path: &Utf8Path,
    format: FileFormat,
    data: &str,
) -> Result<JsonValue, Arc<HotconfError>> {
    match format {
        FileFormat::Toml => parse_toml(path, data),
        FileFormat::Json => parse_json(path, data),
        FileFormat::Yaml => parse_yaml(path, data),
    }
}

#[cfg(feature = "toml")]
fn parse_toml(path: &Utf8Path, data: &str) -> Result<JsonValue, Arc<HotconfError>> {
    use figment::{
        Figment,
        providers::{Format, Toml},
    };

    // Validate with `toml` first so syntax errors carry line information
    // before Figment performs its own parse pass.
    toml::from_str::<toml::Value>(data).map_err(|e| HotconfError::file(path, e))?;
    Figment::from(Toml::string(data))
        .extract::<JsonValue>()
        .map_err(|e| HotconfError::file(path, e))
}

#[cfg(not(feature = "toml"))]
fn parse_toml(path: &Utf8Path, _data: &str) -> Result<JsonValue, Arc<HotconfError>> {
    Err(disabled(path, "toml"))
}

#[cfg(feature = "json")]
fn parse_json(path: &Utf8Path, data: &str) -> Result<JsonValue, Arc<HotconfError>> {
    use figment::{
        Figment,
        providers::{Format, Json},
    };

    // Figment accepts any JSON value at the root; reject non-objects here so
    // the error names the file instead of a profile.
    let parsed: JsonValue = serde_json::from_str(data).map_err(|e| HotconfError::file(path, e))?;
    if !parsed.is_object() {
        return Err(HotconfError::file(
            path,
            "document root must be a table of keys",
        ));
    }
    Figment::from(Json::string(data))
        .extract::<JsonValue>()
        .map_err(|e| HotconfError::file(path, e))
}

#[cfg(not(feature = "json"))]
fn parse_json(path: &Utf8Path, _data: &str) -> Result<JsonValue, Arc<HotconfError>> {
    Err(disabled(path, "json"))
}

#[cfg(feature = "yaml")]
fn parse_yaml(path: &Utf8Path, data: &str) -> Result<JsonValue, Arc<HotconfError>> {
    serde_saphyr::from_str_with_options(
        data,
        serde_saphyr::Options {
            strict_booleans: true,
            ..serde_saphyr::Options::default()
        },
    )
    .map_err(|e| HotconfError::file(path, e))
}

#[cfg(not(feature = "yaml"))]
fn parse_yaml(path: &Utf8Path, _data: &str) -> Result<JsonValue, Arc<HotconfError>> {
    Err(disabled(path, "yaml"))
}

#[cfg(any(not(feature = "toml"), not(feature = "json"), not(feature = "yaml")))]
fn disabled(path: &Utf8Path, feature: &str) -> Arc<HotconfError> {
    HotconfError::file(
        path,
        std::io::Error::other(format!(
            "{feature} feature disabled: enable the '{feature}' feature to support this file format"
        )),
    )
}
