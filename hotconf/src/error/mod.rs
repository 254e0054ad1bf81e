//! Error types produced by the configuration manager.

mod constructors;
mod types;

pub use types::HotconfError;
