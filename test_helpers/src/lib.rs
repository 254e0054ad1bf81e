//! Test helpers shared across crates in the `hotconf` workspace.
//!
//! - [`env`]: RAII guards for mutating process environment variables.
//! - [`fs`]: temporary directories for file-source fixtures.

pub mod env;
pub mod fs;
