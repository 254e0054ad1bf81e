//! Procedural macros for `hotconf`.
//!
//! [`Bind`](macro@Bind) generates the field walk that projects a
//! configuration snapshot onto a struct, so binding needs no runtime
//! reflection.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod derive;

/// Derive `hotconf::Bind` for a struct with named fields.
///
/// Field attributes:
///
/// - `#[bind(key = "KEY")]` binds the field from `KEY`;
/// - `#[bind(key = "KEY", default = "literal")]` falls back to `literal`
///   when `KEY` is absent or empty;
/// - `#[bind(nested)]` binds a field whose type also derives `Bind`.
///
/// Fields without attributes are left untouched. The struct-level
/// `#[bind(crate = "path")]` attribute points generated code at a renamed
/// dependency.
#[proc_macro_derive(Bind, attributes(bind))]
pub fn derive_bind(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive::expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
