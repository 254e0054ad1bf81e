//! Expansion of `#[derive(Bind)]`.

use proc_macro2::TokenStream;
use syn::DeriveInput;

mod generate;
mod parse;

/// Parse `input` and emit the `Bind` implementation.
pub(crate) fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let parsed = parse::parse_input(input)?;
    let krate = parsed.struct_attrs.runtime_path();
    Ok(generate::bind_impl(input, &parsed, &krate))
}
