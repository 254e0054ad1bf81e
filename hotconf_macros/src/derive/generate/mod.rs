//! Token generation for the `Bind` implementation.

use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

use super::parse::{BindField, BindInput, FieldBinding};


/// Emit one binding step for `field`, or nothing when it is skipped.
fn field_step(field: &BindField, krate: &TokenStream) -> Option<TokenStream> {
    let ident = &field.ident;
    let name = ident.to_string();
    match &field.binding {
        FieldBinding::Leaf { key, default } => {
            let default_tokens = default.as_ref().map_or_else(
                || quote! { ::core::option::Option::None },
                |lit| quote! { ::core::option::Option::Some(#lit) },
            );
            Some(quote! {
                #krate::bind_leaf(
                    &mut self.#ident,
                    snapshot,
                    #key,
                    #default_tokens,
                    path,
                    #name,
                )?;
            })
        }
        FieldBinding::Nested => Some(quote! {
            #krate::Bind::bind_at(
                &mut self.#ident,
                snapshot,
                &::std::format!("{}.{}", path, #name),
            )?;
        }),
        FieldBinding::Skip => None,
    }
}

/// Build the `impl Bind` block for the derived struct.
///
/// `bind` roots error paths at the struct name; `bind_at` extends whatever
/// path the enclosing struct passes down.
pub(crate) fn bind_impl(
    input: &DeriveInput,
    parsed: &BindInput,
    krate: &TokenStream,
) -> TokenStream {
    let ident = &input.ident;
    let root = ident.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let steps: Vec<TokenStream> = parsed
        .fields
        .iter()
        .filter_map(|field| field_step(field, krate))
        .collect();
    let unused = steps.is_empty().then(|| quote! { let _ = (snapshot, path); });

    quote! {
        impl #impl_generics #krate::Bind for #ident #ty_generics #where_clause {
            fn bind(
                &mut self,
                snapshot: &#krate::Snapshot,
            ) -> #krate::HotconfResult<()> {
                #krate::Bind::bind_at(self, snapshot, #root)
            }

            fn bind_at(
                &mut self,
                snapshot: &#krate::Snapshot,
                path: &str,
            ) -> #krate::HotconfResult<()> {
                #unused
                #( #steps )*
                ::core::result::Result::Ok(())
            }
        }
    }
}
