//! Parsing of `#[bind(...)]` attributes.

use proc_macro2::TokenStream;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::{Attribute, Data, DeriveInput, Fields, Ident, LitStr};

mod literals;

use literals::lit_str;

/// Struct-level attributes.
#[derive(Default)]
pub(crate) struct StructAttrs {
    /// Overrides the generated crate path for dependency aliasing.
    pub crate_path: Option<syn::Path>,
}

impl StructAttrs {
    /// Tokens prefixing every runtime item the generated code names.
    ///
    /// Generated impls call `hotconf::bind_leaf` and `hotconf::Bind` by
    /// path, so a crate that depends on `hotconf` under another name (for
    /// example `config = { package = "hotconf", .. }`) declares
    /// `#[bind(crate = "config")]` and every path is emitted as `config::..`.
    /// Inside `hotconf` itself the default resolves through
    /// `extern crate self as hotconf`.
    pub(crate) fn runtime_path(&self) -> TokenStream {
        self.crate_path
            .as_ref()
            .map_or_else(|| quote! { hotconf }, |path| quote! { #path })
    }
}

/// Field-level attributes.
#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub key: Option<LitStr>,
    pub default: Option<LitStr>,
    pub nested: bool,
}

/// How a single field participates in binding.
pub(crate) enum FieldBinding {
    Leaf { key: LitStr, default: Option<LitStr> },
    Nested,
    Skip,
}

pub(crate) struct BindField {
    pub ident: Ident,
    pub binding: FieldBinding,
}

pub(crate) struct BindInput {
    pub struct_attrs: StructAttrs,
    pub fields: Vec<BindField>,
}

/// Iterate all `#[bind(...)]` attributes once and apply a callback.
fn parse_bind<F>(attrs: &[Attribute], mut f: F) -> syn::Result<()>
where
    F: FnMut(&ParseNestedMeta) -> syn::Result<()>,
{
    for attr in attrs.iter().filter(|a| a.path().is_ident("bind")) {
        attr.parse_nested_meta(|meta| f(&meta))?;
    }
    Ok(())
}

fn unknown(meta: &ParseNestedMeta, allowed: &str) -> syn::Error {
    let name = meta
        .path
        .get_ident()
        .map_or_else(|| String::from("?"), ToString::to_string);
    meta.error(format!("unknown bind attribute `{name}`; expected {allowed}"))
}

/// Extracts `#[bind(...)]` metadata applied to a struct.
///
/// Only `crate` is recognised; any other key is a compile error.
pub(crate) fn parse_struct_attrs(attrs: &[Attribute]) -> syn::Result<StructAttrs> {
    let mut out = StructAttrs::default();
    parse_bind(attrs, |meta| {
        if meta.path.is_ident("crate") {
            if out.crate_path.is_some() {
                return Err(meta.error("duplicate `crate` override"));
            }
            let s = lit_str(meta, "crate")?;
            let path: syn::Path =
                syn::parse_str(&s.value()).map_err(|e| syn::Error::new(s.span(), e))?;
            out.crate_path = Some(path);
            Ok(())
        } else {
            Err(unknown(meta, "`crate`"))
        }
    })?;
    Ok(out)
}

/// Extracts `#[bind(...)]` metadata applied to a field.
pub(crate) fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    parse_bind(attrs, |meta| {
        match meta.path.get_ident().map(ToString::to_string).as_deref() {
            Some("key") => out.key = Some(lit_str(meta, "key")?),
            Some("default") => out.default = Some(lit_str(meta, "default")?),
            Some("nested") => out.nested = true,
            _ => return Err(unknown(meta, "`key`, `default` or `nested`")),
        }
        Ok(())
    })?;
    Ok(out)
}

impl FieldAttrs {
    /// Validate attribute combinations and classify the field.
    fn into_binding(self, field: &Ident) -> syn::Result<FieldBinding> {
        match (self.key, self.default, self.nested) {
            (Some(key), _, true) => Err(syn::Error::new(
                key.span(),
                format!("field `{field}` cannot combine `key` with `nested`"),
            )),
            (None, Some(default), _) => Err(syn::Error::new(
                default.span(),
                format!("field `{field}` has a `default` but no `key`"),
            )),
            (Some(key), default, false) => Ok(FieldBinding::Leaf { key, default }),
            (None, None, true) => Ok(FieldBinding::Nested),
            (None, None, false) => Ok(FieldBinding::Skip),
        }
    }
}

/// Gathers the struct attributes and classified fields.
///
/// Rejects enums, unions, tuple structs and unit structs.
pub(crate) fn parse_input(input: &DeriveInput) -> syn::Result<BindInput> {
    let struct_attrs = parse_struct_attrs(&input.attrs)?;
    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            Fields::Unnamed(_) | Fields::Unit => {
                return Err(syn::Error::new_spanned(
                    data.struct_token,
                    "Bind requires a struct with named fields",
                ));
            }
        },
        Data::Enum(_) | Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Bind can only be derived for structs",
            ));
        }
    };

    let mut fields = Vec::with_capacity(named.len());
    for field in named {
        let Some(ident) = field.ident.clone() else {
            return Err(syn::Error::new_spanned(field, "Bind requires named fields"));
        };
        let binding = parse_field_attrs(&field.attrs)?.into_binding(&ident)?;
        fields.push(BindField { ident, binding });
    }
    Ok(BindInput {
        struct_attrs,
        fields,
    })
}
