use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, ToTokens};
use syn::{Attribute, Meta};

/// Options read from the `#[builder(...)]` attributes of one field.
pub struct FieldOptions {
    /// Expression used as the initial value instead of `Default::default()`.
    pub default: Option<TokenStream>,
    /// true iff the setter accepts anything convertible into the field type.
    pub into: bool,
}

pub fn field_options(attrs: &[Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions {
        default: None,
        into: false,
    };
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("builder")) {
        match attr.parse_args::<Meta>()? {
            Meta::NameValue(pair) if pair.path.is_ident("default") => {
                options.default = Some(pair.value.to_token_stream());
            }
            Meta::Path(path) if path.is_ident("into") => options.into = true,
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "expected `#[builder(default = <expr>)]` or `#[builder(into)]`",
                ))
            }
        }
    }
    Ok(options)
}

/// `with_<field>`, raw identifiers included (`r#type` gives `with_type`).
pub fn setter_name(field: &Ident) -> Ident {
    let name = field.to_string();
    format_ident!("with_{}", name.trim_start_matches("r#"))
}
