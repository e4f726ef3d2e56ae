extern crate proc_macro;
use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DataStruct, DeriveInput, Fields};

mod helper;

/// Derives `<Struct>Builder` for test fixtures: `create()` starts from defaults,
/// one `with_<field>` setter per field, `build()` produces the struct.
#[proc_macro_derive(TestBuilder, attributes(builder))]
pub fn test_builder_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    let builder_name = format_ident!("{}Builder", struct_name);

    let Data::Struct(DataStruct {
        fields: Fields::Named(fields),
        ..
    }) = &input.data
    else {
        return Err(syn::Error::new_spanned(
            struct_name,
            "TestBuilder only supports structs with named fields",
        ));
    };

    let mut builder_fields = Vec::new();
    let mut defaults = Vec::new();
    let mut setters = Vec::new();
    let mut moves = Vec::new();
    for field in &fields.named {
        let Some(name) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let options = helper::field_options(&field.attrs)?;
        let default = options
            .default
            .unwrap_or_else(|| quote! { ::core::default::Default::default() });
        let setter = helper::setter_name(name);

        builder_fields.push(quote! { #name: #ty });
        defaults.push(quote! { #name: #default });
        setters.push(if options.into {
            quote! {
                pub fn #setter(mut self, #name: impl ::core::convert::Into<#ty>) -> Self {
                    self.#name = #name.into();
                    self
                }
            }
        } else {
            quote! {
                pub fn #setter(mut self, #name: #ty) -> Self {
                    self.#name = #name;
                    self
                }
            }
        });
        moves.push(quote! { #name: self.#name });
    }

    Ok(quote! {
        pub struct #builder_name {
            #(#builder_fields,)*
        }

        impl #builder_name {
            pub fn create() -> Self {
                Self { #(#defaults,)* }
            }

            #(#setters)*

            pub fn build(self) -> #struct_name {
                #struct_name {
                    #(#moves,)*
                }
            }
        }
    })
}
