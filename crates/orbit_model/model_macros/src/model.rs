//! Derive macro for persistent models.

use darling::{FromDeriveInput, FromField, ast};
use proc_macro::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{DeriveInput, parse_macro_input};

/// Parsed field attributes.
#[derive(FromField)]
#[darling(attributes(model), forward_attrs(serde))]
struct FieldArgs {
    ident: Option<syn::Ident>,
    attrs: Vec<syn::Attribute>,

    /// Marks the primary key field.
    #[darling(default)]
    primary_key: bool,
}

/// Parsed struct attributes.
#[derive(FromDeriveInput)]
#[darling(attributes(model), supports(struct_named))]
struct ModelArgs {
    ident: syn::Ident,
    generics: syn::Generics,
    data: ast::Data<(), FieldArgs>,

    /// Storage table. Defaults to the struct name in `snake_case`.
    table: Option<String>,

    /// Dispatcher kind for this model's channel.
    dispatcher: Option<String>,
}

/// Implementation of the `#[derive(Model)]` macro.
pub(crate) fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let args = match ModelArgs::from_derive_input(&input) {
        Ok(args) => args,
        Err(err) => return err.write_errors().into(),
    };

    match expand(&args) {
        Ok(expanded) => expanded.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(args: &ModelArgs) -> syn::Result<proc_macro2::TokenStream> {
    let name = &args.ident;
    let (impl_generics, ty_generics, where_clause) = args.generics.split_for_impl();

    let key = primary_key_field(args)?;
    let key_column = key.unraw().to_string();
    let table = args
        .table
        .clone()
        .unwrap_or_else(|| snake_case(&name.unraw().to_string()));
    let dispatcher = match &args.dispatcher {
        Some(kind) => quote!(::core::option::Option::Some(#kind)),
        None => quote!(::core::option::Option::None),
    };

    let model_crate = orbit_macro_utils::resolve_crate_path(orbit_macro_utils::OrbitCrate::Model);
    let apply_row = apply_row_body(args, &model_crate)?;

    Ok(quote! {
        impl #impl_generics #model_crate::EventDispatcherAware for #name #ty_generics #where_clause {
            fn model_name() -> &'static str {
                ::core::concat!(::core::module_path!(), "::", ::core::stringify!(#name))
            }

            fn dispatcher_kind() -> ::core::option::Option<&'static str> {
                #dispatcher
            }
        }

        impl #impl_generics #model_crate::Record for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;
            const PRIMARY_KEY: &'static str = #key_column;

            fn primary_key(&self) -> ::core::option::Option<i64> {
                self.#key
            }

            fn set_primary_key(&mut self, key: i64) {
                self.#key = ::core::option::Option::Some(key);
            }

            fn apply_row(
                &mut self,
                row: #model_crate::Row,
            ) -> ::core::result::Result<(), #model_crate::StorageError> {
                #apply_row
                ::core::result::Result::Ok(())
            }
        }
    })
}

/// Returns the field marked `#[model(primary_key)]`, or the field named `id`.
fn primary_key_field(args: &ModelArgs) -> syn::Result<&syn::Ident> {
    let ast::Data::Struct(fields) = &args.data else {
        return Err(syn::Error::new_spanned(
            &args.ident,
            "#[derive(Model)] only supports structs with named fields",
        ));
    };

    let marked: Vec<&FieldArgs> = fields.iter().filter(|field| field.primary_key).collect();
    let field = match marked.as_slice() {
        [field] => *field,
        [] => fields
            .iter()
            .find(|field| field.ident.as_ref().is_some_and(|ident| ident == "id"))
            .ok_or_else(|| {
                syn::Error::new_spanned(
                    &args.ident,
                    "#[derive(Model)] needs a field named `id` or a field marked #[model(primary_key)]",
                )
            })?,
        [_, second, ..] => {
            return Err(syn::Error::new_spanned(
                &second.ident,
                "only one field may be marked #[model(primary_key)]",
            ));
        }
    };

    field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(&args.ident, "primary key field must be named"))
}

/// Deserializes the row once, then moves every deserialized field into
/// `self` so skipped fields keep their values.
fn apply_row_body(
    args: &ModelArgs,
    model_crate: &proc_macro2::TokenStream,
) -> syn::Result<proc_macro2::TokenStream> {
    let ast::Data::Struct(fields) = &args.data else {
        return Ok(proc_macro2::TokenStream::new());
    };

    let mut assigned = Vec::new();
    for field in fields.iter() {
        if is_skipped(&field.attrs)? {
            continue;
        }
        if let Some(ident) = &field.ident {
            assigned.push(ident);
        }
    }

    if assigned.is_empty() {
        return Ok(quote! {
            let _: Self = <Self as #model_crate::Record>::from_row(row)?;
        });
    }
    Ok(quote! {
        let fresh: Self = <Self as #model_crate::Record>::from_row(row)?;
        #( self.#assigned = fresh.#assigned; )*
    })
}

/// Returns `true` if a `#[serde(...)]` attribute keeps the field out of
/// deserialization.
fn is_skipped(attrs: &[syn::Attribute]) -> syn::Result<bool> {
    let mut skipped = false;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                skipped = true;
            }
            // Consume values of every other option, e.g. `rename = "..."` or `bound(...)`
            if meta.input.peek(syn::Token![=]) {
                meta.value()?.parse::<syn::Expr>()?;
            } else if meta.input.peek(syn::token::Paren) {
                meta.input.parse::<proc_macro2::TokenTree>()?;
            }
            Ok(())
        })?;
    }
    Ok(skipped)
}

/// Converts `UpperCamelCase` to `snake_case`.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{is_skipped, snake_case};
    use syn::parse_quote;

    #[test]
    fn snake_case_conversion() {
        assert_eq!(snake_case("Post"), "post");
        assert_eq!(snake_case("ForumThread"), "forum_thread");
        assert_eq!(snake_case("Post2Tag"), "post2_tag");
        assert_eq!(snake_case("HTTPLog"), "httplog");
    }

    #[test]
    fn serde_skip_detection() {
        let skipped: syn::Attribute = parse_quote!(#[serde(default, skip)]);
        assert!(is_skipped(&[skipped]).unwrap());

        let one_way: syn::Attribute = parse_quote!(#[serde(skip_deserializing)]);
        assert!(is_skipped(&[one_way]).unwrap());

        let renamed: syn::Attribute =
            parse_quote!(#[serde(rename = "body", skip_serializing_if = "String::is_empty")]);
        assert!(!is_skipped(&[renamed]).unwrap());
    }
}
