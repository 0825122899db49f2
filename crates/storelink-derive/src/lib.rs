//! Derive macro for storelink record schemas
//!
//! `#[derive(Record)]` builds the per-type [`RecordSchema`] once and generates
//! the field setter the binder calls for each coerced value.
//!
//! # Example
//!
//! ```rust,ignore
//! use storelink::Record;
//!
//! #[derive(Debug, Default, Record)]
//! pub struct User {
//!     pub id: u64,
//!     #[record(column = "user_name", not_empty)]
//!     pub name: String,
//!     #[record(default = "member")]
//!     pub role: String,
//!     pub last_login: Option<chrono::NaiveDateTime>,
//!     #[record(skip)]
//!     pub session: Vec<u8>,
//! }
//! ```
//!
//! [`RecordSchema`]: https://docs.rs/storelink/latest/storelink/bind/struct.RecordSchema.html

use darling::{ast, FromDeriveInput, FromField};
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, GenericArgument, PathArguments, Type};

/// Field kinds the binder can populate, by last path segment
const SUPPORTED_TYPES: &[&str] = &[
    "String",
    "bool",
    "i8",
    "i16",
    "i32",
    "i64",
    "isize",
    "u8",
    "u16",
    "u32",
    "u64",
    "usize",
    "f32",
    "f64",
    "NaiveDateTime",
    "DateTime",
];

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(record), supports(struct_named))]
struct RecordAttrs {
    ident: syn::Ident,
    generics: syn::Generics,
    data: ast::Data<(), RecordField>,
}

#[derive(Debug, FromField)]
#[darling(attributes(record))]
struct RecordField {
    ident: Option<syn::Ident>,
    ty: Type,
    /// Source column, used verbatim
    #[darling(default)]
    column: Option<String>,
    /// Substituted when the column is absent or empty
    #[darling(default)]
    default: Option<String>,
    /// Fail the row when the resolved value is empty
    #[darling(default)]
    not_empty: bool,
    /// Never bound
    #[darling(default)]
    skip: bool,
}

/// Derive `storelink::bind::Record`
///
/// # Attributes
///
/// - `#[record(column = "...")]` - Source column (default: lower-cased field name)
/// - `#[record(default = "...")]` - Value used when the column is absent or empty
/// - `#[record(not_empty)]` - Fail the bind if the resolved value is empty
/// - `#[record(skip)]` - Never bind this field
///
/// Field types are mapped by their last path segment; `Option<T>` marks the
/// field optional. Types the binder cannot populate fail at bind time with an
/// unsupported-kind error unless the field is skipped.
///
/// Generic structs are rejected: the schema is a single static per impl.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    TokenStream::from(expand_record(&input))
}

fn expand_record(input: &DeriveInput) -> proc_macro2::TokenStream {
    let attrs = match RecordAttrs::from_derive_input(input) {
        Ok(v) => v,
        Err(e) => return e.write_errors(),
    };

    if !attrs.generics.params.is_empty() {
        return darling::Error::custom(
            "#[derive(Record)] does not support generic structs; the schema is shared by every instantiation",
        )
        .with_span(&attrs.generics)
        .write_errors();
    }

    let struct_name = &attrs.ident;
    let type_name = struct_name.to_string();

    let fields = attrs
        .data
        .take_struct()
        .map(|fields| fields.fields)
        .unwrap_or_default();

    let mut specs: Vec<proc_macro2::TokenStream> = Vec::with_capacity(fields.len());
    let mut arms: Vec<proc_macro2::TokenStream> = Vec::with_capacity(fields.len());

    for (index, field) in fields.iter().enumerate() {
        let Some(ident) = &field.ident else {
            continue;
        };
        let name = ident.to_string();
        let (inner, optional) = unwrap_option(&field.ty);
        let kind = type_kind_name(inner);

        let column_code = match &field.column {
            Some(column) => quote! { .with_column(#column) },
            None => quote! {},
        };
        let default_code = match &field.default {
            Some(default) => quote! { .with_default(#default) },
            None => quote! {},
        };
        let not_empty_code = if field.not_empty {
            quote! { .not_empty() }
        } else {
            quote! {}
        };
        let skip_code = if field.skip {
            quote! { .skip() }
        } else {
            quote! {}
        };
        let optional_code = if optional {
            quote! { .optional() }
        } else {
            quote! {}
        };

        specs.push(quote! {
            ::storelink::bind::FieldSpec::new(
                #name,
                ::storelink::bind::FieldKind::from_type_name(#kind),
            )
            #column_code
            #default_code
            #not_empty_code
            #skip_code
            #optional_code
        });

        if field.skip {
            continue;
        }

        if SUPPORTED_TYPES.contains(&kind.as_str()) {
            arms.push(quote! {
                #index => {
                    self.#ident = ::storelink::bind::FromFieldValue::from_field_value(value, #name)?;
                }
            });
        } else {
            arms.push(quote! {
                #index => {
                    return ::std::result::Result::Err(::storelink::BindError::Unsupported {
                        field: #name.to_string(),
                        kind: #kind.to_string(),
                    });
                }
            });
        }
    }

    quote! {
        impl ::storelink::bind::Record for #struct_name {
            fn schema() -> &'static ::storelink::bind::RecordSchema {
                static SCHEMA: ::std::sync::OnceLock<::storelink::bind::RecordSchema> =
                    ::std::sync::OnceLock::new();
                SCHEMA.get_or_init(|| {
                    ::storelink::bind::RecordSchema::builder(#type_name)
                        #( .field(#specs) )*
                        .build()
                })
            }

            #[allow(unused_variables, unreachable_code)]
            fn set_field(
                &mut self,
                index: usize,
                value: ::storelink::bind::FieldValue,
            ) -> ::std::result::Result<(), ::storelink::BindError> {
                match index {
                    #( #arms )*
                    _ => {}
                }
                ::std::result::Result::Ok(())
            }
        }
    }
}

/// `Option<T>` -> (`T`, true); anything else -> (itself, false)
fn unwrap_option(ty: &Type) -> (&Type, bool) {
    if let Type::Path(path) = ty {
        if let Some(segment) = path.path.segments.last() {
            if segment.ident == "Option" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return (inner, true);
                    }
                }
            }
        }
    }
    (ty, false)
}

fn type_kind_name(ty: &Type) -> String {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string())
            .unwrap_or_default(),
        other => quote!(#other).to_string(),
    }
}
