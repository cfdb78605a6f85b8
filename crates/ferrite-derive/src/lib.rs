//! Derive macro for ferrite entity mapping tables.
//!
//! This crate provides the `#[derive(Entity)]` macro that generates the
//! static member/column mapping table consumed by `ferrite-orm`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Expr, Fields, GenericArgument, Ident, Lit, Meta, PathArguments,
    Type, parse_macro_input,
};

/// Derives the `Entity` trait for a struct, generating its mapping table
/// and row conversion code.
///
/// # Attributes
///
/// - `#[entity(table = "table_name")]` - Specifies the SQL table name
///   (optional, defaults to snake_case of the struct name)
///
/// # Field Attributes
///
/// - `#[field(primary_key)]` - Marks the field as the primary key
///   (exactly one field must carry it)
/// - `#[field(auto)]` - Marks the primary key as database-generated,
///   excluding it from INSERT column lists
/// - `#[field(column = "column_name")]` - Overrides the physical column
///   name (optional, defaults to snake_case of the field name)
/// - `#[field(references = "table_name")]` - Declares a foreign key to
///   another entity's table, used for save-batch ordering
///
/// A field typed `Option<T>` is nullable; every other field is required.
#[proc_macro_derive(Entity, attributes(entity, field))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_entity_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_entity_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let table_name = get_table_name(&input.attrs, struct_name)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity derive only supports structs",
            ));
        }
    };

    let mut members: Vec<MemberInfo> = Vec::new();
    for field in fields {
        let field_name = field.ident.as_ref().unwrap();
        let attrs = parse_field_attrs(&field.attrs)?;

        members.push(MemberInfo {
            field_name: field_name.clone(),
            column_override: attrs.column,
            primary_key: attrs.primary_key,
            auto: attrs.auto,
            required: !is_option(&field.ty),
            references: attrs.references,
        });
    }

    let pk_count = members.iter().filter(|m| m.primary_key).count();
    if pk_count != 1 {
        return Err(syn::Error::new_spanned(
            &input,
            format!("Entity derive requires exactly one #[field(primary_key)] field, found {pk_count}"),
        ));
    }
    let pk_field = &members
        .iter()
        .find(|m| m.primary_key)
        .unwrap()
        .field_name;

    let column_entries: Vec<TokenStream2> = members
        .iter()
        .map(|m| {
            let member = m.field_name.to_string();
            let column_override = match &m.column_override {
                Some(name) => quote! { Some(#name) },
                None => quote! { None },
            };
            let primary_key = m.primary_key;
            let auto = m.auto;
            let required = m.required;
            quote! {
                ::ferrite_orm::ColumnMeta {
                    member: #member,
                    column_override: #column_override,
                    primary_key: #primary_key,
                    auto: #auto,
                    required: #required,
                }
            }
        })
        .collect();

    let fk_entries: Vec<TokenStream2> = members
        .iter()
        .filter_map(|m| {
            m.references.as_ref().map(|table| {
                let member = m.field_name.to_string();
                quote! {
                    ::ferrite_orm::ForeignKeyMeta {
                        member: #member,
                        references: #table,
                    }
                }
            })
        })
        .collect();

    let from_row_fields: Vec<TokenStream2> = members
        .iter()
        .map(|m| {
            let field = &m.field_name;
            let member = m.field_name.to_string();
            quote! {
                #field: ::ferrite_orm::mapper::member_from_row(row, map, #member)?
            }
        })
        .collect();

    let to_row_entries: Vec<TokenStream2> = members
        .iter()
        .map(|m| {
            let field = &m.field_name;
            let member = m.field_name.to_string();
            quote! {
                (#member, ::ferrite_orm::ToSqlValue::to_sql_value(self.#field.clone()))
            }
        })
        .collect();

    let expanded = quote! {
        impl ::ferrite_orm::Entity for #struct_name {
            const META: &'static ::ferrite_orm::EntityMeta = &::ferrite_orm::EntityMeta {
                table: #table_name,
                columns: &[#(#column_entries),*],
                foreign_keys: &[#(#fk_entries),*],
            };

            fn from_row(row: &::ferrite_orm::Row) -> ::std::result::Result<Self, ::ferrite_orm::OrmError> {
                let map = ::ferrite_orm::mapper::column_map::<Self>();
                Ok(Self {
                    #(#from_row_fields),*
                })
            }

            fn to_row(&self) -> ::std::vec::Vec<(&'static str, ::ferrite_orm::SqlValue)> {
                vec![
                    #(#to_row_entries),*
                ]
            }

            fn primary_key(&self) -> ::ferrite_orm::SqlValue {
                ::ferrite_orm::ToSqlValue::to_sql_value(self.#pk_field.clone())
            }
        }
    };

    Ok(expanded)
}

struct MemberInfo {
    field_name: Ident,
    column_override: Option<String>,
    primary_key: bool,
    auto: bool,
    required: bool,
    references: Option<String>,
}

struct FieldAttrs {
    column: Option<String>,
    primary_key: bool,
    auto: bool,
    references: Option<String>,
}

fn get_table_name(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<String> {
    for attr in attrs {
        if attr.path().is_ident("entity") {
            let mut table_name = None;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    let value: Expr = meta.value()?.parse()?;
                    if let Expr::Lit(lit) = value {
                        if let Lit::Str(s) = lit.lit {
                            table_name = Some(s.value());
                        }
                    }
                }
                Ok(())
            })?;
            if let Some(name) = table_name {
                return Ok(name);
            }
        }
    }
    // Default to snake_case of struct name
    Ok(to_snake_case(&struct_name.to_string()))
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs {
        column: None,
        primary_key: false,
        auto: false,
        references: None,
    };

    for attr in attrs {
        if attr.path().is_ident("field") {
            // Handle empty attribute like #[field]
            if matches!(attr.meta, Meta::Path(_)) {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("primary_key") {
                    result.primary_key = true;
                } else if meta.path.is_ident("auto") {
                    result.auto = true;
                } else if meta.path.is_ident("column") {
                    let value: Expr = meta.value()?.parse()?;
                    if let Expr::Lit(lit) = value {
                        if let Lit::Str(s) = lit.lit {
                            result.column = Some(s.value());
                        }
                    }
                } else if meta.path.is_ident("references") {
                    let value: Expr = meta.value()?.parse()?;
                    if let Expr::Lit(lit) = value {
                        if let Lit::Str(s) = lit.lit {
                            result.references = Some(s.value());
                        }
                    }
                }
                Ok(())
            })?;
        }
    }

    Ok(result)
}

fn is_option(ty: &Type) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };
    let Some(segment) = path.path.segments.last() else {
        return false;
    };
    if segment.ident != "Option" {
        return false;
    }
    matches!(
        &segment.arguments,
        PathArguments::AngleBracketed(args)
            if args.args.iter().any(|a| matches!(a, GenericArgument::Type(_)))
    )
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
