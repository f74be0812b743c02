//! Derive macro for wiring-injector
//!
//! `#[derive(Describe)]` implements `wiring_injector::Describe` for a struct
//! with named fields. The generated metadata has one constructor whose
//! arguments are the `#[inject]` fields, in declaration order; every other
//! field is filled with `Default::default()`.
//!
//! # Field attributes
//!
//! - `#[inject]` - `Arc<T>` or `Arc<dyn Trait>`, required
//! - `#[inject(optional)]` - `Option<Arc<T>>`, `None` when nothing matches
//! - `#[inject(all)]` - `Vec<Arc<T>>`, every compatible component
//!
//! # Type attributes
//!
//! - `#[describe(lifecycle)]` - wire the type's `Lifecycle` implementation
//! - `#[describe(implements(dyn A, dyn B))]` - make the type assignable to interfaces
//! - `#[describe(extends(Base))]` - declare a hierarchy level above the type
//!
//! # Example
//!
//! ```rust,ignore
//! use wiring_injector::{Container, Describe, Lookup};
//! use std::sync::Arc;
//!
//! struct Database;
//!
//! trait Cache: Send + Sync {}
//!
//! #[derive(Describe)]
//! #[describe(lifecycle)]
//! struct UserService {
//!     #[inject]
//!     db: Arc<Database>,
//!     #[inject(optional)]
//!     cache: Option<Arc<dyn Cache>>,
//!     // Non-injected fields use Default
//!     request_count: u64,
//! }
//!
//! let container = Container::new();
//! container.singleton(Database).unwrap();
//! container.register_type::<UserService>().unwrap();
//!
//! let service = container.get::<UserService>().unwrap();
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::parse::Parse;
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, GenericArgument, PathArguments, Token, Type};

/// Derive `wiring_injector::Describe`.
///
/// # Generated code
///
/// ```rust,ignore
/// impl ::wiring_injector::Describe for UserService {
///     fn describe() -> ::wiring_injector::TypeMetadata<Self> {
///         ::wiring_injector::TypeMetadata::new()
///             .constructor(
///                 ::wiring_injector::Constructor::new(|args| {
///                     let __db = args.next::<Database>()?;
///                     let __cache = args.next_optional_dyn::<dyn Cache>()?;
///                     Ok(Self { db: __db, cache: __cache, request_count: Default::default() })
///                 })
///                 .arg::<Database>("db")
///                 .optional_arg::<dyn Cache>("cache"),
///             )
///             .lifecycle()
///     }
/// }
/// ```
#[proc_macro_derive(Describe, attributes(inject, describe))]
pub fn derive_describe(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Some(&fields.named),
            Fields::Unit => None,
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Describe can only be derived for structs with named fields",
                ));
            }
        },
        _ => return Err(syn::Error::new_spanned(input, "Describe can only be derived for structs")),
    };

    let mut reads = Vec::new();
    let mut declarations = Vec::new();
    let mut inits = Vec::new();

    for field in fields.into_iter().flatten() {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let binding = field_name.to_string();
        let local = format_ident!("__{}", field_name);

        let Some(shape) = inject_shape(&field.attrs)? else {
            inits.push(quote! { #field_name: ::std::default::Default::default() });
            continue;
        };

        let (inner, is_dyn) = match shape {
            Shape::One => arc_inner(&field.ty),
            Shape::Optional => wrapped_arc_inner(&field.ty, "Option"),
            Shape::All => wrapped_arc_inner(&field.ty, "Vec"),
        }
        .ok_or_else(|| syn::Error::new_spanned(&field.ty, shape.expected()))?;

        let read = match (shape, is_dyn) {
            (Shape::One, false) => quote! { next },
            (Shape::One, true) => quote! { next_dyn },
            (Shape::Optional, false) => quote! { next_optional },
            (Shape::Optional, true) => quote! { next_optional_dyn },
            (Shape::All, false) => quote! { next_all },
            (Shape::All, true) => quote! { next_all_dyn },
        };
        let declare = match shape {
            Shape::One => quote! { arg },
            Shape::Optional => quote! { optional_arg },
            Shape::All => quote! { all_arg },
        };

        reads.push(quote! { let #local = args.#read::<#inner>()?; });
        declarations.push(quote! { .#declare::<#inner>(#binding) });
        inits.push(quote! { #field_name: #local });
    }

    let build = if fields.is_some() {
        quote! { Self { #(#inits),* } }
    } else {
        quote! { Self }
    };
    let extras = describe_attrs(&input.attrs)?;

    Ok(quote! {
        impl #impl_generics ::wiring_injector::Describe for #name #ty_generics #where_clause {
            fn describe() -> ::wiring_injector::TypeMetadata<Self> {
                ::wiring_injector::TypeMetadata::new()
                    .constructor(
                        ::wiring_injector::Constructor::new(|args| {
                            let _ = &args;
                            #(#reads)*
                            ::std::result::Result::Ok(#build)
                        })
                        #(#declarations)*
                    )
                    #(#extras)*
            }
        }
    })
}

#[derive(Clone, Copy)]
enum Shape {
    One,
    Optional,
    All,
}

impl Shape {
    fn expected(self) -> &'static str {
        match self {
            Shape::One => "fields marked with #[inject] must have type Arc<T>",
            Shape::Optional => "fields marked with #[inject(optional)] must have type Option<Arc<T>>",
            Shape::All => "fields marked with #[inject(all)] must have type Vec<Arc<T>>",
        }
    }
}

/// Parse `#[inject]`, `#[inject(optional)]` or `#[inject(all)]`
fn inject_shape(attrs: &[Attribute]) -> syn::Result<Option<Shape>> {
    let Some(attr) = attrs.iter().find(|a| a.path().is_ident("inject")) else {
        return Ok(None);
    };
    if attr.meta.require_path_only().is_ok() {
        return Ok(Some(Shape::One));
    }
    let mut shape = Shape::One;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("optional") {
            shape = Shape::Optional;
            Ok(())
        } else if meta.path.is_ident("all") {
            shape = Shape::All;
            Ok(())
        } else {
            Err(meta.error("expected `optional` or `all`"))
        }
    })?;
    Ok(Some(shape))
}

/// Builder calls for `#[describe(...)]`
fn describe_attrs(attrs: &[Attribute]) -> syn::Result<Vec<TokenStream2>> {
    let mut extras = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("describe")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("lifecycle") {
                extras.push(quote! { .lifecycle() });
                return Ok(());
            }
            let is_implements = meta.path.is_ident("implements");
            if is_implements || meta.path.is_ident("extends") {
                let content;
                syn::parenthesized!(content in meta.input);
                let types: Punctuated<Type, Token![,]> = content.parse_terminated(Type::parse, Token![,])?;
                for ty in types {
                    extras.push(if is_implements {
                        quote! {
                            .implements::<#ty, _>(|this| this as ::std::sync::Arc<#ty>)
                        }
                    } else {
                        quote! { .extends::<#ty>() }
                    });
                }
                return Ok(());
            }
            Err(meta.error("expected `lifecycle`, `implements(...)` or `extends(...)`"))
        })?;
    }
    Ok(extras)
}

/// `T` of `Arc<T>`, and whether it is a trait object
fn arc_inner(ty: &Type) -> Option<(&Type, bool)> {
    let inner = generic_arg(ty, "Arc")?;
    Some((inner, matches!(inner, Type::TraitObject(_))))
}

/// `T` of `Wrapper<Arc<T>>`
fn wrapped_arc_inner<'t>(ty: &'t Type, wrapper: &str) -> Option<(&'t Type, bool)> {
    arc_inner(generic_arg(ty, wrapper)?)
}

fn generic_arg<'t>(ty: &'t Type, ident: &str) -> Option<&'t Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != ident {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
