use fxhash::FxHashSet;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Field, Fields, FieldsNamed, Ident, Type, Variant};

const CONTEXT_FIELD: &str = "context";
const INTERNAL_VARIANT: &str = "Internal";

struct VariantMeta<'a> {
    ident: &'a Ident,
    source: Option<&'a Field>,
    has_context: bool,
    /// Only `source` and `context`, so a `From<Source>` impl can build it.
    convertible: bool,
    cfg_attrs: Vec<Attribute>,
}

impl VariantMeta<'_> {
    fn source_ty(&self) -> Option<&Type> {
        self.source.map(|field| &field.ty)
    }

    fn source_ident(&self) -> Option<&Ident> {
        self.source.and_then(|field| field.ident.as_ref())
    }
}

pub fn expand_derive(input: DeriveInput) -> TokenStream {
    let name = &input.ident;
    let trait_name = format_ident!("{}Ext", name);

    let Data::Enum(data) = &input.data else {
        return quote! { compile_error!("fhub_error can only be applied to enums"); };
    };

    let variants = match data.variants.iter().map(parse_variant).collect::<Result<Vec<_>, _>>() {
        Ok(v) => v,
        Err(err) => return err.to_compile_error(),
    };
    if let Err(err) = check_source_has_context(&variants) {
        return err.to_compile_error();
    }

    let derives = missing_derives(&input);
    let context_trait = generate_context_trait(name, &trait_name, &variants);
    let source_impls = variants.iter().filter_map(|v| generate_source_impls(name, &trait_name, v));
    let internal_impls = generate_internal_impls(name, &variants);

    quote! {
        #[allow(non_shorthand_field_patterns)]
        #derives
        #input

        #context_trait
        #(#source_impls)*
        #internal_impls

        impl #name {
            /// Renders an attached context as ` (context)` for `#[error]` strings.
            #[allow(dead_code, clippy::ref_option)]
            fn format_context(context: &Option<std::borrow::Cow<'static, str>>) -> std::borrow::Cow<'static, str> {
                context.as_ref().map_or(std::borrow::Cow::Borrowed(""), |c| std::borrow::Cow::Owned(format!(" ({c})")))
            }
        }
    }
}

fn parse_variant(v: &Variant) -> syn::Result<VariantMeta<'_>> {
    let Fields::Named(fields) = &v.fields else {
        return Err(syn::Error::new_spanned(
            v,
            "fhub_error requires named fields for source/context handling",
        ));
    };

    Ok(VariantMeta {
        ident: &v.ident,
        source: find_source_field(fields),
        has_context: find_context_field(fields)?.is_some(),
        convertible: fields.named.len() == 2,
        cfg_attrs: v.attrs.iter().filter(|attr| attr.path().is_ident("cfg")).cloned().collect(),
    })
}

fn find_context_field(fields: &FieldsNamed) -> syn::Result<Option<&Field>> {
    let Some(field) = fields
        .named
        .iter()
        .find(|field| field.ident.as_ref().is_some_and(|ident| ident == CONTEXT_FIELD))
    else {
        return Ok(None);
    };

    if is_optional_static_cow_str(&field.ty) {
        Ok(Some(field))
    } else {
        Err(syn::Error::new_spanned(&field.ty, "context field must be Option<Cow<'static, str>>"))
    }
}

fn find_source_field(fields: &FieldsNamed) -> Option<&Field> {
    fields.named.iter().find(|field| {
        field.ident.as_ref().is_some_and(|ident| ident == "source")
            || field.attrs.iter().any(|attr| attr.path().is_ident("source") || attr.path().is_ident("from"))
    })
}

fn check_source_has_context(variants: &[VariantMeta<'_>]) -> syn::Result<()> {
    variants.iter().find(|v| v.source.is_some() && !v.has_context).map_or(Ok(()), |v| {
        Err(syn::Error::new_spanned(
            v.ident,
            "fhub_error requires `context: Option<Cow<'static, str>>` for variants with a source",
        ))
    })
}

fn missing_derives(input: &DeriveInput) -> TokenStream {
    let derived = derived_trait_names(&input.attrs);
    let mut tokens = Vec::new();
    if !derived.contains("Debug") {
        tokens.push(quote! { Debug });
    }
    if !derived.contains("Error") {
        tokens.push(quote! { ::thiserror::Error });
    }
    if tokens.is_empty() { quote! {} } else { quote! { #[derive(#(#tokens),*)] } }
}

fn generate_context_trait(
    name: &Ident,
    trait_name: &Ident,
    variants: &[VariantMeta<'_>],
) -> TokenStream {
    let arms = variants.iter().filter(|v| v.has_context).map(|v| {
        let cfg_attrs = &v.cfg_attrs;
        let ident = v.ident;
        quote! { #(#cfg_attrs)* #name::#ident { context: c, .. } => *c = Some(context), }
    });

    quote! {
        pub trait #trait_name<T> {
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Result<T, #name>;

            fn with_context<C, F>(self, f: F) -> Result<T, #name>
            where
                C: Into<std::borrow::Cow<'static, str>>,
                F: FnOnce() -> C;
        }

        impl #name {
            #[allow(dead_code, unused_variables)]
            fn attach_context(mut self, context: std::borrow::Cow<'static, str>) -> Self {
                match &mut self {
                    #( #arms )*
                    _ => {}
                }
                self
            }
        }

        #[automatically_derived]
        impl<T> #trait_name<T> for Result<T, #name> {
            #[inline]
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Self {
                self.map_err(|e| e.attach_context(context.into()))
            }

            #[inline]
            fn with_context<C, F>(self, f: F) -> Self
            where
                C: Into<std::borrow::Cow<'static, str>>,
                F: FnOnce() -> C,
            {
                self.map_err(|e| e.attach_context(f().into()))
            }
        }
    }
}

fn generate_source_impls(
    name: &Ident,
    trait_name: &Ident,
    v: &VariantMeta<'_>,
) -> Option<TokenStream> {
    if v.ident == INTERNAL_VARIANT || !v.convertible {
        return None;
    }
    let source_ty = v.source_ty()?;
    let source_field = v.source_ident()?;
    let v_ident = v.ident;
    let cfg_attrs = &v.cfg_attrs;

    Some(quote! {
        #(#cfg_attrs)*
        #[automatically_derived]
        impl From<#source_ty> for #name {
            #[inline]
            fn from(#source_field: #source_ty) -> Self { Self::#v_ident { #source_field, context: None } }
        }

        #(#cfg_attrs)*
        impl<T> #trait_name<T> for std::result::Result<T, #source_ty> {
            #[inline]
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> std::result::Result<T, #name> {
                self.map_err(|#source_field| #name::#v_ident { #source_field, context: Some(context.into()) })
            }

            #[inline]
            fn with_context<C, F>(self, f: F) -> std::result::Result<T, #name>
            where
                C: Into<std::borrow::Cow<'static, str>>,
                F: FnOnce() -> C,
            {
                self.map_err(|#source_field| #name::#v_ident { #source_field, context: Some(f().into()) })
            }
        }
    })
}

fn generate_internal_impls(name: &Ident, variants: &[VariantMeta<'_>]) -> TokenStream {
    let Some(internal) = variants.iter().find(|v| v.ident == INTERNAL_VARIANT) else {
        return quote!();
    };
    let cfg_attrs = &internal.cfg_attrs;

    quote! {
        #(#cfg_attrs)*
        impl From<&'static str> for #name {
            #[inline]
            fn from(s: &'static str) -> Self { Self::Internal { message: std::borrow::Cow::Borrowed(s), context: None } }
        }
        #(#cfg_attrs)*
        impl From<String> for #name {
            #[inline]
            fn from(s: String) -> Self { Self::Internal { message: std::borrow::Cow::Owned(s), context: None } }
        }
    }
}

fn derived_trait_names(attrs: &[Attribute]) -> FxHashSet<String> {
    let mut traits = FxHashSet::default();

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("derive")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(seg) = meta.path.segments.last() {
                traits.insert(seg.ident.to_string());
            }
            Ok(())
        });
    }

    traits
}

/// Matches `Option<Cow<'static, str>>` (any path prefix).
fn is_optional_static_cow_str(ty: &Type) -> bool {
    let Some(option_args) = last_segment_args(ty, "Option") else {
        return false;
    };
    let Some(syn::GenericArgument::Type(cow)) = option_args.first() else {
        return false;
    };
    let Some(cow_args) = last_segment_args(cow, "Cow") else {
        return false;
    };

    let mut args = cow_args.iter();
    let is_static = matches!(args.next(), Some(syn::GenericArgument::Lifetime(lt)) if lt.ident == "static");
    let is_str = matches!(
        args.next(),
        Some(syn::GenericArgument::Type(Type::Path(p)))
            if p.path.segments.last().is_some_and(|seg| seg.ident == "str")
    );
    is_static && is_str
}

fn last_segment_args<'a>(
    ty: &'a Type,
    ident: &str,
) -> Option<&'a syn::punctuated::Punctuated<syn::GenericArgument, syn::token::Comma>> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != ident {
        return None;
    }
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => Some(&args.args),
        _ => None,
    }
}
