use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::{Error, Expr, ExprLit, ItemFn, Lit, Meta, ReturnType, Token, Type};

const PROFILES: &str = "high_performance, memory_efficient, or default";
const OVERRIDES: &str = "worker_threads = <int> or thread_name = \"<name>\"";

/// Expands `#[fhub_runtime::main(<profile>, <key> = <value>, ..)]`.
#[must_use]
pub fn expand_main(args: TokenStream, input: ItemFn) -> TokenStream {
    match try_expand_main(args, input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn try_expand_main(args: TokenStream, input: ItemFn) -> syn::Result<TokenStream> {
    if input.sig.asyncness.is_none() {
        return Err(Error::new_spanned(&input.sig.ident, "#[fhub_runtime::main] needs an async fn"));
    }
    if !input.sig.inputs.is_empty() {
        return Err(Error::new_spanned(&input.sig.inputs, "#[fhub_runtime::main] takes no arguments"));
    }
    if !returns_result(&input.sig.output) {
        return Err(Error::new_spanned(&input.sig.output, "#[fhub_runtime::main] needs a Result return type"));
    }

    let config = runtime_config(args)?;
    let ItemFn { attrs, vis, sig, block } = input;
    let name = &sig.ident;
    let output = &sig.output;

    Ok(quote! {
        #(#attrs)*
        #vis fn #name() #output {
            let config = #config;
            let rt = ::fhub_runtime::build_runtime_with_config(&config)?;
            rt.block_on(async #block)
        }
    })
}

/// Builds the `RuntimeConfig` expression: the profile, then one builder call per override.
fn runtime_config(args: TokenStream) -> syn::Result<TokenStream> {
    let metas = Punctuated::<Meta, Token![,]>::parse_terminated.parse2(args)?;

    let mut profile = None;
    let mut overrides = Vec::new();
    for meta in metas {
        match meta {
            Meta::Path(path) if profile.is_none() && overrides.is_empty() => {
                profile = Some(profile_constructor(&path)?);
            }
            Meta::Path(path) => {
                return Err(Error::new_spanned(path, "the profile must be the first and only bare argument"));
            }
            Meta::NameValue(nv) => {
                let key = nv.path.get_ident().map(ToString::to_string).unwrap_or_default();
                overrides.push(match (key.as_str(), &nv.value) {
                    ("worker_threads", Expr::Lit(ExprLit { lit: Lit::Int(n), .. })) => {
                        let n: usize = n.base10_parse()?;
                        quote! { .with_worker_threads(#n) }
                    }
                    ("thread_name", Expr::Lit(ExprLit { lit: Lit::Str(s), .. })) => {
                        quote! { .with_thread_name(#s) }
                    }
                    _ => return Err(Error::new_spanned(nv, format!("Unknown runtime override. Use: {OVERRIDES}"))),
                });
            }
            Meta::List(list) => {
                return Err(Error::new_spanned(list, format!("Unexpected list. Use: {OVERRIDES}")));
            }
        }
    }

    let profile = profile.unwrap_or_else(|| quote! { ::fhub_runtime::RuntimeConfig::default() });
    Ok(quote! { #profile #(#overrides)* })
}

fn profile_constructor(path: &syn::Path) -> syn::Result<TokenStream> {
    let Some(ident) = path.get_ident() else {
        return Err(Error::new_spanned(path, format!("Expected a runtime profile: {PROFILES}")));
    };
    match ident.to_string().as_str() {
        "high_performance" => Ok(quote! { ::fhub_runtime::RuntimeConfig::high_performance() }),
        "memory_efficient" => Ok(quote! { ::fhub_runtime::RuntimeConfig::memory_efficient() }),
        "default" => Ok(quote! { ::fhub_runtime::RuntimeConfig::default() }),
        other => Err(Error::new_spanned(ident, format!("Unknown runtime profile `{other}`. Use: {PROFILES}"))),
    }
}

fn returns_result(output: &ReturnType) -> bool {
    let ReturnType::Type(_, ty) = output else {
        return false;
    };
    let Type::Path(path) = &**ty else {
        return false;
    };
    path.path.segments.last().is_some_and(|seg| seg.ident == "Result")
}
