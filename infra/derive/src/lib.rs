#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by every `FeatureHub` crate: the error enum
//! attribute used across the kernel and features, and the runtime bootstrap
//! attribute used by the binaries.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! fhub-derive.workspace = true
//! ```

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemFn, parse_macro_input};

/// Attribute macro to bootstrap the specialized Tokio runtime.
///
/// Turns an `async fn main` into a plain `fn main` that builds a runtime from
/// one of the `fhub_runtime::RuntimeConfig` presets and blocks on the body.
///
/// # Arguments
///
/// An optional profile first:
/// * `high_performance` - Server profile: all cores, larger stacks.
/// * `memory_efficient` - Half the cores, smaller stacks.
/// * `default` - Auto-detected worker threads.
///
/// Then any of `worker_threads = <int>` and `thread_name = "<name>"`, applied
/// on top of the profile.
///
/// # Examples
///
/// ```rust,ignore
/// #[fhub_runtime::main(high_performance, thread_name = "fhub-server")]
/// async fn main() -> anyhow::Result<()> {
/// # Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::runtime::expand_main(args.into(), input).into()
}

/// Attribute macro for the workspace error enums.
///
/// # Injected items
///
/// * `#[derive(Debug, thiserror::Error)]` unless already derived.
/// * `<ErrorName>Ext` trait with `.context(..)` and lazy `.with_context(|| ..)`
///   for `Result<T, ErrorName>` and for results of every wrapped source error.
/// * `From<Source>` for each variant made of exactly a `source` (or `#[source]`) field
///   and its `context`.
/// * `From<&'static str>` and `From<String>` when an `Internal` variant exists.
/// * A private associated `Self::format_context` helper used in `#[error(..)]` strings.
///
/// # Requirements
///
/// Variants must have named fields. Variants wrapping a source must also carry
/// `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use std::borrow::Cow;
///
/// #[fhub_derive::fhub_error]
/// pub enum LoaderError {
///     #[error("IO error{}: {source}", Self::format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", Self::format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn read(path: &str) -> Result<String, LoaderError> {
///     std::fs::read_to_string(path).with_context(|| format!("reading {path}"))
/// }
/// ```
#[proc_macro_attribute]
pub fn fhub_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}
