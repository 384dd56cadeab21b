use std::borrow::Cow;
use std::time::Duration;

/// Failure reported by a feature hook.
#[fhub_derive::fhub_error]
pub enum FeatureError {
    /// Section content is well-formed but semantically invalid.
    #[error("Invalid configuration{}: {message}", Self::format_context(.context))]
    Config { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Section does not match the feature's typed configuration.
    #[error("Configuration schema mismatch{}: {source}", Self::format_context(.context))]
    Deserialize { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Binding '{key}' not found{}", Self::format_context(.context))]
    BindingNotFound { key: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Binding '{key}' is not a {expected}{}", Self::format_context(.context))]
    BindingType {
        key: Cow<'static, str>,
        expected: &'static str,
        context: Option<Cow<'static, str>>,
    },

    #[error("Binding '{key}' already published by '{owner}'{}", Self::format_context(.context))]
    BindingConflict {
        key: Cow<'static, str>,
        owner: String,
        context: Option<Cow<'static, str>>,
    },

    #[error("IO error{}: {source}", Self::format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// A hook or context operation was used outside of the phase that allows it.
    #[error("Unavailable{}: {message}", Self::format_context(.context))]
    Unavailable { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Error from a feature's own dependency stack.
    #[error("{source}{}", Self::format_context(.context))]
    Other {
        source: Box<dyn std::error::Error + Send + Sync>,
        context: Option<Cow<'static, str>>,
    },

    #[error("Internal error{}: {message}", Self::format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl FeatureError {
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Config { message: message.into(), context: None }
    }

    pub fn unavailable(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Unavailable { message: message.into(), context: None }
    }

    /// Wraps any error type of a feature's own stack.
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other { source: Box::new(err), context: None }
    }
}

/// Failure of [`Registry::build`](crate::registry::Registry::build).
///
/// No runner is produced when this is returned.
#[fhub_derive::fhub_error]
pub enum RegistryError {
    #[error("Duplicate feature names{}: {}", Self::format_context(.context), .names.join(", "))]
    DuplicateFeatureName { names: Vec<String>, context: Option<Cow<'static, str>> },

    #[error("More than one server feature{}: {}", Self::format_context(.context), .names.join(", "))]
    MultipleServers { names: Vec<String>, context: Option<Cow<'static, str>> },

    #[error("Configuration of '{feature}' rejected{}: {source}", Self::format_context(.context))]
    ConfigValidation {
        feature: String,
        source: FeatureError,
        context: Option<Cow<'static, str>>,
    },

    #[error("Feature '{feature}' failed to initialize{}: {source}", Self::format_context(.context))]
    Init { feature: String, source: FeatureError, context: Option<Cow<'static, str>> },
}

/// Failure of a lifecycle run. The runner is always `Stopped` when this is returned.
#[fhub_derive::fhub_error]
pub enum LifecycleError {
    #[error("Feature '{feature}' failed to start{}: {source}", Self::format_context(.context))]
    Startup { feature: String, source: FeatureError, context: Option<Cow<'static, str>> },

    #[error("Shutdown failed for {} feature(s){}: {}", .failures.len(), Self::format_context(.context), format_failures(.failures))]
    Shutdown { failures: Vec<ShutdownFailure>, context: Option<Cow<'static, str>> },

    #[error("Server loop of '{feature}' failed{}: {source}", Self::format_context(.context))]
    Serve { feature: String, source: FeatureError, context: Option<Cow<'static, str>> },
}

/// One `on_shutdown` call that did not complete cleanly.
#[derive(Debug, thiserror::Error)]
#[error("{feature}: {cause}")]
pub struct ShutdownFailure {
    pub feature: String,
    #[source]
    pub cause: ShutdownCause,
}

#[derive(Debug, thiserror::Error)]
pub enum ShutdownCause {
    #[error(transparent)]
    Failed(FeatureError),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

fn format_failures(failures: &[ShutdownFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
