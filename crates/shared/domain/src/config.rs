use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Whole application configuration as loaded from file and environment.
#[derive(Default, Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub lifecycle: LifecycleConfig,
    pub features: ConfigDocument,
}

/// Knobs of the lifecycle runner itself (not of any feature).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Upper bound for a single `on_shutdown` call.
    pub shutdown_timeout_ms: u64,
    /// How long the server loop may keep draining after a stop request.
    pub serve_grace_ms: u64,
}

impl LifecycleConfig {
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    #[must_use]
    pub const fn serve_grace(&self) -> Duration {
        Duration::from_millis(self.serve_grace_ms)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { shutdown_timeout_ms: 30_000, serve_grace_ms: 10_000 }
    }
}

/// Mapping from feature name to its untyped configuration section.
#[derive(Default, Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ConfigDocument {
    sections: BTreeMap<String, Value>,
}

impl ConfigDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a section, returning the document for chaining.
    #[must_use]
    pub fn with_section(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.sections.insert(name.into(), value)
    }

    /// Resolves the section for `name`; a missing key is [`ConfigSection::Absent`].
    #[must_use]
    pub fn section(&self, name: &str) -> ConfigSection {
        self.sections.get(name).map_or(ConfigSection::Absent, |v| ConfigSection::Present(v.clone()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Section names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ConfigDocument {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self { sections: iter.into_iter().map(|(k, v)| (k.into(), v)).collect() }
    }
}

/// A single feature's configuration, handed to the feature exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSection {
    Present(Value),
    Absent,
}

impl ConfigSection {
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Present(v) => Some(v),
            Self::Absent => None,
        }
    }

    /// Deserializes a present section; `Ok(None)` when absent.
    ///
    /// # Errors
    /// Returns the `serde_json` error when the section does not match `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.value().map(|v| T::deserialize(v)).transpose()
    }

    /// Deserializes the section, falling back to `T::default()` when it is
    /// absent or explicitly `null`.
    ///
    /// # Errors
    /// Returns the `serde_json` error when the section does not match `T`.
    pub fn parse_or_default<T: DeserializeOwned + Default>(&self) -> Result<T, serde_json::Error> {
        match self {
            Self::Present(Value::Null) | Self::Absent => Ok(T::default()),
            Self::Present(v) => T::deserialize(v),
        }
    }
}
