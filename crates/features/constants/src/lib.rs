//! # Constants feature
//!
//! Arbitrary named values kept in the configuration document and read at
//! runtime. Reads always hand out an owned copy, so callers cannot alter the
//! shared table.
//!
//! ```yaml
//! constants:
//!   values:
//!     support_email: ops@example.com
//!     retry_delays_ms: [100, 500, 2000]
//! ```

use fhub_kernel::prelude::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Section and feature name.
pub const NAME: &str = "constants";

/// Binding under which the table is published during `init`.
pub const CONSTANTS: BindingKey<Constants> = BindingKey::new("constants");

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConstantsConfig {
    pub values: BTreeMap<String, Value>,
}

/// Read-only table of configured values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constants {
    values: BTreeMap<String, Value>,
}

impl Constants {
    #[must_use]
    pub const fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    /// Returns an owned, typed copy of the value stored under `name`.
    ///
    /// # Errors
    /// [`FeatureError::Deserialize`] when the stored value does not fit `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, FeatureError> {
        self.values
            .get(name)
            .map(|value| T::deserialize(value).with_context(|| format!("constant '{name}'")))
            .transpose()
    }

    /// Untyped copy of the stored value.
    #[must_use]
    pub fn raw(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ConstantsFeature {
    config: ConstantsConfig,
    table: Option<Arc<Constants>>,
}

impl ConstantsFeature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The published table; `None` before `init`.
    #[must_use]
    pub fn constants(&self) -> Option<Arc<Constants>> {
        self.table.clone()
    }
}

#[async_trait]
impl Feature for ConstantsFeature {
    fn name(&self) -> &str {
        NAME
    }

    fn bind_config(&mut self, section: ConfigSection) -> Result<(), FeatureError> {
        self.config = section.parse_or_default()?;
        Ok(())
    }

    fn init(&mut self, ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        let table = Constants::new(std::mem::take(&mut self.config.values));
        debug!(count = table.len(), "Publishing constants");
        self.table = Some(ctx.publish(CONSTANTS, table)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> Constants {
        let values = [
            ("limit".to_owned(), json!(25)),
            ("tags".to_owned(), json!(["a", "b"])),
            ("owner".to_owned(), json!({ "team": "core" })),
        ];
        Constants::new(values.into_iter().collect())
    }

    #[test]
    fn test_typed_get() {
        let constants = table();
        assert_eq!(constants.get::<u32>("limit").ok().flatten(), Some(25));
        assert_eq!(constants.get::<Vec<String>>("tags").ok().flatten(), Some(vec!["a".to_owned(), "b".to_owned()]));
        assert!(matches!(constants.get::<u32>("missing"), Ok(None)));
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let err = table().get::<u32>("tags").expect_err("array is not a number");
        assert!(matches!(err, FeatureError::Deserialize { context: Some(_), .. }));
    }

    #[test]
    fn test_copies_are_independent() {
        let constants = table();
        let mut tags: Vec<String> = constants.get("tags").ok().flatten().unwrap_or_default();
        tags.push("c".to_owned());
        let mut raw = constants.raw("owner").unwrap_or_default();
        raw["team"] = json!("edge");

        assert_eq!(constants.raw("tags"), Some(json!(["a", "b"])));
        assert_eq!(constants.raw("owner"), Some(json!({ "team": "core" })));
    }
}
