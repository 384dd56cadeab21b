//! Typed named slots shared between features.
//!
//! A producer publishes a value under a [`BindingKey`]; any feature registered
//! after it can look the value up by the same key. Values are immutable once
//! published and handed out as `Arc<T>` clones.

use crate::error::FeatureError;
use fxhash::FxHashMap;
use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// String tag plus the type stored under it.
///
/// Producer crates export these as constants:
/// ```rust
/// # use fhub_kernel::binding::BindingKey;
/// pub struct Pool;
/// pub const POOL: BindingKey<Pool> = BindingKey::new("db.pool");
/// assert_eq!(POOL.name(), "db.pool");
/// ```
pub struct BindingKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> BindingKey<T> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name, _marker: PhantomData }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for BindingKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BindingKey<T> {}

impl<T> fmt::Debug for BindingKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingKey").field("name", &self.name).field("type", &type_name::<T>()).finish()
    }
}

struct Published {
    owner: String,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

/// The published bindings of one registry.
#[derive(Default)]
pub struct Bindings {
    slots: FxHashMap<&'static str, Published>,
}

impl Bindings {
    /// Stores `value` under `key` on behalf of `owner`.
    ///
    /// # Errors
    /// [`FeatureError::BindingConflict`] when the key is already taken.
    pub fn publish<T>(&mut self, owner: &str, key: BindingKey<T>, value: T) -> Result<Arc<T>, FeatureError>
    where
        T: Any + Send + Sync,
    {
        let value = Arc::new(value);
        self.publish_arc(owner, key, Arc::clone(&value))?;
        Ok(value)
    }

    /// Like [`publish`](Self::publish) for a value that is already shared.
    ///
    /// # Errors
    /// [`FeatureError::BindingConflict`] when the key is already taken.
    pub fn publish_arc<T>(&mut self, owner: &str, key: BindingKey<T>, value: Arc<T>) -> Result<(), FeatureError>
    where
        T: Any + Send + Sync,
    {
        if let Some(existing) = self.slots.get(key.name()) {
            return Err(FeatureError::BindingConflict {
                key: key.name().into(),
                owner: existing.owner.clone(),
                context: None,
            });
        }

        tracing::debug!(binding = key.name(), owner, "Binding published");
        self.slots.insert(
            key.name(),
            Published { owner: owner.to_owned(), type_name: type_name::<T>(), value },
        );
        Ok(())
    }

    /// Returns a shared handle to the value under `key`.
    ///
    /// # Errors
    /// * [`FeatureError::BindingNotFound`] when nothing was published under the key yet.
    /// * [`FeatureError::BindingType`] when the key holds a different type.
    pub fn get<T>(&self, key: BindingKey<T>) -> Result<Arc<T>, FeatureError>
    where
        T: Any + Send + Sync,
    {
        let published = self.slots.get(key.name()).ok_or_else(|| FeatureError::BindingNotFound {
            key: key.name().into(),
            context: None,
        })?;

        Arc::clone(&published.value).downcast::<T>().map_err(|_| FeatureError::BindingType {
            key: key.name().into(),
            expected: type_name::<T>(),
            context: Some(format!("published as {}", published.type_name).into()),
        })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Name of the feature that published `name`.
    #[must_use]
    pub fn owner(&self, name: &str) -> Option<&str> {
        self.slots.get(name).map(|p| p.owner.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.slots.iter().map(|(k, p)| (k, (&p.owner, p.type_name))))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMBER: BindingKey<u32> = BindingKey::new("number");
    const NUMBER_AS_TEXT: BindingKey<String> = BindingKey::new("number");

    #[test]
    fn publish_then_get_shares_the_value() {
        let mut bindings = Bindings::default();
        let published = bindings.publish("producer", NUMBER, 7).expect("publish");
        let seen = bindings.get(NUMBER).expect("lookup");

        assert_eq!(*seen, 7);
        assert!(Arc::ptr_eq(&published, &seen));
        assert_eq!(bindings.owner("number"), Some("producer"));
    }

    #[test]
    fn missing_key_is_not_found() {
        let bindings = Bindings::default();
        let err = bindings.get(NUMBER).expect_err("nothing published");
        assert!(matches!(err, FeatureError::BindingNotFound { ref key, .. } if key == "number"));
    }

    #[test]
    fn second_publish_conflicts() {
        let mut bindings = Bindings::default();
        bindings.publish("first", NUMBER, 1).expect("publish");
        let err = bindings.publish("second", NUMBER, 2).expect_err("conflict");

        assert!(matches!(err, FeatureError::BindingConflict { ref owner, .. } if owner == "first"));
        assert_eq!(*bindings.get(NUMBER).expect("lookup"), 1);
    }

    #[test]
    fn wrong_type_is_reported() {
        let mut bindings = Bindings::default();
        bindings.publish("producer", NUMBER, 1).expect("publish");
        let err = bindings.get(NUMBER_AS_TEXT).expect_err("type mismatch");
        assert!(matches!(err, FeatureError::BindingType { .. }));
    }
}
