//! The shared state namespace.
//!
//! Every extension may contribute values during startup. Contributions are
//! merged by the [`StateLedger`], which rejects any key that another
//! extension already owns. Once startup completes the ledger is frozen into
//! a read-only [`State`] that the serving layer hands to request handlers.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{KeyCollision, StateError};

/// A value stored in the state namespace.
pub type StateValue = Arc<dyn Any + Send + Sync>;

/// The values one extension contributes during startup.
#[derive(Clone, Default)]
pub struct ExtensionState {
    values: BTreeMap<String, StateValue>,
}

impl ExtensionState {
    /// An empty contribution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, builder style.
    pub fn with<T: Send + Sync + 'static>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Add a value. A repeated key replaces the earlier value.
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Arc::new(value));
    }

    /// Add a value that is already shared.
    pub fn insert_shared(&mut self, key: impl Into<String>, value: StateValue) {
        self.values.insert(key.into(), value);
    }

    /// Whether nothing was contributed.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of contributed keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Contributed keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl fmt::Debug for ExtensionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

/// Accumulates contributions and enforces key uniqueness across extensions.
///
/// The ledger only grows. Nothing is ever removed; the whole ledger is
/// discarded at shutdown.
#[derive(Default)]
pub struct StateLedger {
    values: BTreeMap<String, StateValue>,
    owners: BTreeMap<String, String>,
}

impl StateLedger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one extension's contribution.
    ///
    /// Either every key is inserted or none is: if any key already exists,
    /// the namespace is left unchanged and the error lists every contested
    /// key together with its current owner.
    pub fn merge(
        &mut self,
        extension: &str,
        contribution: ExtensionState,
    ) -> Result<(), StateError> {
        let collisions: Vec<KeyCollision> = contribution
            .values
            .keys()
            .filter_map(|key| {
                self.owners.get(key).map(|owner| KeyCollision {
                    key: key.clone(),
                    owner: owner.clone(),
                })
            })
            .collect();

        if !collisions.is_empty() {
            return Err(StateError::Collision {
                extension: extension.to_string(),
                collisions,
            });
        }

        for (key, value) in contribution.values {
            self.owners.insert(key.clone(), extension.to_string());
            self.values.insert(key, value);
        }

        Ok(())
    }

    /// Whether a key has been contributed.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The extension that contributed `key`.
    pub fn owner_of(&self, key: &str) -> Option<&str> {
        self.owners.get(key).map(String::as_str)
    }

    /// Number of keys merged so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing has been merged.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Freeze the ledger into the read-only namespace.
    pub fn finish(self) -> State {
        State {
            inner: Arc::new(StateInner {
                values: self.values,
                owners: self.owners,
            }),
        }
    }
}

struct StateInner {
    values: BTreeMap<String, StateValue>,
    owners: BTreeMap<String, String>,
}

/// The read-only merged namespace, cheap to clone.
#[derive(Clone)]
pub struct State {
    inner: Arc<StateInner>,
}

impl State {
    /// An empty namespace.
    pub fn empty() -> Self {
        StateLedger::new().finish()
    }

    /// Borrow a value if it exists and has type `T`.
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.inner.values.get(key)?.downcast_ref::<T>()
    }

    /// Share a value if it exists and has type `T`.
    pub fn get_shared<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        self.inner.values.get(key)?.clone().downcast::<T>().ok()
    }

    /// Whether a key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.values.contains_key(key)
    }

    /// The extension that contributed `key`.
    pub fn owner_of(&self, key: &str) -> Option<&str> {
        self.inner.owners.get(key).map(String::as_str)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.values.keys().map(String::as_str)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.inner.values.len()
    }

    /// Whether the namespace is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.values.is_empty()
    }
}

impl Default for State {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.owners.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disjoint_contributions_form_the_union() {
        let mut ledger = StateLedger::new();
        ledger
            .merge("first", ExtensionState::new().with("a", 1i32))
            .unwrap();
        ledger
            .merge("second", ExtensionState::new().with("b", 2i32))
            .unwrap();

        let state = ledger.finish();
        assert_eq!(state.len(), 2);
        assert_eq!(state.get::<i32>("a"), Some(&1));
        assert_eq!(state.get::<i32>("b"), Some(&2));
        assert_eq!(state.owner_of("a"), Some("first"));
        assert_eq!(state.owner_of("b"), Some("second"));
    }

    #[test]
    fn test_collision_names_key_owner_and_extension() {
        let mut ledger = StateLedger::new();
        ledger
            .merge("first", ExtensionState::new().with("x", 1i32))
            .unwrap();

        let err = ledger
            .merge(
                "second",
                ExtensionState::new().with("x", 2i32).with("y", 3i32),
            )
            .unwrap_err();

        let StateError::Collision {
            extension,
            collisions,
        } = err;
        assert_eq!(extension, "second");
        assert_eq!(
            collisions,
            vec![KeyCollision {
                key: "x".to_string(),
                owner: "first".to_string(),
            }]
        );
    }

    #[test]
    fn test_rejected_contribution_leaves_ledger_unchanged() {
        let mut ledger = StateLedger::new();
        ledger
            .merge("first", ExtensionState::new().with("x", 1i32))
            .unwrap();
        let _ = ledger.merge(
            "second",
            ExtensionState::new().with("x", 2i32).with("y", 3i32),
        );

        assert_eq!(ledger.len(), 1);
        assert!(!ledger.contains_key("y"));
        assert_eq!(ledger.finish().get::<i32>("x"), Some(&1));
    }

    #[test]
    fn test_empty_contribution_is_accepted() {
        let mut ledger = StateLedger::new();
        ledger.merge("quiet", ExtensionState::new()).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_typed_access() {
        let mut ledger = StateLedger::new();
        ledger
            .merge(
                "db",
                ExtensionState::new().with("pool", String::from("pool-handle")),
            )
            .unwrap();
        let state = ledger.finish();

        assert!(state.get::<i32>("pool").is_none());
        let pool = state.get_shared::<String>("pool").unwrap();
        assert_eq!(pool.as_str(), "pool-handle");
        assert!(state.get::<String>("missing").is_none());
    }
}
