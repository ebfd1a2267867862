//! In-memory reference implementation of [`StateStore`].
//!
//! Deterministic and test-friendly; every apply swaps in the whole write set
//! under one write lock.

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::traits::{KeySpace, StateKey, StateStore, StateValue, StoreError, StoreResult};

#[derive(Default)]
struct MemoryState {
    version: u64,
    entries: BTreeMap<StateKey, StateValue>,
}

/// In-memory versioned state store.
#[derive(Default)]
pub struct InMemoryStateStore {
    inner: RwLock<MemoryState>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed records.
    pub fn len(&self) -> StoreResult<usize> {
        let guard = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("state lock poisoned".to_string()))?;
        Ok(guard.entries.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl StateStore for InMemoryStateStore {
    fn version(&self) -> StoreResult<u64> {
        let guard = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("state lock poisoned".to_string()))?;
        Ok(guard.version)
    }

    fn get(&self, key: &StateKey) -> StoreResult<Option<StateValue>> {
        let guard = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("state lock poisoned".to_string()))?;
        Ok(guard.entries.get(key).cloned())
    }

    fn scan(&self, space: KeySpace) -> StoreResult<Vec<(StateKey, StateValue)>> {
        let guard = self
            .inner
            .read()
            .map_err(|_| StoreError::Backend("state lock poisoned".to_string()))?;
        Ok(guard
            .entries
            .iter()
            .filter(|(key, _)| key.space() == space)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn apply(&self, base_version: u64, writes: Vec<(StateKey, StateValue)>) -> StoreResult<u64> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| StoreError::Backend("state lock poisoned".to_string()))?;

        if guard.version != base_version {
            return Err(StoreError::Conflict {
                expected: base_version,
                found: guard.version,
            });
        }

        for (key, value) in writes {
            guard.entries.insert(key, value);
        }
        guard.version += 1;
        Ok(guard.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Counter;
    use vault_types::{Principal, UserRiskSettings};

    #[test]
    fn apply_advances_version() {
        let store = InMemoryStateStore::new();
        assert_eq!(store.version().unwrap(), 0);

        let v = store
            .apply(
                0,
                vec![(StateKey::Counter(Counter::NextVaultId), StateValue::Counter(2))],
            )
            .unwrap();
        assert_eq!(v, 1);
        assert_eq!(
            store.get(&StateKey::Counter(Counter::NextVaultId)).unwrap(),
            Some(StateValue::Counter(2))
        );
    }

    #[test]
    fn stale_apply_is_rejected_without_effect() {
        let store = InMemoryStateStore::new();
        store.apply(0, vec![]).unwrap();

        let err = store
            .apply(
                0,
                vec![(StateKey::Counter(Counter::NextVaultId), StateValue::Counter(9))],
            )
            .unwrap_err();
        assert_eq!(err, StoreError::Conflict { expected: 0, found: 1 });
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn scan_filters_by_space() {
        let store = InMemoryStateStore::new();
        store
            .apply(
                0,
                vec![
                    (StateKey::Counter(Counter::NextProtocolId), StateValue::Counter(3)),
                    (
                        StateKey::RiskSettings(Principal::new("alice")),
                        StateValue::RiskSettings(UserRiskSettings::default()),
                    ),
                ],
            )
            .unwrap();

        let settings = store.scan(KeySpace::RiskSettings).unwrap();
        assert_eq!(settings.len(), 1);
        assert!(store.scan(KeySpace::Vault).unwrap().is_empty());
    }
}
