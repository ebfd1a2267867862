//! Write-buffering transaction over a [`StateStore`].
//!
//! Reads see the transaction's own pending writes first, then the committed
//! state. Nothing reaches the store until [`Transaction::apply`]; dropping a
//! transaction discards every staged write, event and compensation.

use std::collections::BTreeMap;

use vault_types::{
    BlockHeight, LedgerEvent, Principal, Protocol, ProtocolId, RiskParams, UserProtocolPosition,
    UserRiskSettings, UserVaultPosition, Vault, VaultError, VaultId, VaultResult,
};

use super::traits::{Counter, KeySpace, StateKey, StateStore, StateValue, StoreError};
use crate::journal::Compensation;

/// Counters start here; id 0 is never assigned.
const FIRST_ID: u64 = 1;

pub struct Transaction<'s> {
    store: &'s dyn StateStore,
    base_version: u64,
    height: BlockHeight,
    writes: BTreeMap<StateKey, StateValue>,
    events: Vec<LedgerEvent>,
    compensations: Vec<Compensation>,
}

impl<'s> Transaction<'s> {
    /// Open a transaction against the store's current version.
    pub fn begin(store: &'s dyn StateStore, height: BlockHeight) -> VaultResult<Self> {
        let base_version = store.version()?;
        Ok(Self {
            store,
            base_version,
            height,
            writes: BTreeMap::new(),
            events: Vec::new(),
            compensations: Vec::new(),
        })
    }

    pub fn height(&self) -> BlockHeight {
        self.height
    }

    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    pub fn has_writes(&self) -> bool {
        !self.writes.is_empty()
    }

    /// Commit staged writes. Returns the new store version, or the base
    /// version when nothing was written.
    pub fn apply(&mut self) -> VaultResult<u64> {
        if self.writes.is_empty() {
            return Ok(self.base_version);
        }
        let writes = std::mem::take(&mut self.writes).into_iter().collect();
        Ok(self.store.apply(self.base_version, writes)?)
    }

    /// Buffer an event for publication after commit.
    pub fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Journal an external side effect so it can be undone on abort.
    pub fn record_compensation(&mut self, compensation: Compensation) {
        self.compensations.push(compensation);
    }

    pub fn take_compensations(&mut self) -> Vec<Compensation> {
        std::mem::take(&mut self.compensations)
    }

    fn read(&self, key: &StateKey) -> VaultResult<Option<StateValue>> {
        if let Some(value) = self.writes.get(key) {
            return Ok(Some(value.clone()));
        }
        Ok(self.store.get(key)?)
    }

    fn write(&mut self, key: StateKey, value: StateValue) {
        self.writes.insert(key, value);
    }

    /// Committed records of one key space overlaid with pending writes.
    fn scan(&self, space: KeySpace) -> VaultResult<Vec<(StateKey, StateValue)>> {
        let mut merged: BTreeMap<StateKey, StateValue> =
            self.store.scan(space)?.into_iter().collect();
        for (key, value) in self.writes.iter().filter(|(k, _)| k.space() == space) {
            merged.insert(key.clone(), value.clone());
        }
        Ok(merged.into_iter().collect())
    }

    // ── counters ────────────────────────────────────────────────────────

    /// Take the next value of a counter and advance it.
    pub fn next_id(&mut self, counter: Counter) -> VaultResult<u64> {
        let key = StateKey::Counter(counter);
        let current = match self.read(&key)? {
            Some(StateValue::Counter(value)) => value,
            Some(_) => return Err(mismatch(&key)),
            None => FIRST_ID,
        };
        let next = current
            .checked_add(1)
            .ok_or(VaultError::ArithmeticOverflow("id counter"))?;
        self.write(key, StateValue::Counter(next));
        Ok(current)
    }

    /// Value the counter will hand out next.
    pub fn peek_id(&self, counter: Counter) -> VaultResult<u64> {
        let key = StateKey::Counter(counter);
        match self.read(&key)? {
            Some(StateValue::Counter(value)) => Ok(value),
            Some(_) => Err(mismatch(&key)),
            None => Ok(FIRST_ID),
        }
    }

    // ── protocols ───────────────────────────────────────────────────────

    pub fn protocol(&self, id: ProtocolId) -> VaultResult<Option<Protocol>> {
        let key = StateKey::Protocol(id);
        match self.read(&key)? {
            Some(StateValue::Protocol(p)) => Ok(Some(p)),
            Some(_) => Err(mismatch(&key)),
            None => Ok(None),
        }
    }

    pub fn put_protocol(&mut self, protocol: Protocol) {
        self.write(
            StateKey::Protocol(protocol.id),
            StateValue::Protocol(protocol),
        );
    }

    pub fn protocols(&self) -> VaultResult<Vec<Protocol>> {
        self.scan(KeySpace::Protocol)?
            .into_iter()
            .map(|(key, value)| match value {
                StateValue::Protocol(p) => Ok(p),
                _ => Err(mismatch(&key)),
            })
            .collect()
    }

    pub fn risk_params(&self, id: ProtocolId) -> VaultResult<Option<RiskParams>> {
        let key = StateKey::RiskParams(id);
        match self.read(&key)? {
            Some(StateValue::RiskParams(r)) => Ok(Some(r)),
            Some(_) => Err(mismatch(&key)),
            None => Ok(None),
        }
    }

    pub fn put_risk_params(&mut self, params: RiskParams) {
        self.write(
            StateKey::RiskParams(params.protocol_id),
            StateValue::RiskParams(params),
        );
    }

    // ── vaults ──────────────────────────────────────────────────────────

    pub fn vault(&self, id: VaultId) -> VaultResult<Option<Vault>> {
        let key = StateKey::Vault(id);
        match self.read(&key)? {
            Some(StateValue::Vault(v)) => Ok(Some(v)),
            Some(_) => Err(mismatch(&key)),
            None => Ok(None),
        }
    }

    pub fn put_vault(&mut self, vault: Vault) {
        self.write(StateKey::Vault(vault.id), StateValue::Vault(vault));
    }

    pub fn vaults(&self) -> VaultResult<Vec<Vault>> {
        self.scan(KeySpace::Vault)?
            .into_iter()
            .map(|(key, value)| match value {
                StateValue::Vault(v) => Ok(v),
                _ => Err(mismatch(&key)),
            })
            .collect()
    }

    pub fn vault_position(
        &self,
        vault_id: VaultId,
        user: &Principal,
    ) -> VaultResult<Option<UserVaultPosition>> {
        let key = StateKey::VaultPosition(vault_id, user.clone());
        match self.read(&key)? {
            Some(StateValue::VaultPosition(p)) => Ok(Some(p)),
            Some(_) => Err(mismatch(&key)),
            None => Ok(None),
        }
    }

    pub fn put_vault_position(&mut self, position: UserVaultPosition) {
        self.write(
            StateKey::VaultPosition(position.vault_id, position.user.clone()),
            StateValue::VaultPosition(position),
        );
    }

    /// Every position held in one vault.
    pub fn vault_positions(&self, vault_id: VaultId) -> VaultResult<Vec<UserVaultPosition>> {
        let mut positions = Vec::new();
        for (key, value) in self.scan(KeySpace::VaultPosition)? {
            match (&key, value) {
                (StateKey::VaultPosition(v, _), StateValue::VaultPosition(p)) if *v == vault_id => {
                    positions.push(p)
                }
                (StateKey::VaultPosition(..), StateValue::VaultPosition(_)) => {}
                _ => return Err(mismatch(&key)),
            }
        }
        Ok(positions)
    }

    // ── user records ────────────────────────────────────────────────────

    pub fn protocol_position(
        &self,
        user: &Principal,
        protocol_id: ProtocolId,
    ) -> VaultResult<Option<UserProtocolPosition>> {
        let key = StateKey::ProtocolPosition(user.clone(), protocol_id);
        match self.read(&key)? {
            Some(StateValue::ProtocolPosition(p)) => Ok(Some(p)),
            Some(_) => Err(mismatch(&key)),
            None => Ok(None),
        }
    }

    pub fn put_protocol_position(&mut self, position: UserProtocolPosition) {
        self.write(
            StateKey::ProtocolPosition(position.user.clone(), position.protocol_id),
            StateValue::ProtocolPosition(position),
        );
    }

    pub fn risk_settings(&self, user: &Principal) -> VaultResult<Option<UserRiskSettings>> {
        let key = StateKey::RiskSettings(user.clone());
        match self.read(&key)? {
            Some(StateValue::RiskSettings(s)) => Ok(Some(s)),
            Some(_) => Err(mismatch(&key)),
            None => Ok(None),
        }
    }

    pub fn put_risk_settings(&mut self, user: Principal, settings: UserRiskSettings) {
        self.write(
            StateKey::RiskSettings(user),
            StateValue::RiskSettings(settings),
        );
    }
}

fn mismatch(key: &StateKey) -> VaultError {
    StoreError::TypeMismatch(key.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStateStore;

    #[test]
    fn reads_see_own_writes_before_commit() {
        let store = InMemoryStateStore::new();
        let mut tx = Transaction::begin(&store, 5).unwrap();

        tx.put_risk_settings(Principal::new("alice"), UserRiskSettings::default());
        assert!(tx.risk_settings(&Principal::new("alice")).unwrap().is_some());
        assert!(store.is_empty().unwrap());

        tx.apply().unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn dropped_transaction_discards_writes() {
        let store = InMemoryStateStore::new();
        {
            let mut tx = Transaction::begin(&store, 1).unwrap();
            assert_eq!(tx.next_id(Counter::NextVaultId).unwrap(), 1);
            assert_eq!(tx.next_id(Counter::NextVaultId).unwrap(), 2);
        }
        let tx = Transaction::begin(&store, 2).unwrap();
        assert_eq!(tx.peek_id(Counter::NextVaultId).unwrap(), 1);
    }

    #[test]
    fn read_only_apply_does_not_bump_version() {
        let store = InMemoryStateStore::new();
        let mut tx = Transaction::begin(&store, 1).unwrap();
        assert!(!tx.has_writes());
        assert_eq!(tx.apply().unwrap(), 0);
        assert_eq!(store.version().unwrap(), 0);
    }

    #[test]
    fn concurrent_transactions_conflict() {
        let store = InMemoryStateStore::new();
        let mut first = Transaction::begin(&store, 1).unwrap();
        let mut second = Transaction::begin(&store, 1).unwrap();

        first.next_id(Counter::NextProtocolId).unwrap();
        second.next_id(Counter::NextProtocolId).unwrap();

        first.apply().unwrap();
        let err = second.apply().unwrap_err();
        assert!(matches!(err, VaultError::Storage(_)));
    }
}
