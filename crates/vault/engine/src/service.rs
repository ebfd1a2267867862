//! The ledger facade.
//!
//! Every public operation runs under one serialization guard inside a
//! [`Transaction`]. On success the writes are applied in one versioned commit
//! and the buffered events are published. On failure the writes are dropped
//! and journalled external effects are unwound.

use std::sync::{Arc, Mutex};

use tracing::{debug, error, warn};
use vault_types::{
    AllocationEntry, EventRecord, Principal, Protocol, ProtocolCategory, ProtocolId,
    ProtocolShare, RiskParams, TokenAmount, UserProtocolPosition, UserRiskSettings,
    UserVaultPosition, Vault, VaultError, VaultId, VaultMeta, VaultResult,
};

use crate::batch::{self, ActionReceipt, BatchAction};
use crate::capability::Capabilities;
use crate::config::LedgerConfig;
use crate::context::OperationContext;
use crate::journal;
use crate::ledger::{self, VaultAudit, VaultMovement};
use crate::positions::{self, PositionReport};
use crate::registry::{self, NewProtocol, RiskParamsUpdate};
use crate::risk::{self, RiskAssessment};
use crate::store::{Counter, StateStore, Transaction};

pub struct VaultService {
    store: Arc<dyn StateStore>,
    caps: Capabilities,
    config: LedgerConfig,
    guard: Mutex<()>,
}

impl VaultService {
    pub fn new(store: Arc<dyn StateStore>, caps: Capabilities, config: LedgerConfig) -> Self {
        Self {
            store,
            caps,
            config,
            guard: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Run one mutating operation atomically.
    fn execute<T>(
        &self,
        operation: &'static str,
        ctx: &OperationContext,
        f: impl FnOnce(&mut Transaction<'_>) -> VaultResult<T>,
    ) -> VaultResult<T> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| VaultError::Storage("operation guard poisoned".into()))?;

        let mut tx = Transaction::begin(self.store.as_ref(), ctx.height)?;
        let outcome = f(&mut tx).and_then(|value| tx.apply().map(|version| (value, version)));

        match outcome {
            Ok((value, version)) => {
                debug!(operation, caller = %ctx.caller, version, "Operation committed");
                for event in tx.take_events() {
                    self.caps.events.publish(EventRecord::new(ctx.height, event));
                }
                Ok(value)
            }
            Err(err) => {
                warn!(
                    operation,
                    caller = %ctx.caller,
                    code = err.code(),
                    error = %err,
                    "Operation rejected"
                );
                let compensations = tx.take_compensations();
                if !compensations.is_empty() {
                    let failed = journal::unwind(&self.caps, compensations);
                    if failed > 0 {
                        error!(operation, failed, "External effects left partially unwound");
                    }
                }
                Err(err)
            }
        }
    }

    /// Run a read against a consistent snapshot.
    fn read<T>(&self, f: impl FnOnce(&Transaction<'_>) -> VaultResult<T>) -> VaultResult<T> {
        let _guard = self
            .guard
            .lock()
            .map_err(|_| VaultError::Storage("operation guard poisoned".into()))?;
        let tx = Transaction::begin(self.store.as_ref(), 0)?;
        f(&tx)
    }

    // ── protocol registry ───────────────────────────────────────────────

    pub fn register_protocol(
        &self,
        ctx: &OperationContext,
        name: impl Into<String>,
        address: impl Into<String>,
        supported_tokens: Vec<String>,
        category: ProtocolCategory,
    ) -> VaultResult<ProtocolId> {
        let new = NewProtocol {
            name: name.into(),
            address: address.into(),
            supported_tokens,
            category,
        };
        self.execute("register_protocol", ctx, |tx| {
            registry::register(tx, ctx, &self.config, new)
        })
    }

    pub fn update_protocol_status(
        &self,
        ctx: &OperationContext,
        protocol_id: ProtocolId,
        active: bool,
        trusted: bool,
    ) -> VaultResult<()> {
        self.execute("update_protocol_status", ctx, |tx| {
            registry::set_status(tx, ctx, &self.config, protocol_id, active, trusted)
        })
    }

    pub fn set_protocol_risk_params(
        &self,
        ctx: &OperationContext,
        protocol_id: ProtocolId,
        update: RiskParamsUpdate,
    ) -> VaultResult<()> {
        self.execute("set_protocol_risk_params", ctx, |tx| {
            registry::set_risk_params(tx, ctx, &self.config, protocol_id, update)
        })
    }

    // ── vaults ──────────────────────────────────────────────────────────

    pub fn create_vault(
        &self,
        ctx: &OperationContext,
        meta: VaultMeta,
        allocation: Vec<AllocationEntry>,
    ) -> VaultResult<VaultId> {
        self.execute("create_vault", ctx, |tx| {
            ledger::create(tx, ctx, meta, allocation)
        })
    }

    pub fn deposit(
        &self,
        ctx: &OperationContext,
        vault_id: VaultId,
        amount: u64,
    ) -> VaultResult<VaultMovement> {
        self.execute("deposit", ctx, |tx| {
            ledger::deposit(tx, &self.caps, ctx, &self.config, vault_id, amount)
        })
    }

    pub fn withdraw(
        &self,
        ctx: &OperationContext,
        vault_id: VaultId,
        amount: u64,
    ) -> VaultResult<VaultMovement> {
        self.execute("withdraw", ctx, |tx| {
            ledger::withdraw(tx, &self.caps, ctx, &self.config, vault_id, amount)
        })
    }

    pub fn rebalance_vault(
        &self,
        ctx: &OperationContext,
        vault_id: VaultId,
    ) -> VaultResult<Vec<ProtocolShare>> {
        self.execute("rebalance_vault", ctx, |tx| {
            ledger::rebalance(tx, ctx, &self.config, vault_id)
        })
    }

    pub fn set_vault_status(
        &self,
        ctx: &OperationContext,
        vault_id: VaultId,
        active: bool,
    ) -> VaultResult<()> {
        self.execute("set_vault_status", ctx, |tx| {
            ledger::set_status(tx, ctx, &self.config, vault_id, active)
        })
    }

    pub fn set_position_strategy(
        &self,
        ctx: &OperationContext,
        vault_id: VaultId,
        strategy: Option<String>,
    ) -> VaultResult<()> {
        self.execute("set_position_strategy", ctx, |tx| {
            ledger::set_position_strategy(tx, ctx, vault_id, strategy)
        })
    }

    // ── risk ────────────────────────────────────────────────────────────

    pub fn set_risk_preferences(
        &self,
        ctx: &OperationContext,
        settings: UserRiskSettings,
    ) -> VaultResult<()> {
        self.execute("set_risk_preferences", ctx, |tx| {
            risk::set_preferences(tx, ctx, settings)
        })
    }

    /// Alert check for `user`; any caller may ask.
    pub fn check_liquidation_risk(
        &self,
        ctx: &OperationContext,
        user: &Principal,
        protocol_id: ProtocolId,
    ) -> VaultResult<bool> {
        self.execute("check_liquidation_risk", ctx, |tx| {
            risk::check_liquidation_risk(tx, &self.caps, &self.config, user, protocol_id)
        })
    }

    pub fn assess_risk(&self, user: &Principal, protocol_id: ProtocolId) -> VaultResult<RiskAssessment> {
        self.read(|tx| risk::assess(tx, &self.caps, &self.config, user, protocol_id))
    }

    // ── positions and batches ───────────────────────────────────────────

    pub fn update_protocol_position(
        &self,
        ctx: &OperationContext,
        protocol_id: ProtocolId,
        report: PositionReport,
    ) -> VaultResult<()> {
        self.execute("update_protocol_position", ctx, |tx| {
            positions::update(tx, ctx, protocol_id, report)
        })
    }

    pub fn execute_batch(
        &self,
        ctx: &OperationContext,
        actions: Vec<BatchAction>,
    ) -> VaultResult<Vec<ActionReceipt>> {
        self.execute("execute_batch", ctx, |tx| {
            batch::execute(tx, &self.caps, ctx, &self.config, actions)
        })
    }

    // ── reads ───────────────────────────────────────────────────────────

    pub fn protocol(&self, id: ProtocolId) -> VaultResult<Option<Protocol>> {
        self.read(|tx| tx.protocol(id))
    }

    pub fn protocols(&self) -> VaultResult<Vec<Protocol>> {
        self.read(|tx| tx.protocols())
    }

    pub fn risk_params(&self, id: ProtocolId) -> VaultResult<Option<RiskParams>> {
        self.read(|tx| tx.risk_params(id))
    }

    pub fn vault(&self, id: VaultId) -> VaultResult<Option<Vault>> {
        self.read(|tx| tx.vault(id))
    }

    pub fn vaults(&self) -> VaultResult<Vec<Vault>> {
        self.read(|tx| tx.vaults())
    }

    pub fn user_position(
        &self,
        vault_id: VaultId,
        user: &Principal,
    ) -> VaultResult<Option<UserVaultPosition>> {
        self.read(|tx| ledger::position(tx, vault_id, user))
    }

    pub fn protocol_position(
        &self,
        user: &Principal,
        protocol_id: ProtocolId,
    ) -> VaultResult<Option<UserProtocolPosition>> {
        self.read(|tx| tx.protocol_position(user, protocol_id))
    }

    /// Stored settings, or the configured defaults.
    pub fn risk_settings(&self, user: &Principal) -> VaultResult<UserRiskSettings> {
        self.read(|tx| risk::settings(tx, &self.config, user))
    }

    pub fn vault_exposure(&self, vault_id: VaultId) -> VaultResult<Vec<ProtocolShare>> {
        self.read(|tx| ledger::exposure(tx, vault_id))
    }

    pub fn audit_vault(&self, vault_id: VaultId) -> VaultResult<VaultAudit> {
        self.read(|tx| ledger::audit(tx, vault_id))
    }

    pub fn next_protocol_id(&self) -> VaultResult<ProtocolId> {
        self.read(|tx| tx.peek_id(Counter::NextProtocolId).map(ProtocolId))
    }

    pub fn next_vault_id(&self) -> VaultResult<VaultId> {
        self.read(|tx| tx.peek_id(Counter::NextVaultId).map(VaultId))
    }
}

/// Shorthand for building token lists in position reports.
pub fn tokens(entries: &[(&str, u64)]) -> Vec<TokenAmount> {
    entries
        .iter()
        .map(|&(token, amount)| TokenAmount::new(token, amount))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::MemoryEventSink;
    use crate::store::InMemoryStateStore;

    fn service() -> (VaultService, Arc<MemoryEventSink>) {
        let events = Arc::new(MemoryEventSink::new());
        let caps = Capabilities::default().with_events(events.clone());
        let service = VaultService::new(
            Arc::new(InMemoryStateStore::new()),
            caps,
            LedgerConfig::default(),
        );
        (service, events)
    }

    #[test]
    fn events_publish_only_after_commit() {
        let (service, events) = service();
        let admin = OperationContext::new("admin", 1);

        service
            .register_protocol(&admin, "alpha", "SP000.alpha", vec!["STX".into()], ProtocolCategory::Farm)
            .unwrap();
        assert_eq!(events.names(), vec!["protocol_registered"]);

        let eve = OperationContext::new("eve", 2);
        assert!(service
            .register_protocol(&eve, "beta", "SP000.beta", vec![], ProtocolCategory::Farm)
            .is_err());
        assert_eq!(events.len(), 1);
        assert_eq!(service.next_protocol_id().unwrap(), ProtocolId(2));
    }

    #[test]
    fn reads_fall_back_to_defaults() {
        let (service, _) = service();
        let alice = Principal::new("alice");
        assert_eq!(service.risk_settings(&alice).unwrap(), UserRiskSettings::default());
        assert!(service.vault(VaultId(1)).unwrap().is_none());
        assert_eq!(
            service.vault_exposure(VaultId(1)).unwrap_err(),
            VaultError::VaultNotFound(VaultId(1))
        );
        assert_eq!(service.next_vault_id().unwrap(), VaultId(1));
    }

    #[test]
    fn tokens_helper_builds_entries() {
        assert_eq!(
            tokens(&[("STX", 5), ("USDA", 7)]),
            vec![TokenAmount::new("STX", 5), TokenAmount::new("USDA", 7)]
        );
    }
}
