//! Vault definitions, aggregate totals and per-user positions.
//!
//! `vault.total_assets` always equals the sum of the vault's position
//! amounts. Per-protocol exposure is not stored; it is the split of
//! `total_assets` over the vault's target allocation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vault_types::{
    AllocationEntry, LedgerEvent, Principal, ProtocolShare, TargetAllocation, UserVaultPosition,
    Vault, VaultError, VaultId, VaultMeta, VaultResult, VaultStatus, MAX_RISK_LEVEL,
    MAX_STRATEGY_LEN, MAX_VAULT_NAME_LEN, MIN_RISK_LEVEL,
};

use crate::allocation;
use crate::capability::{AdapterAction, Capabilities};
use crate::config::LedgerConfig;
use crate::context::OperationContext;
use crate::journal;
use crate::store::{Counter, Transaction};

/// Outcome of a deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMovement {
    pub vault_id: VaultId,
    pub amount: u64,
    pub shares: Vec<ProtocolShare>,
    /// Caller's position after the movement.
    pub position: u64,
    pub total_assets: u64,
}

/// Result of recomputing a vault's total from its positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultAudit {
    pub vault_id: VaultId,
    pub total_assets: u64,
    pub positions_total: u128,
    pub positions: usize,
}

impl VaultAudit {
    pub fn is_consistent(&self) -> bool {
        u128::from(self.total_assets) == self.positions_total
    }
}

pub fn create(
    tx: &mut Transaction<'_>,
    ctx: &OperationContext,
    meta: VaultMeta,
    entries: Vec<AllocationEntry>,
) -> VaultResult<VaultId> {
    if !(MIN_RISK_LEVEL..=MAX_RISK_LEVEL).contains(&meta.risk_level) {
        return Err(VaultError::invalid_parameter(format!(
            "risk level {} outside {}..={}",
            meta.risk_level, MIN_RISK_LEVEL, MAX_RISK_LEVEL
        )));
    }
    if meta.name.trim().is_empty() || meta.name.len() > MAX_VAULT_NAME_LEN {
        return Err(VaultError::invalid_parameter(format!(
            "vault name must be 1..={} bytes",
            MAX_VAULT_NAME_LEN
        )));
    }
    let allocation = TargetAllocation::new(entries)?;
    allocation::resolve_targets(tx, &allocation)?;

    let id = VaultId(tx.next_id(Counter::NextVaultId)?);
    let vault = Vault {
        id,
        creator: ctx.caller.clone(),
        meta,
        allocation,
        status: VaultStatus::Active,
        total_assets: 0,
        created_height: ctx.height,
        created_at: Utc::now(),
    };

    info!(
        vault_id = %id,
        creator = %ctx.caller,
        targets = vault.allocation.len(),
        risk_level = vault.meta.risk_level,
        "Vault created"
    );
    tx.emit(LedgerEvent::VaultCreated {
        vault_id: id,
        creator: ctx.caller.clone(),
    });
    tx.put_vault(vault);
    Ok(id)
}

/// Look up a vault of any status.
pub fn require(tx: &Transaction<'_>, id: VaultId) -> VaultResult<Vault> {
    tx.vault(id)?.ok_or(VaultError::VaultNotFound(id))
}

/// Look up a vault that accepts deposits and withdrawals.
pub fn require_active(tx: &Transaction<'_>, id: VaultId) -> VaultResult<Vault> {
    let vault = require(tx, id)?;
    if !vault.is_active() {
        return Err(VaultError::VaultNotFound(id));
    }
    Ok(vault)
}

pub fn deposit(
    tx: &mut Transaction<'_>,
    caps: &Capabilities,
    ctx: &OperationContext,
    config: &LedgerConfig,
    vault_id: VaultId,
    amount: u64,
) -> VaultResult<VaultMovement> {
    ctx.require_not_custody(config, &format!("deposit to {}", vault_id))?;
    let mut vault = require_active(tx, vault_id)?;
    if amount == 0 {
        return Err(VaultError::InvalidAmount("deposit amount must be positive".into()));
    }

    let new_total = vault
        .total_assets
        .checked_add(amount)
        .ok_or(VaultError::ArithmeticOverflow("vault total"))?;
    if let Some(capacity) = config.limits.max_vault_capacity {
        if new_total > capacity {
            warn!(vault_id = %vault_id, capacity, requested = new_total, "Vault capacity exceeded");
            return Err(VaultError::VaultFull {
                vault: vault_id,
                capacity,
                requested: new_total,
            });
        }
    }

    let distribution = allocation::distribute(tx, &vault.allocation, amount)?;
    debug!(
        vault_id = %vault_id,
        amount,
        remainder = distribution.remainder(),
        "Deposit distributed"
    );

    journal::transfer(caps, tx, &ctx.caller, &config.custody, amount)?;

    let mut position = tx
        .vault_position(vault_id, &ctx.caller)?
        .unwrap_or_else(|| UserVaultPosition::empty(ctx.caller.clone(), vault_id, ctx.height));
    position.amount = position
        .amount
        .checked_add(amount)
        .ok_or(VaultError::ArithmeticOverflow("position amount"))?;
    position.last_rebalance_height = ctx.height;
    vault.total_assets = new_total;

    for leg in distribution.legs.iter().filter(|leg| leg.amount > 0) {
        journal::adapter_call(caps, tx, &leg.protocol, AdapterAction::Deposit, leg.amount)?;
    }

    let movement = VaultMovement {
        vault_id,
        amount,
        shares: distribution.shares(),
        position: position.amount,
        total_assets: vault.total_assets,
    };
    info!(
        vault_id = %vault_id,
        user = %ctx.caller,
        amount,
        total_assets = movement.total_assets,
        "Deposit recorded"
    );
    tx.emit(LedgerEvent::Deposited {
        vault_id,
        user: ctx.caller.clone(),
        amount,
        shares: movement.shares.clone(),
        total_assets: movement.total_assets,
    });
    tx.put_vault_position(position);
    tx.put_vault(vault);
    Ok(movement)
}

pub fn withdraw(
    tx: &mut Transaction<'_>,
    caps: &Capabilities,
    ctx: &OperationContext,
    config: &LedgerConfig,
    vault_id: VaultId,
    amount: u64,
) -> VaultResult<VaultMovement> {
    ctx.require_not_custody(config, &format!("withdraw from {}", vault_id))?;
    let mut vault = require(tx, vault_id)?;
    if amount == 0 {
        return Err(VaultError::InvalidAmount("withdraw amount must be positive".into()));
    }
    let mut position = tx
        .vault_position(vault_id, &ctx.caller)?
        .ok_or_else(|| VaultError::PositionNotFound {
            user: ctx.caller.to_string(),
            vault: vault_id,
        })?;
    if position.amount < amount {
        warn!(
            vault_id = %vault_id,
            user = %ctx.caller,
            requested = amount,
            available = position.amount,
            "Withdrawal exceeds position"
        );
        return Err(VaultError::InsufficientFunds {
            requested: amount,
            available: position.amount,
        });
    }
    if !vault.is_active() {
        return Err(VaultError::VaultNotFound(vault_id));
    }

    let distribution = allocation::distribute(tx, &vault.allocation, amount)?;
    for leg in distribution.legs.iter().filter(|leg| leg.amount > 0) {
        journal::adapter_call(caps, tx, &leg.protocol, AdapterAction::Withdraw, leg.amount)?;
    }

    position.amount -= amount;
    vault.total_assets = vault
        .total_assets
        .checked_sub(amount)
        .ok_or(VaultError::ArithmeticOverflow("vault total"))?;

    journal::transfer(caps, tx, &config.custody, &ctx.caller, amount)?;

    let movement = VaultMovement {
        vault_id,
        amount,
        shares: distribution.shares(),
        position: position.amount,
        total_assets: vault.total_assets,
    };
    info!(
        vault_id = %vault_id,
        user = %ctx.caller,
        amount,
        total_assets = movement.total_assets,
        "Withdrawal recorded"
    );
    tx.emit(LedgerEvent::Withdrawn {
        vault_id,
        user: ctx.caller.clone(),
        amount,
        shares: movement.shares.clone(),
        total_assets: movement.total_assets,
    });
    tx.put_vault_position(position);
    tx.put_vault(vault);
    Ok(movement)
}

/// Report the vault's current exposure. Moves no funds.
pub fn rebalance(
    tx: &mut Transaction<'_>,
    ctx: &OperationContext,
    config: &LedgerConfig,
    vault_id: VaultId,
) -> VaultResult<Vec<ProtocolShare>> {
    let vault = require(tx, vault_id)?;
    ctx.require_owner_or_admin(&vault.creator, config, &format!("rebalance {}", vault_id))?;

    let exposure = allocation::split(&vault.allocation, vault.total_assets);
    info!(vault_id = %vault_id, caller = %ctx.caller, total_assets = vault.total_assets, "Vault rebalanced");
    tx.emit(LedgerEvent::Rebalanced {
        vault_id,
        caller: ctx.caller.clone(),
        exposure: exposure.clone(),
    });
    Ok(exposure)
}

pub fn set_status(
    tx: &mut Transaction<'_>,
    ctx: &OperationContext,
    config: &LedgerConfig,
    vault_id: VaultId,
    active: bool,
) -> VaultResult<()> {
    let mut vault = require(tx, vault_id)?;
    ctx.require_owner_or_admin(&vault.creator, config, &format!("change status of {}", vault_id))?;

    vault.status = if active {
        VaultStatus::Active
    } else {
        VaultStatus::Inactive
    };
    info!(vault_id = %vault_id, active, "Vault status updated");
    tx.emit(LedgerEvent::VaultStatusChanged { vault_id, active });
    tx.put_vault(vault);
    Ok(())
}

/// Set or clear the caller's strategy parameter on an existing position.
pub fn set_position_strategy(
    tx: &mut Transaction<'_>,
    ctx: &OperationContext,
    vault_id: VaultId,
    strategy: Option<String>,
) -> VaultResult<()> {
    require(tx, vault_id)?;
    let mut position = tx
        .vault_position(vault_id, &ctx.caller)?
        .ok_or_else(|| VaultError::PositionNotFound {
            user: ctx.caller.to_string(),
            vault: vault_id,
        })?;
    if let Some(label) = &strategy {
        if label.len() > MAX_STRATEGY_LEN {
            return Err(VaultError::invalid_parameter(format!(
                "strategy longer than {} bytes",
                MAX_STRATEGY_LEN
            )));
        }
    }
    position.strategy = strategy;
    tx.put_vault_position(position);
    Ok(())
}

pub fn exposure(tx: &Transaction<'_>, vault_id: VaultId) -> VaultResult<Vec<ProtocolShare>> {
    let vault = require(tx, vault_id)?;
    Ok(allocation::split(&vault.allocation, vault.total_assets))
}

pub fn audit(tx: &Transaction<'_>, vault_id: VaultId) -> VaultResult<VaultAudit> {
    let vault = require(tx, vault_id)?;
    let positions = tx.vault_positions(vault_id)?;
    let audit = VaultAudit {
        vault_id,
        total_assets: vault.total_assets,
        positions_total: positions.iter().map(|p| u128::from(p.amount)).sum(),
        positions: positions.len(),
    };
    if !audit.is_consistent() {
        warn!(
            vault_id = %vault_id,
            total_assets = audit.total_assets,
            positions_total = %audit.positions_total,
            "Vault total diverges from positions"
        );
    }
    Ok(audit)
}

/// A user's position in a vault, if any.
pub fn position(
    tx: &Transaction<'_>,
    vault_id: VaultId,
    user: &Principal,
) -> VaultResult<Option<UserVaultPosition>> {
    tx.vault_position(vault_id, user)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::capability::{AdapterSet, InMemorySettlement, RecordingAdapter, SettlementLedger};
    use crate::registry::{self, NewProtocol};
    use crate::store::InMemoryStateStore;
    use vault_types::{ProtocolCategory, ProtocolId};

    struct Fixture {
        store: InMemoryStateStore,
        caps: Capabilities,
        settlement: Arc<InMemorySettlement>,
        adapter: Arc<RecordingAdapter>,
        config: LedgerConfig,
    }

    fn fixture() -> Fixture {
        let settlement = Arc::new(InMemorySettlement::new());
        let adapter = Arc::new(RecordingAdapter::new());
        let caps = Capabilities::default()
            .with_settlement(settlement.clone())
            .with_adapters(AdapterSet::new(adapter.clone()));
        settlement.credit(&Principal::new("alice"), 10_000).unwrap();
        Fixture {
            store: InMemoryStateStore::new(),
            caps,
            settlement,
            adapter,
            config: LedgerConfig::default(),
        }
    }

    fn meta(risk_level: u8) -> VaultMeta {
        VaultMeta {
            name: "balanced".into(),
            description: String::new(),
            strategy: String::new(),
            risk_level,
        }
    }

    fn seed(tx: &mut Transaction<'_>, config: &LedgerConfig) -> VaultId {
        let admin = OperationContext::new("admin", 1);
        for name in ["alpha", "beta"] {
            registry::register(
                tx,
                &admin,
                config,
                NewProtocol {
                    name: name.into(),
                    address: format!("SP000.{}", name),
                    supported_tokens: vec!["STX".into()],
                    category: ProtocolCategory::Lending,
                },
            )
            .unwrap();
        }
        create(
            tx,
            &OperationContext::new("carol", 1),
            meta(5),
            vec![
                AllocationEntry::new(ProtocolId(1), 60),
                AllocationEntry::new(ProtocolId(2), 40),
            ],
        )
        .unwrap()
    }

    #[test]
    fn create_validates_risk_level_and_targets() {
        let f = fixture();
        let mut tx = Transaction::begin(&f.store, 1).unwrap();
        seed(&mut tx, &f.config);
        let carol = OperationContext::new("carol", 2);

        let err = create(&mut tx, &carol, meta(0), vec![AllocationEntry::new(ProtocolId(1), 100)])
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidParameter");
        let err = create(&mut tx, &carol, meta(11), vec![AllocationEntry::new(ProtocolId(1), 100)])
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidParameter");

        let mut long_name = meta(3);
        long_name.name = "v".repeat(MAX_VAULT_NAME_LEN + 1);
        let err = create(&mut tx, &carol, long_name, vec![AllocationEntry::new(ProtocolId(1), 100)])
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidParameter");

        let err = create(&mut tx, &carol, meta(3), vec![AllocationEntry::new(ProtocolId(9), 100)])
            .unwrap_err();
        assert_eq!(err, VaultError::InvalidProtocol(ProtocolId(9)));
        assert_eq!(tx.peek_id(Counter::NextVaultId).unwrap(), 2);
    }

    #[test]
    fn deposit_and_withdraw_track_totals() {
        let f = fixture();
        let mut tx = Transaction::begin(&f.store, 1).unwrap();
        let vault_id = seed(&mut tx, &f.config);
        let alice = OperationContext::new("alice", 2);

        let moved = deposit(&mut tx, &f.caps, &alice, &f.config, vault_id, 1000).unwrap();
        assert_eq!(moved.total_assets, 1000);
        assert_eq!(moved.position, 1000);
        assert_eq!(f.adapter.deployed(ProtocolId(1)), 600);
        assert_eq!(f.adapter.deployed(ProtocolId(2)), 400);
        assert_eq!(f.settlement.balance(&f.config.custody).unwrap(), 1000);

        let moved = withdraw(&mut tx, &f.caps, &alice, &f.config, vault_id, 400).unwrap();
        assert_eq!(moved.position, 600);
        assert_eq!(moved.total_assets, 600);
        assert_eq!(f.settlement.balance(&Principal::new("alice")).unwrap(), 9_400);

        let err = withdraw(&mut tx, &f.caps, &alice, &f.config, vault_id, 1000).unwrap_err();
        assert_eq!(
            err,
            VaultError::InsufficientFunds {
                requested: 1000,
                available: 600
            }
        );
        assert!(audit(&tx, vault_id).unwrap().is_consistent());
    }

    #[test]
    fn deposit_rejects_bad_input_before_transfer() {
        let f = fixture();
        let mut tx = Transaction::begin(&f.store, 1).unwrap();
        let vault_id = seed(&mut tx, &f.config);
        let alice = OperationContext::new("alice", 2);

        let err = deposit(&mut tx, &f.caps, &alice, &f.config, vault_id, 0).unwrap_err();
        assert_eq!(err.kind(), "InvalidAmount");
        let err = deposit(&mut tx, &f.caps, &alice, &f.config, VaultId(42), 5).unwrap_err();
        assert_eq!(err, VaultError::VaultNotFound(VaultId(42)));

        let bob = OperationContext::new("bob", 2);
        let err = deposit(&mut tx, &f.caps, &bob, &f.config, vault_id, 5).unwrap_err();
        assert_eq!(err.kind(), "InsufficientFunds");
        assert!(tx.take_compensations().is_empty());
    }

    #[test]
    fn capacity_limit_applies() {
        let mut f = fixture();
        f.config.limits.max_vault_capacity = Some(1500);
        let mut tx = Transaction::begin(&f.store, 1).unwrap();
        let vault_id = seed(&mut tx, &f.config);
        let alice = OperationContext::new("alice", 2);

        deposit(&mut tx, &f.caps, &alice, &f.config, vault_id, 1000).unwrap();
        let err = deposit(&mut tx, &f.caps, &alice, &f.config, vault_id, 501).unwrap_err();
        assert_eq!(err.code(), 109);
    }

    #[test]
    fn rebalance_and_status_require_creator_or_admin() {
        let f = fixture();
        let mut tx = Transaction::begin(&f.store, 1).unwrap();
        let vault_id = seed(&mut tx, &f.config);
        let alice = OperationContext::new("alice", 2);
        deposit(&mut tx, &f.caps, &alice, &f.config, vault_id, 1000).unwrap();

        let err = rebalance(&mut tx, &alice, &f.config, vault_id).unwrap_err();
        assert_eq!(err.kind(), "NotAuthorized");
        let exposure = rebalance(&mut tx, &OperationContext::new("carol", 3), &f.config, vault_id)
            .unwrap();
        assert_eq!(exposure[0].amount, 600);
        assert_eq!(exposure[1].amount, 400);

        set_status(&mut tx, &OperationContext::new("admin", 3), &f.config, vault_id, false)
            .unwrap();
        let err = deposit(&mut tx, &f.caps, &alice, &f.config, vault_id, 1).unwrap_err();
        assert_eq!(err, VaultError::VaultNotFound(vault_id));
        let err = withdraw(&mut tx, &f.caps, &alice, &f.config, vault_id, 1).unwrap_err();
        assert_eq!(err, VaultError::VaultNotFound(vault_id));
        assert!(rebalance(&mut tx, &OperationContext::new("carol", 4), &f.config, vault_id).is_ok());
    }

    #[test]
    fn strategy_requires_position() {
        let f = fixture();
        let mut tx = Transaction::begin(&f.store, 1).unwrap();
        let vault_id = seed(&mut tx, &f.config);
        let alice = OperationContext::new("alice", 2);

        let err = set_position_strategy(&mut tx, &alice, vault_id, Some("steady".into()))
            .unwrap_err();
        assert_eq!(err.kind(), "PositionNotFound");

        deposit(&mut tx, &f.caps, &alice, &f.config, vault_id, 10).unwrap();
        set_position_strategy(&mut tx, &alice, vault_id, Some("steady".into())).unwrap();
        let stored = position(&tx, vault_id, &alice.caller).unwrap().unwrap();
        assert_eq!(stored.strategy.as_deref(), Some("steady"));
    }
}
