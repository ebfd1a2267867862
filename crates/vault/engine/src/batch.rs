//! Ordered execution of a list of protocol actions as one atomic unit.
//!
//! Actions run strictly in list order. The first failing action aborts the
//! batch; the service then unwinds the adapter calls already made.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vault_types::{LedgerEvent, ProtocolId, VaultError, VaultResult};

use crate::capability::{AdapterAction, Capabilities};
use crate::config::LedgerConfig;
use crate::context::OperationContext;
use crate::journal;
use crate::registry;
use crate::risk;
use crate::store::Transaction;

/// One step of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAction {
    pub protocol_id: ProtocolId,
    pub kind: AdapterAction,
    pub token: String,
    pub amount: u64,
    /// Slippage tolerance in percent; checked against the user's maximum.
    #[serde(default)]
    pub slippage: Option<u8>,
}

/// Record of one executed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReceipt {
    pub index: usize,
    pub protocol_id: ProtocolId,
    pub kind: AdapterAction,
    pub token: String,
    pub amount: u64,
}

pub fn execute(
    tx: &mut Transaction<'_>,
    caps: &Capabilities,
    ctx: &OperationContext,
    config: &LedgerConfig,
    actions: Vec<BatchAction>,
) -> VaultResult<Vec<ActionReceipt>> {
    if actions.is_empty() {
        return Err(VaultError::invalid_parameter("batch has no actions"));
    }
    if actions.len() > config.limits.max_batch_actions {
        return Err(VaultError::invalid_parameter(format!(
            "batch has {} actions, at most {} allowed",
            actions.len(),
            config.limits.max_batch_actions
        )));
    }
    let settings = risk::settings(tx, config, &ctx.caller)?;

    let mut receipts = Vec::with_capacity(actions.len());
    for (index, action) in actions.into_iter().enumerate() {
        let protocol = registry::require_active(tx, action.protocol_id)?;
        if !protocol.supports_token(&action.token) {
            return Err(VaultError::UnsupportedToken {
                protocol: protocol.id,
                token: action.token,
            });
        }
        if action.amount == 0 {
            return Err(VaultError::InvalidAmount(format!(
                "batch action {} has zero amount",
                index
            )));
        }
        if let Some(slippage) = action.slippage {
            if slippage > settings.max_slippage {
                return Err(VaultError::SlippageTooHigh {
                    requested: slippage,
                    maximum: settings.max_slippage,
                });
            }
        }
        if action.kind == AdapterAction::Withdraw && tx.risk_params(protocol.id)?.is_some() {
            risk::ensure_within_limits(tx, caps, config, &ctx.caller, protocol.id)?;
        }

        journal::adapter_call(caps, tx, &protocol, action.kind, action.amount)?;
        debug!(
            index,
            protocol_id = %protocol.id,
            kind = %action.kind,
            amount = action.amount,
            "Batch action executed"
        );
        receipts.push(ActionReceipt {
            index,
            protocol_id: protocol.id,
            kind: action.kind,
            token: action.token,
            amount: action.amount,
        });
    }

    info!(user = %ctx.caller, actions = receipts.len(), "Batch executed");
    tx.emit(LedgerEvent::BatchExecuted {
        user: ctx.caller.clone(),
        actions: receipts.len(),
    });
    Ok(receipts)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::capability::{AdapterSet, RecordingAdapter};
    use crate::registry::NewProtocol;
    use crate::store::InMemoryStateStore;
    use vault_types::ProtocolCategory;

    fn action(protocol: u64, kind: AdapterAction, amount: u64) -> BatchAction {
        BatchAction {
            protocol_id: ProtocolId(protocol),
            kind,
            token: "STX".into(),
            amount,
            slippage: None,
        }
    }

    fn seed(tx: &mut Transaction<'_>, config: &LedgerConfig) {
        for name in ["alpha", "beta"] {
            registry::register(
                tx,
                &OperationContext::new("admin", 1),
                config,
                NewProtocol {
                    name: name.into(),
                    address: format!("SP000.{}", name),
                    supported_tokens: vec!["STX".into()],
                    category: ProtocolCategory::Dex,
                },
            )
            .unwrap();
        }
    }

    #[test]
    fn runs_actions_in_order() {
        let store = InMemoryStateStore::new();
        let config = LedgerConfig::default();
        let adapter = Arc::new(RecordingAdapter::new());
        let caps = Capabilities::default().with_adapters(AdapterSet::new(adapter.clone()));
        let mut tx = Transaction::begin(&store, 1).unwrap();
        seed(&mut tx, &config);

        let receipts = execute(
            &mut tx,
            &caps,
            &OperationContext::new("alice", 2),
            &config,
            vec![
                action(2, AdapterAction::Deposit, 50),
                action(1, AdapterAction::Deposit, 20),
                action(2, AdapterAction::Withdraw, 10),
            ],
        )
        .unwrap();
        assert_eq!(receipts.len(), 3);
        let order: Vec<u64> = adapter.calls().iter().map(|c| c.protocol_id.get()).collect();
        assert_eq!(order, vec![2, 1, 2]);
        assert_eq!(adapter.deployed(ProtocolId(2)), 40);
    }

    #[test]
    fn rejects_empty_and_oversized_batches() {
        let store = InMemoryStateStore::new();
        let mut config = LedgerConfig::default();
        config.limits.max_batch_actions = 2;
        let caps = Capabilities::default();
        let alice = OperationContext::new("alice", 2);
        let mut tx = Transaction::begin(&store, 1).unwrap();
        seed(&mut tx, &config);

        let err = execute(&mut tx, &caps, &alice, &config, vec![]).unwrap_err();
        assert_eq!(err.kind(), "InvalidParameter");

        let three = vec![action(1, AdapterAction::Deposit, 1); 3];
        let err = execute(&mut tx, &caps, &alice, &config, three).unwrap_err();
        assert_eq!(err.kind(), "InvalidParameter");
    }

    #[test]
    fn per_action_validation() {
        let store = InMemoryStateStore::new();
        let config = LedgerConfig::default();
        let caps = Capabilities::default();
        let alice = OperationContext::new("alice", 2);
        let mut tx = Transaction::begin(&store, 1).unwrap();
        seed(&mut tx, &config);

        let err = execute(&mut tx, &caps, &alice, &config, vec![action(7, AdapterAction::Deposit, 1)])
            .unwrap_err();
        assert_eq!(err, VaultError::ProtocolNotRegistered(ProtocolId(7)));

        let mut odd = action(1, AdapterAction::Deposit, 1);
        odd.token = "BTC".into();
        assert_eq!(execute(&mut tx, &caps, &alice, &config, vec![odd]).unwrap_err().code(), 111);

        let err = execute(&mut tx, &caps, &alice, &config, vec![action(1, AdapterAction::Deposit, 0)])
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidAmount");

        let mut slippy = action(1, AdapterAction::Deposit, 1);
        slippy.slippage = Some(4);
        let err = execute(&mut tx, &caps, &alice, &config, vec![slippy]).unwrap_err();
        assert_eq!(
            err,
            VaultError::SlippageTooHigh {
                requested: 4,
                maximum: 3
            }
        );
    }
}
