//! Journal of external side effects.
//!
//! Settlement transfers and adapter calls cannot be staged like store writes.
//! Every successful call is recorded on the transaction as a [`Compensation`];
//! if the operation later fails, [`unwind`] replays the inverse calls newest
//! first.

use tracing::{error, warn};
use vault_types::{Principal, Protocol, VaultError, VaultResult};

use crate::capability::{AdapterAction, AdapterError, Capabilities};
use crate::store::Transaction;

/// Inverse of one external effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    /// Undone by withdrawing `amount` again.
    AdapterDeposited { protocol: Protocol, amount: u64 },
    /// Undone by depositing `amount` again.
    AdapterWithdrawn { protocol: Protocol, amount: u64 },
    /// Undone by sending `amount` back from `to` to `from`.
    Transferred {
        from: Principal,
        to: Principal,
        amount: u64,
    },
}

/// Move settlement currency and journal the transfer.
pub fn transfer(
    caps: &Capabilities,
    tx: &mut Transaction<'_>,
    from: &Principal,
    to: &Principal,
    amount: u64,
) -> VaultResult<()> {
    caps.settlement.transfer(from, to, amount)?;
    tx.record_compensation(Compensation::Transferred {
        from: from.clone(),
        to: to.clone(),
        amount,
    });
    Ok(())
}

/// Call the protocol's adapter and journal the call.
pub fn adapter_call(
    caps: &Capabilities,
    tx: &mut Transaction<'_>,
    protocol: &Protocol,
    action: AdapterAction,
    amount: u64,
) -> VaultResult<()> {
    let adapter = caps.adapters.resolve(protocol);
    let result = match action {
        AdapterAction::Deposit => adapter.deposit(protocol, amount),
        AdapterAction::Withdraw => adapter.withdraw(protocol, amount),
    };
    result.map_err(|err| rejected(protocol, action, amount, err))?;

    let compensation = match action {
        AdapterAction::Deposit => Compensation::AdapterDeposited {
            protocol: protocol.clone(),
            amount,
        },
        AdapterAction::Withdraw => Compensation::AdapterWithdrawn {
            protocol: protocol.clone(),
            amount,
        },
    };
    tx.record_compensation(compensation);
    Ok(())
}

fn rejected(protocol: &Protocol, action: AdapterAction, amount: u64, err: AdapterError) -> VaultError {
    VaultError::AdapterRejected {
        protocol: protocol.id,
        action: action.to_string(),
        amount,
        reason: err.to_string(),
    }
}

/// Undo journalled effects, newest first.
///
/// Keeps going after a failed compensation; returns how many failed.
pub fn unwind(caps: &Capabilities, compensations: Vec<Compensation>) -> usize {
    let mut failed = 0;
    for compensation in compensations.into_iter().rev() {
        warn!(?compensation, "compensating external effect");
        let outcome = match &compensation {
            Compensation::AdapterDeposited { protocol, amount } => caps
                .adapters
                .resolve(protocol)
                .withdraw(protocol, *amount)
                .map_err(|e| e.to_string()),
            Compensation::AdapterWithdrawn { protocol, amount } => caps
                .adapters
                .resolve(protocol)
                .deposit(protocol, *amount)
                .map_err(|e| e.to_string()),
            Compensation::Transferred { from, to, amount } => caps
                .settlement
                .transfer(to, from, *amount)
                .map_err(|e| e.to_string()),
        };
        if let Err(reason) = outcome {
            failed += 1;
            error!(?compensation, %reason, "compensation failed");
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::capability::{AdapterSet, InMemorySettlement, RecordingAdapter, SettlementLedger};
    use crate::store::InMemoryStateStore;
    use vault_types::{ProtocolCategory, ProtocolId};

    fn farm() -> Protocol {
        Protocol {
            id: ProtocolId(7),
            name: "farm".into(),
            address: "SP000.farm".into(),
            active: true,
            trusted: true,
            supported_tokens: vec!["STX".into()],
            category: ProtocolCategory::Farm,
            registered_at: 1,
        }
    }

    #[test]
    fn unwind_reverses_effects() {
        let adapter = Arc::new(RecordingAdapter::new());
        let settlement = Arc::new(InMemorySettlement::new());
        let caps = Capabilities::default()
            .with_adapters(AdapterSet::new(adapter.clone()))
            .with_settlement(settlement.clone());
        let alice = Principal::new("alice");
        let custody = Principal::new("custody");
        settlement.credit(&alice, 100).unwrap();

        let store = InMemoryStateStore::new();
        let mut tx = Transaction::begin(&store, 1).unwrap();
        transfer(&caps, &mut tx, &alice, &custody, 60).unwrap();
        adapter_call(&caps, &mut tx, &farm(), AdapterAction::Deposit, 60).unwrap();
        assert_eq!(adapter.deployed(ProtocolId(7)), 60);

        let failed = unwind(&caps, tx.take_compensations());
        assert_eq!(failed, 0);
        assert_eq!(adapter.deployed(ProtocolId(7)), 0);
        assert_eq!(settlement.balance(&alice).unwrap(), 100);
        assert_eq!(settlement.balance(&custody).unwrap(), 0);
    }

    #[test]
    fn rejected_call_is_not_journalled() {
        let adapter = Arc::new(RecordingAdapter::new());
        adapter.fail_on(ProtocolId(7), AdapterAction::Deposit);
        let caps = Capabilities::default().with_adapters(AdapterSet::new(adapter));

        let store = InMemoryStateStore::new();
        let mut tx = Transaction::begin(&store, 1).unwrap();
        let err = adapter_call(&caps, &mut tx, &farm(), AdapterAction::Deposit, 5).unwrap_err();
        assert_eq!(err.kind(), "AdapterRejected");
        assert!(tx.take_compensations().is_empty());
    }
}
