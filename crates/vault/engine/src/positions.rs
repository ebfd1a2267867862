//! Caller-reported mirror of a user's holdings on each protocol.
//!
//! Updates replace the whole record. Nothing here is reconciled against vault
//! positions; the tracked record feeds the position valuation.

use serde::{Deserialize, Serialize};
use tracing::debug;
use vault_types::{
    LedgerEvent, Protocol, ProtocolId, TokenAmount, UserProtocolPosition, VaultError, VaultResult,
    MAX_POSITION_ENTRIES,
};

use crate::context::OperationContext;
use crate::registry;
use crate::store::Transaction;

/// New contents of a protocol position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionReport {
    #[serde(default)]
    pub supplied: Vec<TokenAmount>,
    #[serde(default)]
    pub borrowed: Vec<TokenAmount>,
    /// Liquidity pool shares, keyed by pool name.
    #[serde(default)]
    pub liquidity: Vec<TokenAmount>,
    /// Staked amounts, keyed by pool name.
    #[serde(default)]
    pub staked: Vec<TokenAmount>,
}

pub fn update(
    tx: &mut Transaction<'_>,
    ctx: &OperationContext,
    protocol_id: ProtocolId,
    report: PositionReport,
) -> VaultResult<()> {
    let protocol = registry::require_active(tx, protocol_id)?;

    for (label, entries) in [
        ("supplied", &report.supplied),
        ("borrowed", &report.borrowed),
        ("liquidity", &report.liquidity),
        ("staked", &report.staked),
    ] {
        if entries.len() > MAX_POSITION_ENTRIES {
            return Err(VaultError::invalid_parameter(format!(
                "{} has {} entries, at most {} allowed",
                label,
                entries.len(),
                MAX_POSITION_ENTRIES
            )));
        }
    }
    check_tokens(&protocol, &report.supplied)?;
    check_tokens(&protocol, &report.borrowed)?;

    debug!(
        user = %ctx.caller,
        protocol_id = %protocol_id,
        supplied = report.supplied.len(),
        borrowed = report.borrowed.len(),
        "Protocol position replaced"
    );
    tx.emit(LedgerEvent::ProtocolPositionUpdated {
        user: ctx.caller.clone(),
        protocol_id,
    });
    tx.put_protocol_position(UserProtocolPosition {
        user: ctx.caller.clone(),
        protocol_id,
        supplied: report.supplied,
        borrowed: report.borrowed,
        liquidity: report.liquidity,
        staked: report.staked,
        updated_at: ctx.height,
    });
    Ok(())
}

fn check_tokens(protocol: &Protocol, entries: &[TokenAmount]) -> VaultResult<()> {
    match entries.iter().find(|e| !protocol.supports_token(&e.token)) {
        Some(entry) => Err(VaultError::UnsupportedToken {
            protocol: protocol.id,
            token: entry.token.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::registry::NewProtocol;
    use crate::store::InMemoryStateStore;
    use vault_types::ProtocolCategory;

    fn seed(tx: &mut Transaction<'_>) -> ProtocolId {
        registry::register(
            tx,
            &OperationContext::new("admin", 1),
            &LedgerConfig::default(),
            NewProtocol {
                name: "lender".into(),
                address: "SP000.lender".into(),
                supported_tokens: vec!["STX".into(), "USDA".into()],
                category: ProtocolCategory::Lending,
            },
        )
        .unwrap()
    }

    #[test]
    fn update_replaces_all_lists() {
        let store = InMemoryStateStore::new();
        let mut tx = Transaction::begin(&store, 1).unwrap();
        let id = seed(&mut tx);
        let alice = OperationContext::new("alice", 4);

        update(
            &mut tx,
            &alice,
            id,
            PositionReport {
                supplied: vec![TokenAmount::new("STX", 100)],
                staked: vec![TokenAmount::new("pool-a", 5)],
                ..Default::default()
            },
        )
        .unwrap();
        update(
            &mut tx,
            &OperationContext::new("alice", 9),
            id,
            PositionReport {
                borrowed: vec![TokenAmount::new("USDA", 40)],
                ..Default::default()
            },
        )
        .unwrap();

        let stored = tx.protocol_position(&alice.caller, id).unwrap().unwrap();
        assert!(stored.supplied.is_empty());
        assert!(stored.staked.is_empty());
        assert_eq!(stored.borrowed, vec![TokenAmount::new("USDA", 40)]);
        assert_eq!(stored.updated_at, 9);
    }

    #[test]
    fn update_validates_protocol_and_lists() {
        let store = InMemoryStateStore::new();
        let mut tx = Transaction::begin(&store, 1).unwrap();
        let alice = OperationContext::new("alice", 1);

        let err = update(&mut tx, &alice, ProtocolId(3), PositionReport::default()).unwrap_err();
        assert_eq!(err, VaultError::ProtocolNotRegistered(ProtocolId(3)));

        let id = seed(&mut tx);
        let too_many = PositionReport {
            liquidity: (0..6).map(|i| TokenAmount::new(format!("pool-{}", i), 1)).collect(),
            ..Default::default()
        };
        assert_eq!(update(&mut tx, &alice, id, too_many).unwrap_err().kind(), "InvalidParameter");

        let foreign = PositionReport {
            supplied: vec![TokenAmount::new("BTC", 1)],
            ..Default::default()
        };
        assert_eq!(update(&mut tx, &alice, id, foreign).unwrap_err().code(), 111);

        registry::set_status(
            &mut tx,
            &OperationContext::new("admin", 2),
            &LedgerConfig::default(),
            id,
            false,
            false,
        )
        .unwrap();
        let err = update(&mut tx, &alice, id, PositionReport::default()).unwrap_err();
        assert_eq!(err, VaultError::InvalidProtocol(id));
    }
}
