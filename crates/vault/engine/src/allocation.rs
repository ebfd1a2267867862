//! Splitting an amount across a vault's weighted targets.
//!
//! Each share is `floor(total * percentage / 100)`, computed in 128 bits. The
//! remainder left by truncation is not redistributed, so the shares never sum
//! to more than the total.

use vault_types::{Protocol, ProtocolShare, TargetAllocation, VaultError, VaultResult};

use crate::registry;
use crate::store::Transaction;

/// One share, resolved to its protocol record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg {
    pub protocol: Protocol,
    pub amount: u64,
}

/// An amount split across active protocols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    /// The amount the vault accounts for, unchanged by rounding.
    pub total: u64,
    pub legs: Vec<Leg>,
}

impl Distribution {
    pub fn shares(&self) -> Vec<ProtocolShare> {
        self.legs
            .iter()
            .map(|leg| ProtocolShare {
                protocol_id: leg.protocol.id,
                amount: leg.amount,
            })
            .collect()
    }

    /// Sum of the shares handed to adapters.
    pub fn distributed(&self) -> u64 {
        self.legs.iter().map(|leg| leg.amount).sum()
    }

    /// Rounding loss: `total - distributed`.
    pub fn remainder(&self) -> u64 {
        self.total - self.distributed()
    }
}

/// Floor of `total * percentage / 100`.
pub fn share_of(total: u64, percentage: u8) -> u64 {
    let share = u128::from(total) * u128::from(percentage) / 100;
    // percentage <= 100, so share <= total
    share as u64
}

/// Pure split of `total` across the allocation, in allocation order.
pub fn split(allocation: &TargetAllocation, total: u64) -> Vec<ProtocolShare> {
    allocation
        .entries()
        .iter()
        .map(|entry| ProtocolShare {
            protocol_id: entry.protocol_id,
            amount: share_of(total, entry.percentage),
        })
        .collect()
}

/// Check every target is a registered, active protocol.
///
/// Fails with `InvalidProtocol` on the first target that is not.
pub fn resolve_targets(
    tx: &Transaction<'_>,
    allocation: &TargetAllocation,
) -> VaultResult<Vec<Protocol>> {
    allocation
        .protocol_ids()
        .map(|id| {
            registry::require_active(tx, id).map_err(|err| match err {
                VaultError::ProtocolNotRegistered(id) => VaultError::InvalidProtocol(id),
                other => other,
            })
        })
        .collect()
}

/// Split `total` across the allocation's targets after validating all of them.
pub fn distribute(
    tx: &Transaction<'_>,
    allocation: &TargetAllocation,
    total: u64,
) -> VaultResult<Distribution> {
    let protocols = resolve_targets(tx, allocation)?;
    let legs = protocols
        .into_iter()
        .zip(allocation.entries())
        .map(|(protocol, entry)| Leg {
            protocol,
            amount: share_of(total, entry.percentage),
        })
        .collect();
    Ok(Distribution { total, legs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_types::{AllocationEntry, ProtocolId};

    fn allocation(weights: &[(u64, u8)]) -> TargetAllocation {
        TargetAllocation::new(
            weights
                .iter()
                .map(|&(id, pct)| AllocationEntry::new(ProtocolId(id), pct))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn split_truncates_each_share() {
        let shares = split(&allocation(&[(1, 33), (2, 33), (3, 34)]), 100);
        let amounts: Vec<u64> = shares.iter().map(|s| s.amount).collect();
        assert_eq!(amounts, vec![33, 33, 34]);

        let shares = split(&allocation(&[(1, 33), (2, 33), (3, 34)]), 10);
        let amounts: Vec<u64> = shares.iter().map(|s| s.amount).collect();
        assert_eq!(amounts, vec![3, 3, 3]);
    }

    #[test]
    fn split_keeps_allocation_order() {
        let shares = split(&allocation(&[(4, 70), (2, 30)]), 1000);
        assert_eq!(shares[0].protocol_id, ProtocolId(4));
        assert_eq!(shares[1].protocol_id, ProtocolId(2));
    }

    #[test]
    fn share_of_handles_large_totals() {
        assert_eq!(share_of(u64::MAX, 100), u64::MAX);
        assert_eq!(share_of(u64::MAX, 50), u64::MAX / 2);
        assert_eq!(share_of(0, 100), 0);
    }
}
