//! Ledger events published to subscribers after an operation commits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{BlockHeight, Principal, ProtocolId, VaultId};

/// A per-protocol share of an amount, as seen by adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolShare {
    pub protocol_id: ProtocolId,
    pub amount: u64,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    ProtocolRegistered {
        protocol_id: ProtocolId,
        name: String,
    },
    ProtocolStatusChanged {
        protocol_id: ProtocolId,
        active: bool,
        trusted: bool,
    },
    RiskParamsUpdated {
        protocol_id: ProtocolId,
        liquidation_threshold: u8,
        max_ltv: u8,
    },
    VaultCreated {
        vault_id: VaultId,
        creator: Principal,
    },
    VaultStatusChanged {
        vault_id: VaultId,
        active: bool,
    },
    Deposited {
        vault_id: VaultId,
        user: Principal,
        amount: u64,
        shares: Vec<ProtocolShare>,
        total_assets: u64,
    },
    Withdrawn {
        vault_id: VaultId,
        user: Principal,
        amount: u64,
        shares: Vec<ProtocolShare>,
        total_assets: u64,
    },
    Rebalanced {
        vault_id: VaultId,
        caller: Principal,
        exposure: Vec<ProtocolShare>,
    },
    RiskPreferencesUpdated {
        user: Principal,
    },
    LiquidationAlert {
        user: Principal,
        protocol_id: ProtocolId,
        current_ltv: u64,
        alert_threshold: u8,
    },
    ProtocolPositionUpdated {
        user: Principal,
        protocol_id: ProtocolId,
    },
    BatchExecuted {
        user: Principal,
        actions: usize,
    },
}

impl LedgerEvent {
    /// Event name used for logging and counters.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::ProtocolRegistered { .. } => "protocol_registered",
            LedgerEvent::ProtocolStatusChanged { .. } => "protocol_status_changed",
            LedgerEvent::RiskParamsUpdated { .. } => "risk_params_updated",
            LedgerEvent::VaultCreated { .. } => "vault_created",
            LedgerEvent::VaultStatusChanged { .. } => "vault_status_changed",
            LedgerEvent::Deposited { .. } => "deposited",
            LedgerEvent::Withdrawn { .. } => "withdrawn",
            LedgerEvent::Rebalanced { .. } => "rebalanced",
            LedgerEvent::RiskPreferencesUpdated { .. } => "risk_preferences_updated",
            LedgerEvent::LiquidationAlert { .. } => "liquidation_alert",
            LedgerEvent::ProtocolPositionUpdated { .. } => "protocol_position_updated",
            LedgerEvent::BatchExecuted { .. } => "batch_executed",
        }
    }
}

/// An event stamped with identity, height and wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub height: BlockHeight,
    pub emitted_at: DateTime<Utc>,
    pub event: LedgerEvent,
}

impl EventRecord {
    pub fn new(height: BlockHeight, event: LedgerEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            height,
            emitted_at: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_tag() {
        let event = LedgerEvent::Deposited {
            vault_id: VaultId(1),
            user: Principal::new("alice"),
            amount: 1000,
            shares: vec![ProtocolShare {
                protocol_id: ProtocolId(1),
                amount: 1000,
            }],
            total_assets: 1000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "deposited");
        assert_eq!(json["shares"][0]["amount"], 1000);
        assert_eq!(event.name(), "deposited");
    }

    #[test]
    fn records_get_unique_ids() {
        let a = EventRecord::new(1, LedgerEvent::RiskPreferencesUpdated { user: "a".into() });
        let b = EventRecord::new(1, LedgerEvent::RiskPreferencesUpdated { user: "a".into() });
        assert_ne!(a.id, b.id);
    }
}
