//! Per-user position records and risk preferences.

use serde::{Deserialize, Serialize};

use crate::ids::{BlockHeight, Principal, ProtocolId, VaultId};

/// Maximum entries in each list of a [`UserProtocolPosition`].
pub const MAX_POSITION_ENTRIES: usize = 5;

/// Upper bound for every user risk preference percentage.
pub const MAX_RISK_PREFERENCE: u8 = 50;

/// Longest accepted position strategy label, in bytes.
pub const MAX_STRATEGY_LEN: usize = 64;

/// A user's balance in one vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserVaultPosition {
    pub user: Principal,
    pub vault_id: VaultId,
    pub amount: u64,
    pub entry_height: BlockHeight,
    pub last_rebalance_height: BlockHeight,
    pub cumulative_earnings: u64,
    pub strategy: Option<String>,
}

impl UserVaultPosition {
    /// Zero-valued position created on a user's first deposit.
    pub fn empty(user: Principal, vault_id: VaultId, height: BlockHeight) -> Self {
        Self {
            user,
            vault_id,
            amount: 0,
            entry_height: height,
            last_rebalance_height: height,
            cumulative_earnings: 0,
            strategy: None,
        }
    }
}

/// One (token-or-pool, amount) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub token: String,
    pub amount: u64,
}

impl TokenAmount {
    pub fn new(token: impl Into<String>, amount: u64) -> Self {
        Self {
            token: token.into(),
            amount,
        }
    }
}

/// Externally observed state of a user's activity in one protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProtocolPosition {
    pub user: Principal,
    pub protocol_id: ProtocolId,
    pub supplied: Vec<TokenAmount>,
    pub borrowed: Vec<TokenAmount>,
    pub liquidity: Vec<TokenAmount>,
    pub staked: Vec<TokenAmount>,
    pub updated_at: BlockHeight,
}

impl UserProtocolPosition {
    pub fn total_supplied(&self) -> u128 {
        self.supplied.iter().map(|t| u128::from(t.amount)).sum()
    }

    pub fn total_borrowed(&self) -> u128 {
        self.borrowed.iter().map(|t| u128::from(t.amount)).sum()
    }
}

/// Per-user alerting and execution preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRiskSettings {
    /// Buffer below the liquidation threshold at which alerts fire.
    pub liquidation_alert_threshold: u8,
    pub rebalance_threshold: u8,
    pub max_slippage: u8,
    pub notifications_enabled: bool,
}

impl UserRiskSettings {
    pub fn within_bounds(&self) -> bool {
        self.liquidation_alert_threshold <= MAX_RISK_PREFERENCE
            && self.rebalance_threshold <= MAX_RISK_PREFERENCE
            && self.max_slippage <= MAX_RISK_PREFERENCE
    }
}

impl Default for UserRiskSettings {
    fn default() -> Self {
        Self {
            liquidation_alert_threshold: 5,
            rebalance_threshold: 10,
            max_slippage: 3,
            notifications_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_position_starts_at_height() {
        let position = UserVaultPosition::empty(Principal::new("alice"), VaultId(1), 42);
        assert_eq!(position.amount, 0);
        assert_eq!(position.entry_height, 42);
        assert_eq!(position.last_rebalance_height, 42);
        assert!(position.strategy.is_none());
    }

    #[test]
    fn protocol_position_totals() {
        let position = UserProtocolPosition {
            user: Principal::new("alice"),
            protocol_id: ProtocolId(1),
            supplied: vec![TokenAmount::new("STX", 700), TokenAmount::new("USDA", 300)],
            borrowed: vec![TokenAmount::new("USDA", u64::MAX)],
            liquidity: vec![],
            staked: vec![],
            updated_at: 10,
        };
        assert_eq!(position.total_supplied(), 1000);
        assert_eq!(position.total_borrowed(), u128::from(u64::MAX));
    }

    #[test]
    fn default_risk_settings_within_bounds() {
        let settings = UserRiskSettings::default();
        assert_eq!(settings.liquidation_alert_threshold, 5);
        assert!(settings.within_bounds());

        let too_high = UserRiskSettings {
            max_slippage: 51,
            ..settings
        };
        assert!(!too_high.within_bounds());
    }
}
