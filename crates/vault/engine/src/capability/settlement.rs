//! Settlement-currency transfer capability.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;
use vault_types::{Principal, VaultError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("{account} holds {available}, cannot send {requested}")]
    InsufficientBalance {
        account: Principal,
        requested: u64,
        available: u64,
    },

    #[error("{account} cannot transfer to itself")]
    SelfTransfer { account: Principal },

    #[error("settlement backend error: {0}")]
    Backend(String),
}

impl From<SettlementError> for VaultError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::InsufficientBalance {
                requested,
                available,
                ..
            } => VaultError::InsufficientFunds {
                requested,
                available,
            },
            SettlementError::SelfTransfer { account } => {
                VaultError::invalid_parameter(format!("{} cannot transfer to itself", account))
            }
            SettlementError::Backend(message) => VaultError::Storage(message),
        }
    }
}

/// Moves settlement currency between two identities.
pub trait SettlementLedger: Send + Sync {
    fn balance(&self, account: &Principal) -> Result<u64, SettlementError>;

    /// Fails without effect when `from` cannot cover `amount` or when
    /// `from` and `to` are the same account.
    fn transfer(&self, from: &Principal, to: &Principal, amount: u64)
        -> Result<(), SettlementError>;
}

/// Balance table kept in memory.
#[derive(Default)]
pub struct InMemorySettlement {
    balances: RwLock<HashMap<Principal, u64>>,
}

impl InMemorySettlement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint `amount` into an account.
    pub fn credit(&self, account: &Principal, amount: u64) -> Result<u64, SettlementError> {
        let mut balances = self
            .balances
            .write()
            .map_err(|_| SettlementError::Backend("balances lock poisoned".into()))?;
        let balance = balances.entry(account.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| SettlementError::Backend("balance overflow".into()))?;
        Ok(*balance)
    }
}

impl SettlementLedger for InMemorySettlement {
    fn balance(&self, account: &Principal) -> Result<u64, SettlementError> {
        let balances = self
            .balances
            .read()
            .map_err(|_| SettlementError::Backend("balances lock poisoned".into()))?;
        Ok(balances.get(account).copied().unwrap_or(0))
    }

    fn transfer(
        &self,
        from: &Principal,
        to: &Principal,
        amount: u64,
    ) -> Result<(), SettlementError> {
        if from == to {
            return Err(SettlementError::SelfTransfer {
                account: from.clone(),
            });
        }
        let mut balances = self
            .balances
            .write()
            .map_err(|_| SettlementError::Backend("balances lock poisoned".into()))?;

        let available = balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(SettlementError::InsufficientBalance {
                account: from.clone(),
                requested: amount,
                available,
            });
        }
        let receiver = balances.get(to).copied().unwrap_or(0);
        let credited = receiver
            .checked_add(amount)
            .ok_or_else(|| SettlementError::Backend("balance overflow".into()))?;

        balances.insert(from.clone(), available - amount);
        balances.insert(to.clone(), credited);
        Ok(())
    }
}
