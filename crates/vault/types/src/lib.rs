//! Core records for the yield vault ledger.
//!
//! - identifiers (`ProtocolId`, `VaultId`, `Principal`)
//! - protocol registry entries and risk parameters
//! - vaults with their immutable target allocation
//! - per-user vault and protocol positions, risk preferences
//! - ledger events and the categorical error codes

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod error;
pub mod event;
pub mod ids;
pub mod position;
pub mod protocol;
pub mod vault;

pub use error::{VaultError, VaultResult};
pub use event::{EventRecord, LedgerEvent, ProtocolShare};
pub use ids::{BlockHeight, Principal, ProtocolId, VaultId};
pub use position::{
    TokenAmount, UserProtocolPosition, UserRiskSettings, UserVaultPosition, MAX_POSITION_ENTRIES,
    MAX_RISK_PREFERENCE, MAX_STRATEGY_LEN,
};
pub use protocol::{
    Protocol, ProtocolCategory, RiskParams, MAX_PROTOCOL_NAME_LEN, MAX_SUPPORTED_TOKENS,
};
pub use vault::{
    AllocationEntry, TargetAllocation, Vault, VaultMeta, VaultStatus, FULL_ALLOCATION,
    MAX_ALLOCATION_ENTRIES, MAX_RISK_LEVEL, MAX_VAULT_NAME_LEN, MIN_RISK_LEVEL,
};
