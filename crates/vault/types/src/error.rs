use thiserror::Error;

use crate::ids::{ProtocolId, VaultId};

/// Result type for ledger operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors returned by every public ledger operation.
///
/// The first twelve variants are the categorical codes callers branch on;
/// each maps to a stable numeric [`VaultError::code`]. The remaining variants
/// surface capability and storage failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("caller {caller} is not authorized to {action}")]
    NotAuthorized { caller: String, action: String },

    #[error("invalid protocol {0}: unknown or inactive allocation target")]
    InvalidProtocol(ProtocolId),

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: u64, available: u64 },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("vault not found or inactive: {0}")]
    VaultNotFound(VaultId),

    #[error("protocol not registered: {0}")]
    ProtocolNotRegistered(ProtocolId),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("no position for user {user} in {vault}")]
    PositionNotFound { user: String, vault: VaultId },

    #[error("loan-to-value {ltv}% reached liquidation threshold {threshold}% on {protocol}")]
    LiquidationThreshold {
        protocol: ProtocolId,
        ltv: u64,
        threshold: u8,
    },

    #[error("{vault} is full: capacity {capacity}, requested total {requested}")]
    VaultFull {
        vault: VaultId,
        capacity: u64,
        requested: u64,
    },

    #[error("slippage tolerance {requested}% exceeds user maximum {maximum}%")]
    SlippageTooHigh { requested: u8, maximum: u8 },

    #[error("token {token} is not supported by {protocol}")]
    UnsupportedToken { protocol: ProtocolId, token: String },

    #[error("protocol adapter rejected {action} of {amount} on {protocol}: {reason}")]
    AdapterRejected {
        protocol: ProtocolId,
        action: String,
        amount: u64,
        reason: String,
    },

    #[error("position valuation unavailable: {0}")]
    Valuation(String),

    #[error("arithmetic overflow while computing {0}")]
    ArithmeticOverflow(&'static str),

    #[error("storage error: {0}")]
    Storage(String),
}

impl VaultError {
    /// Stable numeric code for the error category.
    pub fn code(&self) -> u32 {
        match self {
            VaultError::NotAuthorized { .. } => 100,
            VaultError::InvalidProtocol(_) => 101,
            VaultError::InsufficientFunds { .. } => 102,
            VaultError::InvalidAmount(_) => 103,
            VaultError::VaultNotFound(_) => 104,
            VaultError::ProtocolNotRegistered(_) => 105,
            VaultError::InvalidParameter(_) => 106,
            VaultError::PositionNotFound { .. } => 107,
            VaultError::LiquidationThreshold { .. } => 108,
            VaultError::VaultFull { .. } => 109,
            VaultError::SlippageTooHigh { .. } => 110,
            VaultError::UnsupportedToken { .. } => 111,
            VaultError::AdapterRejected { .. } => 200,
            VaultError::Valuation(_) => 201,
            VaultError::ArithmeticOverflow(_) => 202,
            VaultError::Storage(_) => 203,
        }
    }

    /// Short machine-readable name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::NotAuthorized { .. } => "NotAuthorized",
            VaultError::InvalidProtocol(_) => "InvalidProtocol",
            VaultError::InsufficientFunds { .. } => "InsufficientFunds",
            VaultError::InvalidAmount(_) => "InvalidAmount",
            VaultError::VaultNotFound(_) => "VaultNotFound",
            VaultError::ProtocolNotRegistered(_) => "ProtocolNotRegistered",
            VaultError::InvalidParameter(_) => "InvalidParameter",
            VaultError::PositionNotFound { .. } => "PositionNotFound",
            VaultError::LiquidationThreshold { .. } => "LiquidationThreshold",
            VaultError::VaultFull { .. } => "VaultFull",
            VaultError::SlippageTooHigh { .. } => "SlippageTooHigh",
            VaultError::UnsupportedToken { .. } => "UnsupportedToken",
            VaultError::AdapterRejected { .. } => "AdapterRejected",
            VaultError::Valuation(_) => "Valuation",
            VaultError::ArithmeticOverflow(_) => "ArithmeticOverflow",
            VaultError::Storage(_) => "Storage",
        }
    }

    pub fn not_authorized(caller: impl ToString, action: impl Into<String>) -> Self {
        VaultError::NotAuthorized {
            caller: caller.to_string(),
            action: action.into(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        VaultError::InvalidParameter(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorical_codes_are_stable() {
        assert_eq!(VaultError::not_authorized("eve", "register").code(), 100);
        assert_eq!(VaultError::InvalidProtocol(ProtocolId(1)).code(), 101);
        assert_eq!(VaultError::VaultNotFound(VaultId(1)).code(), 104);
        assert_eq!(
            VaultError::UnsupportedToken {
                protocol: ProtocolId(1),
                token: "XYZ".into()
            }
            .code(),
            111
        );
        assert_eq!(VaultError::Storage("down".into()).code(), 203);
    }

    #[test]
    fn error_display_carries_context() {
        let err = VaultError::InsufficientFunds {
            requested: 1000,
            available: 600,
        };
        let s = err.to_string();
        assert!(s.contains("1000"));
        assert!(s.contains("600"));
        assert_eq!(err.kind(), "InsufficientFunds");
    }

    #[test]
    fn not_authorized_names_action() {
        let err = VaultError::not_authorized("mallory", "rebalance vault:1");
        assert!(err.to_string().contains("mallory"));
        assert!(err.to_string().contains("rebalance vault:1"));
    }
}
