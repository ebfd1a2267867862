//! Position valuation capability.
//!
//! Returns a user's current loan-to-value (in percent) for a protocol. Real
//! deployments back this with a price oracle; the reference valuations here
//! either return a fixed figure or derive the ratio from the tracked
//! protocol position.

use thiserror::Error;
use vault_types::{Principal, Protocol, UserProtocolPosition, VaultError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValuationError {
    #[error("no price available for {0}")]
    NoPrice(String),

    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

impl From<ValuationError> for VaultError {
    fn from(err: ValuationError) -> Self {
        VaultError::Valuation(err.to_string())
    }
}

pub trait PositionValuation: Send + Sync {
    /// `tracked` is the caller-reported position mirror, when one exists.
    fn current_ltv(
        &self,
        user: &Principal,
        protocol: &Protocol,
        tracked: Option<&UserProtocolPosition>,
    ) -> Result<u64, ValuationError>;
}

/// Always reports the same loan-to-value.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedValuation(pub u64);

impl PositionValuation for FixedValuation {
    fn current_ltv(
        &self,
        _user: &Principal,
        _protocol: &Protocol,
        _tracked: Option<&UserProtocolPosition>,
    ) -> Result<u64, ValuationError> {
        Ok(self.0)
    }
}

/// Loan-to-value computed as `Σ borrowed * 100 / Σ supplied` over the tracked
/// position, treating every token at par.
///
/// No position or nothing borrowed is 0%; debt with no supply saturates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackedPositionValuation;

impl PositionValuation for TrackedPositionValuation {
    fn current_ltv(
        &self,
        _user: &Principal,
        _protocol: &Protocol,
        tracked: Option<&UserProtocolPosition>,
    ) -> Result<u64, ValuationError> {
        let Some(position) = tracked else {
            return Ok(0);
        };
        let borrowed = position.total_borrowed();
        let supplied = position.total_supplied();
        if borrowed == 0 {
            return Ok(0);
        }
        if supplied == 0 {
            return Ok(u64::MAX);
        }
        let ltv = borrowed.saturating_mul(100) / supplied;
        Ok(u64::try_from(ltv).unwrap_or(u64::MAX))
    }
}
