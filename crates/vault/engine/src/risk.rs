//! Liquidation risk evaluation and per-user risk preferences.
//!
//! A user is alerted once their loan-to-value on a protocol reaches
//! `liquidation_threshold - alert_buffer`; the buffer is the user's
//! `liquidation_alert_threshold` setting (default 5).

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vault_types::{
    LedgerEvent, Principal, ProtocolId, RiskParams, UserRiskSettings, VaultError, VaultResult,
    MAX_RISK_PREFERENCE,
};

use crate::capability::Capabilities;
use crate::config::LedgerConfig;
use crate::context::OperationContext;
use crate::registry;
use crate::store::Transaction;

/// Full picture of one user's risk on one protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub user: Principal,
    pub protocol_id: ProtocolId,
    pub current_ltv: u64,
    pub alert_threshold: u8,
    pub liquidation_threshold: u8,
    pub max_ltv: u8,
    /// `current_ltv >= alert_threshold`
    pub alert: bool,
    /// `current_ltv >= liquidation_threshold`
    pub liquidatable: bool,
}

/// Stored preferences, or the configured defaults.
pub fn settings(
    tx: &Transaction<'_>,
    config: &LedgerConfig,
    user: &Principal,
) -> VaultResult<UserRiskSettings> {
    Ok(tx
        .risk_settings(user)?
        .unwrap_or_else(|| config.risk_defaults.clone()))
}

pub fn set_preferences(
    tx: &mut Transaction<'_>,
    ctx: &OperationContext,
    settings: UserRiskSettings,
) -> VaultResult<()> {
    if !settings.within_bounds() {
        return Err(VaultError::invalid_parameter(format!(
            "risk preferences must each be at most {} (alert {}, rebalance {}, slippage {})",
            MAX_RISK_PREFERENCE,
            settings.liquidation_alert_threshold,
            settings.rebalance_threshold,
            settings.max_slippage
        )));
    }
    debug!(user = %ctx.caller, ?settings, "Risk preferences updated");
    tx.emit(LedgerEvent::RiskPreferencesUpdated {
        user: ctx.caller.clone(),
    });
    tx.put_risk_settings(ctx.caller.clone(), settings);
    Ok(())
}

fn require_params(tx: &Transaction<'_>, protocol_id: ProtocolId) -> VaultResult<RiskParams> {
    tx.risk_params(protocol_id)?
        .ok_or(VaultError::ProtocolNotRegistered(protocol_id))
}

/// Evaluate a user's position without side effects.
pub fn assess(
    tx: &Transaction<'_>,
    caps: &Capabilities,
    config: &LedgerConfig,
    user: &Principal,
    protocol_id: ProtocolId,
) -> VaultResult<RiskAssessment> {
    let protocol = registry::require(tx, protocol_id)?;
    let params = require_params(tx, protocol_id)?;
    let buffer = settings(tx, config, user)?.liquidation_alert_threshold;
    let tracked = tx.protocol_position(user, protocol_id)?;

    let current_ltv = caps
        .valuation
        .current_ltv(user, &protocol, tracked.as_ref())?;
    let alert_threshold = params.liquidation_threshold.saturating_sub(buffer);

    Ok(RiskAssessment {
        user: user.clone(),
        protocol_id,
        current_ltv,
        alert_threshold,
        liquidation_threshold: params.liquidation_threshold,
        max_ltv: params.max_ltv,
        alert: current_ltv >= u64::from(alert_threshold),
        liquidatable: current_ltv >= u64::from(params.liquidation_threshold),
    })
}

/// True when the user should be alerted; emits `LiquidationAlert` if so.
pub fn check_liquidation_risk(
    tx: &mut Transaction<'_>,
    caps: &Capabilities,
    config: &LedgerConfig,
    user: &Principal,
    protocol_id: ProtocolId,
) -> VaultResult<bool> {
    let assessment = assess(tx, caps, config, user, protocol_id)?;
    if assessment.alert {
        warn!(
            user = %user,
            protocol_id = %protocol_id,
            current_ltv = assessment.current_ltv,
            alert_threshold = assessment.alert_threshold,
            "Liquidation alert"
        );
        tx.emit(LedgerEvent::LiquidationAlert {
            user: user.clone(),
            protocol_id,
            current_ltv: assessment.current_ltv,
            alert_threshold: assessment.alert_threshold,
        });
    } else {
        debug!(user = %user, protocol_id = %protocol_id, ltv = assessment.current_ltv, "Risk check passed");
    }
    Ok(assessment.alert)
}

/// Fail with `LiquidationThreshold` when the position is already liquidatable.
pub fn ensure_within_limits(
    tx: &Transaction<'_>,
    caps: &Capabilities,
    config: &LedgerConfig,
    user: &Principal,
    protocol_id: ProtocolId,
) -> VaultResult<()> {
    let assessment = assess(tx, caps, config, user, protocol_id)?;
    if assessment.liquidatable {
        info!(
            user = %user,
            protocol_id = %protocol_id,
            current_ltv = assessment.current_ltv,
            "Position at liquidation threshold"
        );
        return Err(VaultError::LiquidationThreshold {
            protocol: protocol_id,
            ltv: assessment.current_ltv,
            threshold: assessment.liquidation_threshold,
        });
    }
    Ok(())
}
