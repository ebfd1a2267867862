//! Protocol registry: the authoritative table of yield protocols and their
//! risk parameters.
//!
//! Protocols are never removed, only deactivated. All mutations are
//! admin-only; reads are open.

use std::collections::HashSet;

use tracing::{debug, info, warn};
use vault_types::{
    LedgerEvent, Protocol, ProtocolCategory, ProtocolId, RiskParams, VaultError, VaultResult,
    MAX_PROTOCOL_NAME_LEN, MAX_SUPPORTED_TOKENS,
};

use crate::config::LedgerConfig;
use crate::context::OperationContext;
use crate::store::{Counter, Transaction};

/// Input for [`register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProtocol {
    pub name: String,
    pub address: String,
    pub supported_tokens: Vec<String>,
    pub category: ProtocolCategory,
}

pub fn register(
    tx: &mut Transaction<'_>,
    ctx: &OperationContext,
    config: &LedgerConfig,
    new: NewProtocol,
) -> VaultResult<ProtocolId> {
    ctx.require_admin(config, "register protocol")?;
    validate_new(&new)?;

    let id = ProtocolId(tx.next_id(Counter::NextProtocolId)?);
    let protocol = Protocol {
        id,
        name: new.name,
        address: new.address,
        active: true,
        trusted: true,
        supported_tokens: new.supported_tokens,
        category: new.category,
        registered_at: tx.height(),
    };

    info!(
        protocol_id = %id,
        name = %protocol.name,
        category = %protocol.category,
        "Protocol registered"
    );
    tx.emit(LedgerEvent::ProtocolRegistered {
        protocol_id: id,
        name: protocol.name.clone(),
    });
    tx.put_protocol(protocol);
    Ok(id)
}

fn validate_new(new: &NewProtocol) -> VaultResult<()> {
    if new.name.trim().is_empty() {
        return Err(VaultError::invalid_parameter("protocol name is empty"));
    }
    if new.name.len() > MAX_PROTOCOL_NAME_LEN {
        return Err(VaultError::invalid_parameter(format!(
            "protocol name longer than {} bytes",
            MAX_PROTOCOL_NAME_LEN
        )));
    }
    if new.supported_tokens.len() > MAX_SUPPORTED_TOKENS {
        return Err(VaultError::invalid_parameter(format!(
            "{} supported tokens, at most {} allowed",
            new.supported_tokens.len(),
            MAX_SUPPORTED_TOKENS
        )));
    }
    let mut seen = HashSet::new();
    for token in &new.supported_tokens {
        if token.is_empty() {
            return Err(VaultError::invalid_parameter("empty token symbol"));
        }
        if !seen.insert(token.as_str()) {
            return Err(VaultError::invalid_parameter(format!(
                "token {} listed twice",
                token
            )));
        }
    }
    Ok(())
}

pub fn set_status(
    tx: &mut Transaction<'_>,
    ctx: &OperationContext,
    config: &LedgerConfig,
    id: ProtocolId,
    active: bool,
    trusted: bool,
) -> VaultResult<()> {
    ctx.require_admin(config, "update protocol status")?;
    let mut protocol = require(tx, id)?;
    protocol.active = active;
    protocol.trusted = trusted;

    info!(protocol_id = %id, active, trusted, "Protocol status updated");
    tx.emit(LedgerEvent::ProtocolStatusChanged {
        protocol_id: id,
        active,
        trusted,
    });
    tx.put_protocol(protocol);
    Ok(())
}

/// Input for [`set_risk_params`]. All figures are percentages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskParamsUpdate {
    pub liquidation_threshold: u8,
    pub max_ltv: u8,
    pub liquidation_penalty: u8,
    pub oracle: String,
}

pub fn set_risk_params(
    tx: &mut Transaction<'_>,
    ctx: &OperationContext,
    config: &LedgerConfig,
    id: ProtocolId,
    update: RiskParamsUpdate,
) -> VaultResult<()> {
    ctx.require_admin(config, "set protocol risk parameters")?;
    require(tx, id)?;

    if !RiskParams::validate(
        update.liquidation_threshold,
        update.max_ltv,
        update.liquidation_penalty,
    ) {
        warn!(
            protocol_id = %id,
            threshold = update.liquidation_threshold,
            max_ltv = update.max_ltv,
            penalty = update.liquidation_penalty,
            "Risk parameters rejected"
        );
        return Err(VaultError::invalid_parameter(format!(
            "risk parameters must satisfy max_ltv <= threshold <= 100 and penalty <= 100 \
             (threshold {}, max_ltv {}, penalty {})",
            update.liquidation_threshold, update.max_ltv, update.liquidation_penalty
        )));
    }

    let params = RiskParams {
        protocol_id: id,
        liquidation_threshold: update.liquidation_threshold,
        max_ltv: update.max_ltv,
        liquidation_penalty: update.liquidation_penalty,
        oracle: update.oracle,
        updated_at: tx.height(),
    };
    debug!(protocol_id = %id, ?params, "Risk parameters updated");
    tx.emit(LedgerEvent::RiskParamsUpdated {
        protocol_id: id,
        liquidation_threshold: params.liquidation_threshold,
        max_ltv: params.max_ltv,
    });
    tx.put_risk_params(params);
    Ok(())
}

/// Look up a protocol, failing with `ProtocolNotRegistered`.
pub fn require(tx: &Transaction<'_>, id: ProtocolId) -> VaultResult<Protocol> {
    tx.protocol(id)?.ok_or(VaultError::ProtocolNotRegistered(id))
}

/// Look up a protocol that must be registered and active.
pub fn require_active(tx: &Transaction<'_>, id: ProtocolId) -> VaultResult<Protocol> {
    let protocol = require(tx, id)?;
    if !protocol.active {
        return Err(VaultError::InvalidProtocol(id));
    }
    Ok(protocol)
}
