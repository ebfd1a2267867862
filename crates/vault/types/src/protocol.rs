//! Registered external protocols and their risk parameters.

use serde::{Deserialize, Serialize};

use crate::ids::{BlockHeight, ProtocolId};

/// Maximum number of token symbols a protocol may declare.
pub const MAX_SUPPORTED_TOKENS: usize = 10;

/// Maximum length of a protocol display name in bytes.
pub const MAX_PROTOCOL_NAME_LEN: usize = 64;

/// Category tag used to pick an adapter implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolCategory {
    Lending,
    Dex,
    Farm,
    Staking,
    Other,
}

impl std::fmt::Display for ProtocolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProtocolCategory::Lending => "lending",
            ProtocolCategory::Dex => "dex",
            ProtocolCategory::Farm => "farm",
            ProtocolCategory::Staking => "staking",
            ProtocolCategory::Other => "other",
        };
        f.write_str(s)
    }
}

/// A registered protocol. Never deleted; deactivated instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    pub id: ProtocolId,
    pub name: String,
    /// External address or contract identity of the protocol.
    pub address: String,
    pub active: bool,
    pub trusted: bool,
    pub supported_tokens: Vec<String>,
    pub category: ProtocolCategory,
    pub registered_at: BlockHeight,
}

impl Protocol {
    pub fn supports_token(&self, token: &str) -> bool {
        self.supported_tokens.iter().any(|t| t == token)
    }
}

/// Risk parameters attached to a protocol.
///
/// All values are percentages; `max_ltv <= liquidation_threshold <= 100`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskParams {
    pub protocol_id: ProtocolId,
    pub liquidation_threshold: u8,
    pub max_ltv: u8,
    pub liquidation_penalty: u8,
    /// Identity of the price oracle backing this protocol's valuations.
    pub oracle: String,
    pub updated_at: BlockHeight,
}

impl RiskParams {
    /// Check the percentage bounds and the ltv/threshold ordering.
    pub fn validate(liquidation_threshold: u8, max_ltv: u8, liquidation_penalty: u8) -> bool {
        liquidation_threshold <= 100 && max_ltv <= liquidation_threshold && liquidation_penalty <= 100
    }
}
