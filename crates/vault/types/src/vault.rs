//! Vault definitions and their fixed target allocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};
use crate::ids::{BlockHeight, Principal, ProtocolId, VaultId};

/// Maximum number of allocation targets per vault.
pub const MAX_ALLOCATION_ENTRIES: usize = 10;

/// Allocation percentages must sum to exactly this value.
pub const FULL_ALLOCATION: u16 = 100;

/// Longest accepted vault name, in bytes.
pub const MAX_VAULT_NAME_LEN: usize = 64;

pub const MIN_RISK_LEVEL: u8 = 1;
pub const MAX_RISK_LEVEL: u8 = 10;

/// One weighted allocation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub protocol_id: ProtocolId,
    pub percentage: u8,
}

impl AllocationEntry {
    pub fn new(protocol_id: ProtocolId, percentage: u8) -> Self {
        Self {
            protocol_id,
            percentage,
        }
    }
}

/// Ordered list of (protocol, percentage) pairs summing to 100.
///
/// Construction is the only place the sum is checked; the list cannot be
/// mutated afterwards. Zero weights and repeated targets are accepted: a
/// zero-weight leg receives no share, and a repeated target receives one
/// share per entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AllocationEntry>", into = "Vec<AllocationEntry>")]
pub struct TargetAllocation(Vec<AllocationEntry>);

impl TargetAllocation {
    pub fn new(entries: Vec<AllocationEntry>) -> VaultResult<Self> {
        if entries.is_empty() {
            return Err(VaultError::invalid_parameter(
                "allocation must name at least one protocol",
            ));
        }
        if entries.len() > MAX_ALLOCATION_ENTRIES {
            return Err(VaultError::invalid_parameter(format!(
                "allocation has {} entries, maximum is {}",
                entries.len(),
                MAX_ALLOCATION_ENTRIES
            )));
        }

        let sum: u16 = entries.iter().map(|e| u16::from(e.percentage)).sum();
        if sum != FULL_ALLOCATION {
            return Err(VaultError::invalid_parameter(format!(
                "allocation percentages sum to {}, expected {}",
                sum, FULL_ALLOCATION
            )));
        }

        Ok(Self(entries))
    }

    pub fn entries(&self) -> &[AllocationEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn protocol_ids(&self) -> impl Iterator<Item = ProtocolId> + '_ {
        self.0.iter().map(|e| e.protocol_id)
    }
}

impl TryFrom<Vec<AllocationEntry>> for TargetAllocation {
    type Error = VaultError;

    fn try_from(entries: Vec<AllocationEntry>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<TargetAllocation> for Vec<AllocationEntry> {
    fn from(allocation: TargetAllocation) -> Self {
        allocation.0
    }
}

/// Descriptive vault metadata supplied by the creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub strategy: String,
    pub risk_level: u8,
}

/// Lifecycle state of a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultStatus {
    Active,
    Inactive,
}

/// A strategy container with a fixed allocation across protocols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub id: VaultId,
    pub creator: Principal,
    pub meta: VaultMeta,
    pub allocation: TargetAllocation,
    pub status: VaultStatus,
    /// Sum of every depositor's current balance.
    pub total_assets: u64,
    pub created_height: BlockHeight,
    pub created_at: DateTime<Utc>,
}

impl Vault {
    pub fn is_active(&self) -> bool {
        self.status == VaultStatus::Active
    }
}
