use serde::{Deserialize, Serialize};
use thiserror::Error;
use vault_types::{
    Principal, Protocol, ProtocolId, RiskParams, UserProtocolPosition, UserRiskSettings, Vault,
    VaultError, VaultId, UserVaultPosition,
};

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("version conflict: expected {expected}, store is at {found}")]
    Conflict { expected: u64, found: u64 },

    #[error("value stored under {0} has an unexpected type")]
    TypeMismatch(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for VaultError {
    fn from(err: StoreError) -> Self {
        VaultError::Storage(err.to_string())
    }
}

/// Monotonic id sequences held in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Counter {
    NextProtocolId,
    NextVaultId,
}

/// Table a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySpace {
    Counter,
    Protocol,
    RiskParams,
    Vault,
    VaultPosition,
    ProtocolPosition,
    RiskSettings,
}

/// Key of one record in the ledger state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StateKey {
    Counter(Counter),
    Protocol(ProtocolId),
    RiskParams(ProtocolId),
    Vault(VaultId),
    /// Vault first so one vault's positions sort together.
    VaultPosition(VaultId, Principal),
    ProtocolPosition(Principal, ProtocolId),
    RiskSettings(Principal),
}

impl StateKey {
    pub fn space(&self) -> KeySpace {
        match self {
            StateKey::Counter(_) => KeySpace::Counter,
            StateKey::Protocol(_) => KeySpace::Protocol,
            StateKey::RiskParams(_) => KeySpace::RiskParams,
            StateKey::Vault(_) => KeySpace::Vault,
            StateKey::VaultPosition(..) => KeySpace::VaultPosition,
            StateKey::ProtocolPosition(..) => KeySpace::ProtocolPosition,
            StateKey::RiskSettings(_) => KeySpace::RiskSettings,
        }
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateKey::Counter(c) => write!(f, "counter/{:?}", c),
            StateKey::Protocol(id) => write!(f, "protocols/{}", id.get()),
            StateKey::RiskParams(id) => write!(f, "risk-params/{}", id.get()),
            StateKey::Vault(id) => write!(f, "vaults/{}", id.get()),
            StateKey::VaultPosition(vault, user) => {
                write!(f, "vault-positions/{}/{}", vault.get(), user)
            }
            StateKey::ProtocolPosition(user, protocol) => {
                write!(f, "protocol-positions/{}/{}", user, protocol.get())
            }
            StateKey::RiskSettings(user) => write!(f, "risk-settings/{}", user),
        }
    }
}

/// A stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateValue {
    Counter(u64),
    Protocol(Protocol),
    RiskParams(RiskParams),
    Vault(Vault),
    VaultPosition(UserVaultPosition),
    ProtocolPosition(UserProtocolPosition),
    RiskSettings(UserRiskSettings),
}

/// Versioned key-value store holding the committed ledger state.
///
/// Every successful `apply` advances the version by one. Writers pass the
/// version they read from; a stale base version is rejected so that two
/// operations can never both commit against the same snapshot.
pub trait StateStore: Send + Sync {
    /// Current committed version.
    fn version(&self) -> StoreResult<u64>;

    /// Read one committed record.
    fn get(&self, key: &StateKey) -> StoreResult<Option<StateValue>>;

    /// Read every committed record in a key space, ordered by key.
    fn scan(&self, space: KeySpace) -> StoreResult<Vec<(StateKey, StateValue)>>;

    /// Atomically apply a write set on top of `base_version`.
    ///
    /// Returns the new version.
    fn apply(&self, base_version: u64, writes: Vec<(StateKey, StateValue)>) -> StoreResult<u64>;
}
