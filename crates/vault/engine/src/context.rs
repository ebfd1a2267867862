//! Caller identity and height for one operation, with the authorisation
//! checks every component shares.

use serde::{Deserialize, Serialize};
use vault_types::{BlockHeight, Principal, VaultError, VaultResult};

use crate::config::LedgerConfig;

/// Who is calling, and at which block height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationContext {
    pub caller: Principal,
    pub height: BlockHeight,
}

impl OperationContext {
    pub fn new(caller: impl Into<String>, height: BlockHeight) -> Self {
        Self {
            caller: Principal::new(caller),
            height,
        }
    }

    pub fn is_admin(&self, config: &LedgerConfig) -> bool {
        self.caller == config.admin
    }

    pub fn require_admin(&self, config: &LedgerConfig, action: &str) -> VaultResult<()> {
        if self.is_admin(config) {
            Ok(())
        } else {
            Err(VaultError::not_authorized(&self.caller, action))
        }
    }

    /// Fail when the caller is the custody account, which escrows every
    /// vault's funds and cannot hold a position of its own.
    pub fn require_not_custody(&self, config: &LedgerConfig, action: &str) -> VaultResult<()> {
        if self.caller == config.custody {
            Err(VaultError::not_authorized(&self.caller, action))
        } else {
            Ok(())
        }
    }

    /// Pass when the caller is `owner` or the administrator.
    pub fn require_owner_or_admin(
        &self,
        owner: &Principal,
        config: &LedgerConfig,
        action: &str,
    ) -> VaultResult<()> {
        if &self.caller == owner || self.is_admin(config) {
            Ok(())
        } else {
            Err(VaultError::not_authorized(&self.caller, action))
        }
    }
}
