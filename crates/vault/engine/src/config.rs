//! Configuration for the vault ledger

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vault_types::{Principal, UserRiskSettings};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Principal allowed to administer protocols
    #[serde(default = "default_admin")]
    pub admin: Principal,

    /// Account that holds deposited funds
    #[serde(default = "default_custody")]
    pub custody: Principal,

    /// Operational limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Risk preferences applied to users without their own settings
    #[serde(default)]
    pub risk_defaults: UserRiskSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            admin: default_admin(),
            custody: default_custody(),
            limits: LimitsConfig::default(),
            risk_defaults: UserRiskSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Operational limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Upper bound on a vault's total assets; unlimited when absent
    #[serde(default)]
    pub max_vault_capacity: Option<u64>,

    /// Maximum actions accepted in one batch
    #[serde(default = "default_max_batch_actions")]
    pub max_batch_actions: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_vault_capacity: None,
            max_batch_actions: default_max_batch_actions(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_admin() -> Principal {
    Principal::new("admin")
}

fn default_custody() -> Principal {
    Principal::new("vault-custody")
}

fn default_max_batch_actions() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LedgerConfig {
    /// Load configuration: defaults, then the optional file, then `VAULT__*`
    /// environment variables (`VAULT__LIMITS__MAX_BATCH_ACTIONS=5`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&LedgerConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("VAULT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: LedgerConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin.as_str().is_empty() {
            return Err(ConfigError::Invalid("admin principal is empty".into()));
        }
        if self.custody.as_str().is_empty() {
            return Err(ConfigError::Invalid("custody principal is empty".into()));
        }
        if self.admin == self.custody {
            return Err(ConfigError::Invalid(
                "custody account must differ from admin".into(),
            ));
        }
        if self.limits.max_batch_actions == 0 {
            return Err(ConfigError::Invalid("max_batch_actions must be positive".into()));
        }
        if self.limits.max_vault_capacity == Some(0) {
            return Err(ConfigError::Invalid("max_vault_capacity must be positive".into()));
        }
        if !self.risk_defaults.within_bounds() {
            return Err(ConfigError::Invalid(
                "risk defaults must each be at most 50".into(),
            ));
        }
        Ok(())
    }

    /// Configuration with a specific admin, for tests and scripts.
    pub fn with_admin(admin: impl Into<String>) -> Self {
        Self {
            admin: Principal::new(admin),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.admin.as_str(), "admin");
        assert_eq!(config.limits.max_batch_actions, 10);
        assert!(config.limits.max_vault_capacity.is_none());
        assert_eq!(config.risk_defaults.liquidation_alert_threshold, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = LedgerConfig::load(None).unwrap();
        assert_eq!(config.custody.as_str(), "vault-custody");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validation_rejects_bad_limits() {
        let mut config = LedgerConfig::with_admin("root");
        config.limits.max_batch_actions = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = LedgerConfig::default();
        config.risk_defaults.max_slippage = 51;
        assert!(config.validate().is_err());

        let mut config = LedgerConfig::default();
        config.custody = config.admin.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: LedgerConfig = serde_json::from_value(
            serde_json::json!({"admin": "root", "limits": {"max_vault_capacity": 5000}}),
        )
        .unwrap();
        assert_eq!(config.admin.as_str(), "root");
        assert_eq!(config.limits.max_vault_capacity, Some(5000));
        assert_eq!(config.limits.max_batch_actions, 10);
    }
}
