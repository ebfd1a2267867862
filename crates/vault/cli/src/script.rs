//! Scenario scripts: YAML lists of ledger operations replayed against an
//! in-memory service.
//!
//! ```yaml
//! balances:
//!   alice: 10000
//! steps:
//!   - op: register_protocol
//!     caller: admin
//!     name: zest
//!     address: SP000.zest
//!     tokens: [STX]
//!     category: lending
//!   - op: deposit
//!     caller: alice
//!     vault: 1
//!     amount: 1000
//!     expect: VaultNotFound
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vault_engine::{
    BatchAction, Capabilities, InMemorySettlement, InMemoryStateStore, LedgerConfig,
    MemoryEventSink, OperationContext, PositionReport, RiskParamsUpdate, SettlementLedger,
    VaultService,
};
use vault_types::{
    AllocationEntry, BlockHeight, EventRecord, Principal, ProtocolCategory, ProtocolId,
    UserRiskSettings, Vault, VaultError, VaultId, VaultMeta,
};

use crate::error::{CliError, CliResult};

/// A full scenario file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scenario {
    /// Starting settlement balances.
    #[serde(default)]
    pub balances: BTreeMap<String, u64>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_yaml(text: &str) -> CliResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// One operation with its caller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Step {
    pub caller: String,
    /// Block height; defaults to the step's position, starting at 1.
    #[serde(default)]
    pub height: Option<BlockHeight>,
    /// Error kind the step must fail with, e.g. `InsufficientFunds`.
    #[serde(default)]
    pub expect: Option<String>,
    #[serde(flatten)]
    pub op: Operation,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    RegisterProtocol {
        name: String,
        address: String,
        #[serde(default)]
        tokens: Vec<String>,
        category: ProtocolCategory,
    },
    UpdateProtocolStatus {
        protocol: ProtocolId,
        active: bool,
        trusted: bool,
    },
    SetRiskParams {
        protocol: ProtocolId,
        liquidation_threshold: u8,
        max_ltv: u8,
        liquidation_penalty: u8,
        #[serde(default)]
        oracle: String,
    },
    CreateVault {
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        strategy: String,
        risk_level: u8,
        allocation: Vec<AllocationEntry>,
    },
    Deposit {
        vault: VaultId,
        amount: u64,
    },
    Withdraw {
        vault: VaultId,
        amount: u64,
    },
    Rebalance {
        vault: VaultId,
    },
    SetVaultStatus {
        vault: VaultId,
        active: bool,
    },
    SetPositionStrategy {
        vault: VaultId,
        #[serde(default)]
        strategy: Option<String>,
    },
    SetRiskPreferences {
        liquidation_alert_threshold: u8,
        rebalance_threshold: u8,
        max_slippage: u8,
        #[serde(default = "default_true")]
        notifications_enabled: bool,
    },
    CheckLiquidationRisk {
        user: String,
        protocol: ProtocolId,
    },
    UpdatePosition {
        protocol: ProtocolId,
        #[serde(flatten)]
        report: PositionReport,
    },
    Batch {
        actions: Vec<BatchAction>,
    },
}

fn default_true() -> bool {
    true
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::RegisterProtocol { .. } => "register_protocol",
            Operation::UpdateProtocolStatus { .. } => "update_protocol_status",
            Operation::SetRiskParams { .. } => "set_risk_params",
            Operation::CreateVault { .. } => "create_vault",
            Operation::Deposit { .. } => "deposit",
            Operation::Withdraw { .. } => "withdraw",
            Operation::Rebalance { .. } => "rebalance",
            Operation::SetVaultStatus { .. } => "set_vault_status",
            Operation::SetPositionStrategy { .. } => "set_position_strategy",
            Operation::SetRiskPreferences { .. } => "set_risk_preferences",
            Operation::CheckLiquidationRisk { .. } => "check_liquidation_risk",
            Operation::UpdatePosition { .. } => "update_position",
            Operation::Batch { .. } => "batch",
        }
    }
}

/// What one step produced.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    pub caller: String,
    pub height: BlockHeight,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final state after a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub steps: Vec<StepReport>,
    pub vaults: Vec<Vault>,
    pub balances: BTreeMap<String, u64>,
    pub events: Vec<EventRecord>,
}

/// Replays scenarios against a fresh in-memory ledger.
pub struct ScenarioRunner {
    service: VaultService,
    settlement: Arc<InMemorySettlement>,
    events: Arc<MemoryEventSink>,
}

impl ScenarioRunner {
    pub fn new(config: LedgerConfig) -> Self {
        let settlement = Arc::new(InMemorySettlement::new());
        let events = Arc::new(MemoryEventSink::new());
        let caps = Capabilities::default()
            .with_settlement(settlement.clone())
            .with_events(events.clone());
        Self {
            service: VaultService::new(Arc::new(InMemoryStateStore::new()), caps, config),
            settlement,
            events,
        }
    }

    pub fn run(&self, scenario: Scenario) -> CliResult<ScenarioReport> {
        self.events.clear();

        for (account, amount) in &scenario.balances {
            self.settlement
                .credit(&Principal::new(account.as_str()), *amount)
                .map_err(|e| CliError::Settlement(e.to_string()))?;
        }

        let mut steps = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.into_iter().enumerate() {
            let height = step.height.unwrap_or(index as BlockHeight + 1);
            let ctx = OperationContext::new(step.caller.clone(), height);
            let op = step.op.name();
            debug!(index, op, caller = %step.caller, height, "Running step");

            let outcome = self.apply(&ctx, step.op);
            let report = match (outcome, step.expect) {
                (Ok(value), None) => StepReport {
                    index,
                    op,
                    caller: step.caller,
                    height,
                    result: Some(value),
                    error: None,
                },
                (Ok(_), Some(kind)) => {
                    return Err(CliError::Expectation {
                        index,
                        op,
                        message: format!("expected {} but the step succeeded", kind),
                    })
                }
                (Err(err), Some(kind)) if err.kind() == kind => StepReport {
                    index,
                    op,
                    caller: step.caller,
                    height,
                    result: None,
                    error: Some(err.to_string()),
                },
                (Err(err), Some(kind)) => {
                    return Err(CliError::Expectation {
                        index,
                        op,
                        message: format!("expected {} but got {}: {}", kind, err.kind(), err),
                    })
                }
                (Err(source), None) => return Err(CliError::Step { index, op, source }),
            };
            steps.push(report);
        }

        let mut balances = BTreeMap::new();
        let custody = self.service.config().custody.clone();
        for account in scenario
            .balances
            .keys()
            .map(|name| Principal::new(name.as_str()))
            .chain(std::iter::once(custody))
        {
            let balance = self
                .settlement
                .balance(&account)
                .map_err(|e| CliError::Settlement(e.to_string()))?;
            balances.insert(account.to_string(), balance);
        }

        let events = self.events.records();

        let vaults = self
            .service
            .vaults()
            .map_err(|source| CliError::Step {
                index: steps.len(),
                op: "report",
                source,
            })?;
        info!(steps = steps.len(), events = events.len(), "Scenario complete");
        Ok(ScenarioReport {
            steps,
            vaults,
            balances,
            events,
        })
    }

    fn apply(&self, ctx: &OperationContext, op: Operation) -> Result<serde_json::Value, VaultError> {
        let svc = &self.service;
        let value = match op {
            Operation::RegisterProtocol {
                name,
                address,
                tokens,
                category,
            } => to_value(svc.register_protocol(ctx, name, address, tokens, category)?),
            Operation::UpdateProtocolStatus {
                protocol,
                active,
                trusted,
            } => to_value(svc.update_protocol_status(ctx, protocol, active, trusted)?),
            Operation::SetRiskParams {
                protocol,
                liquidation_threshold,
                max_ltv,
                liquidation_penalty,
                oracle,
            } => to_value(svc.set_protocol_risk_params(
                ctx,
                protocol,
                RiskParamsUpdate {
                    liquidation_threshold,
                    max_ltv,
                    liquidation_penalty,
                    oracle,
                },
            )?),
            Operation::CreateVault {
                name,
                description,
                strategy,
                risk_level,
                allocation,
            } => to_value(svc.create_vault(
                ctx,
                VaultMeta {
                    name,
                    description,
                    strategy,
                    risk_level,
                },
                allocation,
            )?),
            Operation::Deposit { vault, amount } => to_value(svc.deposit(ctx, vault, amount)?),
            Operation::Withdraw { vault, amount } => to_value(svc.withdraw(ctx, vault, amount)?),
            Operation::Rebalance { vault } => to_value(svc.rebalance_vault(ctx, vault)?),
            Operation::SetVaultStatus { vault, active } => {
                to_value(svc.set_vault_status(ctx, vault, active)?)
            }
            Operation::SetPositionStrategy { vault, strategy } => {
                to_value(svc.set_position_strategy(ctx, vault, strategy)?)
            }
            Operation::SetRiskPreferences {
                liquidation_alert_threshold,
                rebalance_threshold,
                max_slippage,
                notifications_enabled,
            } => to_value(svc.set_risk_preferences(
                ctx,
                UserRiskSettings {
                    liquidation_alert_threshold,
                    rebalance_threshold,
                    max_slippage,
                    notifications_enabled,
                },
            )?),
            Operation::CheckLiquidationRisk { user, protocol } => to_value(
                svc.check_liquidation_risk(ctx, &Principal::new(user), protocol)?,
            ),
            Operation::UpdatePosition { protocol, report } => {
                to_value(svc.update_protocol_position(ctx, protocol, report)?)
            }
            Operation::Batch { actions } => to_value(svc.execute_batch(ctx, actions)?),
        };
        Ok(value)
    }
}

fn to_value<T: Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
