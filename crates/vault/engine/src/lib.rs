//! # vault-engine
//!
//! Allocation, accounting and risk engine for the yield vault ledger.
//!
//! - **ProtocolRegistry** (`registry`): known protocols and risk parameters
//! - **AllocationEngine** (`allocation`): floor-split of an amount across a
//!   vault's weighted targets
//! - **VaultLedger** (`ledger`): vaults, totals, per-user positions
//! - **RiskEngine** (`risk`): liquidation alerts and user preferences
//! - **PositionTracker** (`positions`): caller-reported protocol holdings
//! - **BatchExecutor** (`batch`): ordered protocol actions
//!
//! [`VaultService`] wires these to an injected [`store::StateStore`] and a
//! [`capability::Capabilities`] set. Each public operation is atomic: store
//! writes commit together, external effects are compensated on failure, and
//! events are published only after commit.

#![deny(unsafe_code)]

pub mod allocation;
pub mod batch;
pub mod capability;
pub mod config;
pub mod context;
pub mod journal;
pub mod ledger;
pub mod positions;
pub mod registry;
pub mod risk;
pub mod service;
pub mod store;

pub use allocation::{Distribution, Leg};
pub use batch::{ActionReceipt, BatchAction};
pub use capability::{
    AdapterAction, AdapterSet, BroadcastEventSink, Capabilities, EventSink, FixedValuation,
    InMemorySettlement, MemoryEventSink, NoopAdapter, PositionValuation, ProtocolAdapter,
    RecordingAdapter, SettlementLedger, TracingEventSink, TrackedPositionValuation,
};
pub use config::{ConfigError, LedgerConfig, LimitsConfig, LoggingConfig};
pub use context::OperationContext;
pub use ledger::{VaultAudit, VaultMovement};
pub use positions::PositionReport;
pub use registry::RiskParamsUpdate;
pub use risk::RiskAssessment;
pub use service::{tokens, VaultService};
pub use store::{InMemoryStateStore, StateStore};
