//! External collaborators injected into the service.
//!
//! Each concern is a trait with in-memory reference implementations:
//!
//! - [`ProtocolAdapter`]: moves funds into and out of one yield protocol
//! - [`SettlementLedger`]: settlement-currency transfers
//! - [`PositionValuation`]: current loan-to-value for a user on a protocol
//! - [`EventSink`]: receives committed ledger events

mod adapter;
mod events;
mod settlement;
mod valuation;

use std::sync::Arc;

pub use adapter::{
    AdapterAction, AdapterCall, AdapterError, AdapterSet, NoopAdapter, ProtocolAdapter,
    RecordingAdapter,
};
pub use events::{BroadcastEventSink, EventSink, MemoryEventSink, TracingEventSink};
pub use settlement::{InMemorySettlement, SettlementError, SettlementLedger};
pub use valuation::{FixedValuation, PositionValuation, TrackedPositionValuation, ValuationError};

/// The capability set a [`crate::VaultService`] runs against.
#[derive(Clone)]
pub struct Capabilities {
    pub adapters: AdapterSet,
    pub settlement: Arc<dyn SettlementLedger>,
    pub valuation: Arc<dyn PositionValuation>,
    pub events: Arc<dyn EventSink>,
}

impl Capabilities {
    pub fn with_adapters(mut self, adapters: AdapterSet) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_settlement(mut self, settlement: Arc<dyn SettlementLedger>) -> Self {
        self.settlement = settlement;
        self
    }

    pub fn with_valuation(mut self, valuation: Arc<dyn PositionValuation>) -> Self {
        self.valuation = valuation;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            adapters: AdapterSet::default(),
            settlement: Arc::new(InMemorySettlement::new()),
            valuation: Arc::new(TrackedPositionValuation),
            events: Arc::new(TracingEventSink),
        }
    }
}
