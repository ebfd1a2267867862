//! Protocol adapter capability.
//!
//! The ledger never talks to a lending market, DEX or farm directly; it calls
//! the adapter resolved for the target protocol. Resolution order is the
//! protocol id, then the protocol category, then the fallback adapter.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vault_types::{Protocol, ProtocolCategory, ProtocolId};

/// Failure reported by an adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("rejected by protocol: {0}")]
    Rejected(String),

    #[error("protocol unavailable: {0}")]
    Unavailable(String),
}

/// Direction of an adapter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterAction {
    Deposit,
    Withdraw,
}

impl std::fmt::Display for AdapterAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterAction::Deposit => f.write_str("deposit"),
            AdapterAction::Withdraw => f.write_str("withdraw"),
        }
    }
}

/// Moves funds into or out of one external protocol.
pub trait ProtocolAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn deposit(&self, protocol: &Protocol, amount: u64) -> Result<(), AdapterError>;

    fn withdraw(&self, protocol: &Protocol, amount: u64) -> Result<(), AdapterError>;
}

/// Adapter that accepts every call and does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAdapter;

impl ProtocolAdapter for NoopAdapter {
    fn name(&self) -> &str {
        "noop"
    }

    fn deposit(&self, _protocol: &Protocol, _amount: u64) -> Result<(), AdapterError> {
        Ok(())
    }

    fn withdraw(&self, _protocol: &Protocol, _amount: u64) -> Result<(), AdapterError> {
        Ok(())
    }
}

/// One call observed by a [`RecordingAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterCall {
    pub protocol_id: ProtocolId,
    pub action: AdapterAction,
    pub amount: u64,
}

/// Adapter that records calls, tracks net deployed amounts per protocol and
/// can be told to fail specific calls.
#[derive(Default)]
pub struct RecordingAdapter {
    calls: RwLock<Vec<AdapterCall>>,
    deployed: RwLock<HashMap<ProtocolId, i128>>,
    failures: RwLock<HashSet<(ProtocolId, AdapterAction)>>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `action` on `protocol_id` fail.
    pub fn fail_on(&self, protocol_id: ProtocolId, action: AdapterAction) {
        if let Ok(mut failures) = self.failures.write() {
            failures.insert((protocol_id, action));
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.write() {
            failures.clear();
        }
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls.read().map(|c| c.clone()).unwrap_or_default()
    }

    /// Net amount deposited minus withdrawn for a protocol.
    pub fn deployed(&self, protocol_id: ProtocolId) -> i128 {
        self.deployed
            .read()
            .ok()
            .and_then(|d| d.get(&protocol_id).copied())
            .unwrap_or(0)
    }

    fn record(
        &self,
        protocol: &Protocol,
        action: AdapterAction,
        amount: u64,
    ) -> Result<(), AdapterError> {
        let failing = self
            .failures
            .read()
            .map(|f| f.contains(&(protocol.id, action)))
            .unwrap_or(false);
        if failing {
            return Err(AdapterError::Rejected(format!(
                "{} refused by {}",
                action, protocol.name
            )));
        }

        let mut calls = self
            .calls
            .write()
            .map_err(|_| AdapterError::Unavailable("call log lock poisoned".into()))?;
        let mut deployed = self
            .deployed
            .write()
            .map_err(|_| AdapterError::Unavailable("balance lock poisoned".into()))?;

        calls.push(AdapterCall {
            protocol_id: protocol.id,
            action,
            amount,
        });
        let entry = deployed.entry(protocol.id).or_insert(0);
        match action {
            AdapterAction::Deposit => *entry += i128::from(amount),
            AdapterAction::Withdraw => *entry -= i128::from(amount),
        }
        Ok(())
    }
}

impl ProtocolAdapter for RecordingAdapter {
    fn name(&self) -> &str {
        "recording"
    }

    fn deposit(&self, protocol: &Protocol, amount: u64) -> Result<(), AdapterError> {
        self.record(protocol, AdapterAction::Deposit, amount)
    }

    fn withdraw(&self, protocol: &Protocol, amount: u64) -> Result<(), AdapterError> {
        self.record(protocol, AdapterAction::Withdraw, amount)
    }
}

/// Adapter lookup table.
#[derive(Clone)]
pub struct AdapterSet {
    by_protocol: HashMap<ProtocolId, Arc<dyn ProtocolAdapter>>,
    by_category: HashMap<ProtocolCategory, Arc<dyn ProtocolAdapter>>,
    fallback: Arc<dyn ProtocolAdapter>,
}

impl AdapterSet {
    pub fn new(fallback: Arc<dyn ProtocolAdapter>) -> Self {
        Self {
            by_protocol: HashMap::new(),
            by_category: HashMap::new(),
            fallback,
        }
    }

    pub fn with_protocol(mut self, id: ProtocolId, adapter: Arc<dyn ProtocolAdapter>) -> Self {
        self.by_protocol.insert(id, adapter);
        self
    }

    pub fn with_category(
        mut self,
        category: ProtocolCategory,
        adapter: Arc<dyn ProtocolAdapter>,
    ) -> Self {
        self.by_category.insert(category, adapter);
        self
    }

    pub fn resolve(&self, protocol: &Protocol) -> Arc<dyn ProtocolAdapter> {
        self.by_protocol
            .get(&protocol.id)
            .or_else(|| self.by_category.get(&protocol.category))
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}

impl Default for AdapterSet {
    fn default() -> Self {
        Self::new(Arc::new(NoopAdapter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol(id: u64, category: ProtocolCategory) -> Protocol {
        Protocol {
            id: ProtocolId(id),
            name: format!("p{}", id),
            address: format!("SP000.p{}", id),
            active: true,
            trusted: true,
            supported_tokens: vec!["STX".into()],
            category,
            registered_at: 0,
        }
    }

    struct Named(&'static str);

    impl ProtocolAdapter for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn deposit(&self, _protocol: &Protocol, _amount: u64) -> Result<(), AdapterError> {
            Ok(())
        }

        fn withdraw(&self, _protocol: &Protocol, _amount: u64) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    #[test]
    fn resolution_prefers_protocol_then_category() {
        let set = AdapterSet::default()
            .with_category(ProtocolCategory::Lending, Arc::new(Named("lending")))
            .with_protocol(ProtocolId(2), Arc::new(Named("pinned")));

        assert_eq!(set.resolve(&protocol(1, ProtocolCategory::Lending)).name(), "lending");
        assert_eq!(set.resolve(&protocol(2, ProtocolCategory::Lending)).name(), "pinned");
        assert_eq!(set.resolve(&protocol(3, ProtocolCategory::Dex)).name(), "noop");
    }

    #[test]
    fn recording_adapter_tracks_net_deployment() {
        let adapter = RecordingAdapter::new();
        let p = protocol(1, ProtocolCategory::Farm);

        adapter.deposit(&p, 500).unwrap();
        adapter.withdraw(&p, 200).unwrap();
        assert_eq!(adapter.deployed(ProtocolId(1)), 300);
        assert_eq!(adapter.calls().len(), 2);
    }

    #[test]
    fn recording_adapter_injects_failures() {
        let adapter = RecordingAdapter::new();
        let p = protocol(1, ProtocolCategory::Farm);
        adapter.fail_on(ProtocolId(1), AdapterAction::Withdraw);

        assert!(adapter.deposit(&p, 10).is_ok());
        assert!(matches!(adapter.withdraw(&p, 10), Err(AdapterError::Rejected(_))));
        assert_eq!(adapter.calls().len(), 1);

        adapter.clear_failures();
        assert!(adapter.withdraw(&p, 10).is_ok());
    }
}
