//! Event sinks for committed ledger events.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::info;
use vault_types::EventRecord;

/// Receives every event after its operation commits.
pub trait EventSink: Send + Sync {
    fn publish(&self, record: EventRecord);
}

/// Collects events in memory, for tests and local inspection.
#[derive(Default)]
pub struct MemoryEventSink {
    records: RwLock<Vec<EventRecord>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    /// Event names in publication order.
    pub fn names(&self) -> Vec<&'static str> {
        self.records
            .read()
            .map(|r| r.iter().map(|rec| rec.event.name()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.write() {
            records.clear();
        }
    }
}

impl EventSink for MemoryEventSink {
    fn publish(&self, record: EventRecord) {
        if let Ok(mut records) = self.records.write() {
            records.push(record);
        }
    }
}

/// Fans events out to live subscribers over a broadcast channel.
pub struct BroadcastEventSink {
    sender: broadcast::Sender<EventRecord>,
    counts: RwLock<HashMap<&'static str, u64>>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            counts: RwLock::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Number of events published per event name.
    pub fn counts(&self) -> HashMap<&'static str, u64> {
        self.counts.read().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, record: EventRecord) {
        if let Ok(mut counts) = self.counts.write() {
            *counts.entry(record.event.name()).or_insert(0) += 1;
        }
        // no receivers is not an error
        let _ = self.sender.send(record);
    }
}

/// Writes each event to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, record: EventRecord) {
        let payload = serde_json::to_string(&record.event).unwrap_or_default();
        info!(
            event_id = %record.id,
            event = record.event.name(),
            height = record.height,
            payload = %payload,
            "ledger event"
        );
    }
}
