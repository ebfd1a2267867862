//! Versioned state store and the transaction overlay used by every operation.

pub mod memory;
mod traits;
mod tx;

pub use memory::InMemoryStateStore;
pub use traits::{Counter, KeySpace, StateKey, StateStore, StateValue, StoreError, StoreResult};
pub use tx::Transaction;
