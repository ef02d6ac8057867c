//! Core persistence logic for the canteen customer/order tracker.
//! This crate is the single source of truth for data invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod persist;
pub mod repo;
pub mod service;

pub use db::{open_db_in_memory, DbError, Engine, SqliteEngine};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::customer::{
    Customer, CustomerId, CustomerUpdate, NewCustomer, NewOrder, NewOrderItem, Order, OrderId,
    OrderItem, OrderItemId, ValidationError,
};
pub use persist::{
    DecodeError, FileKeyValueStore, KeyValueStore, KvError, LoadOutcome, MemoryKeyValueStore,
    PersistenceError,
};
pub use repo::customer_repo::{CanteenRepository, CascadeReport, TableCounts};
pub use repo::{StorageError, StorageResult};
pub use service::canteen_store::{
    CanteenStore, InitError, InitErrorKind, StoreConfig, StoreError, StoreResult, StoreStatus,
    DEFAULT_SNAPSHOT_KEY,
};

/// SQLite-backed store, the configuration every shipped caller uses.
pub type SqliteCanteenStore<K> = CanteenStore<SqliteEngine, K>;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
