//! Canteen CRUD facade.
//!
//! # Responsibility
//! - Own the engine lifecycle (pending, ready, failed) for one store instance.
//! - Assign identifiers and order dates.
//! - Run every mutation as validate -> execute -> persist under one lock.
//!
//! # Invariants
//! - Initialization runs at most once; its failure is returned to every caller.
//! - Mutations are serialized: a snapshot is always written from a state that
//!   includes every previously committed mutation.
//! - A failed snapshot write keeps the committed in-memory change and marks
//!   the store as having unsaved changes until `flush` succeeds.
//! - Dropping a caller's future does not cancel its snapshot write; the lock
//!   stays held until that write settles.

use crate::db::Engine;
use crate::model::customer::{
    generate_id, Customer, CustomerId, CustomerUpdate, NewCustomer, NewOrder, Order, OrderItem,
};
use crate::persist::adapter::{LoadError, LoadOutcome, PersistenceAdapter, PersistenceError};
use crate::persist::kv::KeyValueStore;
use crate::repo::customer_repo::{CanteenRepository, CascadeReport};
use crate::repo::{StorageError, StorageResult};
use chrono::Local;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OnceCell, OwnedMutexGuard};

/// Host-store key used when none is configured.
pub const DEFAULT_SNAPSHOT_KEY: &str = "cantinaDb";

/// Store construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Host-store key holding the encoded snapshot.
    pub snapshot_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
        }
    }
}

/// Which startup step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitErrorKind {
    /// The host store could not be read.
    SnapshotRead,
    /// The engine could not be opened or its schema created.
    Engine,
}

/// Cached initialization failure, cloned to every caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitError {
    pub kind: InitErrorKind,
    pub message: String,
}

impl Display for InitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "canteen store initialization failed: {}", self.message)
    }
}

impl Error for InitError {}

impl From<LoadError> for InitError {
    fn from(value: LoadError) -> Self {
        let kind = match value {
            LoadError::Read(_) => InitErrorKind::SnapshotRead,
            LoadError::Engine(_) => InitErrorKind::Engine,
        };
        Self {
            kind,
            message: value.to_string(),
        }
    }
}

/// Lifecycle of a store's engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreStatus {
    /// Initialization has not finished (or not started).
    Pending,
    Ready,
    Failed(InitError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Facade-level error.
#[derive(Debug)]
pub enum StoreError {
    /// A non-waiting call was made before initialization completed.
    NotInitialized,
    Init(InitError),
    /// The engine rejected a statement, or input was invalid.
    Storage(StorageError),
    /// The mutation committed in memory but its snapshot was not written.
    Persistence(PersistenceError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "canteen store is not initialized"),
            Self::Init(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotInitialized => None,
            Self::Init(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Persistence(err) => Some(err),
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<PersistenceError> for StoreError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

struct EngineSlot<E> {
    engine: E,
    load_outcome: LoadOutcome,
    unsaved_changes: bool,
}

/// Canteen customer/order store backed by an embedded engine and a host
/// key-value store.
pub struct CanteenStore<E: Engine, K: KeyValueStore> {
    adapter: PersistenceAdapter<K>,
    state: OnceCell<Result<Arc<Mutex<EngineSlot<E>>>, InitError>>,
}

impl<E, K> CanteenStore<E, K>
where
    E: Engine + Send + 'static,
    K: KeyValueStore,
{
    /// Creates a store in `Pending` state. Nothing is read until first use.
    pub fn new(kv: Arc<K>, config: StoreConfig) -> Self {
        Self {
            adapter: PersistenceAdapter::new(kv, config.snapshot_key),
            state: OnceCell::new(),
        }
    }

    /// Runs (or awaits) the one-time initialization.
    pub async fn init(&self) -> StoreResult<LoadOutcome> {
        let slot = self.ready().await?;
        let outcome = slot.lock().await.load_outcome.clone();
        Ok(outcome)
    }

    /// Current lifecycle state; never waits.
    pub fn status(&self) -> StoreStatus {
        match self.state.get() {
            None => StoreStatus::Pending,
            Some(Ok(_)) => StoreStatus::Ready,
            Some(Err(err)) => StoreStatus::Failed(err.clone()),
        }
    }

    /// Inserts a customer; generates the id when absent. Persists.
    pub async fn add_customer(&self, new_customer: NewCustomer) -> StoreResult<Customer> {
        new_customer.validate().map_err(StorageError::from)?;
        let customer = Customer {
            id: new_customer.id.unwrap_or_else(generate_id),
            name: new_customer.name,
            organization: new_customer.organization,
            orders: Vec::new(),
        };

        self.mutate(
            "add_customer",
            |repo| repo.insert_customer(&customer),
            |_| true,
        )
        .await?;
        Ok(customer)
    }

    /// Overwrites name/organization. Returns `false` (and writes nothing)
    /// when the id is unknown.
    pub async fn update_customer(&self, update: CustomerUpdate) -> StoreResult<bool> {
        let changed = self
            .mutate(
                "update_customer",
                |repo| repo.update_customer(&update),
                |changed| *changed > 0,
            )
            .await?;
        Ok(changed > 0)
    }

    /// Deletes a customer with all of its orders and items. Persists once.
    pub async fn delete_customer(&self, id: &str) -> StoreResult<CascadeReport> {
        self.mutate(
            "delete_customer",
            |repo| repo.delete_customer_cascade(id),
            |report| !report.is_empty(),
        )
        .await
    }

    /// Inserts an order with its items for an existing customer. Persists once.
    ///
    /// Generates order/item ids when absent, dates the order today when no
    /// date is given, and derives `total` from the items when not supplied.
    pub async fn add_order(&self, customer_id: &str, new_order: NewOrder) -> StoreResult<Order> {
        let order = build_order(customer_id, new_order);

        self.mutate("add_order", |repo| repo.insert_order(&order), |_| true)
            .await?;
        Ok(order)
    }

    /// Deletes one order and its items. Persists once.
    pub async fn delete_order(&self, order_id: &str) -> StoreResult<CascadeReport> {
        self.mutate(
            "delete_order",
            |repo| repo.delete_order_cascade(order_id),
            |report| !report.is_empty(),
        )
        .await
    }

    /// Deletes every order of a customer; the customer remains. Persists once.
    pub async fn delete_all_orders(&self, customer_id: &str) -> StoreResult<CascadeReport> {
        self.mutate(
            "delete_all_orders",
            |repo| repo.delete_orders_for_customer(customer_id),
            |report| !report.is_empty(),
        )
        .await
    }

    /// Returns all customers with nested orders, ordered by name.
    pub async fn get_all_customers(&self) -> StoreResult<Vec<Customer>> {
        self.read(|repo| repo.list_customers()).await
    }

    /// Returns one customer, or `None` for an unknown id.
    pub async fn get_customer(&self, id: &str) -> StoreResult<Option<Customer>> {
        self.read(|repo| repo.get_customer(id)).await
    }

    /// Whether the latest committed mutation is missing from the host store.
    pub async fn has_unsaved_changes(&self) -> StoreResult<bool> {
        let slot = self.ready().await?;
        let unsaved = slot.lock().await.unsaved_changes;
        Ok(unsaved)
    }

    /// Rewrites the snapshot from the current in-memory state.
    ///
    /// Intended as the retry path after a `StoreError::Persistence`. Does not
    /// trigger initialization.
    pub async fn flush(&self) -> StoreResult<()> {
        let slot_lock = match self.state.get() {
            None => return Err(StoreError::NotInitialized),
            Some(Err(err)) => return Err(StoreError::Init(err.clone())),
            Some(Ok(slot_lock)) => slot_lock,
        };

        let slot = Arc::clone(slot_lock).lock_owned().await;
        self.persist(slot).await?;
        info!("event=store_flush module=service status=ok");
        Ok(())
    }

    async fn ready(&self) -> StoreResult<&Arc<Mutex<EngineSlot<E>>>> {
        let state = self.state.get_or_init(|| self.initialize()).await;
        state
            .as_ref()
            .map_err(|err| StoreError::Init(err.clone()))
    }

    async fn initialize(&self) -> Result<Arc<Mutex<EngineSlot<E>>>, InitError> {
        let started_at = Instant::now();
        info!(
            "event=store_init module=service status=start key={}",
            self.adapter.key()
        );

        match self.adapter.load::<E>().await {
            Ok(loaded) => {
                info!(
                    "event=store_init module=service status=ok outcome={:?} duration_ms={}",
                    loaded.outcome,
                    started_at.elapsed().as_millis()
                );
                Ok(Arc::new(Mutex::new(EngineSlot {
                    engine: loaded.engine,
                    load_outcome: loaded.outcome,
                    unsaved_changes: false,
                })))
            }
            Err(err) => {
                let init_error = InitError::from(err);
                error!(
                    "event=store_init module=service status=error kind={:?} error={}",
                    init_error.kind, init_error.message
                );
                Err(init_error)
            }
        }
    }

    async fn read<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&CanteenRepository<'_, E>) -> StorageResult<T>,
    {
        let slot_lock = self.ready().await?;
        let slot = slot_lock.lock().await;
        let repo = CanteenRepository::new(&slot.engine);
        Ok(f(&repo)?)
    }

    /// Runs one mutation and persists it while holding the engine lock.
    async fn mutate<T, F, C>(&self, operation: &'static str, f: F, changed: C) -> StoreResult<T>
    where
        F: FnOnce(&CanteenRepository<'_, E>) -> StorageResult<T>,
        C: FnOnce(&T) -> bool,
    {
        let slot = Arc::clone(self.ready().await?).lock_owned().await;
        let started_at = Instant::now();

        let result = {
            let repo = CanteenRepository::new(&slot.engine);
            f(&repo)
        };
        let output = match result {
            Ok(output) => output,
            Err(err) => {
                warn!(
                    "event={} module=service status=error stage=execute error={}",
                    operation, err
                );
                return Err(err.into());
            }
        };

        if !changed(&output) {
            info!(
                "event={} module=service status=ok changed=false duration_ms={}",
                operation,
                started_at.elapsed().as_millis()
            );
            return Ok(output);
        }

        self.persist(slot).await?;

        info!(
            "event={} module=service status=ok changed=true duration_ms={}",
            operation,
            started_at.elapsed().as_millis()
        );
        Ok(output)
    }

    /// Writes the current snapshot on a spawned task that owns the lock.
    ///
    /// The write runs to completion even if the calling future is dropped,
    /// and no other operation can start until it settles.
    async fn persist(&self, mut slot: OwnedMutexGuard<EngineSlot<E>>) -> StoreResult<()> {
        slot.unsaved_changes = true;
        let encoded = PersistenceAdapter::<K>::export_snapshot(&slot.engine)?;
        let adapter = self.adapter.clone();
        let write = tokio::spawn(async move {
            let result = adapter.save(encoded).await;
            if result.is_ok() {
                slot.unsaved_changes = false;
            }
            result
        });
        match write.await {
            Ok(result) => Ok(result?),
            Err(err) => {
                error!("event=snapshot_save module=service status=error error={err}");
                Err(PersistenceError::Interrupted(err.to_string()).into())
            }
        }
    }
}

fn build_order(customer_id: &str, new_order: NewOrder) -> Order {
    let total = new_order.total.unwrap_or_else(|| new_order.items_sum());
    let order_id = new_order.id.unwrap_or_else(generate_id);
    let items = new_order
        .items
        .into_iter()
        .map(|item| OrderItem {
            id: item.id.unwrap_or_else(generate_id),
            order_id: order_id.clone(),
            name: item.name,
            quantity: item.quantity,
            price: item.price,
        })
        .collect();

    Order {
        id: order_id,
        customer_id: CustomerId::from(customer_id),
        date: new_order
            .date
            .unwrap_or_else(|| Local::now().date_naive()),
        total,
        items,
    }
}
