use canteen_core::db::{open_db_in_memory, Engine, SqliteEngine};
use canteen_core::persist::{
    decode_snapshot, encode_snapshot, DecodeError, LoadError, LoadOutcome, PersistenceAdapter,
    PersistenceError,
};
use canteen_core::{
    CanteenRepository, Customer, FileKeyValueStore, KvError, MemoryKeyValueStore,
    SqliteCanteenStore, StoreConfig, DEFAULT_SNAPSHOT_KEY,
};
use std::sync::Arc;

fn adapter(store: &Arc<MemoryKeyValueStore>) -> PersistenceAdapter<MemoryKeyValueStore> {
    PersistenceAdapter::new(Arc::clone(store), DEFAULT_SNAPSHOT_KEY)
}

/// Snapshot in the browser app's layout: same tables, locale-formatted dates.
fn locale_dated_snapshot() -> String {
    let engine = SqliteEngine::open_empty().unwrap();
    engine
        .execute_batch(
            "CREATE TABLE customers (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                organization TEXT NOT NULL
            );
            CREATE TABLE orders (
                id TEXT PRIMARY KEY,
                customer_id TEXT NOT NULL,
                date TEXT NOT NULL,
                total REAL NOT NULL,
                FOREIGN KEY (customer_id) REFERENCES customers(id)
            );
            CREATE TABLE order_items (
                id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL,
                name TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                price REAL NOT NULL,
                FOREIGN KEY (order_id) REFERENCES orders(id)
            );
            INSERT INTO customers VALUES ('c1', 'Ana', 'Eng');
            INSERT INTO orders VALUES ('o1', 'c1', '19/10/2026', 7.0);
            INSERT INTO order_items VALUES ('i1', 'o1', 'Coffee', 2, 3.5);",
        )
        .unwrap();
    PersistenceAdapter::<MemoryKeyValueStore>::export_snapshot(&engine).unwrap()
}

fn engine_with_customer(id: &str, name: &str) -> SqliteEngine {
    let engine = open_db_in_memory().unwrap();
    CanteenRepository::new(&engine)
        .insert_customer(&Customer {
            id: id.to_string(),
            name: name.to_string(),
            organization: "Eng".to_string(),
            orders: Vec::new(),
        })
        .unwrap();
    engine
}

#[tokio::test]
async fn load_without_snapshot_starts_fresh_with_schema() {
    let store = Arc::new(MemoryKeyValueStore::new());

    let loaded = adapter(&store).load::<SqliteEngine>().await.unwrap();

    assert_eq!(loaded.outcome, LoadOutcome::Fresh);
    let customers = CanteenRepository::new(&loaded.engine)
        .list_customers()
        .unwrap();
    assert!(customers.is_empty());
    assert_eq!(store.peek(DEFAULT_SNAPSHOT_KEY), None);
}

#[tokio::test]
async fn saved_snapshot_is_restored_by_a_later_load() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let engine = engine_with_customer("c1", "Ana");
    let encoded = PersistenceAdapter::<MemoryKeyValueStore>::export_snapshot(&engine).unwrap();
    adapter(&store).save(encoded).await.unwrap();

    let loaded = adapter(&store).load::<SqliteEngine>().await.unwrap();

    assert!(matches!(loaded.outcome, LoadOutcome::Restored { bytes } if bytes > 0));
    let customers = CanteenRepository::new(&loaded.engine)
        .list_customers()
        .unwrap();
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].name, "Ana");
}

#[tokio::test]
async fn stored_value_is_comma_joined_decimal_bytes() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let engine = engine_with_customer("c1", "Ana");
    let encoded = PersistenceAdapter::<MemoryKeyValueStore>::export_snapshot(&engine).unwrap();
    adapter(&store).save(encoded).await.unwrap();

    let stored = store.peek(DEFAULT_SNAPSHOT_KEY).unwrap();
    assert!(stored
        .split(',')
        .all(|token| token.parse::<u8>().is_ok()));
    let bytes = decode_snapshot(&stored).unwrap();
    assert!(bytes.starts_with(b"SQLite format 3\0"));
}

#[tokio::test]
async fn garbage_snapshot_falls_back_to_empty_engine() {
    let store = Arc::new(MemoryKeyValueStore::new());
    store.insert(DEFAULT_SNAPSHOT_KEY, "not,a,snapshot");

    let loaded = adapter(&store).load::<SqliteEngine>().await.unwrap();

    assert!(matches!(
        loaded.outcome,
        LoadOutcome::Recovered(DecodeError::InvalidByte { position: 0, .. })
    ));
    let customers = CanteenRepository::new(&loaded.engine)
        .list_customers()
        .unwrap();
    assert!(customers.is_empty());
    // The unusable value is left in place until the next save.
    assert_eq!(
        store.peek(DEFAULT_SNAPSHOT_KEY).as_deref(),
        Some("not,a,snapshot")
    );
}

#[tokio::test]
async fn decodable_bytes_that_are_not_a_database_fall_back() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let junk = encode_snapshot(&[7u8; 512]);
    store.insert(DEFAULT_SNAPSHOT_KEY, junk);

    let loaded = adapter(&store).load::<SqliteEngine>().await.unwrap();

    assert!(matches!(loaded.outcome, LoadOutcome::Recovered(DecodeError::Engine(_))));
    assert!(CanteenRepository::new(&loaded.engine)
        .list_customers()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn snapshot_from_newer_schema_falls_back() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let engine = engine_with_customer("c1", "Ana");
    engine.execute_batch("PRAGMA user_version = 99;").unwrap();
    let encoded = PersistenceAdapter::<MemoryKeyValueStore>::export_snapshot(&engine).unwrap();
    store.insert(DEFAULT_SNAPSHOT_KEY, encoded);

    let loaded = adapter(&store).load::<SqliteEngine>().await.unwrap();

    assert!(matches!(loaded.outcome, LoadOutcome::Recovered(DecodeError::Engine(_))));
}

#[tokio::test]
async fn snapshot_with_unreadable_rows_falls_back() {
    let store = Arc::new(MemoryKeyValueStore::new());
    store.insert(DEFAULT_SNAPSHOT_KEY, locale_dated_snapshot());

    let loaded = adapter(&store).load::<SqliteEngine>().await.unwrap();

    assert!(matches!(
        loaded.outcome,
        LoadOutcome::Recovered(DecodeError::UnreadableRows(ref message))
            if message.contains("orders.date")
    ));
    assert!(CanteenRepository::new(&loaded.engine)
        .list_customers()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn store_over_unreadable_snapshot_stays_usable() {
    let kv = Arc::new(MemoryKeyValueStore::new());
    kv.insert(DEFAULT_SNAPSHOT_KEY, locale_dated_snapshot());
    let store = SqliteCanteenStore::new(Arc::clone(&kv), StoreConfig::default());

    assert!(matches!(
        store.init().await.unwrap(),
        LoadOutcome::Recovered(DecodeError::UnreadableRows(_))
    ));
    assert!(store.get_all_customers().await.unwrap().is_empty());
    assert!(store.get_customer("c1").await.unwrap().is_none());
}

#[tokio::test]
async fn host_read_failure_is_an_error_not_a_fallback() {
    let store = Arc::new(MemoryKeyValueStore::new());
    store.set_reject_reads(true);

    let err = adapter(&store).load::<SqliteEngine>().await.err().unwrap();

    assert!(matches!(err, LoadError::Read(KvError::Io(_))));
}

#[tokio::test]
async fn host_write_failure_is_reported() {
    let store = Arc::new(MemoryKeyValueStore::new());
    store.set_reject_writes(true);
    let engine = engine_with_customer("c1", "Ana");
    let encoded = PersistenceAdapter::<MemoryKeyValueStore>::export_snapshot(&engine).unwrap();

    let err = adapter(&store).save(encoded).await.unwrap_err();

    assert!(matches!(err, PersistenceError::Write(KvError::Rejected(_))));
    assert_eq!(store.peek(DEFAULT_SNAPSHOT_KEY), None);
}

#[tokio::test]
async fn file_store_snapshot_survives_new_adapter() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_customer("c7", "Bruno");
    let encoded = PersistenceAdapter::<FileKeyValueStore>::export_snapshot(&engine).unwrap();
    PersistenceAdapter::new(Arc::new(FileKeyValueStore::new(dir.path())), "cantinaDb")
        .save(encoded)
        .await
        .unwrap();

    let reopened =
        PersistenceAdapter::new(Arc::new(FileKeyValueStore::new(dir.path())), "cantinaDb");
    let loaded = reopened.load::<SqliteEngine>().await.unwrap();

    let customer = CanteenRepository::new(&loaded.engine)
        .get_customer("c7")
        .unwrap()
        .unwrap();
    assert_eq!(customer.name, "Bruno");
}
