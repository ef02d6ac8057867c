//! SQLite-backed engine.
//!
//! # Responsibility
//! - Open in-memory SQLite connections and configure required pragmas.
//! - Export/import the full database image for snapshot persistence,
//!   entirely in memory.
//!
//! # Invariants
//! - Returned engines have `foreign_keys=ON`.
//! - Snapshot import never touches an existing connection; it builds a new one.

use super::engine::{Engine, Row, Value};
use super::schema::ensure_schema;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::serialize::OwnedData;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{ffi, params_from_iter, Connection, DatabaseName};
use std::ptr::NonNull;
use std::time::{Duration, Instant};

/// In-memory SQLite engine.
pub struct SqliteEngine {
    conn: Connection,
}

/// Opens an empty in-memory engine and creates the canteen schema.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_in_memory() -> DbResult<SqliteEngine> {
    let engine = SqliteEngine::open_empty()?;
    ensure_schema(&engine)?;
    Ok(engine)
}

impl Engine for SqliteEngine {
    fn open_empty() -> DbResult<Self> {
        let started_at = Instant::now();
        info!("event=db_open module=db status=start mode=memory");

        let result = Connection::open_in_memory()
            .map_err(DbError::from)
            .and_then(bootstrap_connection);
        log_open_result("memory", started_at, &result);
        result.map(|conn| Self { conn })
    }

    fn from_bytes(bytes: &[u8]) -> DbResult<Self> {
        let started_at = Instant::now();
        info!(
            "event=db_open module=db status=start mode=snapshot bytes={}",
            bytes.len()
        );

        let result = restore_connection(bytes).and_then(bootstrap_connection);
        log_open_result("snapshot", started_at, &result);
        result.map(|conn| Self { conn })
    }

    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<usize> {
        Ok(self.conn.execute(sql, params_from_iter(params.iter()))?)
    }

    fn execute_batch(&self, sql: &str) -> DbResult<()> {
        Ok(self.conn.execute_batch(sql)?)
    }

    fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let column_count = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut collected = Vec::new();

        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                values.push(value_from_ref(row.get_ref(index)?));
            }
            collected.push(Row::new(values));
        }

        Ok(collected)
    }

    fn export_bytes(&self) -> DbResult<Vec<u8>> {
        let image = self.conn.serialize(DatabaseName::Main)?;
        Ok(image.to_vec())
    }

    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        // Dropping `tx` without commit rolls back.
        let tx = self.conn.unchecked_transaction().map_err(DbError::from)?;
        let output = f(self)?;
        tx.commit().map_err(DbError::from)?;
        Ok(output)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(value) => ToSqlOutput::Borrowed(ValueRef::Integer(*value)),
            Value::Real(value) => ToSqlOutput::Borrowed(ValueRef::Real(*value)),
            Value::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            Value::Blob(value) => ToSqlOutput::Borrowed(ValueRef::Blob(value.as_slice())),
        })
    }
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(value) => Value::Integer(value),
        ValueRef::Real(value) => Value::Real(value),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn restore_connection(bytes: &[u8]) -> DbResult<Connection> {
    let mut conn = Connection::open_in_memory()?;
    conn.deserialize(DatabaseName::Main, sqlite_owned_image(bytes)?, false)?;
    // sqlite3_deserialize does not inspect the image; a foreign one fails here.
    conn.query_row("SELECT COUNT(*) FROM sqlite_master;", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(conn)
}

/// Copies `bytes` into a buffer owned by SQLite's allocator.
fn sqlite_owned_image(bytes: &[u8]) -> DbResult<OwnedData> {
    if bytes.is_empty() {
        return Err(DbError::ImageAllocation(0));
    }
    let len = u64::try_from(bytes.len()).map_err(|_| DbError::ImageAllocation(bytes.len()))?;
    // SAFETY: the buffer is allocated by sqlite3_malloc64 with `len` bytes and
    // fully initialized before ownership moves to `OwnedData`, which frees it
    // with sqlite3_free (or hands it to sqlite3_deserialize).
    unsafe {
        let raw = ffi::sqlite3_malloc64(len).cast::<u8>();
        let ptr = NonNull::new(raw).ok_or(DbError::ImageAllocation(bytes.len()))?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len());
        Ok(OwnedData::from_raw_nonnull(ptr, bytes.len()))
    }
}

fn bootstrap_connection(conn: Connection) -> DbResult<Connection> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

fn log_open_result(mode: &str, started_at: Instant, result: &DbResult<Connection>) {
    match result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={} duration_ms={}",
            mode,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={} duration_ms={} error={}",
            mode,
            started_at.elapsed().as_millis(),
            err
        ),
    }
}
