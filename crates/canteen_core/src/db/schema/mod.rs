//! Canteen schema registry and executor.
//!
//! # Responsibility
//! - Register schema scripts in strictly increasing order.
//! - Apply pending scripts atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied version is mirrored to `PRAGMA user_version`.
//! - Scripts use `IF NOT EXISTS`, so stores created before versioning was
//!   tracked (user_version 0 with tables present) are accepted.

use crate::db::{DbError, DbResult, Engine};
use log::info;

#[derive(Debug, Clone, Copy)]
struct SchemaScript {
    version: u32,
    sql: &'static str,
}

const SCHEMA_SCRIPTS: &[SchemaScript] = &[SchemaScript {
    version: 1,
    sql: include_str!("0001_init.sql"),
}];

/// Tables the canteen store relies on.
pub const REQUIRED_TABLES: &[&str] = &["customers", "orders", "order_items"];

/// Returns the latest schema version known by this binary.
pub fn latest_version() -> u32 {
    SCHEMA_SCRIPTS.last().map_or(0, |script| script.version)
}

/// Creates the canteen tables when missing. Idempotent.
pub fn ensure_schema<E: Engine>(engine: &E) -> DbResult<()> {
    let current_version = current_user_version(engine)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    engine.transaction(|engine| -> DbResult<()> {
        for script in SCHEMA_SCRIPTS {
            if script.version <= current_version {
                continue;
            }

            engine.execute_batch(script.sql)?;
            engine.execute_batch(&format!("PRAGMA user_version = {};", script.version))?;
        }
        Ok(())
    })?;

    info!(
        "event=schema_apply module=db status=ok from_version={} to_version={}",
        current_version, latest
    );
    Ok(())
}

/// Reads the schema version stamped into the store.
pub fn current_user_version<E: Engine>(engine: &E) -> DbResult<u32> {
    let rows = engine.query("PRAGMA user_version;", &[])?;
    let version = rows
        .first()
        .and_then(|row| row.integer(0))
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or(0);
    Ok(version)
}

/// Lists which of `REQUIRED_TABLES` exist.
pub fn existing_tables<E: Engine>(engine: &E) -> DbResult<Vec<String>> {
    let rows = engine.query(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name;",
        &[],
    )?;
    Ok(rows
        .iter()
        .filter_map(|row| row.text(0))
        .filter(|name| REQUIRED_TABLES.contains(name))
        .map(str::to_string)
        .collect())
}
