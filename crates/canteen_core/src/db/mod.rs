//! Embedded relational engine integration and schema bootstrap.
//!
//! # Responsibility
//! - Define the narrow engine capability used by repositories and persistence.
//! - Provide the SQLite-backed engine implementation.
//! - Create the canteen schema idempotently.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Callers must not read/write canteen data before `ensure_schema` succeeds.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod engine;
mod open;
pub mod schema;

pub use engine::{Engine, Row, Value};
pub use open::{open_db_in_memory, SqliteEngine};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// No SQLite buffer could be allocated for an imported image of this length.
    ImageAllocation(usize),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::ImageAllocation(len) => {
                write!(f, "cannot allocate {len} bytes for database image")
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::ImageAllocation(_) | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
