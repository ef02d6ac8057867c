//! Repository layer over the relational engine.
//!
//! # Responsibility
//! - Keep every SQL statement for customers, orders and order items.
//! - Rebuild nested customer trees from flat left-joined rows.
//! - Run multi-table mutations inside one engine transaction.
//!
//! # Invariants
//! - Write paths validate models immediately before each statement.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Parent references are checked here, not left to the engine.

use crate::db::DbError;
use crate::model::customer::{CustomerId, ValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod aggregate;
pub mod customer_repo;

pub type StorageResult<T> = Result<T, StorageError>;

/// Statement-level failure of a repository operation.
#[derive(Debug)]
pub enum StorageError {
    Db(DbError),
    Validation(ValidationError),
    CustomerNotFound(CustomerId),
    InvalidData(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::CustomerNotFound(id) => write!(f, "customer not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted canteen data: {message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::CustomerNotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<ValidationError> for StorageError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}
