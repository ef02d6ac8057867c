//! Engine capability shared by the schema manager, repositories and persistence.
//!
//! # Responsibility
//! - Describe the only operations the core needs from a relational engine.
//! - Carry parameters and result rows in an engine-neutral shape.
//!
//! # Invariants
//! - `transaction` commits only when the closure returns `Ok`; any error
//!   leaves the engine exactly as it was before the call.
//! - `export_bytes` captures the complete state; `from_bytes` on that output
//!   reproduces it.

use super::{DbError, DbResult};

/// Statement parameter or result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One positional result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns `true` for SQL `NULL` and for out-of-range columns.
    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.get(index), None | Some(Value::Null))
    }

    pub fn text(&self, index: usize) -> Option<&str> {
        match self.get(index) {
            Some(Value::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn integer(&self, index: usize) -> Option<i64> {
        match self.get(index) {
            Some(Value::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    /// Reads a numeric cell, widening integers stored in REAL columns.
    pub fn real(&self, index: usize) -> Option<f64> {
        match self.get(index) {
            Some(Value::Real(value)) => Some(*value),
            Some(Value::Integer(value)) => Some(*value as f64),
            _ => None,
        }
    }
}

/// Narrow capability interface over an embeddable relational engine.
pub trait Engine: Sized {
    /// Opens an engine with no tables.
    fn open_empty() -> DbResult<Self>;

    /// Rehydrates an engine from bytes produced by `export_bytes`.
    fn from_bytes(bytes: &[u8]) -> DbResult<Self>;

    /// Executes one parameterized statement and returns affected row count.
    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<usize>;

    /// Executes a parameterless multi-statement script.
    fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Runs one parameterized query and collects all rows.
    fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>>;

    /// Exports the complete engine state.
    fn export_bytes(&self) -> DbResult<Vec<u8>>;

    /// Runs `f` inside one engine transaction.
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>;
}

#[cfg(test)]
mod tests {
    use super::{Row, Value};

    #[test]
    fn real_accessor_widens_integer_cells() {
        let row = Row::new(vec![Value::Integer(7), Value::Real(3.5), Value::Null]);
        assert_eq!(row.real(0), Some(7.0));
        assert_eq!(row.real(1), Some(3.5));
        assert_eq!(row.real(2), None);
        assert!(row.is_null(2));
        assert!(row.is_null(9));
    }

    #[test]
    fn option_converts_to_null() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".to_string()));
    }
}
