//! Persistence adapter between the engine and the host key-value store.
//!
//! # Responsibility
//! - `load`: rehydrate the engine from the fixed key, or start empty.
//! - `save`: overwrite the fixed key with a full snapshot.
//!
//! # Invariants
//! - A corrupt, foreign or too-new snapshot yields an empty engine and a
//!   `LoadOutcome::Recovered` plus a warning log; it is never an error.
//! - A restored snapshot has already been read back in full once, so reads
//!   after `Restored` cannot fail on persisted data.
//! - A failing host *read* is an error: starting empty would let the next
//!   save overwrite data that may still be intact.
//! - Export and write are split so no engine borrow is held across I/O.

use crate::db::schema::ensure_schema;
use crate::db::{DbError, Engine};
use crate::persist::codec::{decode_snapshot, encode_snapshot, DecodeError};
use crate::persist::kv::{KeyValueStore, KvError};
use crate::repo::customer_repo::CanteenRepository;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

/// Snapshot write failure.
#[derive(Debug)]
pub enum PersistenceError {
    /// The engine could not export its state.
    Export(DbError),
    /// The host store refused or failed the write.
    Write(KvError),
    /// The background write task panicked or was cancelled.
    Interrupted(String),
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Export(err) => write!(f, "snapshot export failed: {err}"),
            Self::Write(err) => write!(f, "snapshot write failed: {err}"),
            Self::Interrupted(message) => write!(f, "snapshot write interrupted: {message}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Export(err) => Some(err),
            Self::Write(err) => Some(err),
            Self::Interrupted(_) => None,
        }
    }
}

/// Startup failure that prevents any engine from being produced.
#[derive(Debug)]
pub enum LoadError {
    Read(KvError),
    Engine(DbError),
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(err) => write!(f, "snapshot read failed: {err}"),
            Self::Engine(err) => write!(f, "engine initialization failed: {err}"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read(err) => Some(err),
            Self::Engine(err) => Some(err),
        }
    }
}

impl From<DbError> for LoadError {
    fn from(value: DbError) -> Self {
        Self::Engine(value)
    }
}

/// How the engine returned by `load` was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No snapshot stored under the key.
    Fresh,
    /// Snapshot decoded and restored.
    Restored { bytes: usize },
    /// Snapshot present but unusable; started empty.
    Recovered(DecodeError),
}

/// Engine produced by `load`, with its provenance.
pub struct LoadedEngine<E> {
    pub engine: E,
    pub outcome: LoadOutcome,
}

/// Bridges one engine and one fixed key in a host store.
pub struct PersistenceAdapter<K: KeyValueStore> {
    store: Arc<K>,
    key: String,
}

impl<K: KeyValueStore> Clone for PersistenceAdapter<K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
        }
    }
}

impl<K: KeyValueStore> PersistenceAdapter<K> {
    pub fn new(store: Arc<K>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Restores the engine from the host store, or starts with an empty schema.
    pub async fn load<E: Engine>(&self) -> Result<LoadedEngine<E>, LoadError> {
        let started_at = Instant::now();
        let stored = match self.store.get(&self.key).await {
            Ok(stored) => stored,
            Err(err) => {
                error!(
                    "event=snapshot_load module=persist status=error key={} error={}",
                    self.key, err
                );
                return Err(LoadError::Read(err));
            }
        };

        let outcome = match stored {
            None => LoadOutcome::Fresh,
            Some(encoded) => match restore_engine::<E>(&encoded) {
                Ok((engine, bytes)) => {
                    info!(
                        "event=snapshot_load module=persist status=ok key={} bytes={} duration_ms={}",
                        self.key,
                        bytes,
                        started_at.elapsed().as_millis()
                    );
                    return Ok(LoadedEngine {
                        engine,
                        outcome: LoadOutcome::Restored { bytes },
                    });
                }
                Err(err) => {
                    warn!(
                        "event=snapshot_load module=persist status=fallback key={} reason={}",
                        self.key, err
                    );
                    LoadOutcome::Recovered(err)
                }
            },
        };

        let engine = E::open_empty()?;
        ensure_schema(&engine)?;
        if outcome == LoadOutcome::Fresh {
            info!(
                "event=snapshot_load module=persist status=fresh key={} duration_ms={}",
                self.key,
                started_at.elapsed().as_millis()
            );
        }
        Ok(LoadedEngine { engine, outcome })
    }

    /// Exports and encodes the complete engine state.
    pub fn export_snapshot<E: Engine>(engine: &E) -> Result<String, PersistenceError> {
        let bytes = engine.export_bytes().map_err(PersistenceError::Export)?;
        Ok(encode_snapshot(&bytes))
    }

    /// Overwrites the fixed key with an encoded snapshot.
    pub async fn save(&self, encoded: String) -> Result<(), PersistenceError> {
        let started_at = Instant::now();
        let encoded_len = encoded.len();
        match self.store.set(&self.key, encoded).await {
            Ok(()) => {
                info!(
                    "event=snapshot_save module=persist status=ok key={} encoded_len={} duration_ms={}",
                    self.key,
                    encoded_len,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=snapshot_save module=persist status=error key={} error={}",
                    self.key, err
                );
                Err(PersistenceError::Write(err))
            }
        }
    }
}

fn restore_engine<E: Engine>(encoded: &str) -> Result<(E, usize), DecodeError> {
    let bytes = decode_snapshot(encoded)?;
    let engine = E::from_bytes(&bytes).map_err(|err| DecodeError::Engine(err.to_string()))?;
    ensure_schema(&engine).map_err(|err| DecodeError::Engine(err.to_string()))?;
    // A foreign image can pass the schema check and still fail every read.
    CanteenRepository::new(&engine)
        .list_customers()
        .map_err(|err| DecodeError::UnreadableRows(err.to_string()))?;
    Ok((engine, bytes.len()))
}
