//! Snapshot persistence into a host key-value store.
//!
//! # Responsibility
//! - Encode full engine exports into the host store's text representation.
//! - Restore the engine on startup, falling back to an empty store on
//!   corrupt or foreign data.
//! - Write a full snapshot after every successful mutation.
//!
//! # Invariants
//! - One fixed key holds the entire state; every save overwrites it.
//! - Decode failures are never fatal to `load()`, but they are always logged.

pub mod adapter;
pub mod codec;
pub mod kv;

pub use adapter::{LoadError, LoadOutcome, LoadedEngine, PersistenceAdapter, PersistenceError};
pub use codec::{decode_snapshot, encode_snapshot, DecodeError};
pub use kv::{FileKeyValueStore, KeyValueStore, KvError, MemoryKeyValueStore};
