//! Core use-case services.
//!
//! # Responsibility
//! - Expose the canteen CRUD facade consumed by UI, report and HTTP callers.
//! - Keep callers decoupled from engine, SQL and persistence details.

pub mod canteen_store;
