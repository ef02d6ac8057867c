//! Canteen domain model.
//!
//! # Responsibility
//! - Define the nested Customer -> Order -> OrderItem shape returned to callers.
//! - Define write-side input models and their validation rules.
//!
//! # Invariants
//! - Identifiers are opaque strings, immutable once assigned.
//! - Orders and items only reference parents; ownership is expressed by nesting.

pub mod customer;
