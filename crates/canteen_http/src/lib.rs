//! HTTP shim over the canteen store.
//!
//! # Responsibility
//! - Expose the store's CRUD operations as JSON resources.
//! - Translate store errors into status codes without leaking engine state.
//!
//! # Invariants
//! - Every request goes through the same `CanteenStore` instance, so the
//!   single-flight mutation ordering and cascade atomicity hold over HTTP too.

pub mod api;
mod error;

pub use api::{create_router, AppState};
pub use error::ApiError;

use canteen_core::KeyValueStore;
use log::info;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Binds `addr` and serves the router until the process is interrupted.
pub async fn serve<K>(state: AppState<K>, addr: SocketAddr) -> std::io::Result<()>
where
    K: KeyValueStore + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(
        "event=http_listen module=http status=ok addr={}",
        listener.local_addr()?
    );
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler: run until the listener fails.
        std::future::pending::<()>().await;
    }
    info!("event=http_shutdown module=http status=ok");
}
