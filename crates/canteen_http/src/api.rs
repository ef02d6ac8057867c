//! Routes and handlers.
//!
//! | Route | Store operation |
//! |---|---|
//! | `GET /customers` | `get_all_customers` |
//! | `POST /customers` | `add_customer` |
//! | `PUT /customers` | `update_customer` |
//! | `DELETE /customers?id=` | `delete_customer` |
//! | `GET /customers/{id}` | `get_customer` |
//! | `DELETE /customers/{id}/orders` | `delete_all_orders` |
//! | `POST /orders` | `add_order` |
//! | `DELETE /orders?id=` | `delete_order` |

use crate::error::ApiError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use canteen_core::{
    CascadeReport, Customer, CustomerUpdate, KeyValueStore, NewCustomer, NewOrder, NewOrderItem,
    SqliteCanteenStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared handler state.
pub struct AppState<K: KeyValueStore> {
    pub store: Arc<SqliteCanteenStore<K>>,
    pub version: String,
}

impl<K: KeyValueStore> AppState<K> {
    pub fn new(store: Arc<SqliteCanteenStore<K>>) -> Self {
        Self {
            store,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl<K: KeyValueStore> Clone for AppState<K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            version: self.version.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub organization: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    pub items: Vec<OrderItemRequest>,
    /// Derived from the items when omitted.
    #[serde(default)]
    pub total: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub updated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub orders: usize,
    pub items: usize,
}

impl From<CascadeReport> for DeleteResponse {
    fn from(report: CascadeReport) -> Self {
        Self {
            success: true,
            orders: report.orders,
            items: report.items,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Builds the router for one store.
pub fn create_router<K>(state: AppState<K>) -> Router
where
    K: KeyValueStore + 'static,
{
    Router::new()
        .route("/health", get(health::<K>))
        .route(
            "/customers",
            get(list_customers::<K>)
                .post(create_customer::<K>)
                .put(update_customer::<K>)
                .delete(delete_customer::<K>),
        )
        .route("/customers/{id}", get(get_customer::<K>))
        .route(
            "/customers/{id}/orders",
            axum::routing::delete(delete_customer_orders::<K>),
        )
        .route("/orders", post(create_order::<K>).delete(delete_order::<K>))
        .with_state(state)
}

async fn health<K: KeyValueStore>(State(state): State<AppState<K>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
    })
}

async fn list_customers<K: KeyValueStore>(
    State(state): State<AppState<K>>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    Ok(Json(state.store.get_all_customers().await?))
}

async fn get_customer<K: KeyValueStore>(
    State(state): State<AppState<K>>,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    state
        .store
        .get_customer(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("customer `{id}` not found")))
}

async fn create_customer<K: KeyValueStore>(
    State(state): State<AppState<K>>,
    body: Result<Json<CreateCustomerRequest>, JsonRejection>,
) -> Result<Json<IdResponse>, ApiError> {
    let Json(request) = body.map_err(bad_body)?;
    let customer = state
        .store
        .add_customer(NewCustomer::new(request.name, request.organization))
        .await?;
    Ok(Json(IdResponse { id: customer.id }))
}

async fn update_customer<K: KeyValueStore>(
    State(state): State<AppState<K>>,
    body: Result<Json<CustomerUpdate>, JsonRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let Json(update) = body.map_err(bad_body)?;
    let updated = state.store.update_customer(update).await?;
    Ok(Json(UpdateResponse { updated }))
}

async fn delete_customer<K: KeyValueStore>(
    State(state): State<AppState<K>>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let Query(IdQuery { id }) = query.map_err(bad_query)?;
    let report = state.store.delete_customer(&id).await?;
    Ok(Json(report.into()))
}

async fn delete_customer_orders<K: KeyValueStore>(
    State(state): State<AppState<K>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let report = state.store.delete_all_orders(&id).await?;
    Ok(Json(report.into()))
}

async fn create_order<K: KeyValueStore>(
    State(state): State<AppState<K>>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<IdResponse>, ApiError> {
    let Json(request) = body.map_err(bad_body)?;
    let items = request
        .items
        .into_iter()
        .map(|item| NewOrderItem::new(item.name, item.quantity, item.price))
        .collect();
    let mut new_order = NewOrder::new(items);
    new_order.total = request.total;

    let order = state
        .store
        .add_order(&request.customer_id, new_order)
        .await?;
    Ok(Json(IdResponse { id: order.id }))
}

async fn delete_order<K: KeyValueStore>(
    State(state): State<AppState<K>>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let Query(IdQuery { id }) = query.map_err(bad_query)?;
    let report = state.store.delete_order(&id).await?;
    Ok(Json(report.into()))
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

fn bad_query(rejection: QueryRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}
