//! Customer, order and order item models.
//!
//! # Responsibility
//! - Define the read model reconstructed from joined rows.
//! - Define input models used by the CRUD facade and their validation.
//!
//! # Invariants
//! - `OrderItem::quantity` is strictly positive.
//! - `OrderItem::price` and `Order::total` are finite and non-negative.
//! - `Order::total` is stored as supplied; it is never recomputed on read.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a customer row.
pub type CustomerId = String;
/// Stable identifier of an order row.
pub type OrderId = String;
/// Stable identifier of an order item row.
pub type OrderItemId = String;

/// Storage text format for `Order::date`.
pub const ORDER_DATE_FORMAT: &str = "%Y-%m-%d";

/// Validation failures for write-side input models.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyId,
    EmptyCustomerName,
    EmptyOrganization,
    EmptyItemName,
    NonPositiveQuantity { item: String },
    InvalidPrice { item: String, price: f64 },
    InvalidTotal(f64),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "id cannot be empty"),
            Self::EmptyCustomerName => write!(f, "customer name cannot be empty"),
            Self::EmptyOrganization => write!(f, "customer organization cannot be empty"),
            Self::EmptyItemName => write!(f, "order item name cannot be empty"),
            Self::NonPositiveQuantity { item } => {
                write!(f, "order item `{item}` must have a positive quantity")
            }
            Self::InvalidPrice { item, price } => write!(
                f,
                "order item `{item}` has invalid price {price}; expected a finite value >= 0"
            ),
            Self::InvalidTotal(total) => write!(
                f,
                "order total {total} is invalid; expected a finite value >= 0"
            ),
        }
    }
}

impl Error for ValidationError {}

/// Customer with all of its orders, as returned by reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub organization: String,
    /// Orders in insertion order.
    pub orders: Vec<Order>,
}

impl Customer {
    /// Validates the persisted customer columns.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        validate_customer_fields(&self.name, &self.organization)
    }
}

/// One purchase made by a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Back-reference to the owning customer.
    pub customer_id: CustomerId,
    /// Calendar date the order was created.
    pub date: NaiveDate,
    /// Caller-supplied currency amount.
    pub total: f64,
    /// Items in insertion order.
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Sum of `quantity * price` over all items.
    pub fn items_sum(&self) -> f64 {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    /// Difference between the stored total and the derived items sum.
    ///
    /// Zero (within float noise) when the caller supplied a consistent total.
    pub fn total_drift(&self) -> f64 {
        self.total - self.items_sum()
    }
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    /// Back-reference to the owning order.
    pub order_id: OrderId,
    pub name: String,
    pub quantity: u32,
    /// Unit price.
    pub price: f64,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        f64::from(self.quantity) * self.price
    }
}

/// Input for creating a customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
    /// Caller-assigned id; generated when `None`.
    #[serde(default)]
    pub id: Option<CustomerId>,
    pub name: String,
    pub organization: String,
}

impl NewCustomer {
    pub fn new(name: impl Into<String>, organization: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            organization: organization.into(),
        }
    }

    /// Validates the fields that are persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_optional_id(self.id.as_deref())?;
        validate_customer_fields(&self.name, &self.organization)
    }
}

/// Input for overwriting a customer's mutable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerUpdate {
    pub id: CustomerId,
    pub name: String,
    pub organization: String,
}

impl CustomerUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        validate_customer_fields(&self.name, &self.organization)
    }
}

/// Input for creating an order with its items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Caller-assigned id; generated when `None`.
    #[serde(default)]
    pub id: Option<OrderId>,
    /// Creation date; today when `None`.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Caller-supplied total; derived from items when `None`.
    #[serde(default)]
    pub total: Option<f64>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new(items: Vec<NewOrderItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Sets a caller-supplied total.
    pub fn with_total(mut self, total: f64) -> Self {
        self.total = Some(total);
        self
    }

    /// Sum of `quantity * price` over the requested items.
    pub fn items_sum(&self) -> f64 {
        self.items
            .iter()
            .map(|item| f64::from(item.quantity) * item.price)
            .sum()
    }
}

/// Input for one order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderItem {
    /// Caller-assigned id; generated when `None`.
    #[serde(default)]
    pub id: Option<OrderItemId>,
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

impl NewOrderItem {
    pub fn new(name: impl Into<String>, quantity: u32, price: f64) -> Self {
        Self {
            id: None,
            name: name.into(),
            quantity,
            price,
        }
    }
}

impl OrderItem {
    /// Validates one item right before it is written.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyItemName);
        }
        if self.quantity == 0 {
            return Err(ValidationError::NonPositiveQuantity {
                item: self.name.clone(),
            });
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ValidationError::InvalidPrice {
                item: self.name.clone(),
                price: self.price,
            });
        }
        Ok(())
    }
}

impl Order {
    /// Validates the order row itself; items are validated one by one on insert.
    pub fn validate_header(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() || self.customer_id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if !self.total.is_finite() || self.total < 0.0 {
            return Err(ValidationError::InvalidTotal(self.total));
        }
        Ok(())
    }
}

/// Generates a fresh opaque identifier.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

fn validate_optional_id(id: Option<&str>) -> Result<(), ValidationError> {
    match id {
        Some(value) if value.trim().is_empty() => Err(ValidationError::EmptyId),
        _ => Ok(()),
    }
}

fn validate_customer_fields(name: &str, organization: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyCustomerName);
    }
    if organization.trim().is_empty() {
        return Err(ValidationError::EmptyOrganization);
    }
    Ok(())
}
