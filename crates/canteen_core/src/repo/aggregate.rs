//! Flat join rows to nested customer trees.
//!
//! # Invariants
//! - Customers, orders and items keep first-seen order.
//! - A customer with no orders still yields one customer with `orders == []`.
//! - An order with no items yields an order with `items == []`.
//! - Runs in O(n) over input rows.

use crate::model::customer::{Customer, CustomerId, Order, OrderId, OrderItem, OrderItemId};
use chrono::NaiveDate;
use std::collections::HashMap;

/// One row of `customers LEFT JOIN orders LEFT JOIN order_items`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub organization: String,
    /// `None` when the customer has no orders.
    pub order: Option<JoinedOrder>,
}

/// Order columns of a joined row.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedOrder {
    pub id: OrderId,
    pub date: NaiveDate,
    pub total: f64,
    /// `None` when the order has no items.
    pub item: Option<JoinedItem>,
}

/// Item columns of a joined row.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedItem {
    pub id: OrderItemId,
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

struct CustomerSlot {
    customer: Customer,
    order_positions: HashMap<OrderId, usize>,
}

/// Folds pre-sorted joined rows into customers with nested orders and items.
pub fn aggregate_customers<I>(rows: I) -> Vec<Customer>
where
    I: IntoIterator<Item = JoinedRow>,
{
    let mut slots: Vec<CustomerSlot> = Vec::new();
    let mut customer_positions: HashMap<CustomerId, usize> = HashMap::new();

    for row in rows {
        let slot_position = match customer_positions.get(&row.customer_id) {
            Some(position) => *position,
            None => {
                let position = slots.len();
                customer_positions.insert(row.customer_id.clone(), position);
                slots.push(CustomerSlot {
                    customer: Customer {
                        id: row.customer_id,
                        name: row.customer_name,
                        organization: row.organization,
                        orders: Vec::new(),
                    },
                    order_positions: HashMap::new(),
                });
                position
            }
        };
        let slot = &mut slots[slot_position];

        let Some(joined_order) = row.order else {
            continue;
        };

        let order_position = match slot.order_positions.get(&joined_order.id) {
            Some(position) => *position,
            None => {
                let position = slot.customer.orders.len();
                slot.order_positions
                    .insert(joined_order.id.clone(), position);
                slot.customer.orders.push(Order {
                    id: joined_order.id,
                    customer_id: slot.customer.id.clone(),
                    date: joined_order.date,
                    total: joined_order.total,
                    items: Vec::new(),
                });
                position
            }
        };

        if let Some(item) = joined_order.item {
            let order = &mut slot.customer.orders[order_position];
            order.items.push(OrderItem {
                id: item.id,
                order_id: order.id.clone(),
                name: item.name,
                quantity: item.quantity,
                price: item.price,
            });
        }
    }

    slots.into_iter().map(|slot| slot.customer).collect()
}
