//! Customer/order repository over any `Engine`.
//!
//! # Responsibility
//! - Provide CRUD and cascading deletes over `customers`, `orders`, `order_items`.
//! - Produce nested `Customer` reads through the row aggregator.
//!
//! # Invariants
//! - Every multi-statement mutation runs in one engine transaction.
//! - Deletes remove children before parents; no orphan rows survive a commit.
//! - Reads are ordered by customer name, then insertion order of orders/items.

use crate::db::{Engine, Row};
use crate::model::customer::{Customer, CustomerUpdate, Order, OrderItem, ORDER_DATE_FORMAT};
use crate::repo::aggregate::{aggregate_customers, JoinedItem, JoinedOrder, JoinedRow};
use crate::repo::{StorageError, StorageResult};
use chrono::NaiveDate;

const CUSTOMER_TREE_SELECT_SQL: &str = "SELECT
    c.id,
    c.name,
    c.organization,
    o.id,
    o.date,
    o.total,
    oi.id,
    oi.name,
    oi.quantity,
    oi.price
FROM customers c
LEFT JOIN orders o ON o.customer_id = c.id
LEFT JOIN order_items oi ON oi.order_id = o.id";

const CUSTOMER_TREE_ORDER_SQL: &str = "ORDER BY c.name ASC, c.id ASC, o.rowid ASC, oi.rowid ASC";

const DELETE_ITEMS_OF_CUSTOMER_SQL: &str = "DELETE FROM order_items
 WHERE order_id IN (
    SELECT id FROM orders WHERE customer_id = ?1
 );";

/// Rows removed by one cascading delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub customers: usize,
    pub orders: usize,
    pub items: usize,
}

impl CascadeReport {
    /// Whether the delete touched no rows at all.
    pub fn is_empty(&self) -> bool {
        self.customers == 0 && self.orders == 0 && self.items == 0
    }
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub customers: usize,
    pub orders: usize,
    pub items: usize,
}

/// Engine-backed canteen repository.
pub struct CanteenRepository<'e, E: Engine> {
    engine: &'e E,
}

impl<'e, E: Engine> CanteenRepository<'e, E> {
    pub fn new(engine: &'e E) -> Self {
        Self { engine }
    }

    /// Inserts one customer row. Fails on duplicate id.
    pub fn insert_customer(&self, customer: &Customer) -> StorageResult<()> {
        customer.validate()?;

        self.engine.execute(
            "INSERT INTO customers (id, name, organization) VALUES (?1, ?2, ?3);",
            &[
                customer.id.as_str().into(),
                customer.name.as_str().into(),
                customer.organization.as_str().into(),
            ],
        )?;
        Ok(())
    }

    /// Overwrites name and organization. Returns changed row count (0 for unknown id).
    pub fn update_customer(&self, update: &CustomerUpdate) -> StorageResult<usize> {
        update.validate()?;

        let changed = self.engine.execute(
            "UPDATE customers SET name = ?1, organization = ?2 WHERE id = ?3;",
            &[
                update.name.as_str().into(),
                update.organization.as_str().into(),
                update.id.as_str().into(),
            ],
        )?;
        Ok(changed)
    }

    pub fn customer_exists(&self, id: &str) -> StorageResult<bool> {
        customer_exists(self.engine, id)
    }

    /// Inserts one order row and all of its item rows atomically.
    ///
    /// Items are validated one at a time right before their insert; the first
    /// invalid item aborts the transaction and nothing of the order remains.
    pub fn insert_order(&self, order: &Order) -> StorageResult<()> {
        self.engine.transaction(|engine| -> StorageResult<()> {
            order.validate_header()?;
            if !customer_exists(engine, &order.customer_id)? {
                return Err(StorageError::CustomerNotFound(order.customer_id.clone()));
            }

            engine.execute(
                "INSERT INTO orders (id, customer_id, date, total) VALUES (?1, ?2, ?3, ?4);",
                &[
                    order.id.as_str().into(),
                    order.customer_id.as_str().into(),
                    format_date(order.date).into(),
                    order.total.into(),
                ],
            )?;

            for item in &order.items {
                insert_item(engine, &order.id, item)?;
            }
            Ok(())
        })
    }

    /// Removes the customer's items, then orders, then the customer.
    pub fn delete_customer_cascade(&self, id: &str) -> StorageResult<CascadeReport> {
        self.engine.transaction(|engine| -> StorageResult<CascadeReport> {
            let items = engine.execute(DELETE_ITEMS_OF_CUSTOMER_SQL, &[id.into()])?;
            let orders = engine.execute(
                "DELETE FROM orders WHERE customer_id = ?1;",
                &[id.into()],
            )?;
            let customers =
                engine.execute("DELETE FROM customers WHERE id = ?1;", &[id.into()])?;
            Ok(CascadeReport {
                customers,
                orders,
                items,
            })
        })
    }

    /// Removes one order's items, then the order.
    pub fn delete_order_cascade(&self, order_id: &str) -> StorageResult<CascadeReport> {
        self.engine.transaction(|engine| -> StorageResult<CascadeReport> {
            let items = engine.execute(
                "DELETE FROM order_items WHERE order_id = ?1;",
                &[order_id.into()],
            )?;
            let orders =
                engine.execute("DELETE FROM orders WHERE id = ?1;", &[order_id.into()])?;
            Ok(CascadeReport {
                customers: 0,
                orders,
                items,
            })
        })
    }

    /// Removes every order (and item) of a customer; the customer stays.
    pub fn delete_orders_for_customer(&self, customer_id: &str) -> StorageResult<CascadeReport> {
        self.engine.transaction(|engine| -> StorageResult<CascadeReport> {
            let items = engine.execute(DELETE_ITEMS_OF_CUSTOMER_SQL, &[customer_id.into()])?;
            let orders = engine.execute(
                "DELETE FROM orders WHERE customer_id = ?1;",
                &[customer_id.into()],
            )?;
            Ok(CascadeReport {
                customers: 0,
                orders,
                items,
            })
        })
    }

    /// Returns every customer with nested orders, ordered by name.
    pub fn list_customers(&self) -> StorageResult<Vec<Customer>> {
        let rows = self.engine.query(
            &format!("{CUSTOMER_TREE_SELECT_SQL} {CUSTOMER_TREE_ORDER_SQL};"),
            &[],
        )?;
        let joined = rows
            .iter()
            .map(parse_joined_row)
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(aggregate_customers(joined))
    }

    /// Returns one customer with nested orders, or `None` for an unknown id.
    pub fn get_customer(&self, id: &str) -> StorageResult<Option<Customer>> {
        let rows = self.engine.query(
            &format!("{CUSTOMER_TREE_SELECT_SQL} WHERE c.id = ?1 {CUSTOMER_TREE_ORDER_SQL};"),
            &[id.into()],
        )?;
        let joined = rows
            .iter()
            .map(parse_joined_row)
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(aggregate_customers(joined).into_iter().next())
    }

    /// Counts rows in each canteen table.
    pub fn table_counts(&self) -> StorageResult<TableCounts> {
        Ok(TableCounts {
            customers: count_rows(self.engine, "SELECT COUNT(*) FROM customers;")?,
            orders: count_rows(self.engine, "SELECT COUNT(*) FROM orders;")?,
            items: count_rows(self.engine, "SELECT COUNT(*) FROM order_items;")?,
        })
    }

    /// Counts orders and items whose parent row no longer exists.
    pub fn orphan_counts(&self) -> StorageResult<TableCounts> {
        Ok(TableCounts {
            customers: 0,
            orders: count_rows(
                self.engine,
                "SELECT COUNT(*) FROM orders o
                 WHERE NOT EXISTS (SELECT 1 FROM customers c WHERE c.id = o.customer_id);",
            )?,
            items: count_rows(
                self.engine,
                "SELECT COUNT(*) FROM order_items oi
                 WHERE NOT EXISTS (SELECT 1 FROM orders o WHERE o.id = oi.order_id);",
            )?,
        })
    }
}

fn customer_exists<E: Engine>(engine: &E, id: &str) -> StorageResult<bool> {
    let rows = engine.query(
        "SELECT EXISTS(SELECT 1 FROM customers WHERE id = ?1);",
        &[id.into()],
    )?;
    Ok(rows.first().and_then(|row| row.integer(0)) == Some(1))
}

fn insert_item<E: Engine>(engine: &E, order_id: &str, item: &OrderItem) -> StorageResult<()> {
    item.validate()?;
    if item.order_id != order_id {
        return Err(StorageError::InvalidData(format!(
            "item `{}` belongs to order `{}`, not `{order_id}`",
            item.id, item.order_id
        )));
    }

    engine.execute(
        "INSERT INTO order_items (id, order_id, name, quantity, price)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        &[
            item.id.as_str().into(),
            order_id.into(),
            item.name.as_str().into(),
            item.quantity.into(),
            item.price.into(),
        ],
    )?;
    Ok(())
}

fn count_rows<E: Engine>(engine: &E, sql: &str) -> StorageResult<usize> {
    let rows = engine.query(sql, &[])?;
    let count = rows.first().and_then(|row| row.integer(0)).unwrap_or(0);
    usize::try_from(count)
        .map_err(|_| StorageError::InvalidData(format!("negative row count {count}")))
}

fn parse_joined_row(row: &Row) -> StorageResult<JoinedRow> {
    let order = if row.is_null(3) {
        None
    } else {
        let item = if row.is_null(6) {
            None
        } else {
            Some(JoinedItem {
                id: required_text(row, 6, "order_items.id")?,
                name: required_text(row, 7, "order_items.name")?,
                quantity: parse_quantity(row)?,
                price: required_real(row, 9, "order_items.price")?,
            })
        };
        Some(JoinedOrder {
            id: required_text(row, 3, "orders.id")?,
            date: parse_date(&required_text(row, 4, "orders.date")?)?,
            total: required_real(row, 5, "orders.total")?,
            item,
        })
    };

    Ok(JoinedRow {
        customer_id: required_text(row, 0, "customers.id")?,
        customer_name: required_text(row, 1, "customers.name")?,
        organization: required_text(row, 2, "customers.organization")?,
        order,
    })
}

fn required_text(row: &Row, index: usize, column: &str) -> StorageResult<String> {
    row.text(index)
        .map(str::to_string)
        .ok_or_else(|| invalid_column(row, index, column))
}

fn required_real(row: &Row, index: usize, column: &str) -> StorageResult<f64> {
    row.real(index)
        .ok_or_else(|| invalid_column(row, index, column))
}

fn parse_quantity(row: &Row) -> StorageResult<u32> {
    let raw = row
        .integer(8)
        .ok_or_else(|| invalid_column(row, 8, "order_items.quantity"))?;
    match u32::try_from(raw) {
        Ok(quantity) if quantity > 0 => Ok(quantity),
        _ => Err(StorageError::InvalidData(format!(
            "invalid quantity `{raw}` in order_items.quantity"
        ))),
    }
}

fn invalid_column(row: &Row, index: usize, column: &str) -> StorageError {
    StorageError::InvalidData(format!(
        "unexpected value {:?} in {column}",
        row.get(index)
    ))
}

fn format_date(date: NaiveDate) -> String {
    date.format(ORDER_DATE_FORMAT).to_string()
}

fn parse_date(value: &str) -> StorageResult<NaiveDate> {
    NaiveDate::parse_from_str(value, ORDER_DATE_FORMAT).map_err(|_| {
        StorageError::InvalidData(format!("invalid date `{value}` in orders.date"))
    })
}

