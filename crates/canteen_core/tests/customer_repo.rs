use canteen_core::db::{open_db_in_memory, Engine, SqliteEngine};
use canteen_core::{
    CanteenRepository, CascadeReport, Customer, CustomerUpdate, Order, OrderItem, StorageError,
    TableCounts, ValidationError,
};
use chrono::NaiveDate;

fn customer(id: &str, name: &str) -> Customer {
    Customer {
        id: id.to_string(),
        name: name.to_string(),
        organization: "Eng".to_string(),
        orders: Vec::new(),
    }
}

fn order(id: &str, customer_id: &str, items: &[(&str, &str, u32, f64)]) -> Order {
    let items = items
        .iter()
        .map(|(item_id, name, quantity, price)| OrderItem {
            id: item_id.to_string(),
            order_id: id.to_string(),
            name: name.to_string(),
            quantity: *quantity,
            price: *price,
        })
        .collect::<Vec<_>>();
    Order {
        id: id.to_string(),
        customer_id: customer_id.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        total: items.iter().map(OrderItem::line_total).sum(),
        items,
    }
}

fn seeded_engine() -> SqliteEngine {
    let engine = open_db_in_memory().unwrap();
    let repo = CanteenRepository::new(&engine);
    repo.insert_customer(&customer("c1", "Ana")).unwrap();
    repo.insert_customer(&customer("c2", "Bruno")).unwrap();
    repo.insert_order(&order(
        "o1",
        "c1",
        &[("i1", "Coffee", 2, 3.5), ("i2", "Cake", 1, 4.0)],
    ))
    .unwrap();
    repo.insert_order(&order("o2", "c1", &[("i3", "Tea", 1, 2.0)]))
        .unwrap();
    repo.insert_order(&order("o3", "c2", &[("i4", "Juice", 3, 1.5)]))
        .unwrap();
    engine
}

#[test]
fn list_customers_nests_orders_and_items_in_insertion_order() {
    let engine = seeded_engine();
    let repo = CanteenRepository::new(&engine);

    let customers = repo.list_customers().unwrap();

    assert_eq!(customers.len(), 2);
    assert_eq!(customers[0].name, "Ana");
    let order_ids = customers[0]
        .orders
        .iter()
        .map(|order| order.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(order_ids, vec!["o1", "o2"]);
    assert_eq!(customers[0].orders[0].items.len(), 2);
    assert_eq!(customers[0].orders[0].items[0].name, "Coffee");
    assert_eq!(customers[0].orders[0].items[1].name, "Cake");
    assert_eq!(customers[0].orders[0].total, 11.0);
    assert_eq!(
        customers[0].orders[0].date,
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    );
    assert_eq!(customers[1].orders[0].items[0].quantity, 3);
}

#[test]
fn list_customers_is_ordered_by_name_not_insertion() {
    let engine = open_db_in_memory().unwrap();
    let repo = CanteenRepository::new(&engine);
    repo.insert_customer(&customer("z", "Zoe")).unwrap();
    repo.insert_customer(&customer("a", "Carla")).unwrap();
    repo.insert_customer(&customer("m", "Ana")).unwrap();

    let names = repo
        .list_customers()
        .unwrap()
        .into_iter()
        .map(|customer| customer.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Ana", "Carla", "Zoe"]);
}

#[test]
fn sparse_joins_keep_customers_without_orders_and_orders_without_items() {
    let engine = open_db_in_memory().unwrap();
    let repo = CanteenRepository::new(&engine);
    repo.insert_customer(&customer("c1", "Ana")).unwrap();
    repo.insert_customer(&customer("c2", "Bruno")).unwrap();
    repo.insert_order(&order("o1", "c2", &[])).unwrap();

    let customers = repo.list_customers().unwrap();

    assert_eq!(customers.len(), 2);
    assert!(customers[0].orders.is_empty());
    assert_eq!(customers[1].orders.len(), 1);
    assert!(customers[1].orders[0].items.is_empty());
}

#[test]
fn get_customer_returns_one_tree_or_none() {
    let engine = seeded_engine();
    let repo = CanteenRepository::new(&engine);

    let found = repo.get_customer("c2").unwrap().unwrap();
    assert_eq!(found.name, "Bruno");
    assert_eq!(found.orders.len(), 1);

    assert!(repo.get_customer("missing").unwrap().is_none());
}

#[test]
fn update_customer_overwrites_fields_and_ignores_unknown_ids() {
    let engine = seeded_engine();
    let repo = CanteenRepository::new(&engine);

    let changed = repo
        .update_customer(&CustomerUpdate {
            id: "c1".to_string(),
            name: "Ana Maria".to_string(),
            organization: "Ops".to_string(),
        })
        .unwrap();
    assert_eq!(changed, 1);

    let unknown = repo
        .update_customer(&CustomerUpdate {
            id: "nobody".to_string(),
            name: "X".to_string(),
            organization: "Y".to_string(),
        })
        .unwrap();
    assert_eq!(unknown, 0);

    let updated = repo.get_customer("c1").unwrap().unwrap();
    assert_eq!(updated.name, "Ana Maria");
    assert_eq!(updated.organization, "Ops");
    assert_eq!(updated.orders.len(), 2);
}

#[test]
fn duplicate_customer_id_is_a_storage_error() {
    let engine = seeded_engine();
    let repo = CanteenRepository::new(&engine);

    let err = repo.insert_customer(&customer("c1", "Other")).unwrap_err();
    assert!(matches!(err, StorageError::Db(_)));
}

#[test]
fn delete_customer_cascade_removes_orders_and_items() {
    let engine = seeded_engine();
    let repo = CanteenRepository::new(&engine);

    let report = repo.delete_customer_cascade("c1").unwrap();

    assert_eq!(
        report,
        CascadeReport {
            customers: 1,
            orders: 2,
            items: 3
        }
    );
    assert!(repo.get_customer("c1").unwrap().is_none());
    assert_eq!(
        repo.table_counts().unwrap(),
        TableCounts {
            customers: 1,
            orders: 1,
            items: 1
        }
    );
    assert_eq!(repo.orphan_counts().unwrap(), TableCounts::default());
}

#[test]
fn delete_order_cascade_removes_only_that_order() {
    let engine = seeded_engine();
    let repo = CanteenRepository::new(&engine);

    let report = repo.delete_order_cascade("o1").unwrap();

    assert_eq!(report.orders, 1);
    assert_eq!(report.items, 2);
    let ana = repo.get_customer("c1").unwrap().unwrap();
    assert_eq!(ana.orders.len(), 1);
    assert_eq!(ana.orders[0].id, "o2");
    assert_eq!(repo.orphan_counts().unwrap(), TableCounts::default());
}

#[test]
fn delete_orders_for_customer_keeps_the_customer() {
    let engine = seeded_engine();
    let repo = CanteenRepository::new(&engine);

    let report = repo.delete_orders_for_customer("c1").unwrap();

    assert_eq!(report.customers, 0);
    assert_eq!(report.orders, 2);
    let ana = repo.get_customer("c1").unwrap().unwrap();
    assert!(ana.orders.is_empty());
    assert_eq!(repo.get_customer("c2").unwrap().unwrap().orders.len(), 1);
}

#[test]
fn deleting_unknown_ids_reports_nothing_removed() {
    let engine = seeded_engine();
    let repo = CanteenRepository::new(&engine);

    assert!(repo.delete_customer_cascade("nobody").unwrap().is_empty());
    assert!(repo.delete_order_cascade("nothing").unwrap().is_empty());
}

#[test]
fn insert_order_for_unknown_customer_is_rejected() {
    let engine = open_db_in_memory().unwrap();
    let repo = CanteenRepository::new(&engine);

    let err = repo
        .insert_order(&order("o1", "ghost", &[("i1", "Tea", 1, 1.0)]))
        .unwrap_err();

    assert!(matches!(err, StorageError::CustomerNotFound(id) if id == "ghost"));
    assert_eq!(repo.table_counts().unwrap(), TableCounts::default());
}

#[test]
fn malformed_item_mid_order_rolls_back_the_whole_order() {
    let engine = seeded_engine();
    let repo = CanteenRepository::new(&engine);
    let before = repo.table_counts().unwrap();

    let err = repo
        .insert_order(&order(
            "o9",
            "c2",
            &[("i90", "Soup", 1, 5.0), ("i91", "Bread", 0, 1.0)],
        ))
        .unwrap_err();

    assert!(matches!(
        err,
        StorageError::Validation(ValidationError::NonPositiveQuantity { .. })
    ));
    assert_eq!(repo.table_counts().unwrap(), before);
    let bruno = repo.get_customer("c2").unwrap().unwrap();
    assert!(bruno.orders.iter().all(|order| order.id != "o9"));
}

#[test]
fn engine_rejection_mid_order_rolls_back_the_whole_order() {
    let engine = seeded_engine();
    let repo = CanteenRepository::new(&engine);
    let before = repo.table_counts().unwrap();

    // Second item reuses an existing item id: the engine rejects the insert.
    let err = repo
        .insert_order(&order(
            "o9",
            "c2",
            &[("i90", "Soup", 1, 5.0), ("i1", "Bread", 1, 1.0)],
        ))
        .unwrap_err();

    assert!(matches!(err, StorageError::Db(_)));
    assert_eq!(repo.table_counts().unwrap(), before);
}

#[test]
fn read_rejects_invalid_persisted_dates() {
    let engine = seeded_engine();
    engine
        .execute("UPDATE orders SET date = 'yesterday' WHERE id = 'o1';", &[])
        .unwrap();
    let repo = CanteenRepository::new(&engine);

    let err = repo.list_customers().unwrap_err();
    assert!(matches!(err, StorageError::InvalidData(message) if message.contains("orders.date")));
}
