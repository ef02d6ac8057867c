//! Canteen command-line entry point.
//!
//! # Responsibility
//! - Resolve configuration from flags and `CANTEEN_*` environment variables.
//! - Run one store operation against the file-backed snapshot, or serve HTTP.

mod cli;

use anyhow::{anyhow, Context, Result};
use canteen_core::{
    default_log_level, init_logging, CustomerUpdate, FileKeyValueStore, LoadOutcome, NewCustomer,
    NewOrder, NewOrderItem, SqliteCanteenStore, StoreConfig,
};
use canteen_http::AppState;
use clap::Parser;
use cli::{AddOrderArgs, Cli, Commands};
use log::warn;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_DATA_DIR_NAME: &str = "canteen";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = absolute(
        cli.data_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DATA_DIR_NAME)),
    )?;
    let log_dir = absolute(cli.log_dir.clone().unwrap_or_else(|| data_dir.join("logs")))?;
    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    init_logging(&log_level, &log_dir).context("failed to start logging")?;

    let store = Arc::new(SqliteCanteenStore::new(
        Arc::new(FileKeyValueStore::new(&data_dir)),
        StoreConfig::default(),
    ));
    if let LoadOutcome::Recovered(reason) = store.init().await? {
        warn!("event=cli_start module=cli status=fallback reason={reason}");
        eprintln!("warning: stored data was unreadable ({reason}); starting empty");
    }

    run(cli.command, store).await
}

async fn run(command: Commands, store: Arc<SqliteCanteenStore<FileKeyValueStore>>) -> Result<()> {
    match command {
        Commands::List => {
            let customers = store.get_all_customers().await?;
            println!("{}", serde_json::to_string_pretty(&customers)?);
        }
        Commands::Show { id } => {
            let customer = store
                .get_customer(&id)
                .await?
                .ok_or_else(|| anyhow!("customer `{id}` not found"))?;
            println!("{}", serde_json::to_string_pretty(&customer)?);
        }
        Commands::AddCustomer { name, organization } => {
            let customer = store
                .add_customer(NewCustomer::new(name, organization))
                .await?;
            println!("{}", customer.id);
        }
        Commands::UpdateCustomer {
            id,
            name,
            organization,
        } => {
            let updated = store
                .update_customer(CustomerUpdate {
                    id: id.clone(),
                    name,
                    organization,
                })
                .await?;
            if !updated {
                return Err(anyhow!("customer `{id}` not found"));
            }
        }
        Commands::DeleteCustomer { id } => {
            let report = store.delete_customer(&id).await?;
            println!(
                "{}",
                json!({"customers": report.customers, "orders": report.orders, "items": report.items})
            );
        }
        Commands::AddOrder(args) => {
            let customer_id = args.customer_id.clone();
            let order = store.add_order(&customer_id, new_order(args)).await?;
            println!("{}", order.id);
        }
        Commands::DeleteOrder { id } => {
            let report = store.delete_order(&id).await?;
            println!("{}", json!({"orders": report.orders, "items": report.items}));
        }
        Commands::ClearOrders { customer_id } => {
            let report = store.delete_all_orders(&customer_id).await?;
            println!("{}", json!({"orders": report.orders, "items": report.items}));
        }
        Commands::Serve { addr } => {
            println!("listening on http://{addr}");
            canteen_http::serve(AppState::new(store), addr)
                .await
                .context("http server failed")?;
        }
    }
    Ok(())
}

fn new_order(args: AddOrderArgs) -> NewOrder {
    let items = args
        .items
        .into_iter()
        .map(|item| NewOrderItem::new(item.name, item.quantity, item.price))
        .collect();
    let mut order = NewOrder::new(items);
    order.total = args.total;
    order.date = args.date;
    order
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("cannot resolve current directory")?;
    Ok(cwd.join(Path::new(&path)))
}
