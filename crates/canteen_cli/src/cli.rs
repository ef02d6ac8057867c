//! Command-line definitions.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Canteen customer and order tracker.
#[derive(Parser, Debug)]
#[command(name = "canteen", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the persisted snapshot (default: <tmp>/canteen)
    #[arg(long, global = true, env = "CANTEEN_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log level: trace|debug|info|warn|error
    #[arg(long, global = true, env = "CANTEEN_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Directory for rolling log files (default: <data-dir>/logs)
    #[arg(long, global = true, env = "CANTEEN_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print all customers with their orders as JSON
    List,

    /// Print one customer as JSON
    Show {
        id: String,
    },

    /// Add a customer and print its id
    AddCustomer {
        name: String,
        organization: String,
    },

    /// Overwrite a customer's name and organization
    UpdateCustomer {
        id: String,
        name: String,
        organization: String,
    },

    /// Delete a customer with all of its orders
    DeleteCustomer {
        id: String,
    },

    /// Add an order for a customer and print its id
    AddOrder(AddOrderArgs),

    /// Delete one order with its items
    DeleteOrder {
        id: String,
    },

    /// Delete every order of a customer, keeping the customer
    ClearOrders {
        customer_id: String,
    },

    /// Serve the store over HTTP
    Serve {
        #[arg(long, env = "CANTEEN_ADDR", default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

#[derive(Args, Debug)]
pub struct AddOrderArgs {
    pub customer_id: String,

    /// Order line as `name:quantity:price` (repeatable)
    #[arg(long = "item", value_parser = parse_item, required = true)]
    pub items: Vec<ItemArg>,

    /// Order total (default: sum of quantity * price)
    #[arg(long)]
    pub total: Option<f64>,

    /// Order date as YYYY-MM-DD (default: today)
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemArg {
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

/// Parses `name:quantity:price`; the name itself may contain `:`.
pub fn parse_item(value: &str) -> Result<ItemArg, String> {
    let mut parts = value.rsplitn(3, ':');
    let (Some(price), Some(quantity), Some(name)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected name:quantity:price, got `{value}`"));
    };

    let quantity = quantity
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid quantity `{quantity}`"))?;
    let price = price
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid price `{price}`"))?;

    Ok(ItemArg {
        name: name.trim().to_string(),
        quantity,
        price,
    })
}
