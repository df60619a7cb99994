//! Command handlers for the budget CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod auth;
mod budget;
mod init;
mod metrics;
mod transactions;

use crate::api::{self, LedgerStore, Mode};
use crate::budget::BudgetStore;
use crate::Config;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use auth::{auth_status, set_token, AuthStatus};
pub use budget::{budget_months, budget_set, budget_show};
pub use init::init;
pub use metrics::metrics;
pub use transactions::{add_transaction, delete_transaction, list_transactions, update_transaction};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data to the command line.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Opens the transactions tab of the configured spreadsheet.
async fn ledger_store(config: &Config, mode: Mode) -> LedgerStore {
    let store = api::connect(config, mode).await;
    LedgerStore::new(store, config.transactions_sheet())
}

/// Opens both tabs of the configured spreadsheet over one connection.
async fn stores(config: &Config, mode: Mode) -> (LedgerStore, BudgetStore) {
    let store = api::connect(config, mode).await;
    (
        LedgerStore::new(store.clone(), config.transactions_sheet()),
        BudgetStore::new(store, config.budget_sheet()),
    )
}
