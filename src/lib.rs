//! Record income and expenses in a Google sheet and reconcile them with monthly budgets.
//!
//! The transactions tab holds one row per income or expense. The budget tab holds one row per
//! month and category with the expected amount. `budget::Reconciler` puts the two together.

mod api;
pub mod args;
pub mod budget;
pub mod commands;
mod config;
mod error;
pub mod model;
mod utils;


pub use api::{connect, AccessToken, LedgerStore, Mode, RetryPolicy, RowStore, Session};
pub use config::Config;
pub use error::{Error, ErrorType, Result};
