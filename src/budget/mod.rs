//! Monthly budgets: the stored expected amounts (`BudgetStore`) and their reconciliation with the
//! transaction ledger (`MonthBudget`, `Reconciler`).

mod engine;
mod store;

pub use engine::{BudgetLine, BudgetReport, BudgetTotals, MonthBudget, Phase, Reconciler};
pub use store::{BudgetStore, BUDGET_HEADERS};
