//! Types that represent the core data model, such as `Transaction`, `Amount` and the budget
//! category configuration.
mod amount;
mod budget;
mod category;
mod ledger;
mod mapping;
mod month;
mod row_col;
mod transaction;

pub use amount::{parse_amount, Amount, AmountFormat, CURRENCY};
pub use budget::{BudgetEntries, BudgetEntry};
pub use category::{BudgetCategories, CategoryConfig, CategoryKind, Contribution, DerivedFormula};
pub use ledger::{
    CategoryTotals, Period, PeriodTotals, Share, Summary, TransactionFilter, TransactionKind,
    TOP_N,
};
pub use mapping::{Header, Mapping, MappingError};
pub use month::Month;
pub use row_col::{column_letter, RowRange, FIRST_DATA_ROW, MAX_COLUMNS};
pub use transaction::{parse_date, Transaction, TransactionColumn, TransactionUpdates, Transactions};
