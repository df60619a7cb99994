//! The monthly budgets table. Every row is `Month | Category | Expected` and rows are keyed by
//! `(month, category)`. Saving a month rewrites the whole table: the rows of that month are
//! replaced and every other row is kept as it was, in its original order.

use crate::api::RowStore;
use crate::error::{ErrorType, Res};
use crate::model::{Amount, BudgetEntries, Month};
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// The header row of the budgets table.
pub const BUDGET_HEADERS: [&str; 3] = ["Month", "Category", "Expected"];

const MONTH_COL: usize = 0;
const CATEGORY_COL: usize = 1;
const EXPECTED_COL: usize = 2;

/// Reads and writes the budgets table. Clones share the table-exists cache and the registry of
/// saves in flight.
#[derive(Debug, Clone)]
pub struct BudgetStore {
    store: RowStore,
    sheet_name: String,
    table_ready: Arc<AtomicBool>,
    in_flight: InFlight,
    /// Held for the whole read-modify-write of a save, so saves of different months do not
    /// overwrite each other.
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl BudgetStore {
    pub fn new(store: RowStore, sheet_name: impl Into<String>) -> Self {
        Self {
            store,
            sheet_name: sheet_name.into(),
            table_ready: Arc::new(AtomicBool::new(false)),
            in_flight: InFlight::default(),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Replaces the rows of `month` with one row per entry, in the order of `entries`.
    ///
    /// The table is created with its header row the first time it is needed. Rows of other months
    /// are written back unchanged and in their original order, blank rows are dropped.
    ///
    /// # Errors
    /// - `ErrorType::Conflict` when a save of the same month is already in flight.
    /// - Any error of the row store. A failed save leaves the table as it was, unless the write
    ///   itself failed half way.
    pub async fn save_budget(&self, month: Month, entries: &BudgetEntries) -> Res<()> {
        let _guard = self.in_flight.begin(month)?;
        let _write = self.write_lock.lock().await;
        self.ensure_table().await?;
        let rows = self.store.read_all(&self.sheet_name).await?;
        let old_len = rows.len();
        let old_width = rows.iter().map(Vec::len).max().unwrap_or(0);

        let mut table: Vec<Vec<String>> = Vec::with_capacity(old_len + entries.len());
        table.push(BUDGET_HEADERS.iter().map(|h| h.to_string()).collect());
        let mut replaced = 0;
        for row in rows.into_iter().skip(1) {
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            if row_month(&row) == Some(month) {
                replaced += 1;
                continue;
            }
            table.push(row);
        }
        for entry in entries.iter() {
            table.push(vec![
                month.to_string(),
                entry.category().to_string(),
                entry.expected().to_string(),
            ]);
        }
        debug!(
            "Saving {} budget rows for {month}, replacing {replaced}",
            entries.len()
        );

        // Rows move up when earlier rows are replaced, so every row is written as wide as the
        // widest old row. Otherwise a short row keeps the cells of the row that was there before.
        let columns = old_width.max(BUDGET_HEADERS.len());
        for row in table.iter_mut() {
            row.resize(columns.max(row.len()), String::new());
        }
        let new_len = table.len();
        self.store.write_rows(&self.sheet_name, 1, table).await?;
        if old_len > new_len {
            // The table shrank, empty the rows that are left over below it.
            self.store
                .clear_rows(&self.sheet_name, new_len + 1, old_len, columns)
                .await?;
        }
        info!("Saved the budget for {month}");
        Ok(())
    }

    /// Returns the stored expected amounts of `month`, `real` is always zero. A missing table is
    /// an empty budget.
    pub async fn load_budget(&self, month: Month) -> Res<BudgetEntries> {
        let Some(rows) = self.read_table().await? else {
            return Ok(BudgetEntries::new());
        };
        let mut entries = BudgetEntries::new();
        for row in rows.iter().skip(1) {
            if row_month(row) != Some(month) {
                continue;
            }
            let category = cell(row, CATEGORY_COL).trim();
            if category.is_empty() {
                continue;
            }
            entries.upsert(category, Amount::parse(cell(row, EXPECTED_COL)));
        }
        Ok(entries)
    }

    /// The distinct months that have budget rows, oldest first.
    pub async fn list_budget_months(&self) -> Res<Vec<Month>> {
        let Some(rows) = self.read_table().await? else {
            return Ok(Vec::new());
        };
        let mut months = BTreeSet::new();
        for (ix, row) in rows.iter().enumerate().skip(1) {
            let raw = cell(row, MONTH_COL).trim();
            if raw.is_empty() {
                continue;
            }
            match raw.parse::<Month>() {
                Ok(month) => {
                    months.insert(month);
                }
                Err(e) => warn!("Ignoring row {} of {}: {e:#}", ix + 1, self.sheet_name),
            }
        }
        Ok(months.into_iter().collect())
    }

    /// Reads the whole table, `None` when it does not exist.
    async fn read_table(&self) -> Res<Option<Vec<Vec<String>>>> {
        match self.store.read_all(&self.sheet_name).await {
            Ok(rows) => {
                self.table_ready.store(true, Ordering::SeqCst);
                Ok(Some(rows))
            }
            Err(e) if ErrorType::of(&e) == Some(ErrorType::TableMissing) => {
                debug!("The {} sheet does not exist yet", self.sheet_name);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Creates the table with its header row unless it is known to exist. The answer is kept for
    /// the lifetime of the store.
    async fn ensure_table(&self) -> Res<()> {
        if self.table_ready.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.read_table().await?.is_none() {
            info!("Creating the {} sheet", self.sheet_name);
            let headers: Vec<String> = BUDGET_HEADERS.iter().map(|h| h.to_string()).collect();
            self.store.create_table(&self.sheet_name, &headers).await?;
        }
        self.table_ready.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn cell(row: &[String], ix: usize) -> &str {
    row.get(ix).map(String::as_str).unwrap_or_default()
}

fn row_month(row: &[String]) -> Option<Month> {
    cell(row, MONTH_COL).trim().parse().ok()
}

/// The months whose save has started and not yet finished.
#[derive(Debug, Default, Clone)]
struct InFlight(Arc<Mutex<HashSet<Month>>>);

impl InFlight {
    fn begin(&self, month: Month) -> Res<InFlightGuard> {
        if !self.with_months(|months| months.insert(month)) {
            return Err(ErrorType::Conflict.err(format!(
                "The budget for {month} is already being saved"
            )));
        }
        Ok(InFlightGuard {
            in_flight: self.clone(),
            month,
        })
    }

    fn with_months<T>(&self, f: impl FnOnce(&mut HashSet<Month>) -> T) -> T {
        let mut months = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut months)
    }
}

/// Removes its month from the registry when dropped, whether the save succeeded or not.
struct InFlightGuard {
    in_flight: InFlight,
    month: Month,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.with_months(|months| months.remove(&self.month));
    }
}
