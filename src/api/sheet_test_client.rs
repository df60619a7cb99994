//! Implements the `Sheet` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets (see `BUDGET_SHEET_IN_TEST_MODE`).
//!
//! The data lives in a process-wide map keyed by spreadsheet id, so every `TestSheet` created for
//! the same spreadsheet sees the same tabs, the way every client of a Google sheet does.

use crate::api::{split_qualified_range, Sheet, SheetRange};
use crate::error::{ErrorType, Res};
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tracing::trace;

/// The name of the transactions tab in the seed data.
const SEED_TRANSACTIONS: &str = "Transactions";

/// The complete state of one in-memory spreadsheet, plus knobs for simulating a remote service.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct TestSheetState {
    /// Tab name -> rows.
    pub(crate) sheets: BTreeMap<String, Vec<Vec<String>>>,
    /// The next this-many calls fail with `ErrorType::RateLimited`.
    pub(crate) rate_limit_failures: usize,
    /// Every call sleeps this long before touching the data.
    pub(crate) latency: Option<Duration>,
    /// The number of calls made, including failed ones.
    pub(crate) calls: usize,
}

impl TestSheetState {
    /// A state holding the seed transactions and no budget tab.
    pub(crate) fn seeded() -> Self {
        let mut sheets = BTreeMap::new();
        // The seed data is a constant and is covered by tests.
        let transactions = load_csv(TRANSACTION_DATA).unwrap_or_default();
        sheets.insert(SEED_TRANSACTIONS.to_string(), transactions);
        Self {
            sheets,
            ..Default::default()
        }
    }

    /// Replaces the tab `name` with `rows`.
    #[cfg(test)]
    pub(crate) fn with_sheet<S: Into<String>>(mut self, name: &str, rows: Vec<Vec<S>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(Into::into).collect())
            .collect();
        self.sheets.insert(name.to_string(), rows);
        self
    }

    /// The rows of tab `name`, the way `Sheet::get` reports them.
    pub(crate) fn rows(&self, name: &str) -> Option<Vec<Vec<String>>> {
        self.sheets.get(name).map(|rows| trimmed(rows))
    }
}

fn states() -> &'static Mutex<HashMap<String, TestSheetState>> {
    static STATES: OnceLock<Mutex<HashMap<String, TestSheetState>>> = OnceLock::new();
    STATES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// An implementation of the `Sheet` trait that does not use Google sheets. A spreadsheet that has
/// never been seen before starts out with the seed data from this module.
pub(crate) struct TestSheet {
    spreadsheet_id: String,
}

impl TestSheet {
    pub(crate) fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    /// Returns a copy of the current state of this spreadsheet.
    #[cfg(test)]
    pub(crate) fn get_state(&self) -> TestSheetState {
        self.with_state(|state| state.clone())
    }

    /// Replaces the state of this spreadsheet.
    #[cfg(test)]
    pub(crate) fn set_state(&self, state: TestSheetState) {
        self.with_state(|current| *current = state)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut TestSheetState) -> T) -> T {
        // A panic while holding the lock can only come from a failing test; keep going with the
        // data as it is.
        let mut states = match states().lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let state = states
            .entry(self.spreadsheet_id.clone())
            .or_insert_with(TestSheetState::seeded);
        f(state)
    }

    /// Counts the call, applies the simulated latency and fails if a rate limit is pending.
    async fn begin_call(&self, what: &str) -> Res<()> {
        let latency = self.with_state(|state| {
            state.calls += 1;
            state.latency
        });
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let limited = self.with_state(|state| {
            if state.rate_limit_failures > 0 {
                state.rate_limit_failures -= 1;
                true
            } else {
                false
            }
        });
        if limited {
            trace!("{what}: simulating a rate limit");
            return Err(ErrorType::RateLimited.err(format!(
                "{what}: 429 Too Many Requests (RESOURCE_EXHAUSTED)"
            )));
        }
        Ok(())
    }
}

fn table_missing(sheet_name: &str) -> anyhow::Error {
    ErrorType::TableMissing.err(format!(
        "Unable to parse range: '{sheet_name}' does not exist"
    ))
}

/// Drops trailing empty cells of each row and trailing empty rows, like the Sheets API does.
fn trimmed(rows: &[Vec<String>]) -> Vec<Vec<String>> {
    let mut out: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            let len = row
                .iter()
                .rposition(|cell| !cell.is_empty())
                .map(|ix| ix + 1)
                .unwrap_or(0);
            row[..len].to_vec()
        })
        .collect();
    while out.last().is_some_and(|row| row.is_empty()) {
        out.pop();
    }
    out
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn get(&mut self, sheet_name: &str) -> Res<Vec<Vec<String>>> {
        self.begin_call("get").await?;
        self.with_state(|state| state.rows(sheet_name))
            .ok_or_else(|| table_missing(sheet_name))
    }

    async fn write_ranges(&mut self, data: &[SheetRange]) -> Res<()> {
        self.begin_call("write_ranges").await?;
        let parsed = data
            .iter()
            .map(|sr| split_qualified_range(&sr.range).map(|(name, range)| (name, range, sr)))
            .collect::<Res<Vec<_>>>()?;
        self.with_state(|state| {
            for (name, range, sr) in parsed {
                let rows = state
                    .sheets
                    .get_mut(&name)
                    .ok_or_else(|| table_missing(&name))?;
                for (offset, values) in sr.values.iter().enumerate() {
                    let row_ix = range.first() - 1 + offset;
                    if rows.len() <= row_ix {
                        rows.resize(row_ix + 1, Vec::new());
                    }
                    let row = &mut rows[row_ix];
                    if row.len() < values.len() {
                        row.resize(values.len(), String::new());
                    }
                    for (col_ix, value) in values.iter().enumerate() {
                        row[col_ix] = value.clone();
                    }
                }
            }
            Ok(())
        })
    }

    async fn clear_ranges(&mut self, ranges: &[&str]) -> Res<()> {
        self.begin_call("clear_ranges").await?;
        let parsed = ranges
            .iter()
            .map(|r| split_qualified_range(r))
            .collect::<Res<Vec<_>>>()?;
        self.with_state(|state| {
            for (name, range) in parsed {
                let rows = state
                    .sheets
                    .get_mut(&name)
                    .ok_or_else(|| table_missing(&name))?;
                for row_ix in (range.first() - 1)..range.last() {
                    if let Some(row) = rows.get_mut(row_ix) {
                        for cell in row.iter_mut().take(range.columns()) {
                            cell.clear();
                        }
                    }
                }
            }
            Ok(())
        })
    }

    async fn create_sheet(&mut self, sheet_name: &str) -> Res<()> {
        self.begin_call("create_sheet").await?;
        self.with_state(|state| {
            if state.sheets.contains_key(sheet_name) {
                return Err(ErrorType::Sheet.err(format!(
                    "A sheet with the name '{sheet_name}' already exists"
                )));
            }
            state.sheets.insert(sheet_name.to_string(), Vec::new());
            Ok(())
        })
    }
}

/// Loads data from a CSV-formatted string.
fn load_csv(csv_data: &str) -> Res<Vec<Vec<String>>> {
    let bytes = csv_data.as_bytes();
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false) // Ensure headers are treated as part of the data
        .flexible(true)
        .from_reader(Cursor::new(bytes));

    let mut rows: Vec<Vec<String>> = Vec::new();

    for result in rdr.records() {
        let record = result?;
        let row: Vec<String> = record.iter().map(|field| field.to_string()).collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Seed transaction data.
const TRANSACTION_DATA: &str = r##"Date,Description,Category,How Much?,What payment method?,who recorded
2025-01-02,Saldo de diciembre,Saldo Anterior,"S/ 1,250.00",,Sigrid
2025-01-03,Pago Pathway,Pathway,"S/ 1,000.00",Transferencia,Diego
2025-01-05,Alquiler enero,Alquiler,-800,Sigrid Yape/plin/débito,Sigrid
2025-01-07,Mercado,Comida,"-S/ 152,40",Efectivo,Sigrid
2025-01-10,Pago Funval,Funval,200,Transferencia,Diego
2025-01-12,Luz y agua,Servicios,-95.5,Diego Yape/plin/débito,Diego
2025-01-15,Pago Mendel,Mendel,200,Transferencia,Diego
2025-01-20,Arena para gatos,Gatos,-45,Efectivo,Sigrid
2025-02-03,Pago Pathway,Pathway,1000,Transferencia,Diego
2025-02-06,Mercado,Comida,-180.25,Efectivo,Sigrid
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::qualified_range;
    use crate::model::{RowRange, TransactionColumn};

    fn unique_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    #[test]
    fn test_seed_data_parses() {
        let rows = load_csv(TRANSACTION_DATA).unwrap();
        assert_eq!(rows[0], TransactionColumn::default_headers());
        assert_eq!(rows.len(), 11);
    }

    #[tokio::test]
    async fn test_new_spreadsheet_is_seeded() {
        let mut sheet = TestSheet::new(unique_id());
        let rows = sheet.get(SEED_TRANSACTIONS).await.unwrap();
        assert_eq!(rows.len(), 11);
    }

    #[tokio::test]
    async fn test_missing_tab() {
        let mut sheet = TestSheet::new(unique_id());
        let e = sheet.get("Budgets").await.unwrap_err();
        assert_eq!(ErrorType::of(&e), Some(ErrorType::TableMissing));
    }

    #[tokio::test]
    async fn test_write_clear_and_trim() {
        let id = unique_id();
        let mut sheet = TestSheet::new(&id);
        sheet.create_sheet("T").await.unwrap();
        sheet
            .write_ranges(&[SheetRange {
                range: qualified_range("T", &RowRange::rows(1, 2, 2).unwrap()),
                values: vec![
                    vec!["a".to_string(), "b".to_string()],
                    vec!["c".to_string(), "d".to_string()],
                ],
            }])
            .await
            .unwrap();
        let range = qualified_range("T", &RowRange::row(2, 2).unwrap());
        sheet.clear_ranges(&[range.as_str()]).await.unwrap();

        // The cleared trailing row disappears from reads.
        assert_eq!(sheet.get("T").await.unwrap(), vec![vec!["a", "b"]]);
        // Other handles on the same spreadsheet see the same data.
        assert_eq!(TestSheet::new(&id).get_state().calls, 4);
    }

    #[tokio::test]
    async fn test_rate_limit_injection() {
        let sheet = TestSheet::new(unique_id());
        let mut state = sheet.get_state();
        state.rate_limit_failures = 1;
        sheet.set_state(state);

        let mut sheet = sheet;
        let e = sheet.get(SEED_TRANSACTIONS).await.unwrap_err();
        assert_eq!(ErrorType::of(&e), Some(ErrorType::RateLimited));
        assert!(sheet.get(SEED_TRANSACTIONS).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_existing_sheet_fails() {
        let mut sheet = TestSheet::new(unique_id());
        assert!(sheet.create_sheet(SEED_TRANSACTIONS).await.is_err());
    }
}
