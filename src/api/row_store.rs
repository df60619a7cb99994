//! Row-oriented access to a sheet tab. A record's identity is its 1-based row number: appends go
//! below the last row that has any non-empty cell, updates overwrite a row in place and deletes
//! empty the cells of a row without shifting the rows below it.
//!
//! Every call checks the session first and goes through the retry policy, so a rate-limited call
//! is retried while a missing login fails at once.
//!
//! Appending reads the whole tab to find the last used row. That is one full scan per append, which
//! is fine for a household ledger but does not scale to very large sheets. Callers that need the
//! header row to build the record use `append_with`, which hands them that same scan.

use crate::api::{qualified_range, RetryPolicy, Session, Sheet, SheetRange};
use crate::error::{ErrorType, Res};
use crate::model::{RowRange, FIRST_DATA_ROW};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A cloneable handle on a spreadsheet. Clones share the underlying `Sheet`, the session and the
/// append lock.
#[derive(Clone)]
pub struct RowStore {
    sheet: Arc<Mutex<Box<dyn Sheet + Send>>>,
    session: Arc<Session>,
    retry: RetryPolicy,
    /// Held from the scan to the write of an append so that two appends do not pick the same row.
    append_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for RowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStore")
            .field("signed_in", &self.session.is_signed_in())
            .field("retry", &self.retry)
            .finish()
    }
}

impl RowStore {
    pub(crate) fn new(sheet: Box<dyn Sheet + Send>, session: Session, retry: RetryPolicy) -> Self {
        Self {
            sheet: Arc::new(Mutex::new(sheet)),
            session: Arc::new(session),
            retry,
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Returns every row of the tab, including the header row.
    ///
    /// # Errors
    /// - `ErrorType::NotAuthenticated` when there is no signed-in session.
    /// - `ErrorType::TableMissing` when the tab does not exist.
    pub async fn read_all(&self, sheet_name: &str) -> Res<Vec<Vec<String>>> {
        self.session.ensure_signed_in()?;
        let this = self;
        self.retry
            .run("read", move || async move {
                this.sheet.lock().await.get(sheet_name).await
            })
            .await
    }

    /// Writes `values` into the row after the last row with any non-empty cell and returns that
    /// row number. The header row is never overwritten, so an empty tab receives its first record
    /// at row 2.
    pub async fn append(&self, sheet_name: &str, values: Vec<String>) -> Res<usize> {
        self.append_with(sheet_name, |_| Ok(values)).await
    }

    /// Like `append`, but the values are built by `build` from the rows read to find the next
    /// row. Nothing is written when `build` fails.
    pub async fn append_with<F>(&self, sheet_name: &str, build: F) -> Res<usize>
    where
        F: FnOnce(&[Vec<String>]) -> Res<Vec<String>>,
    {
        self.session.ensure_signed_in()?;
        let _append = self.append_lock.lock().await;
        let rows = self.read_all(sheet_name).await?;
        let row = next_row(&rows);
        let values = build(&rows)?;
        debug!("Appending to {sheet_name} at row {row}");
        self.write_rows(sheet_name, row, vec![values]).await?;
        Ok(row)
    }

    /// Overwrites row `row` with `values`.
    pub async fn update(&self, sheet_name: &str, row: usize, values: Vec<String>) -> Res<()> {
        check_data_row(row)?;
        self.write_rows(sheet_name, row, vec![values]).await
    }

    /// Empties the first `columns` cells of row `row`. Other rows keep their numbers.
    pub async fn clear(&self, sheet_name: &str, row: usize, columns: usize) -> Res<()> {
        check_data_row(row)?;
        self.clear_rows(sheet_name, row, row, columns).await
    }

    /// Writes `rows` starting at row `first_row`. The block is as wide as the widest row.
    pub async fn write_rows(
        &self,
        sheet_name: &str,
        first_row: usize,
        rows: Vec<Vec<String>>,
    ) -> Res<()> {
        self.session.ensure_signed_in()?;
        if rows.is_empty() {
            return Ok(());
        }
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let range = RowRange::rows(first_row, first_row + rows.len() - 1, columns)?;
        let data = &[SheetRange {
            range: qualified_range(sheet_name, &range),
            values: rows,
        }];
        let this = self;
        self.retry
            .run("write", move || async move {
                this.sheet.lock().await.write_ranges(data).await
            })
            .await
    }

    /// Empties the first `columns` cells of rows `first..=last`.
    pub async fn clear_rows(
        &self,
        sheet_name: &str,
        first: usize,
        last: usize,
        columns: usize,
    ) -> Res<()> {
        self.session.ensure_signed_in()?;
        let range = qualified_range(sheet_name, &RowRange::rows(first, last, columns.max(1))?);
        let range = range.as_str();
        let this = self;
        self.retry
            .run("clear", move || async move {
                this.sheet.lock().await.clear_ranges(&[range]).await
            })
            .await
    }

    /// Adds the tab `sheet_name` and writes `headers` into its first row.
    pub async fn create_table(&self, sheet_name: &str, headers: &[String]) -> Res<()> {
        self.session.ensure_signed_in()?;
        let this = self;
        self.retry
            .run("create", move || async move {
                this.sheet.lock().await.create_sheet(sheet_name).await
            })
            .await?;
        self.write_rows(sheet_name, 1, vec![headers.to_vec()]).await
    }
}

/// The row after the last row that has any non-empty cell, but never the header row.
fn next_row(rows: &[Vec<String>]) -> usize {
    let last_used = rows
        .iter()
        .rposition(|row| row.iter().any(|cell| !cell.is_empty()))
        .map(|ix| ix + 1)
        .unwrap_or(0);
    (last_used + 1).max(FIRST_DATA_ROW)
}

fn check_data_row(row: usize) -> Res<()> {
    if row < FIRST_DATA_ROW {
        return Err(ErrorType::Validation.err(format!(
            "Row {row} is not a data row, data starts at row {FIRST_DATA_ROW}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestSheet;
    use std::time::Duration;

    const TAB: &str = "Log";

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    fn store_with(rows: Vec<Vec<&str>>) -> (RowStore, TestSheet) {
        let id = uuid::Uuid::new_v4().to_string();
        let test_sheet = TestSheet::new(&id);
        test_sheet.set_state(test_sheet.get_state().with_sheet(TAB, rows));
        let store = RowStore::new(
            Box::new(TestSheet::new(&id)),
            Session::testing(),
            fast_retry(),
        );
        (store, test_sheet)
    }

    fn s(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_next_row() {
        assert_eq!(next_row(&[]), 2);
        assert_eq!(next_row(&[s(&["h"])]), 2);
        assert_eq!(next_row(&[s(&["h"]), s(&["a"]), s(&[]), s(&["", ""])]), 3);
    }

    #[tokio::test]
    async fn test_append_after_last_non_empty_row() {
        // Rows 2 and 4 are empty, rows 3 and 5 hold data.
        let (store, sheet) = store_with(vec![
            vec!["Date", "Amount"],
            vec![],
            vec!["2025-01-01", "10"],
            vec!["", ""],
            vec!["2025-01-02", "20"],
        ]);
        let row = store.append(TAB, s(&["2025-01-03", "30"])).await.unwrap();
        assert_eq!(row, 6);
        let rows = sheet.get_state().rows(TAB).unwrap();
        assert_eq!(rows[5], s(&["2025-01-03", "30"]));
        // The gaps are not reused.
        assert!(rows[1].is_empty());
        assert!(rows[3].is_empty());
    }

    #[tokio::test]
    async fn test_clear_keeps_identities() {
        let (store, sheet) = store_with(vec![
            vec!["Date", "Amount"],
            vec!["2025-01-01", "10"],
            vec!["2025-01-02", "20"],
            vec!["2025-01-03", "30"],
        ]);
        store.clear(TAB, 3, 2).await.unwrap();
        let rows = sheet.get_state().rows(TAB).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows[2].is_empty());
        assert_eq!(rows[3], s(&["2025-01-03", "30"]));

        // Clearing the last row makes its position available to the next append.
        store.clear(TAB, 4, 2).await.unwrap();
        let row = store.append(TAB, s(&["2025-01-04", "40"])).await.unwrap();
        assert_eq!(row, 3);
    }

    #[tokio::test]
    async fn test_update_in_place() {
        let (store, sheet) = store_with(vec![vec!["Date", "Amount"], vec!["2025-01-01", "10"]]);
        store.update(TAB, 2, s(&["2025-01-01", "15"])).await.unwrap();
        assert_eq!(sheet.get_state().rows(TAB).unwrap()[1], s(&["2025-01-01", "15"]));

        let e = store.update(TAB, 1, s(&["x"])).await.unwrap_err();
        assert_eq!(ErrorType::of(&e), Some(ErrorType::Validation));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let (store, sheet) = store_with(vec![vec!["Date", "Amount"]]);
        let mut state = sheet.get_state();
        state.rate_limit_failures = 2;
        state.calls = 0;
        sheet.set_state(state);

        let rows = store.read_all(TAB).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(sheet.get_state().calls, 3);
    }

    #[tokio::test]
    async fn test_not_signed_in_is_never_retried() {
        let id = uuid::Uuid::new_v4().to_string();
        let sheet = TestSheet::new(&id);
        let store = RowStore::new(
            Box::new(TestSheet::new(&id)),
            Session::signed_out(),
            fast_retry(),
        );
        let e = store.read_all("Transactions").await.unwrap_err();
        assert_eq!(ErrorType::of(&e), Some(ErrorType::NotAuthenticated));
        let e = store.append("Transactions", s(&["x"])).await.unwrap_err();
        assert_eq!(ErrorType::of(&e), Some(ErrorType::NotAuthenticated));
        assert_eq!(sheet.get_state().calls, 0);
    }

    #[tokio::test]
    async fn test_create_table_writes_header() {
        let (store, sheet) = store_with(vec![]);
        store
            .create_table("Budgets", &s(&["Month", "Category", "Expected"]))
            .await
            .unwrap();
        assert_eq!(
            sheet.get_state().rows("Budgets").unwrap(),
            vec![s(&["Month", "Category", "Expected"])]
        );
    }
}
