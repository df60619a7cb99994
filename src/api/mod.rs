//! Access to the spreadsheet that stores transactions and budgets.
//!
//! The `Sheet` trait is the thin transport: read a whole tab, write ranges, clear ranges and add a
//! tab. `RowStore` builds the row-oriented operations on top of it (append, update and clear by row
//! number) and adds the session gate and the retry policy.

mod google;
mod ledger;
mod retry;
mod row_store;
mod session;
mod sheet_test_client;

use crate::error::{ErrorType, Res};
use crate::model::RowRange;
use crate::Config;
use anyhow::Context;

pub use ledger::LedgerStore;
pub use retry::RetryPolicy;
pub use row_store::RowStore;
pub use session::{save_token, AccessToken, Session};
pub(crate) use sheet_test_client::TestSheet;
#[cfg(test)]
pub(crate) use sheet_test_client::TestSheetState;

/// When this environment variable is set and non-empty, the in-memory `TestSheet` is used instead
/// of Google Sheets.
pub const TEST_MODE_ENV: &str = "BUDGET_SHEET_IN_TEST_MODE";

/// Selects the implementation of `Sheet`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    /// Talk to the Google Sheets API.
    #[default]
    Google,
    /// Use the in-memory `TestSheet`.
    Testing,
}

impl Mode {
    /// Returns `Mode::Testing` when `BUDGET_SHEET_IN_TEST_MODE` is set to a non-empty value,
    /// otherwise `Mode::Google`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Testing,
            _ => Mode::Google,
        }
    }
}

/// A block of cells to be written, e.g. `'Budgets'!A1:C3` and its rows.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct SheetRange {
    pub(crate) range: String,
    pub(crate) values: Vec<Vec<String>>,
}

/// The minimal set of spreadsheet operations this program needs.
#[async_trait::async_trait]
pub(crate) trait Sheet: Send {
    /// Returns every row of the tab named `sheet_name`. Trailing empty rows and trailing empty
    /// cells are omitted, empty rows in the middle are returned as empty vectors.
    ///
    /// # Errors
    /// `ErrorType::TableMissing` when the tab does not exist.
    async fn get(&mut self, sheet_name: &str) -> Res<Vec<Vec<String>>>;

    /// Writes each range. Ranges are sheet qualified, see `qualified_range`.
    async fn write_ranges(&mut self, data: &[SheetRange]) -> Res<()>;

    /// Empties the cells of each range without removing rows.
    async fn clear_ranges(&mut self, ranges: &[&str]) -> Res<()>;

    /// Adds an empty tab named `sheet_name`.
    async fn create_sheet(&mut self, sheet_name: &str) -> Res<()>;
}

/// Creates the `Sheet` implementation for `mode`.
pub(crate) fn sheet(config: &Config, session: &Session, mode: Mode) -> Box<dyn Sheet + Send> {
    match mode {
        Mode::Google => Box::new(google::GoogleSheet::new(
            config.spreadsheet_id(),
            session.token_value(),
        )),
        Mode::Testing => Box::new(TestSheet::new(config.spreadsheet_id())),
    }
}

/// Opens the spreadsheet named in `config`. In `Mode::Google` the session is loaded from the token
/// file, the in-memory test sheet always has a signed-in session.
pub async fn connect(config: &Config, mode: Mode) -> RowStore {
    let session = match mode {
        Mode::Google => Session::load(config.token_path()).await,
        Mode::Testing => Session::testing(),
    };
    let sheet = sheet(config, &session, mode);
    RowStore::new(sheet, session, config.retry())
}

/// Prefixes `range` with the quoted sheet name, e.g. `'How Much'!A2:F2`.
pub(crate) fn qualified_range(sheet_name: &str, range: &RowRange) -> String {
    format!("{}!{range}", quote_sheet_name(sheet_name))
}

/// Quotes a sheet name for use in A1 notation. Embedded single quotes are doubled.
pub(crate) fn quote_sheet_name(sheet_name: &str) -> String {
    format!("'{}'", sheet_name.replace('\'', "''"))
}

/// Splits a range produced by `qualified_range` into the sheet name and the row range.
pub(crate) fn split_qualified_range(qualified: &str) -> Res<(String, RowRange)> {
    let (name, range) = qualified
        .rsplit_once('!')
        .with_context(|| format!("The range '{qualified}' has no sheet name"))?;
    let name = match name
        .strip_prefix('\'')
        .and_then(|n| n.strip_suffix('\''))
    {
        Some(quoted) => quoted.replace("''", "'"),
        None => name.to_string(),
    };
    let range = range
        .parse::<RowRange>()
        .map_err(|e| ErrorType::Sheet.err(format!("Unable to parse range '{qualified}': {e:#}")))?;
    Ok((name, range))
}
