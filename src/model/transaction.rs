use crate::error::Res;
use crate::model::mapping::Mapping;
use crate::model::{Amount, Month, FIRST_DATA_ROW};
use anyhow::{bail, Context};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Represents the transaction data from a Transactions sheet, including the header mapping.
///
/// Rows that have been cleared are skipped, but every transaction remembers the sheet row it was
/// read from, which is its identity for updates and deletes.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transactions {
    mapping: Mapping,
    data: Vec<Transaction>,
}

impl Transactions {
    /// Parses the rows downloaded from a Transactions sheet. The first row is the header row. An
    /// entirely empty sheet is treated as a sheet with the default headers and no data.
    pub fn parse<S, R, I>(sheet_data: I) -> Res<Self>
    where
        S: Into<String>,
        R: IntoIterator<Item = S>,
        I: IntoIterator<Item = R>,
    {
        let mut rows = sheet_data.into_iter();
        let mapping = match rows.next() {
            Some(header_row) => Mapping::new(header_row)?,
            None => Mapping::new(TransactionColumn::default_headers())?,
        };
        if mapping.is_empty() {
            bail!("The header row of the transactions sheet is empty");
        }

        let len = mapping.len();
        let mut transactions = Vec::new();

        for (row_ix, row) in rows.enumerate() {
            let row_number = row_ix + FIRST_DATA_ROW;
            let mut values: Vec<String> = row.into_iter().map(|s| s.into()).collect();
            if values.iter().all(|v| v.trim().is_empty()) {
                continue;
            }
            if values.len() > len {
                warn!(
                    "Row {row_number} has {} cells but there are only {len} headers, ignoring \
                    the extra cells",
                    values.len()
                );
                values.truncate(len);
            }

            let mut transaction =
                Transaction::new_with_sheet_headers(mapping.headers(), values)
                    .with_context(|| format!("Unable to parse transaction at row {row_number}"))?;
            transaction.row = Some(row_number);
            transactions.push(transaction);
        }
        Ok(Self {
            mapping,
            data: transactions,
        })
    }

    pub fn data(&self) -> &[Transaction] {
        &self.data
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Finds the transaction stored at sheet row `row`.
    pub fn get_row(&self, row: usize) -> Option<&Transaction> {
        self.data.iter().find(|t| t.row == Some(row))
    }
}

/// Represents a single row from the Transactions sheet.
///
/// The amount is signed: expenses are negative and income is positive.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    /// The 1-based sheet row this transaction was read from. `None` until it has been stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    row: Option<usize>,
    date: String,
    description: String,
    category: String,
    amount: Amount,
    payment_method: String,
    recorded_by: String,
    /// Cells under headers that are not one of the known columns. Written back unchanged.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    other_fields: BTreeMap<String, String>,
}

impl Transaction {
    /// Creates a transaction that has not been stored yet.
    pub fn new(date: impl Into<String>, category: impl Into<String>, amount: Amount) -> Self {
        Self {
            date: date.into(),
            category: category.into(),
            amount,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_payment_method(mut self, payment_method: impl Into<String>) -> Self {
        self.payment_method = payment_method.into();
        self
    }

    pub fn with_recorded_by(mut self, recorded_by: impl Into<String>) -> Self {
        self.recorded_by = recorded_by.into();
        self
    }

    pub(crate) fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn new_with_sheet_headers<S1, S2, I>(headers: &[S1], values: I) -> Res<Self>
    where
        S1: AsRef<str>,
        S2: Into<String>,
        I: IntoIterator<Item = S2>,
    {
        let mut transaction = Transaction::default();
        for (ix, value) in values.into_iter().map(|s| s.into()).enumerate() {
            let header = headers
                .get(ix)
                .with_context(|| format!("No header found for column index {ix}"))?
                .as_ref();
            transaction.set_with_header(header, value);
        }
        Ok(transaction)
    }

    /// Given the `header` name and the `value`, set the appropriate struct field. Amounts never
    /// fail to parse, an unreadable amount is zero.
    pub fn set_with_header<S1, S2>(&mut self, header: S1, value: S2)
    where
        S1: AsRef<str>,
        S2: Into<String>,
    {
        let header = header.as_ref();
        let value = value.into();

        match TransactionColumn::from_header(header) {
            Ok(col) => self.set(col, value),
            Err(_) => {
                let _ = self.other_fields.insert(header.to_string(), value);
            }
        }
    }

    fn set(&mut self, column: TransactionColumn, value: String) {
        match column {
            TransactionColumn::Date => self.date = value,
            TransactionColumn::Description => self.description = value,
            TransactionColumn::Category => self.category = value,
            TransactionColumn::Amount => self.amount = Amount::parse(&value),
            TransactionColumn::PaymentMethod => self.payment_method = value,
            TransactionColumn::RecordedBy => self.recorded_by = value,
        }
    }

    /// Given the `header` name, retrieve the appropriate struct field value.
    pub fn get_by_header(&self, header: &str) -> String {
        match TransactionColumn::from_header(header) {
            Ok(col) => self.get(col),
            Err(_) => self.other_fields.get(header).cloned().unwrap_or_default(),
        }
    }

    /// Retrieves the value of one of the known columns as it would be written to the sheet.
    pub fn get(&self, column: TransactionColumn) -> String {
        match column {
            TransactionColumn::Date => self.date.clone(),
            TransactionColumn::Description => self.description.clone(),
            TransactionColumn::Category => self.category.clone(),
            TransactionColumn::Amount => self.amount.to_string(),
            TransactionColumn::PaymentMethod => self.payment_method.clone(),
            TransactionColumn::RecordedBy => self.recorded_by.clone(),
        }
    }

    /// Given the order of the `headers`, convert the struct field values to a `Vec<String>` where
    /// the values appear in the right order according to the `headers` order.
    pub fn to_row<S: AsRef<str>>(&self, headers: &[S]) -> Vec<String> {
        headers
            .iter()
            .map(|h| self.get_by_header(h.as_ref()))
            .collect()
    }

    pub fn row(&self) -> Option<usize> {
        self.row
    }

    /// The raw date cell.
    pub fn date_str(&self) -> &str {
        &self.date
    }

    /// The parsed date, `None` when the cell is empty or unreadable.
    pub fn date(&self) -> Option<NaiveDate> {
        parse_date(&self.date)
    }

    /// The month of the parsed date.
    pub fn month(&self) -> Option<Month> {
        self.date().map(Month::of)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn payment_method(&self) -> Option<&str> {
        non_empty(&self.payment_method)
    }

    pub fn recorded_by(&self) -> Option<&str> {
        non_empty(&self.recorded_by)
    }

    pub fn other_fields(&self) -> &BTreeMap<String, String> {
        &self.other_fields
    }

    /// Income is strictly positive.
    pub fn is_income(&self) -> bool {
        self.amount.is_positive()
    }

    /// Expenses are strictly negative.
    pub fn is_expense(&self) -> bool {
        self.amount.is_negative()
    }

    /// Overwrites the known fields that are `Some` in `updates`.
    pub fn apply(&mut self, updates: &TransactionUpdates) {
        if let Some(date) = &updates.date {
            self.date = date.clone();
        }
        if let Some(description) = &updates.description {
            self.description = description.clone();
        }
        if let Some(category) = &updates.category {
            self.category = category.clone();
        }
        if let Some(amount) = updates.amount {
            self.amount = amount;
        }
        if let Some(payment_method) = &updates.payment_method {
            self.payment_method = payment_method.clone();
        }
        if let Some(recorded_by) = &updates.recorded_by {
            self.recorded_by = recorded_by.clone();
        }
    }
}

/// A partial update of a transaction. Fields that are `None` are left unchanged.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransactionUpdates {
    pub date: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount: Option<Amount>,
    pub payment_method: Option<String>,
    pub recorded_by: Option<String>,
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Parses a date cell. Accepts `YYYY-MM-DD` (what this program writes) and `M/D/YYYY` (how the
/// sheet may render a date that it recognized). A trailing time is ignored.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let day = s.split(['T', ' ']).next().unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(day, "%m/%d/%Y"))
        .ok()
}

/// Represents the known columns that should be found in the transactions sheet.
#[derive(
    Default, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionColumn {
    #[default]
    Date,
    Description,
    Category,
    Amount,
    PaymentMethod,
    RecordedBy,
}

serde_plain::derive_display_from_serialize!(TransactionColumn);
serde_plain::derive_fromstr_from_deserialize!(TransactionColumn);

impl TransactionColumn {
    pub const ALL: [TransactionColumn; 6] = [
        TransactionColumn::Date,
        TransactionColumn::Description,
        TransactionColumn::Category,
        TransactionColumn::Amount,
        TransactionColumn::PaymentMethod,
        TransactionColumn::RecordedBy,
    ];

    pub fn from_header(header: impl AsRef<str>) -> Res<TransactionColumn> {
        let header_str = header.as_ref();
        match header_str {
            DATE_STR => Ok(TransactionColumn::Date),
            DESCRIPTION_STR => Ok(TransactionColumn::Description),
            CATEGORY_STR => Ok(TransactionColumn::Category),
            AMOUNT_STR => Ok(TransactionColumn::Amount),
            PAYMENT_METHOD_STR => Ok(TransactionColumn::PaymentMethod),
            RECORDED_BY_STR => Ok(TransactionColumn::RecordedBy),
            bad => bail!("Invalid transaction column name '{bad}'"),
        }
    }

    pub fn as_header_str(&self) -> &'static str {
        match self {
            TransactionColumn::Date => DATE_STR,
            TransactionColumn::Description => DESCRIPTION_STR,
            TransactionColumn::Category => CATEGORY_STR,
            TransactionColumn::Amount => AMOUNT_STR,
            TransactionColumn::PaymentMethod => PAYMENT_METHOD_STR,
            TransactionColumn::RecordedBy => RECORDED_BY_STR,
        }
    }

    /// The headers of a freshly created transactions sheet.
    pub fn default_headers() -> Vec<String> {
        Self::ALL
            .iter()
            .map(|c| c.as_header_str().to_string())
            .collect()
    }
}

pub(crate) const DATE_STR: &str = "Date";
pub(crate) const DESCRIPTION_STR: &str = "Description";
pub(crate) const CATEGORY_STR: &str = "Category";
pub(crate) const AMOUNT_STR: &str = "How Much?";
pub(crate) const PAYMENT_METHOD_STR: &str = "What payment method?";
pub(crate) const RECORDED_BY_STR: &str = "who recorded";

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> Vec<Vec<&'static str>> {
        vec![
            vec![
                "Date",
                "Description",
                "Category",
                "How Much?",
                "What payment method?",
                "who recorded",
                "Notes",
            ],
            vec!["2025-01-05", "Rent", "Alquiler", "-800", "Transfer", "Ana", "jan"],
            vec!["", "", "", "", "", "", ""],
            vec!["2025-01-15", "Salary", "Pathway", "S/ 1,000.00", "", "Ana"],
            vec!["1/20/2025", "Lunch", "Comida", "-12.5"],
        ]
    }

    #[test]
    fn test_parse_skips_cleared_rows_and_keeps_row_numbers() {
        let transactions = Transactions::parse(sheet()).unwrap();
        assert_eq!(transactions.len(), 3);
        let rows: Vec<Option<usize>> = transactions.data().iter().map(|t| t.row()).collect();
        assert_eq!(rows, vec![Some(2), Some(4), Some(5)]);
        assert!(transactions.get_row(3).is_none());
    }

    #[test]
    fn test_parse_fields() {
        let transactions = Transactions::parse(sheet()).unwrap();
        let salary = transactions.get_row(4).unwrap();
        assert_eq!(salary.category(), "Pathway");
        assert_eq!(salary.amount(), Amount::parse("1000"));
        assert!(salary.is_income());
        assert_eq!(salary.payment_method(), None);
        assert_eq!(salary.recorded_by(), Some("Ana"));

        let rent = transactions.get_row(2).unwrap();
        assert!(rent.is_expense());
        assert_eq!(rent.other_fields().get("Notes").unwrap(), "jan");
    }

    #[test]
    fn test_parse_empty_sheet_uses_default_headers() {
        let transactions = Transactions::parse(Vec::<Vec<String>>::new()).unwrap();
        assert!(transactions.is_empty());
        assert_eq!(
            transactions.mapping().header_strings(),
            TransactionColumn::default_headers()
        );
    }

    #[test]
    fn test_to_row_preserves_unknown_columns_and_sign() {
        let transactions = Transactions::parse(sheet()).unwrap();
        let headers = transactions.mapping().header_strings();
        let row = transactions.get_row(2).unwrap().to_row(&headers);
        assert_eq!(
            row,
            vec!["2025-01-05", "Rent", "Alquiler", "-800", "Transfer", "Ana", "jan"]
        );
    }

    #[test]
    fn test_dates() {
        let transactions = Transactions::parse(sheet()).unwrap();
        let lunch = transactions.get_row(5).unwrap();
        assert_eq!(lunch.date(), NaiveDate::from_ymd_opt(2025, 1, 20));
        assert_eq!(lunch.month().unwrap().to_string(), "2025-01");

        assert_eq!(parse_date("2025-02-03T10:00:00"), NaiveDate::from_ymd_opt(2025, 2, 3));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_apply_updates() {
        let mut t = Transaction::new("2025-01-01", "Comida", Amount::parse("-10"))
            .with_description("bread");
        t.apply(&TransactionUpdates {
            amount: Some(Amount::parse("-12")),
            recorded_by: Some("Luis".to_string()),
            ..Default::default()
        });
        assert_eq!(t.amount(), Amount::parse("-12"));
        assert_eq!(t.description(), "bread");
        assert_eq!(t.recorded_by(), Some("Luis"));
    }

    #[test]
    fn test_column_from_header() {
        assert_eq!(
            TransactionColumn::from_header("How Much?").unwrap(),
            TransactionColumn::Amount
        );
        assert!(TransactionColumn::from_header("Amount").is_err());
        assert_eq!(
            "payment_method".parse::<TransactionColumn>().unwrap(),
            TransactionColumn::PaymentMethod
        );
    }
}
