//! Aggregations over the transaction ledger: per category totals, the metrics summary and the
//! filtered, sorted listing.

use crate::model::{Amount, Month, Transaction, TransactionColumn, Transactions};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// The number of entries in the "top" lists of the summary.
pub const TOP_N: usize = 5;

/// A date range used to select transactions for aggregation.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Period {
    /// Every transaction, including those without a readable date.
    AllTime,
    Year(i32),
    Month(Month),
}

impl Period {
    /// Transactions without a readable date only belong to `AllTime`.
    pub fn includes(&self, date: Option<NaiveDate>) -> bool {
        match (self, date) {
            (Period::AllTime, _) => true,
            (Period::Year(year), Some(d)) => d.year() == *year,
            (Period::Month(month), Some(d)) => month.contains(d),
            (_, None) => false,
        }
    }
}

/// Sums per name (a category or a payment method) that remember the order in which each name was
/// first seen. Serializes as a JSON object in that order.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct CategoryTotals {
    entries: Vec<(String, Amount)>,
    index: HashMap<String, usize>,
}

impl CategoryTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to the total for `name`.
    pub fn add(&mut self, name: impl Into<String>, amount: Amount) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&ix) => self.entries[ix].1 += amount,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, amount));
            }
        }
    }

    /// The total for `name`, zero when nothing was recorded for it.
    pub fn get(&self, name: &str) -> Amount {
        self.index
            .get(name)
            .map(|&ix| self.entries[ix].1)
            .unwrap_or(Amount::ZERO)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Amount)> {
        self.entries.iter().map(|(name, amount)| (name.as_str(), *amount))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The sum of all entries.
    pub fn total(&self) -> Amount {
        self.entries.iter().map(|(_, amount)| *amount).sum()
    }

    /// The `n` largest entries, largest first. Ties keep the order in which the names were first
    /// seen. Each share carries its percentage of `total()`.
    pub fn top(&self, n: usize) -> Vec<Share> {
        let total = self.total();
        let mut sorted: Vec<&(String, Amount)> = self.entries.iter().collect();
        // Vec::sort_by is stable.
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted
            .into_iter()
            .take(n)
            .map(|(name, amount)| Share::new(name, *amount, total))
            .collect()
    }
}

impl Serialize for CategoryTotals {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, amount) in &self.entries {
            map.serialize_entry(name, amount)?;
        }
        map.end()
    }
}

/// One entry of a "top" list.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Share {
    name: String,
    amount: Amount,
    /// Percentage of the total, rounded to one decimal place.
    percent: Decimal,
}

impl Share {
    fn new(name: &str, amount: Amount, total: Amount) -> Self {
        let percent = if total.is_zero() {
            Decimal::ZERO
        } else {
            // Dividing first keeps amounts near `Decimal::MAX` in range.
            amount
                .value()
                .checked_div(total.value())
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .map(|percent| percent.round_dp(1))
                .unwrap_or(Decimal::ZERO)
        };
        Self {
            name: name.to_string(),
            amount,
            percent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn percent(&self) -> Decimal {
        self.percent
    }
}

/// Income and expense totals for a period. Both are non-negative.
#[derive(Default, Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PeriodTotals {
    income: Amount,
    expenses: Amount,
    balance: Amount,
}

impl PeriodTotals {
    fn add(&mut self, amount: Amount) {
        if amount.is_positive() {
            self.income += amount;
        } else if amount.is_negative() {
            self.expenses += amount.abs();
        }
        self.balance = self.income - self.expenses;
    }

    pub fn income(&self) -> Amount {
        self.income
    }

    pub fn expenses(&self) -> Amount {
        self.expenses
    }

    /// Income minus expenses.
    pub fn balance(&self) -> Amount {
        self.balance
    }
}

impl<'a> FromIterator<&'a Transaction> for PeriodTotals {
    fn from_iter<T: IntoIterator<Item = &'a Transaction>>(iter: T) -> Self {
        let mut totals = PeriodTotals::default();
        for t in iter {
            totals.add(t.amount());
        }
        totals
    }
}

/// The metrics shown for the ledger as a whole, relative to a reference month.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Summary {
    month: Month,
    all_time: PeriodTotals,
    this_month: PeriodTotals,
    this_year: PeriodTotals,
    income_by_category: CategoryTotals,
    expenses_by_category: CategoryTotals,
    payment_methods: CategoryTotals,
    top_income: Vec<Share>,
    top_expenses: Vec<Share>,
    top_payment_methods: Vec<Share>,
}

impl Summary {
    pub fn month(&self) -> Month {
        self.month
    }

    pub fn all_time(&self) -> PeriodTotals {
        self.all_time
    }

    pub fn this_month(&self) -> PeriodTotals {
        self.this_month
    }

    pub fn this_year(&self) -> PeriodTotals {
        self.this_year
    }

    pub fn income_by_category(&self) -> &CategoryTotals {
        &self.income_by_category
    }

    pub fn expenses_by_category(&self) -> &CategoryTotals {
        &self.expenses_by_category
    }

    pub fn payment_methods(&self) -> &CategoryTotals {
        &self.payment_methods
    }

    pub fn top_income(&self) -> &[Share] {
        &self.top_income
    }

    pub fn top_expenses(&self) -> &[Share] {
        &self.top_expenses
    }

    pub fn top_payment_methods(&self) -> &[Share] {
        &self.top_payment_methods
    }
}

/// Whether a transaction is income (positive) or an expense (negative).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

serde_plain::derive_display_from_serialize!(TransactionKind);
serde_plain::derive_fromstr_from_deserialize!(TransactionKind);

/// Narrows the transaction listing. Every criterion that is set must match.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct TransactionFilter {
    /// Transactions without a readable date never match a month.
    pub month: Option<Month>,
    /// Exact category name.
    pub category: Option<String>,
    pub kind: Option<TransactionKind>,
    /// Case-insensitive substring search within one column.
    pub search: Option<(TransactionColumn, String)>,
}

impl TransactionFilter {
    pub fn matches(&self, t: &Transaction) -> bool {
        if let Some(month) = self.month {
            if t.month() != Some(month) {
                return false;
            }
        }
        if let Some((column, needle)) = &self.search {
            let needle = needle.to_lowercase();
            if !t.get(*column).to_lowercase().contains(&needle) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if t.category() != category {
                return false;
            }
        }
        match self.kind {
            Some(TransactionKind::Income) if !t.is_income() => false,
            Some(TransactionKind::Expense) if !t.is_expense() => false,
            _ => true,
        }
    }
}

/// Most recent first. Transactions without dates come after dated ones, and ties are broken by the
/// most recently added row first.
fn newest_first(a: &&Transaction, b: &&Transaction) -> Ordering {
    let by_date = match (a.date(), b.date()) {
        (Some(da), Some(db)) => db.cmp(&da),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_date.then_with(|| b.row().cmp(&a.row()))
}

impl Transactions {
    fn in_period(&self, period: Period) -> impl Iterator<Item = &Transaction> {
        self.data()
            .iter()
            .filter(move |t| period.includes(t.date()))
    }

    /// Income per category within `period`, in absolute amounts.
    pub fn income_by_category(&self, period: Period) -> CategoryTotals {
        let mut totals = CategoryTotals::new();
        for t in self.in_period(period).filter(|t| t.is_income()) {
            totals.add(t.category(), t.amount().abs());
        }
        totals
    }

    /// Expenses per category within `period`, in absolute amounts.
    pub fn expense_by_category(&self, period: Period) -> CategoryTotals {
        let mut totals = CategoryTotals::new();
        for t in self.in_period(period).filter(|t| t.is_expense()) {
            totals.add(t.category(), t.amount().abs());
        }
        totals
    }

    /// Absolute amounts per payment method within `period`. Transactions without a payment method
    /// are left out.
    pub fn payment_methods(&self, period: Period) -> CategoryTotals {
        let mut totals = CategoryTotals::new();
        for t in self.in_period(period) {
            if let Some(method) = t.payment_method() {
                totals.add(method, t.amount().abs());
            }
        }
        totals
    }

    /// Income and expense totals within `period`.
    pub fn totals(&self, period: Period) -> PeriodTotals {
        self.in_period(period).collect()
    }

    /// The absolute sum per category within `month`, regardless of sign. These are the "real"
    /// amounts of a month's budget.
    pub fn category_totals(&self, month: Month) -> CategoryTotals {
        let mut totals = CategoryTotals::new();
        for t in self.in_period(Period::Month(month)) {
            totals.add(t.category(), t.amount().abs());
        }
        totals
    }

    /// Builds the metrics summary relative to `month`.
    pub fn summary(&self, month: Month) -> Summary {
        let income_by_category = self.income_by_category(Period::AllTime);
        let expenses_by_category = self.expense_by_category(Period::AllTime);
        let payment_methods = self.payment_methods(Period::AllTime);
        Summary {
            month,
            all_time: self.totals(Period::AllTime),
            this_month: self.totals(Period::Month(month)),
            this_year: self.totals(Period::Year(month.year())),
            top_income: income_by_category.top(TOP_N),
            top_expenses: expenses_by_category.top(TOP_N),
            top_payment_methods: payment_methods.top(TOP_N),
            income_by_category,
            expenses_by_category,
            payment_methods,
        }
    }

    /// The transactions that match `filter`, most recent first.
    pub fn filter(&self, filter: &TransactionFilter) -> Vec<&Transaction> {
        let mut found: Vec<&Transaction> =
            self.data().iter().filter(|t| filter.matches(t)).collect();
        found.sort_by(newest_first);
        found
    }

    /// The distinct months that transactions were recorded in, most recent first.
    pub fn available_months(&self) -> Vec<Month> {
        let months: BTreeSet<Month> = self.data().iter().filter_map(|t| t.month()).collect();
        months.into_iter().rev().collect()
    }
}
