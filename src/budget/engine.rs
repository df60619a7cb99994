//! Merges the budgeted ("expected") amounts of a month with the real amounts found in the
//! transaction ledger.
//!
//! A `MonthBudget` moves through `Loading -> Ready -> Editing -> Ready`. Real amounts can change
//! in any state and are applied at once; they never touch the expected amount of an editable
//! category. Computed categories take their expected amount from their formula, so they follow the
//! month's real income and cannot be edited.

use crate::budget::BudgetStore;
use crate::error::{ErrorType, Res};
use crate::model::{
    Amount, BudgetCategories, BudgetEntries, BudgetEntry, CategoryKind, CategoryTotals, Month,
    Transactions,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Where a month's budget is in its lifecycle.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The stored budget has not been read yet.
    Loading,
    /// The budget is shown and can be edited.
    Ready,
    /// Expected amounts are being changed and have not been saved.
    Editing,
}

serde_plain::derive_display_from_serialize!(Phase);

/// The budget of one month.
#[derive(Debug, Clone)]
pub struct MonthBudget {
    month: Month,
    categories: Arc<BudgetCategories>,
    phase: Phase,
    /// One entry per configured category, in configuration order.
    entries: BudgetEntries,
    /// The expected amounts from before the current edit.
    before_edit: Option<BudgetEntries>,
    real: CategoryTotals,
}

impl MonthBudget {
    /// A month that is `Loading`, with a zero entry for every configured category.
    pub fn new(month: Month, categories: Arc<BudgetCategories>) -> Self {
        let entries = categories
            .names()
            .map(|name| BudgetEntry::new(name, Amount::ZERO))
            .collect();
        Self {
            month,
            categories,
            phase: Phase::Loading,
            entries,
            before_edit: None,
            real: CategoryTotals::new(),
        }
    }

    pub fn month(&self) -> Month {
        self.month
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn entries(&self) -> &BudgetEntries {
        &self.entries
    }

    pub fn categories(&self) -> &BudgetCategories {
        &self.categories
    }

    /// Takes the stored expected amounts and moves to `Ready`. Stored values of computed
    /// categories are ignored and stored categories that are not configured are dropped.
    pub fn loaded(&mut self, stored: &BudgetEntries) -> Res<()> {
        if self.phase != Phase::Loading {
            return Err(wrong_phase("load", self.phase));
        }
        for entry in stored.iter() {
            match self.categories.get(entry.category()) {
                Some(config) if config.is_editable() => {
                    if let Some(target) = self.entries.get_mut(entry.category()) {
                        target.set_expected(entry.expected());
                    }
                }
                Some(_) => trace!("Ignoring the stored value of {}", entry.category()),
                None => debug!(
                    "Ignoring the budget of unknown category '{}' in {}",
                    entry.category(),
                    self.month
                ),
            }
        }
        self.recompute();
        self.phase = Phase::Ready;
        Ok(())
    }

    /// Replaces the real amounts, e.g. after the ledger changed. Works in every phase.
    pub fn set_real(&mut self, real: CategoryTotals) {
        self.real = real;
        self.recompute();
    }

    /// Replaces the real amounts with the totals of this month in `ledger`.
    pub fn set_ledger(&mut self, ledger: &Transactions) {
        self.set_real(ledger.category_totals(self.month));
    }

    /// `Ready -> Editing`. The current expected amounts are kept for `cancel_edit`.
    pub fn begin_edit(&mut self) -> Res<()> {
        if self.phase != Phase::Ready {
            return Err(wrong_phase("edit", self.phase));
        }
        self.before_edit = Some(self.entries.clone());
        self.phase = Phase::Editing;
        Ok(())
    }

    /// Sets the expected amount of an editable category. Returns false, changing nothing, when not
    /// `Editing` or when the category is unknown or computed. Expected amounts are magnitudes, the
    /// sign of `expected` is dropped.
    pub fn edit(&mut self, category: &str, expected: Amount) -> bool {
        if self.phase != Phase::Editing {
            debug!("Ignoring an edit of '{category}' while {}", self.phase);
            return false;
        }
        if !self
            .categories
            .get(category)
            .is_some_and(|config| config.is_editable())
        {
            debug!("'{category}' cannot be edited");
            return false;
        }
        match self.entries.get_mut(category) {
            Some(entry) => {
                entry.set_expected(expected.abs());
                true
            }
            None => false,
        }
    }

    /// `Editing -> Ready`, restoring the expected amounts from before the edit.
    pub fn cancel_edit(&mut self) -> Res<()> {
        if self.phase != Phase::Editing {
            return Err(wrong_phase("cancel", self.phase));
        }
        if let Some(before) = self.before_edit.take() {
            for entry in before.iter() {
                if let Some(target) = self.entries.get_mut(entry.category()) {
                    target.set_expected(entry.expected());
                }
            }
        }
        self.recompute();
        self.phase = Phase::Ready;
        Ok(())
    }

    /// `Editing -> Ready` by saving the entries. When the save fails the month stays `Editing` with
    /// its edits, so that it can be saved again.
    ///
    /// # Errors
    /// - `ErrorType::Validation` when not `Editing` or when the entries no longer match the
    ///   configured categories.
    /// - Any error of `BudgetStore::save_budget`, e.g. `ErrorType::Conflict`.
    pub async fn save(&mut self, store: &BudgetStore) -> Res<()> {
        if self.phase != Phase::Editing {
            return Err(wrong_phase("save", self.phase));
        }
        if !self.entries.categories().eq(self.categories.names()) {
            return Err(ErrorType::Validation.err(format!(
                "The categories of the {} budget do not match the configured categories",
                self.month
            )));
        }
        if let Err(e) = store.save_budget(self.month, &self.entries).await {
            warn!("Saving the budget for {} failed: {e:#}", self.month);
            return Err(e);
        }
        self.before_edit = None;
        self.phase = Phase::Ready;
        Ok(())
    }

    /// The income and expense rollups.
    pub fn totals(&self) -> BudgetTotals {
        let (income_expected, income_real) =
            self.sum(self.categories.rollup_income().map(|c| c.name()));
        let (expenses_expected, expenses_real) =
            self.sum(self.categories.expenses().map(|c| c.name()));
        BudgetTotals {
            income_expected,
            income_real,
            expenses_expected,
            expenses_real,
        }
    }

    /// The sums of the expected and real amounts of `names`.
    fn sum<'a>(&self, names: impl Iterator<Item = &'a str>) -> (Amount, Amount) {
        let mut expected = Amount::ZERO;
        let mut real = Amount::ZERO;
        for name in names {
            if let Some(entry) = self.entries.get(name) {
                expected += entry.expected();
                real += entry.real();
            }
        }
        (expected, real)
    }

    /// One line per configured category plus the totals.
    pub fn report(&self) -> BudgetReport {
        let lines = self
            .categories
            .iter()
            .filter_map(|config| {
                let entry = self.entries.get(config.name())?;
                let variance = if config.is_income() {
                    entry.real() - entry.expected()
                } else {
                    entry.expected() - entry.real()
                };
                Some(BudgetLine {
                    category: config.name().to_string(),
                    kind: config.kind(),
                    editable: config.is_editable(),
                    expected: entry.expected(),
                    real: entry.real(),
                    variance,
                })
            })
            .collect();
        BudgetReport {
            month: self.month,
            phase: self.phase,
            lines,
            totals: self.totals(),
        }
    }

    /// Copies the real amounts into the entries and re-derives the computed categories.
    fn recompute(&mut self) {
        for entry in self.entries.iter_mut() {
            let real = self.real.get(entry.category());
            entry.set_real(real);
        }
        let mut real_by_category = CategoryTotals::new();
        for entry in self.entries.iter() {
            real_by_category.add(entry.category(), entry.real());
        }
        for config in self.categories.iter() {
            let Some(formula) = config.formula() else {
                continue;
            };
            let expected = self.categories.derive(formula, &real_by_category);
            if let Some(entry) = self.entries.get_mut(config.name()) {
                entry.set_expected(expected);
            }
        }
    }
}

fn wrong_phase(action: &str, phase: Phase) -> anyhow::Error {
    ErrorType::Validation.err(format!("Cannot {action} a budget that is {phase}"))
}

/// The rollups of a month. Income leaves out carry-forward categories, expenses include the
/// computed ones.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetTotals {
    pub income_expected: Amount,
    pub income_real: Amount,
    pub expenses_expected: Amount,
    pub expenses_real: Amount,
}

impl BudgetTotals {
    /// Positive when more income came in than budgeted.
    pub fn income_variance(&self) -> Amount {
        self.income_real - self.income_expected
    }

    /// Positive when less was spent than budgeted.
    pub fn expense_variance(&self) -> Amount {
        self.expenses_expected - self.expenses_real
    }
}

/// One category of a month's budget.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetLine {
    pub category: String,
    pub kind: CategoryKind,
    pub editable: bool,
    pub expected: Amount,
    pub real: Amount,
    /// `real - expected` for income and `expected - real` for expenses, so positive is good.
    pub variance: Amount,
}

/// A month's budget as shown to the user.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetReport {
    pub month: Month,
    pub phase: Phase,
    pub lines: Vec<BudgetLine>,
    pub totals: BudgetTotals,
}

/// Keeps the budgets of the months that have been looked at and tracks the selected month.
#[derive(Debug)]
pub struct Reconciler {
    store: BudgetStore,
    categories: Arc<BudgetCategories>,
    ledger: Transactions,
    months: HashMap<Month, MonthBudget>,
    selected: Month,
}

impl Reconciler {
    pub fn new(
        store: BudgetStore,
        categories: Arc<BudgetCategories>,
        ledger: Transactions,
        month: Month,
    ) -> Self {
        let mut reconciler = Self {
            store,
            categories,
            ledger,
            months: HashMap::new(),
            selected: month,
        };
        reconciler.insert_month(month);
        reconciler
    }

    pub fn selected(&self) -> Month {
        self.selected
    }

    pub fn ledger(&self) -> &Transactions {
        &self.ledger
    }

    /// The budget of the selected month.
    pub fn current(&self) -> Option<&MonthBudget> {
        self.months.get(&self.selected)
    }

    /// Switches to `month`, reusing its budget when it was looked at before.
    ///
    /// # Errors
    /// `ErrorType::Validation` while the selected month is being edited.
    pub fn select_month(&mut self, month: Month) -> Res<()> {
        if self.current().map(MonthBudget::phase) == Some(Phase::Editing) {
            return Err(ErrorType::Validation.err(format!(
                "Finish editing the {} budget before switching months",
                self.selected
            )));
        }
        self.selected = month;
        if !self.months.contains_key(&month) {
            self.insert_month(month);
        }
        Ok(())
    }

    /// Loads the selected month if it is still `Loading`. A failed load leaves it `Loading`.
    pub async fn load(&mut self) -> Res<&MonthBudget> {
        let month = self.selected;
        let budget = self.month_mut()?;
        if budget.phase() == Phase::Loading {
            let stored = self.store.load_budget(month).await?;
            self.month_mut()?.loaded(&stored)?;
        }
        self.months
            .get(&month)
            .ok_or_else(|| ErrorType::Internal.err(format!("{month} is not loaded")))
    }

    /// Replaces the ledger and recomputes the real amounts of every month, whatever its phase.
    pub fn set_ledger(&mut self, ledger: Transactions) {
        self.ledger = ledger;
        for budget in self.months.values_mut() {
            budget.set_ledger(&self.ledger);
        }
    }

    pub fn begin_edit(&mut self) -> Res<()> {
        self.month_mut()?.begin_edit()
    }

    /// See `MonthBudget::edit`.
    pub fn edit(&mut self, category: &str, expected: Amount) -> bool {
        match self.months.get_mut(&self.selected) {
            Some(budget) => budget.edit(category, expected),
            None => false,
        }
    }

    pub fn cancel_edit(&mut self) -> Res<()> {
        self.month_mut()?.cancel_edit()
    }

    pub async fn save(&mut self) -> Res<()> {
        let budget = self
            .months
            .get_mut(&self.selected)
            .ok_or_else(|| ErrorType::Internal.err(format!("{} is not loaded", self.selected)))?;
        budget.save(&self.store).await
    }

    fn insert_month(&mut self, month: Month) {
        let mut budget = MonthBudget::new(month, self.categories.clone());
        budget.set_ledger(&self.ledger);
        self.months.insert(month, budget);
    }

    fn month_mut(&mut self) -> Res<&mut MonthBudget> {
        let selected = self.selected;
        self.months
            .get_mut(&selected)
            .ok_or_else(|| ErrorType::Internal.err(format!("{selected} is not loaded")))
    }
}
