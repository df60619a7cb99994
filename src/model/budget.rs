use crate::model::Amount;
use serde::{Deserialize, Serialize};

/// The budgeted (`expected`) and actual (`real`) amount of one category in one month. Both are
/// magnitudes, the category decides whether they are income or expense.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetEntry {
    category: String,
    expected: Amount,
    /// Derived from the ledger, never stored.
    #[serde(default)]
    real: Amount,
}

impl BudgetEntry {
    pub fn new(category: impl Into<String>, expected: Amount) -> Self {
        Self {
            category: category.into(),
            expected,
            real: Amount::ZERO,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn expected(&self) -> Amount {
        self.expected
    }

    pub fn real(&self) -> Amount {
        self.real
    }

    pub(crate) fn set_expected(&mut self, expected: Amount) {
        self.expected = expected;
    }

    pub(crate) fn set_real(&mut self, real: Amount) {
        self.real = real;
    }
}

/// The entries of one month's budget in row order. A category appears at most once.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BudgetEntries {
    entries: Vec<BudgetEntry>,
}

impl BudgetEntries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the expected amount of `category`, adding the entry at the end if it is new.
    pub fn upsert(&mut self, category: impl Into<String>, expected: Amount) {
        let category = category.into();
        match self.get_mut(&category) {
            Some(entry) => entry.set_expected(expected),
            None => self.entries.push(BudgetEntry::new(category, expected)),
        }
    }

    pub fn get(&self, category: &str) -> Option<&BudgetEntry> {
        self.entries.iter().find(|e| e.category == category)
    }

    pub(crate) fn get_mut(&mut self, category: &str) -> Option<&mut BudgetEntry> {
        self.entries.iter_mut().find(|e| e.category == category)
    }

    /// The expected amount of `category`, zero when it has no entry.
    pub fn expected(&self, category: &str) -> Amount {
        self.get(category)
            .map(|e| e.expected)
            .unwrap_or(Amount::ZERO)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BudgetEntry> {
        self.entries.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut BudgetEntry> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.category.as_str())
    }
}

impl FromIterator<BudgetEntry> for BudgetEntries {
    fn from_iter<T: IntoIterator<Item = BudgetEntry>>(iter: T) -> Self {
        let mut entries = BudgetEntries::new();
        for entry in iter {
            entries.upsert(entry.category, entry.expected);
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_keeps_first_position() {
        let mut entries = BudgetEntries::new();
        entries.upsert("Comida", Amount::parse("300"));
        entries.upsert("Salud", Amount::parse("50"));
        entries.upsert("Comida", Amount::parse("350"));
        let order: Vec<&str> = entries.categories().collect();
        assert_eq!(order, vec!["Comida", "Salud"]);
        assert_eq!(entries.expected("Comida"), Amount::parse("350"));
        assert_eq!(entries.expected("Gatos"), Amount::ZERO);
    }

    #[test]
    fn test_from_iter_dedups() {
        let entries: BudgetEntries = vec![
            BudgetEntry::new("A", Amount::parse("1")),
            BudgetEntry::new("B", Amount::parse("2")),
            BudgetEntry::new("A", Amount::parse("3")),
        ]
        .into_iter()
        .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.expected("A"), Amount::parse("3"));
    }

    #[test]
    fn test_serde() {
        let mut entries = BudgetEntries::new();
        entries.upsert("Comida", Amount::parse("300.5"));
        let json = serde_json::to_string(&entries).unwrap();
        assert_eq!(
            json,
            r#"[{"category":"Comida","expected":"300.5","real":"0"}]"#
        );
    }
}
