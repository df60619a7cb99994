//! The budget category configuration: which categories exist, how they are classified, and how
//! the computed categories are derived from income.

use crate::error::{ErrorType, Res};
use crate::model::{Amount, CategoryTotals};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The classification of a budget category.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    VariableIncome,
    FixedIncome,
    VariableExpense,
    FixedExpense,
}

serde_plain::derive_display_from_serialize!(CategoryKind);
serde_plain::derive_fromstr_from_deserialize!(CategoryKind);

impl CategoryKind {
    pub fn is_income(&self) -> bool {
        matches!(self, CategoryKind::VariableIncome | CategoryKind::FixedIncome)
    }
}

/// One income category's weight in a `DerivedFormula::Weighted` sum.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Contribution {
    pub source: String,
    pub rate: Decimal,
}

impl Contribution {
    pub fn new(source: impl Into<String>, rate: Decimal) -> Self {
        Self {
            source: source.into(),
            rate,
        }
    }
}

/// How a computed category's expected amount is derived from the month's real income.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DerivedFormula {
    /// `rate` times the real amount of every income category that is not a carry-forward.
    IncomeShare { rate: Decimal },
    /// The sum of `rate` times the real amount of each listed source category.
    Weighted { contributions: Vec<Contribution> },
}

/// The configuration of a single budget category.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CategoryConfig {
    name: String,
    kind: CategoryKind,
    #[serde(default = "default_true")]
    editable: bool,
    /// A balance brought over from the previous period. It is income shaped but is left out of
    /// the income rollups.
    #[serde(default, skip_serializing_if = "is_false")]
    carry_forward: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    formula: Option<DerivedFormula>,
}

fn default_true() -> bool {
    true
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl CategoryConfig {
    /// An editable category.
    pub fn new(name: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            name: name.into(),
            kind,
            editable: true,
            carry_forward: false,
            formula: None,
        }
    }

    /// A computed category. It is never editable.
    pub fn computed(name: impl Into<String>, kind: CategoryKind, formula: DerivedFormula) -> Self {
        Self {
            name: name.into(),
            kind,
            editable: false,
            carry_forward: false,
            formula: Some(formula),
        }
    }

    pub fn with_carry_forward(mut self) -> Self {
        self.carry_forward = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CategoryKind {
        self.kind
    }

    pub fn is_income(&self) -> bool {
        self.kind.is_income()
    }

    pub fn is_editable(&self) -> bool {
        self.editable && self.formula.is_none()
    }

    pub fn is_computed(&self) -> bool {
        self.formula.is_some()
    }

    pub fn is_carry_forward(&self) -> bool {
        self.carry_forward
    }

    pub fn formula(&self) -> Option<&DerivedFormula> {
        self.formula.as_ref()
    }
}

/// The ordered, validated set of budget categories. Built once and shared read-only.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CategoriesFile", into = "CategoriesFile")]
pub struct BudgetCategories {
    categories: Vec<CategoryConfig>,
    index: HashMap<String, usize>,
}

/// The on-disk shape of `categories.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CategoriesFile {
    categories: Vec<CategoryConfig>,
}

impl TryFrom<CategoriesFile> for BudgetCategories {
    type Error = anyhow::Error;

    fn try_from(value: CategoriesFile) -> Result<Self, Self::Error> {
        BudgetCategories::new(value.categories)
    }
}

impl From<BudgetCategories> for CategoriesFile {
    fn from(value: BudgetCategories) -> Self {
        CategoriesFile {
            categories: value.categories,
        }
    }
}

impl BudgetCategories {
    /// Validates and indexes `categories`.
    ///
    /// # Errors
    /// - Duplicate or blank names
    /// - A carry-forward category that is not income
    /// - A computed category that is income, or whose formula refers to an unknown category, a
    ///   non-income category, or a computed category
    pub fn new(categories: Vec<CategoryConfig>) -> Res<Self> {
        let mut index = HashMap::new();
        for (ix, c) in categories.iter().enumerate() {
            if c.name.trim().is_empty() {
                return Err(ErrorType::Config.err("A budget category has a blank name"));
            }
            if index.insert(c.name.clone(), ix).is_some() {
                return Err(ErrorType::Config.err(format!(
                    "The budget category '{}' is configured more than once",
                    c.name
                )));
            }
        }

        for c in &categories {
            if c.carry_forward && !c.is_income() {
                return Err(ErrorType::Config.err(format!(
                    "The carry-forward category '{}' must be an income category",
                    c.name
                )));
            }
            let Some(formula) = &c.formula else {
                continue;
            };
            if c.is_income() {
                return Err(ErrorType::Config.err(format!(
                    "The computed category '{}' must be an expense category",
                    c.name
                )));
            }
            if let DerivedFormula::Weighted { contributions } = formula {
                for contribution in contributions {
                    let source = index
                        .get(&contribution.source)
                        .map(|&ix| &categories[ix])
                        .ok_or_else(|| {
                            ErrorType::Config.err(format!(
                                "The formula of '{}' refers to the unknown category '{}'",
                                c.name, contribution.source
                            ))
                        })?;
                    if !source.is_income() || source.is_computed() {
                        return Err(ErrorType::Config.err(format!(
                            "The formula of '{}' may only use income categories, '{}' is not one",
                            c.name, contribution.source
                        )));
                    }
                }
            }
        }

        Ok(Self { categories, index })
    }

    pub fn get(&self, name: &str) -> Option<&CategoryConfig> {
        self.index.get(name).map(|&ix| &self.categories[ix])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All categories in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &CategoryConfig> {
        self.categories.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Income categories that count toward the income rollups.
    pub fn rollup_income(&self) -> impl Iterator<Item = &CategoryConfig> {
        self.categories
            .iter()
            .filter(|c| c.is_income() && !c.carry_forward)
    }

    /// All expense categories, computed ones included.
    pub fn expenses(&self) -> impl Iterator<Item = &CategoryConfig> {
        self.categories.iter().filter(|c| !c.is_income())
    }

    /// Evaluates `formula` against the real amounts of a month.
    pub fn derive(&self, formula: &DerivedFormula, real: &CategoryTotals) -> Amount {
        let value: Decimal = match formula {
            DerivedFormula::IncomeShare { rate } => {
                let income: Amount = self.rollup_income().map(|c| real.get(c.name())).sum();
                income.value().saturating_mul(*rate)
            }
            DerivedFormula::Weighted { contributions } => contributions
                .iter()
                .map(|c| real.get(&c.source).value().saturating_mul(c.rate))
                .fold(Decimal::ZERO, Decimal::saturating_add),
        };
        Amount::new(value.normalize())
    }

    /// The category set of the household this program was written for: five income categories
    /// (one of which carries the previous balance forward), a 10% tithe, a savings carve-out and
    /// ten editable expense categories.
    pub fn default_deployment() -> Self {
        use CategoryKind::*;
        let five_percent = Decimal::new(5, 2);
        let categories = vec![
            CategoryConfig::new(SALDO_ANTERIOR, VariableIncome).with_carry_forward(),
            CategoryConfig::new(PATHWAY, VariableIncome),
            CategoryConfig::new(FUNVAL, FixedIncome),
            CategoryConfig::new(MENDEL, VariableIncome),
            CategoryConfig::new(INGRESOS_EXTRA, VariableIncome),
            CategoryConfig::computed(
                DIEZMO,
                VariableExpense,
                DerivedFormula::IncomeShare {
                    rate: Decimal::new(10, 2),
                },
            ),
            CategoryConfig::computed(
                AHORROS,
                VariableExpense,
                DerivedFormula::Weighted {
                    contributions: vec![
                        Contribution::new(PATHWAY, Decimal::ONE),
                        Contribution::new(FUNVAL, five_percent),
                        Contribution::new(MENDEL, five_percent),
                    ],
                },
            ),
            CategoryConfig::new("Ayuno", FixedExpense),
            CategoryConfig::new("Alquiler", FixedExpense),
            CategoryConfig::new("Servicios", VariableExpense),
            CategoryConfig::new("Comida", VariableExpense),
            CategoryConfig::new("Salud", VariableExpense),
            CategoryConfig::new("Transporte", VariableExpense),
            CategoryConfig::new("Artículos de Hogar", VariableExpense),
            CategoryConfig::new("Gatos", VariableExpense),
            CategoryConfig::new("Gastos personales", VariableExpense),
            CategoryConfig::new("FE Extrafamiliar", VariableExpense),
        ];
        let index = categories
            .iter()
            .enumerate()
            .map(|(ix, c)| (c.name.clone(), ix))
            .collect();
        Self { categories, index }
    }
}

const SALDO_ANTERIOR: &str = "Saldo Anterior";
const PATHWAY: &str = "Pathway";
const FUNVAL: &str = "Funval";
const MENDEL: &str = "Mendel";
const INGRESOS_EXTRA: &str = "Ingresos Extra";
const DIEZMO: &str = "Diezmo";
const AHORROS: &str = "Ahorros";

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn amt(s: &str) -> Amount {
        Amount::parse(s)
    }

    #[test]
    fn test_default_deployment() {
        let categories = BudgetCategories::default_deployment();
        assert_eq!(categories.len(), 17);
        let validated = BudgetCategories::new(categories.iter().cloned().collect()).unwrap();
        assert_eq!(validated, categories);
        let diezmo = categories.get("Diezmo").unwrap();
        assert!(diezmo.is_computed());
        assert!(!diezmo.is_editable());
        assert!(!diezmo.is_income());
        assert!(categories.get("Saldo Anterior").unwrap().is_carry_forward());
        let rollup: Vec<&str> = categories.rollup_income().map(|c| c.name()).collect();
        assert_eq!(rollup, vec!["Pathway", "Funval", "Mendel", "Ingresos Extra"]);
    }

    #[test]
    fn test_derive_default_formulas() {
        let categories = BudgetCategories::default_deployment();
        let mut real = CategoryTotals::new();
        real.add("Pathway", amt("1000"));
        real.add("Funval", amt("200"));
        real.add("Mendel", amt("200"));
        real.add("Saldo Anterior", amt("5000"));
        real.add("Comida", amt("75"));

        let diezmo = categories.get("Diezmo").unwrap().formula().unwrap();
        assert_eq!(categories.derive(diezmo, &real), amt("140"));
        let ahorros = categories.get("Ahorros").unwrap().formula().unwrap();
        assert_eq!(categories.derive(ahorros, &real), amt("1020"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let e = BudgetCategories::new(vec![
            CategoryConfig::new("A", CategoryKind::FixedIncome),
            CategoryConfig::new("A", CategoryKind::FixedExpense),
        ])
        .unwrap_err();
        assert_eq!(ErrorType::of(&e), Some(ErrorType::Config));
    }

    #[test]
    fn test_formula_sources_must_be_income() {
        let result = BudgetCategories::new(vec![
            CategoryConfig::new("Food", CategoryKind::VariableExpense),
            CategoryConfig::computed(
                "Savings",
                CategoryKind::VariableExpense,
                DerivedFormula::Weighted {
                    contributions: vec![Contribution::new("Food", Decimal::ONE)],
                },
            ),
        ]);
        assert!(result.is_err());

        let result = BudgetCategories::new(vec![CategoryConfig::computed(
            "Savings",
            CategoryKind::VariableExpense,
            DerivedFormula::Weighted {
                contributions: vec![Contribution::new("Missing", Decimal::ONE)],
            },
        )]);
        assert!(result.is_err());
    }

    #[test]
    fn test_computed_income_rejected() {
        let result = BudgetCategories::new(vec![CategoryConfig::computed(
            "Bonus",
            CategoryKind::FixedIncome,
            DerivedFormula::IncomeShare { rate: Decimal::ONE },
        )]);
        assert!(result.is_err());
    }

    #[test]
    fn test_carry_forward_must_be_income() {
        let result = BudgetCategories::new(vec![CategoryConfig::new(
            "Old",
            CategoryKind::FixedExpense,
        )
        .with_carry_forward()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_categories_json() {
        let json = r#"{
            "categories": [
                {"name": "Salary", "kind": "fixed_income"},
                {"name": "Tithe", "kind": "variable_expense", "formula": {"type": "income_share", "rate": "0.1"}},
                {"name": "Rent", "kind": "fixed_expense"}
            ]
        }"#;
        let categories: BudgetCategories = serde_json::from_str(json).unwrap();
        assert_eq!(categories.len(), 3);
        assert!(categories.get("Rent").unwrap().is_editable());
        assert!(!categories.get("Tithe").unwrap().is_editable());
        assert_eq!(
            categories.get("Tithe").unwrap().formula(),
            Some(&DerivedFormula::IncomeShare {
                rate: Decimal::from_str("0.1").unwrap()
            })
        );

        let back = serde_json::to_string(&categories).unwrap();
        let again: BudgetCategories = serde_json::from_str(&back).unwrap();
        assert_eq!(categories, again);
    }

    #[test]
    fn test_categories_json_rejects_invalid() {
        let json = r#"{"categories": [{"name": "A", "kind": "fixed_income"}, {"name": "A", "kind": "fixed_income"}]}"#;
        assert!(serde_json::from_str::<BudgetCategories>(json).is_err());
    }
}
