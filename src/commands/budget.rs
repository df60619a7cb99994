//! Handlers for `budget budget`.

use crate::api::Mode;
use crate::args::{MonthArgs, SetArgs};
use crate::budget::{BudgetReport, Reconciler};
use crate::commands::{stores, Out};
use crate::error::{ErrorType, IntoResult};
use crate::model::Month;
use crate::{Config, Result};
use tracing::debug;

/// Shows the expected and real amount of every category for a month, with the income and
/// expense totals. A month without a saved budget shows zero expected amounts.
///
/// # Errors
/// - `NotAuthenticated`, `RateLimited` or `Sheet` if the sheet cannot be read.
pub async fn budget_show(config: Config, mode: Mode, args: MonthArgs) -> Result<Out<BudgetReport>> {
    let mut reconciler = reconciler(&config, mode, args.month()).await?;
    let report = reconciler.load().await.pub_result(ErrorType::Sheet)?.report();
    Ok(Out::new(render(&report), report))
}

/// Sets the expected amounts given in `args` and saves the month's budget. Categories that are not
/// mentioned keep their expected amount.
///
/// # Errors
/// - `Validation` if a category is unknown or computed. Nothing is saved in that case.
/// - `Conflict` if the same month is being saved by another call.
/// - `NotAuthenticated`, `RateLimited` or `Sheet` if the sheet cannot be read or written.
pub async fn budget_set(config: Config, mode: Mode, args: SetArgs) -> Result<Out<BudgetReport>> {
    let mut reconciler = reconciler(&config, mode, args.month()).await?;
    reconciler.load().await.pub_result(ErrorType::Sheet)?;
    reconciler.begin_edit().pub_result(ErrorType::Validation)?;

    let mut rejected = Vec::new();
    for expected in args.expected() {
        if !reconciler.edit(expected.category(), expected.amount()) {
            rejected.push(expected.category());
        }
    }
    if !rejected.is_empty() {
        reconciler.cancel_edit().pub_result(ErrorType::Internal)?;
        return Err(ErrorType::Validation
            .err(format!(
                "These categories cannot be set: {}. Computed categories are derived from income",
                rejected.join(", ")
            ))
            .into());
    }

    reconciler.save().await.pub_result(ErrorType::Sheet)?;
    let report = reconciler
        .current()
        .map(|budget| budget.report())
        .ok_or_else(|| ErrorType::Internal.err(format!("{} is not loaded", args.month())))
        .pub_result(ErrorType::Internal)?;
    Ok(Out::new(
        format!("Saved the budget for {}\n{}", args.month(), render(&report)),
        report,
    ))
}

/// Lists the months that have a saved budget, oldest first.
///
/// # Errors
/// - `NotAuthenticated`, `RateLimited` or `Sheet` if the budget sheet cannot be read.
pub async fn budget_months(config: Config, mode: Mode) -> Result<Out<Vec<Month>>> {
    let (_, store) = stores(&config, mode).await;
    let months = store
        .list_budget_months()
        .await
        .pub_result(ErrorType::Sheet)?;
    let message = if months.is_empty() {
        "No budgets have been saved".to_string()
    } else {
        months
            .iter()
            .map(Month::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    };
    Ok(Out::new(message, months))
}

async fn reconciler(config: &Config, mode: Mode, month: Month) -> Result<Reconciler> {
    let (ledger, store) = stores(config, mode).await;
    let transactions = ledger.load().await.pub_result(ErrorType::Sheet)?;
    debug!("Loaded {} transactions", transactions.len());
    Ok(Reconciler::new(
        store,
        config.categories(),
        transactions,
        month,
    ))
}

/// A plain text table of `report`.
fn render(report: &BudgetReport) -> String {
    let width = report
        .lines
        .iter()
        .map(|line| line.category.chars().count())
        .max()
        .unwrap_or(0)
        + 2;
    let mut out = format!(
        "Budget for {}\n{:width$}  {:>14}  {:>14}  {:>14}",
        report.month, "Category", "Expected", "Real", "Variance"
    );
    for line in &report.lines {
        let marker = if line.editable { "" } else { " *" };
        let name = format!("{}{marker}", line.category);
        out.push_str(&format!(
            "\n{name:width$}  {:>14}  {:>14}  {:>14}",
            line.expected.display().to_string(),
            line.real.display().to_string(),
            line.variance.display().to_string(),
        ));
    }
    let totals = &report.totals;
    out.push_str(&format!(
        "\nIncome:   expected {}, real {}, variance {}",
        totals.income_expected.display(),
        totals.income_real.display(),
        totals.income_variance().display()
    ));
    out.push_str(&format!(
        "\nExpenses: expected {}, real {}, variance {}",
        totals.expenses_expected.display(),
        totals.expenses_real.display(),
        totals.expense_variance().display()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ExpectedArg;
    use crate::model::Amount;
    use crate::test::TestEnv;

    fn january() -> Month {
        "2025-01".parse().unwrap()
    }

    fn line<'a>(report: &'a BudgetReport, category: &str) -> &'a crate::budget::BudgetLine {
        report
            .lines
            .iter()
            .find(|l| l.category == category)
            .unwrap()
    }

    #[tokio::test]
    async fn test_show_without_budget() {
        let env = TestEnv::new().await;
        let out = budget_show(env.config(), Mode::Testing, MonthArgs::new(Some(january())))
            .await
            .unwrap();
        let report = out.structure().unwrap();
        assert_eq!(report.lines.len(), env.config().categories().len());
        assert_eq!(line(report, "Comida").expected, Amount::ZERO);
        assert_eq!(line(report, "Pathway").real, Amount::parse("1000"));
        // 10% of the January income, leaving out the carried-over balance.
        assert_eq!(line(report, "Diezmo").expected, Amount::parse("140"));
        assert!(out.message().contains("Diezmo *"));
    }

    #[tokio::test]
    async fn test_set_then_show_and_months() {
        let env = TestEnv::new().await;
        let args = SetArgs::new(
            january(),
            vec![
                ExpectedArg::new("Comida", Amount::parse("650")),
                ExpectedArg::new("Alquiler", Amount::parse("-800")),
            ],
        );
        let out = budget_set(env.config(), Mode::Testing, args).await.unwrap();
        let report = out.structure().unwrap();
        assert_eq!(line(report, "Comida").expected, Amount::parse("650"));
        assert_eq!(line(report, "Alquiler").expected, Amount::parse("800"));

        let out = budget_show(env.config(), Mode::Testing, MonthArgs::new(Some(january())))
            .await
            .unwrap();
        let report = out.structure().unwrap();
        assert_eq!(line(report, "Comida").expected, Amount::parse("650"));
        assert_eq!(line(report, "Servicios").expected, Amount::ZERO);

        let months = budget_months(env.config(), Mode::Testing).await.unwrap();
        assert_eq!(months.structure().unwrap(), &vec![january()]);
    }

    #[tokio::test]
    async fn test_set_rejects_computed_category() {
        let env = TestEnv::new().await;
        let args = SetArgs::new(
            january(),
            vec![
                ExpectedArg::new("Comida", Amount::parse("650")),
                ExpectedArg::new("Diezmo", Amount::parse("10")),
            ],
        );
        let e = budget_set(env.config(), Mode::Testing, args)
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
        assert!(e.to_string().contains("Diezmo"));

        // Nothing was saved.
        assert!(env.get_state().rows("Budgets").is_none());
        let months = budget_months(env.config(), Mode::Testing).await.unwrap();
        assert!(months.structure().unwrap().is_empty());
    }
}
