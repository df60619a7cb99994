use crate::api::Mode;
use crate::args::MetricsArgs;
use crate::commands::{ledger_store, Out};
use crate::error::{ErrorType, IntoResult};
use crate::model::{Month, PeriodTotals, Share, Summary};
use crate::{Config, Result};
use serde::Serialize;

/// The output of `budget metrics`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Metrics {
    pub summary: Summary,
    /// Every month that has transactions, plus the current month, newest first.
    pub available_months: Vec<Month>,
}

/// Computes the all-time, monthly and yearly totals and the top categories and payment methods.
///
/// # Errors
/// - `NotAuthenticated`, `RateLimited` or `Sheet` if the transactions cannot be read.
pub async fn metrics(config: Config, mode: Mode, args: MetricsArgs) -> Result<Out<Metrics>> {
    let ledger = ledger_store(&config, mode).await;
    let transactions = ledger.load().await.pub_result(ErrorType::Sheet)?;
    let month = args.month();
    let summary = transactions.summary(month);

    let mut available_months = transactions.available_months();
    let current = Month::current();
    if !available_months.contains(&current) {
        available_months.push(current);
    }
    available_months.sort_unstable_by(|a, b| b.cmp(a));

    let mut message = format!("Metrics for {month}");
    message.push_str(&totals_line("All time", summary.all_time()));
    message.push_str(&totals_line(&month.to_string(), summary.this_month()));
    message.push_str(&totals_line(&month.year().to_string(), summary.this_year()));
    message.push_str(&shares("Top income", summary.top_income()));
    message.push_str(&shares("Top expenses", summary.top_expenses()));
    message.push_str(&shares("Top payment methods", summary.top_payment_methods()));

    Ok(Out::new(
        message,
        Metrics {
            summary,
            available_months,
        },
    ))
}

fn totals_line(label: &str, totals: PeriodTotals) -> String {
    format!(
        "\n{label}: income {}, expenses {}, balance {}",
        totals.income().display(),
        totals.expenses().display(),
        totals.balance().display()
    )
}

fn shares(label: &str, shares: &[Share]) -> String {
    let mut out = format!("\n{label}:");
    if shares.is_empty() {
        out.push_str(" none");
    }
    for share in shares {
        out.push_str(&format!(
            "\n  {} {} ({}%)",
            share.name(),
            share.amount().display(),
            share.percent()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Amount;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_metrics_for_january() {
        let env = TestEnv::new().await;
        let out = metrics(
            env.config(),
            Mode::Testing,
            MetricsArgs::new(Some("2025-01".parse().unwrap())),
        )
        .await
        .unwrap();
        let metrics = out.structure().unwrap();
        let january = metrics.summary.this_month();
        assert_eq!(january.income(), Amount::parse("2650"));
        assert_eq!(january.expenses(), Amount::parse("1092.90"));
        assert_eq!(metrics.summary.top_expenses()[0].name(), "Alquiler");

        let months = &metrics.available_months;
        assert!(months.contains(&"2025-01".parse().unwrap()));
        assert!(months.contains(&"2025-02".parse().unwrap()));
        assert!(months.contains(&Month::current()));
        assert!(months.windows(2).all(|w| w[0] > w[1]));
    }

    #[tokio::test]
    async fn test_metrics_gives_up_when_rate_limited() {
        let env = TestEnv::new().await;
        let mut state = env.get_state();
        state.rate_limit_failures = 3;
        env.set_state(state);

        let e = metrics(env.config(), Mode::Testing, MetricsArgs::default())
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::RateLimited);
        assert_eq!(env.get_state().calls, 3);
    }
}
