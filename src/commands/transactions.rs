//! Handlers for `budget tx`.

use crate::api::Mode;
use crate::args::{AddArgs, DeleteArgs, ListArgs, UpdateArgs};
use crate::commands::{ledger_store, Out};
use crate::error::{ErrorType, IntoResult, Res};
use crate::model::{
    parse_date, Amount, BudgetCategories, Transaction, TransactionFilter, TransactionKind,
    TransactionUpdates,
};
use crate::{Config, Result};
use tracing::info;

/// Lists transactions, most recent first, narrowed by the criteria in `args`.
///
/// # Errors
/// - `NotAuthenticated`, `RateLimited` or `Sheet` if the transactions cannot be read.
pub async fn list_transactions(
    config: Config,
    mode: Mode,
    args: ListArgs,
) -> Result<Out<Vec<Transaction>>> {
    let ledger = ledger_store(&config, mode).await;
    let transactions = ledger.load().await.pub_result(ErrorType::Sheet)?;
    let filter = TransactionFilter {
        month: args.month(),
        category: args.category().map(String::from),
        kind: args.kind(),
        search: args.search().map(|(column, text)| (column, text.to_string())),
    };
    let found: Vec<Transaction> = transactions.filter(&filter).into_iter().cloned().collect();

    let mut message = format!("{} of {} transactions", found.len(), transactions.len());
    for t in &found {
        message.push_str(&format!("\n{}", line(t)));
    }
    Ok(Out::new(message, found))
}

/// Adds a transaction below the last non-empty row of the transactions sheet.
///
/// The amount is stored negative for expense categories and positive for income categories,
/// whatever sign was given. A category missing from `categories.json` needs `--kind`.
///
/// # Errors
/// - `Validation` if the date is not a date, the amount is zero or the kind cannot be decided.
/// - `NotAuthenticated`, `RateLimited` or `Sheet` if the row cannot be written.
pub async fn add_transaction(config: Config, mode: Mode, args: AddArgs) -> Result<Out<Transaction>> {
    let date = normalize_date(args.date()).pub_result(ErrorType::Validation)?;
    let category = args.category().trim();
    let amount = signed_amount(&config.categories(), category, args.kind(), args.amount())
        .pub_result(ErrorType::Validation)?;

    let mut transaction = Transaction::new(date, category, amount);
    if let Some(description) = args.description() {
        transaction = transaction.with_description(description);
    }
    if let Some(payment_method) = args.payment_method() {
        transaction = transaction.with_payment_method(payment_method);
    }
    if let Some(recorded_by) = args.recorded_by() {
        transaction = transaction.with_recorded_by(recorded_by);
    }

    let ledger = ledger_store(&config, mode).await;
    let added = ledger.add(transaction).await.pub_result(ErrorType::Sheet)?;
    info!("Added {}", line(&added));
    Ok(Out::new("Added 1 transaction", added))
}

/// Changes the fields given in `args` of the transaction at `args.row()`. When the category or
/// the amount changes, the sign of the amount is set again from the (possibly new) category.
///
/// # Errors
/// - `Validation` if there is no transaction at the row, or for the reasons `add_transaction`
///   gives.
/// - `NotAuthenticated`, `RateLimited` or `Sheet` if the row cannot be read or written.
pub async fn update_transaction(
    config: Config,
    mode: Mode,
    args: UpdateArgs,
) -> Result<Out<Transaction>> {
    let updates = TransactionUpdates {
        date: args
            .date()
            .map(normalize_date)
            .transpose()
            .pub_result(ErrorType::Validation)?,
        description: args.description().map(String::from),
        category: args.category().map(|c| c.trim().to_string()),
        amount: args.amount(),
        payment_method: args.payment_method().map(String::from),
        recorded_by: args.recorded_by().map(String::from),
    };
    let resign = updates.category.is_some() || updates.amount.is_some() || args.kind().is_some();
    let categories = config.categories();
    let kind = args.kind();

    let ledger = ledger_store(&config, mode).await;
    let updated = ledger
        .update_with(args.row(), |transaction| {
            transaction.apply(&updates);
            if resign {
                let amount = signed_amount(
                    &categories,
                    transaction.category(),
                    kind,
                    transaction.amount(),
                )?;
                transaction.apply(&TransactionUpdates {
                    amount: Some(amount),
                    ..Default::default()
                });
            }
            Ok(())
        })
        .await
        .pub_result(ErrorType::Sheet)?;
    Ok(Out::new(format!("Updated {}", line(&updated)), updated))
}

/// Empties the row of the transaction at `args.row()`. Other rows keep their numbers.
///
/// # Errors
/// - `Validation` if there is no transaction at the row.
/// - `NotAuthenticated`, `RateLimited` or `Sheet` if the row cannot be read or cleared.
pub async fn delete_transaction(
    config: Config,
    mode: Mode,
    args: DeleteArgs,
) -> Result<Out<Transaction>> {
    let ledger = ledger_store(&config, mode).await;
    let deleted = ledger.delete(args.row()).await.pub_result(ErrorType::Sheet)?;
    Ok(Out::new(format!("Deleted {}", line(&deleted)), deleted))
}

/// Decides the sign of `amount` from the kind of `category`. Categories that are not configured
/// take their kind from `kind`, and a `kind` that contradicts the configuration is rejected.
fn signed_amount(
    categories: &BudgetCategories,
    category: &str,
    kind: Option<TransactionKind>,
    amount: Amount,
) -> Res<Amount> {
    if category.is_empty() {
        return Err(ErrorType::Validation.err("The category is empty"));
    }
    if amount.is_zero() {
        return Err(ErrorType::Validation.err("The amount must not be zero"));
    }
    let configured = categories.get(category).map(|c| {
        if c.is_income() {
            TransactionKind::Income
        } else {
            TransactionKind::Expense
        }
    });
    let kind = match (configured, kind) {
        (Some(configured), Some(given)) if configured != given => {
            return Err(ErrorType::Validation.err(format!(
                "'{category}' is an {configured} category, not {given}"
            )))
        }
        (Some(configured), _) => configured,
        (None, Some(given)) => given,
        (None, None) => {
            return Err(ErrorType::Validation.err(format!(
                "'{category}' is not in the categories file, pass --kind income or --kind expense"
            )))
        }
    };
    Ok(amount.with_sign(kind == TransactionKind::Expense))
}

/// Accepts the date formats the sheet uses and writes them back as `YYYY-MM-DD`.
fn normalize_date(date: &str) -> Res<String> {
    parse_date(date)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .ok_or_else(|| ErrorType::Validation.err(format!("'{date}' is not a date")))
}

fn line(t: &Transaction) -> String {
    let row = t.row().map(|r| r.to_string()).unwrap_or_default();
    format!(
        "row {row}: {} {} {} {}",
        t.date_str(),
        t.category(),
        t.amount().display(),
        t.description()
    )
    .trim_end()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransactionColumn;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_list_with_filters() {
        let env = TestEnv::new().await;
        let all = list_transactions(env.config(), Mode::Testing, ListArgs::default())
            .await
            .unwrap();
        assert_eq!(all.structure().unwrap().len(), 10);

        let args = ListArgs::new(None, Some("Pathway".into()), None, None);
        let out = list_transactions(env.config(), Mode::Testing, args)
            .await
            .unwrap();
        let found = out.structure().unwrap();
        assert!(!found.is_empty());
        assert!(found.iter().all(|t| t.category() == "Pathway"));

        let args = ListArgs::new(
            None,
            None,
            Some(TransactionKind::Income),
            Some((TransactionColumn::Description, "PATHWAY".into())),
        );
        let out = list_transactions(env.config(), Mode::Testing, args)
            .await
            .unwrap();
        let found = out.structure().unwrap();
        assert_eq!(found.len(), 2);
        assert!(found
            .iter()
            .all(|t| t.is_income() && t.description().contains("Pathway")));
        // Most recent first.
        assert_eq!(found[0].row(), Some(10));
    }

    #[tokio::test]
    async fn test_add_sets_sign_from_category() {
        let env = TestEnv::new().await;
        let args = AddArgs::new("2025-02-03", "Comida", Amount::parse("45.90"))
            .with_description("Mercado")
            .with_recorded_by("Ana");
        let out = add_transaction(env.config(), Mode::Testing, args)
            .await
            .unwrap();
        let added = out.structure().unwrap();
        assert_eq!(added.amount(), Amount::parse("-45.90"));
        assert_eq!(added.row(), Some(12));

        let args = AddArgs::new("2/4/2025", "Mendel", Amount::parse("-300"));
        let out = add_transaction(env.config(), Mode::Testing, args)
            .await
            .unwrap();
        let added = out.structure().unwrap();
        assert_eq!(added.amount(), Amount::parse("300"));
        assert_eq!(added.date_str(), "2025-02-04");
        assert_eq!(added.row(), Some(13));

        let rows = env.get_state().rows("Transactions").unwrap();
        assert_eq!(rows.len(), 13);
        assert_eq!(rows[11][2], "Comida");
    }

    #[tokio::test]
    async fn test_add_rejects_bad_input() {
        let env = TestEnv::new().await;
        let bad = [
            AddArgs::new("yesterday", "Comida", Amount::parse("5")),
            AddArgs::new("2025-02-03", "Comida", Amount::ZERO),
            AddArgs::new("2025-02-03", "Regalos", Amount::parse("5")),
            AddArgs::new("2025-02-03", "Comida", Amount::parse("5"))
                .with_kind(TransactionKind::Income),
        ];
        for args in bad {
            let e = add_transaction(env.config(), Mode::Testing, args)
                .await
                .unwrap_err();
            assert_eq!(e.error_type(), ErrorType::Validation);
        }
        assert_eq!(env.get_state().rows("Transactions").unwrap().len(), 11);

        let args = AddArgs::new("2025-02-03", "Regalos", Amount::parse("5"))
            .with_kind(TransactionKind::Expense);
        let out = add_transaction(env.config(), Mode::Testing, args)
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap().amount(), Amount::parse("-5"));
    }

    #[tokio::test]
    async fn test_update_resigns_on_category_change() {
        let env = TestEnv::new().await;
        let before = list_transactions(env.config(), Mode::Testing, ListArgs::default())
            .await
            .unwrap();
        let pathway = before
            .structure()
            .unwrap()
            .iter()
            .find(|t| t.row() == Some(3))
            .unwrap()
            .clone();
        assert!(pathway.is_income());

        let args = UpdateArgs::new(3)
            .with_category("Salud")
            .with_description("Farmacia");
        let out = update_transaction(env.config(), Mode::Testing, args)
            .await
            .unwrap();
        let updated = out.structure().unwrap();
        assert_eq!(updated.category(), "Salud");
        assert_eq!(updated.amount(), pathway.amount().with_sign(true));
        assert_eq!(updated.date_str(), pathway.date_str());
        assert_eq!(updated.row(), Some(3));

        let e = update_transaction(env.config(), Mode::Testing, UpdateArgs::new(3).with_date("x"))
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
    }

    #[tokio::test]
    async fn test_delete() {
        let env = TestEnv::new().await;
        let out = delete_transaction(env.config(), Mode::Testing, DeleteArgs::new(3))
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap().category(), "Pathway");

        let e = delete_transaction(env.config(), Mode::Testing, DeleteArgs::new(3))
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);

        let rows = env.get_state().rows("Transactions").unwrap();
        assert!(rows[2].is_empty());
        assert_eq!(rows.len(), 11);
    }
}
