//! Reads and writes transaction records on the transactions tab.

use crate::api::RowStore;
use crate::error::{ErrorType, Res};
use crate::model::{Transaction, TransactionColumn, TransactionUpdates, Transactions};
use tracing::{debug, info};

/// The transaction ledger stored on one tab of the spreadsheet.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    store: RowStore,
    sheet_name: String,
}

impl LedgerStore {
    pub fn new(store: RowStore, sheet_name: impl Into<String>) -> Self {
        Self {
            store,
            sheet_name: sheet_name.into(),
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Reads every transaction. A missing tab is an empty ledger.
    pub async fn load(&self) -> Res<Transactions> {
        match self.store.read_all(&self.sheet_name).await {
            Ok(rows) => Transactions::parse(rows),
            Err(e) if ErrorType::of(&e) == Some(ErrorType::TableMissing) => {
                debug!("The {} sheet does not exist yet", self.sheet_name);
                Transactions::parse(Vec::<Vec<String>>::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Appends `transaction` and returns it with its row number. The tab is created with the
    /// default headers when it does not exist.
    ///
    /// The header row comes from the same read that finds the next free row.
    pub async fn add(&self, transaction: Transaction) -> Res<Transaction> {
        let appended = self
            .store
            .append_with(&self.sheet_name, |rows| {
                let header_row = rows.iter().take(1).map(|row| row.iter().map(String::as_str));
                let headers = Transactions::parse(header_row)?.mapping().header_strings();
                Ok(transaction.to_row(&headers))
            })
            .await;
        let row = match appended {
            Ok(row) => row,
            Err(e) if ErrorType::of(&e) == Some(ErrorType::TableMissing) => {
                info!("Creating the {} sheet", self.sheet_name);
                let headers = TransactionColumn::default_headers();
                self.store.create_table(&self.sheet_name, &headers).await?;
                self.store
                    .append(&self.sheet_name, transaction.to_row(&headers))
                    .await?
            }
            Err(e) => return Err(e),
        };
        Ok(transaction.with_row(row))
    }

    /// Applies `updates` to the transaction at `row` and writes it back in place.
    pub async fn update(&self, row: usize, updates: &TransactionUpdates) -> Res<Transaction> {
        self.update_with(row, |transaction| {
            transaction.apply(updates);
            Ok(())
        })
        .await
    }

    /// Lets `change` modify the transaction at `row` and writes the result back in place. Nothing
    /// is written when `change` fails.
    pub async fn update_with<F>(&self, row: usize, change: F) -> Res<Transaction>
    where
        F: FnOnce(&mut Transaction) -> Res<()>,
    {
        let transactions = self.load().await?;
        let mut transaction = find(&transactions, row)?.clone();
        change(&mut transaction)?;
        let headers = transactions.mapping().header_strings();
        self.store
            .update(&self.sheet_name, row, transaction.to_row(&headers))
            .await?;
        Ok(transaction)
    }

    /// Empties the row of the transaction at `row` and returns what was removed.
    pub async fn delete(&self, row: usize) -> Res<Transaction> {
        let transactions = self.load().await?;
        let transaction = find(&transactions, row)?.clone();
        self.store
            .clear(&self.sheet_name, row, transactions.mapping().len())
            .await?;
        Ok(transaction)
    }
}

fn find(transactions: &Transactions, row: usize) -> Res<&Transaction> {
    transactions
        .get_row(row)
        .ok_or_else(|| ErrorType::Validation.err(format!("There is no transaction at row {row}")))
}
