use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories and:
/// - Creates an initial `config.json` file using `sheet_url` along with default settings
/// - Writes `categories.json` with the default budget categories, unless one already exists
///
/// # Arguments
/// - `budget_home` - The directory that will be the root of data directory, e.g. `$HOME/budget`
/// - `sheet_url` - The URL of the Google Sheet where the transactions and budgets are stored.
///   e.g.https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
///
/// # Errors
/// - Returns a `Config` error if the URL is not a Google Sheets URL or any file operation fails.
pub async fn init(budget_home: &Path, sheet_url: &str) -> Result<Out<()>> {
    let config = Config::create(budget_home, sheet_url)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Successfully created the budget directory at {}. Next, provide an access token with \
        'budget auth set-token'",
        config.root().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_then_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("budget");
        let url = "https://docs.google.com/spreadsheets/d/abc123XYZ/edit";
        init(&home, url).await.unwrap();

        let config = Config::load(&home).await.unwrap();
        assert_eq!(config.spreadsheet_id(), "abc123XYZ");
        assert!(config.categories_path().is_file());
    }

    #[tokio::test]
    async fn test_init_rejects_bad_url() {
        let dir = TempDir::new().unwrap();
        let e = init(&dir.path().join("budget"), "https://example.com/nope")
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Config);
    }
}
