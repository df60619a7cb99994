//! Configuration file handling.
//!
//! The configuration file is stored at `$BUDGET_HOME/config.json` and contains the Google Sheet
//! URL, the names of the transactions and budget tabs, the retry policy and the location of the
//! access token. The budget categories live next to it in `$BUDGET_HOME/categories.json`.

use crate::api::RetryPolicy;
use crate::error::{ErrorType, IntoResult, Res};
use crate::model::BudgetCategories;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const APP_NAME: &str = "budget";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";
const CATEGORIES_JSON: &str = "categories.json";
const TRANSACTIONS_SHEET: &str = "Transactions";
const BUDGET_SHEET: &str = "Budgets";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$BUDGET_HOME` and from there it loads `$BUDGET_HOME/config.json` and the category
/// configuration. It provides paths to other items that are either configurable or are expected in
/// a certain location within the budget home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet_id: String,
    token_path: PathBuf,
    categories_path: PathBuf,
    categories: Arc<BudgetCategories>,
}

impl Config {
    /// Creates the data directory, its `.secrets` subdirectory, an initial `config.json` using
    /// `sheet_url` along with default settings, and a `categories.json` holding the default
    /// category set.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of data directory, e.g. `$HOME/budget`
    /// - `sheet_url` - The URL of the Google Sheet where the transactions and budgets are stored.
    ///   e.g. https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    ///
    /// # Errors
    /// - Returns an error if the URL is not a Google Sheets URL or any file operation fails.
    pub async fn create(dir: impl Into<PathBuf>, sheet_url: &str) -> Result<Self> {
        Self::create_inner(dir.into(), sheet_url)
            .await
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(maybe_relative: PathBuf, sheet_url: &str) -> Res<Self> {
        // Fail before touching the disk if the URL is unusable.
        let _ = extract_spreadsheet_id(sheet_url)?;

        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the budget home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;
        utils::make_dir(&root.join(SECRETS)).await?;

        let config_file = ConfigFile {
            sheet_url: sheet_url.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(root.join(CONFIG_JSON)).await?;

        let categories_path = root.join(CATEGORIES_JSON);
        if categories_path.is_file() {
            // Keep a category file that was put in place by hand.
            let _ = load_categories(&categories_path).await?;
        } else {
            let data = serde_json::to_string_pretty(&BudgetCategories::default_deployment())
                .context("Unable to serialize the budget categories")?;
            utils::write(&categories_path, data)
                .await
                .context("Unable to write the categories file")?;
        }

        Self::load_inner(root).await
    }

    /// This will
    /// - validate that `budget_home` exists and that the config file exists
    /// - load the config file and the category configuration
    /// - validate that the secrets directory exists
    /// - return the loaded configuration object
    pub async fn load(budget_home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(budget_home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(maybe_relative: PathBuf) -> Res<Self> {
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Budget home is missing, run 'budget init' first")?;
        let _ = utils::read_dir(&root)
            .await
            .context("Budget home is missing")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let spreadsheet_id = extract_spreadsheet_id(&config_file.sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();

        let secrets = root.join(SECRETS);
        if !secrets.is_dir() {
            bail!("The secrets directory is missing '{}'", secrets.display())
        }

        let token_path = resolve(&root, config_file.token_path());
        let categories_path = resolve(&root, config_file.categories_path());
        let categories = load_categories(&categories_path).await?;

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            spreadsheet_id,
            token_path,
            categories_path,
            categories: Arc::new(categories),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn sheet_url(&self) -> &str {
        &self.config_file.sheet_url
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn transactions_sheet(&self) -> &str {
        &self.config_file.transactions_sheet
    }

    pub fn budget_sheet(&self) -> &str {
        &self.config_file.budget_sheet
    }

    pub fn retry(&self) -> RetryPolicy {
        self.config_file.retry
    }

    /// The stored `token_path` if it is absolute, otherwise resolved against the home directory.
    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    pub fn categories_path(&self) -> &Path {
        &self.categories_path
    }

    pub fn categories(&self) -> Arc<BudgetCategories> {
        self.categories.clone()
    }
}

/// Checks if `p` is relative, and if so, resolves it against `root`.
fn resolve(root: &Path, p: PathBuf) -> PathBuf {
    if p.is_absolute() {
        return p;
    }
    root.join(p)
}

async fn load_categories(path: &Path) -> Res<BudgetCategories> {
    utils::deserialize::<BudgetCategories>(path)
        .await
        .map_err(|e| ErrorType::Config.err(format!("Invalid budget categories: {e:#}")))
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "budget",
///   "config_version": 1,
///   "sheet_url": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
///   "transactions_sheet": "Transactions",
///   "budget_sheet": "Budgets",
///   "retry": { "attempts": 3, "base_delay_ms": 500 },
///   "token_path": ".secrets/token.json"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "budget"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// URL to the Google Sheet
    sheet_url: String,

    /// The tab holding the transaction ledger
    #[serde(default = "default_transactions_sheet")]
    transactions_sheet: String,

    /// The tab holding the monthly budgets
    #[serde(default = "default_budget_sheet")]
    budget_sheet: String,

    /// Backoff for rate limited calls
    #[serde(default)]
    retry: RetryPolicy,

    /// Path to the access token file (optional, relative to $BUDGET_HOME or absolute)
    /// Defaults to $BUDGET_HOME/.secrets/token.json if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,

    /// Path to the category configuration (optional, relative to $BUDGET_HOME or absolute)
    /// Defaults to $BUDGET_HOME/categories.json if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    categories_path: Option<PathBuf>,
}

fn default_transactions_sheet() -> String {
    TRANSACTIONS_SHEET.to_string()
}

fn default_budget_sheet() -> String {
    BUDGET_SHEET.to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sheet_url: String::new(),
            transactions_sheet: default_transactions_sheet(),
            budget_sheet: default_budget_sheet(),
            retry: RetryPolicy::default(),
            token_path: None,
            categories_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.transactions_sheet != config.budget_sheet,
            "The transactions and budget sheets must be different tabs, both are '{}'",
            config.budget_sheet
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    /// If None, defaults to $BUDGET_HOME/.secrets/token.json
    fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }

    /// If None, defaults to $BUDGET_HOME/categories.json
    fn categories_path(&self) -> PathBuf {
        self.categories_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(CATEGORIES_JSON))
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL
///
/// # Arguments
/// * `url` - The Google Sheets URL (e.g., "https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...")
///
/// # Returns
/// The spreadsheet ID or an error if the URL format is invalid.
fn extract_spreadsheet_id(url: &str) -> Res<&str> {
    // URL format: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...
    // or: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID?foo=bar
    let parts: Vec<&str> = url.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            let id_part = parts[i + 1];
            let id = id_part
                .split(['?', '#'])
                .next()
                .unwrap_or(id_part);
            if id.is_empty() {
                break;
            }
            return Ok(id);
        }
    }
    Err(ErrorType::Config.err(format!(
        "Invalid Google Sheets URL '{url}'. Expected: \
        https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    )))
}
