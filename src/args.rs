//! These structs provide the CLI interface for the budget CLI.

use crate::model::{Amount, Month, TransactionColumn, TransactionKind};
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// budget: Record income and expenses in a Google sheet and compare them with monthly budgets.
///
/// Transactions are kept on one tab of the sheet and the monthly budgets on another. For every
/// month the budgeted ("expected") amount of each category is shown next to the real amount found
/// in the transactions. The tithe and savings categories are derived from the month's income.
///
/// Run `budget init` first, then hand over a Google access token with `budget auth set-token`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration files.
    ///
    /// This is the first command you should run. Decide what directory you want to store the
    /// configuration in and pass it as --budget-home, by default it is $HOME/budget. Pass the URL
    /// of your Google sheet as --sheet-url.
    ///
    /// A categories.json file with the default budget categories is written next to config.json.
    /// Edit it to change the categories and the tithe and savings formulas.
    Init(InitArgs),
    /// Manage the Google access token.
    Auth(AuthArgs),
    /// List, add, update and delete transactions.
    Tx(TxArgs),
    /// Show and edit monthly budgets.
    Budget(BudgetArgs),
    /// Show income and expense totals, by category and by payment method.
    Metrics(MetricsArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the configuration is held. Defaults to ~/budget
    #[arg(long, env = "BUDGET_HOME", default_value_t = default_budget_home())]
    budget_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, budget_home: PathBuf) -> Self {
        Self {
            log_level,
            budget_home: budget_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn budget_home(&self) -> &DisplayPath {
        &self.budget_home
    }
}

/// (Not shown): Args for the `budget init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL to your Google sheet. It looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long)]
    sheet_url: String,
}

impl InitArgs {
    pub fn new(sheet_url: impl Into<String>) -> Self {
        Self {
            sheet_url: sheet_url.into(),
        }
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }
}

/// (Not shown): Args for the `budget auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    #[command(subcommand)]
    command: AuthCommand,
}

impl AuthArgs {
    pub fn new(command: AuthCommand) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &AuthCommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommand {
    /// Store an OAuth access token for the Google Sheets API.
    ///
    /// The token is written to $BUDGET_HOME/.secrets/token.json, readable only by you.
    SetToken(SetTokenArgs),
    /// Report whether a usable access token is stored.
    Status,
}

/// (Not shown): Args for the `budget auth set-token` command.
#[derive(Debug, Parser, Clone)]
pub struct SetTokenArgs {
    /// The access token.
    #[arg(long, env = "BUDGET_ACCESS_TOKEN", hide_env_values = true)]
    token: String,

    /// The number of seconds until the token expires. Without it the token is assumed to stay
    /// valid.
    #[arg(long)]
    expires_in: Option<u64>,
}

impl SetTokenArgs {
    pub fn new(token: impl Into<String>, expires_in: Option<u64>) -> Self {
        Self {
            token: token.into(),
            expires_in,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }
}

/// (Not shown): Args for the `budget tx` command.
#[derive(Debug, Parser, Clone)]
pub struct TxArgs {
    #[command(subcommand)]
    command: TxCommand,
}

impl TxArgs {
    pub fn new(command: TxCommand) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &TxCommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum TxCommand {
    /// List transactions, most recent first.
    List(ListArgs),
    /// Add a transaction below the last row of the transactions sheet.
    ///
    /// The sign of the amount follows the category: expenses are stored as negative amounts and
    /// income as positive amounts, whatever sign is given.
    Add(AddArgs),
    /// Change fields of the transaction stored at a row.
    Update(UpdateArgs),
    /// Empty the row of a transaction. The rows below it keep their numbers.
    Delete(DeleteArgs),
}

/// (Not shown): Args for the `budget tx list` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct ListArgs {
    /// Only transactions dated in this month, e.g. 2025-01.
    #[arg(long)]
    month: Option<Month>,

    /// Only transactions of this category.
    #[arg(long)]
    category: Option<String>,

    /// Only income or only expenses.
    #[arg(long)]
    kind: Option<TransactionKind>,

    /// The column searched by --search: date, description, category, amount, payment_method or
    /// recorded_by.
    #[arg(long, default_value_t = TransactionColumn::Description, requires = "search")]
    column: TransactionColumn,

    /// Only transactions whose --column contains this text, ignoring case.
    #[arg(long)]
    search: Option<String>,
}

impl ListArgs {
    pub fn new(
        month: Option<Month>,
        category: Option<String>,
        kind: Option<TransactionKind>,
        search: Option<(TransactionColumn, String)>,
    ) -> Self {
        let (column, search) = match search {
            Some((column, text)) => (column, Some(text)),
            None => (TransactionColumn::Description, None),
        };
        Self {
            month,
            category,
            kind,
            column,
            search,
        }
    }

    pub fn month(&self) -> Option<Month> {
        self.month
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn kind(&self) -> Option<TransactionKind> {
        self.kind
    }

    pub fn search(&self) -> Option<(TransactionColumn, &str)> {
        self.search.as_deref().map(|text| (self.column, text))
    }
}

/// (Not shown): Args for the `budget tx add` command.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// The date, e.g. 2025-01-31.
    #[arg(long)]
    date: String,

    /// The category, e.g. Comida.
    #[arg(long)]
    category: String,

    /// The amount, e.g. 125.50 or "S/ 1.250,00".
    #[arg(long, allow_hyphen_values = true)]
    amount: Amount,

    /// Whether this is income or an expense. Only needed for categories that are not in
    /// categories.json.
    #[arg(long)]
    kind: Option<TransactionKind>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    payment_method: Option<String>,

    /// Who recorded the transaction.
    #[arg(long)]
    recorded_by: Option<String>,
}

impl AddArgs {
    pub fn new(date: impl Into<String>, category: impl Into<String>, amount: Amount) -> Self {
        Self {
            date: date.into(),
            category: category.into(),
            amount,
            kind: None,
            description: None,
            payment_method: None,
            recorded_by: None,
        }
    }

    pub fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_payment_method(mut self, payment_method: impl Into<String>) -> Self {
        self.payment_method = Some(payment_method.into());
        self
    }

    pub fn with_recorded_by(mut self, recorded_by: impl Into<String>) -> Self {
        self.recorded_by = Some(recorded_by.into());
        self
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn kind(&self) -> Option<TransactionKind> {
        self.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    pub fn recorded_by(&self) -> Option<&str> {
        self.recorded_by.as_deref()
    }
}

/// (Not shown): Args for the `budget tx update` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct UpdateArgs {
    /// The sheet row of the transaction, as shown by `budget tx list`.
    #[arg(long)]
    row: usize,

    #[arg(long)]
    date: Option<String>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    amount: Option<Amount>,

    /// Whether this is income or an expense. Only needed for categories that are not in
    /// categories.json.
    #[arg(long)]
    kind: Option<TransactionKind>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    payment_method: Option<String>,

    #[arg(long)]
    recorded_by: Option<String>,
}

impl UpdateArgs {
    pub fn new(row: usize) -> Self {
        Self {
            row,
            ..Default::default()
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn amount(&self) -> Option<Amount> {
        self.amount
    }

    pub fn kind(&self) -> Option<TransactionKind> {
        self.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    pub fn recorded_by(&self) -> Option<&str> {
        self.recorded_by.as_deref()
    }
}

/// (Not shown): Args for the `budget tx delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    /// The sheet row of the transaction, as shown by `budget tx list`.
    #[arg(long)]
    row: usize,
}

impl DeleteArgs {
    pub fn new(row: usize) -> Self {
        Self { row }
    }

    pub fn row(&self) -> usize {
        self.row
    }
}

/// (Not shown): Args for the `budget budget` command.
#[derive(Debug, Parser, Clone)]
pub struct BudgetArgs {
    #[command(subcommand)]
    command: BudgetCommand,
}

impl BudgetArgs {
    pub fn new(command: BudgetCommand) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &BudgetCommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum BudgetCommand {
    /// Show the expected and real amount of every category for a month.
    Show(MonthArgs),
    /// Set expected amounts for a month and save the month's budget.
    ///
    /// Categories that are not mentioned keep their current expected amount. The tithe and
    /// savings categories are computed and cannot be set.
    Set(SetArgs),
    /// List the months that have a saved budget.
    Months,
}

/// (Not shown): A month that defaults to the current one.
#[derive(Debug, Default, Parser, Clone)]
pub struct MonthArgs {
    /// The month, e.g. 2025-01. Defaults to the current month.
    #[arg(long)]
    month: Option<Month>,
}

impl MonthArgs {
    pub fn new(month: Option<Month>) -> Self {
        Self { month }
    }

    /// The given month or the current one.
    pub fn month(&self) -> Month {
        self.month.unwrap_or_else(Month::current)
    }
}

/// (Not shown): Args for the `budget budget set` command.
#[derive(Debug, Parser, Clone)]
pub struct SetArgs {
    /// The month, e.g. 2025-01.
    #[arg(long)]
    month: Month,

    /// A category and its expected amount, e.g. --expected "Comida=650". Repeat for more
    /// categories.
    #[arg(long, required = true)]
    expected: Vec<ExpectedArg>,
}

impl SetArgs {
    pub fn new(month: Month, expected: Vec<ExpectedArg>) -> Self {
        Self { month, expected }
    }

    pub fn month(&self) -> Month {
        self.month
    }

    pub fn expected(&self) -> &[ExpectedArg] {
        &self.expected
    }
}

/// `Category=Amount`, as given to `budget budget set --expected`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExpectedArg {
    category: String,
    amount: Amount,
}

impl ExpectedArg {
    pub fn new(category: impl Into<String>, amount: Amount) -> Self {
        Self {
            category: category.into(),
            amount,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

impl FromStr for ExpectedArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, amount) = s
            .rsplit_once('=')
            .ok_or_else(|| format!("Expected 'Category=Amount', got '{s}'"))?;
        let category = category.trim();
        if category.is_empty() {
            return Err(format!("The category is missing in '{s}'"));
        }
        Ok(Self::new(category, Amount::parse(amount)))
    }
}

/// (Not shown): Args for the `budget metrics` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct MetricsArgs {
    /// The month used for the monthly and yearly totals, e.g. 2025-01. Defaults to the current
    /// month.
    #[arg(long)]
    month: Option<Month>,
}

impl MetricsArgs {
    pub fn new(month: Option<Month>) -> Self {
        Self { month }
    }

    pub fn month(&self) -> Month {
        self.month.unwrap_or_else(Month::current)
    }
}

fn default_budget_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("budget"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --budget-home or BUDGET_HOME instead of relying on the default \
                budget home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("budget")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
