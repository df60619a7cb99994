use clap::Parser;
use sheet_budget::args::{Args, AuthCommand, BudgetCommand, Command, TxCommand};
use sheet_budget::{commands, Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().budget_home().path();

    // This allows for running the program without hitting the Google APIs. When
    // BUDGET_SHEET_IN_TEST_MODE is set and non-zero in length, then the mode will be
    // Mode::Testing, otherwise it will be Mode::Google.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args.sheet_url()).await?.print(),

        Command::Auth(auth_args) => {
            let config = Config::load(home).await?;
            match auth_args.command() {
                AuthCommand::SetToken(token_args) => {
                    commands::set_token(&config, token_args.token(), token_args.expires_in())
                        .await?
                        .print()
                }
                AuthCommand::Status => commands::auth_status(&config).await?.print(),
            }
        }

        Command::Tx(tx_args) => {
            let config = Config::load(home).await?;
            match tx_args.command() {
                TxCommand::List(args) => commands::list_transactions(config, mode, args.clone())
                    .await?
                    .print(),
                TxCommand::Add(args) => commands::add_transaction(config, mode, args.clone())
                    .await?
                    .print(),
                TxCommand::Update(args) => {
                    commands::update_transaction(config, mode, args.clone())
                        .await?
                        .print()
                }
                TxCommand::Delete(args) => {
                    commands::delete_transaction(config, mode, args.clone())
                        .await?
                        .print()
                }
            }
        }

        Command::Budget(budget_args) => {
            let config = Config::load(home).await?;
            match budget_args.command() {
                BudgetCommand::Show(args) => commands::budget_show(config, mode, args.clone())
                    .await?
                    .print(),
                BudgetCommand::Set(args) => commands::budget_set(config, mode, args.clone())
                    .await?
                    .print(),
                BudgetCommand::Months => commands::budget_months(config, mode).await?.print(),
            }
        }

        Command::Metrics(metrics_args) => {
            let config = Config::load(home).await?;
            commands::metrics(config, mode, metrics_args.clone())
                .await?
                .print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "sheet_budget={level},{}={level}",
                env!("CARGO_BIN_NAME")
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
