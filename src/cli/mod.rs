use std::env;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::api::ApiClient;
use crate::app::App;
use crate::config::{ConfigLoader, CONFIG_ENV};

pub mod commands;

use self::commands::{CarsArgs, CheckoutArgs, ItemsArgs, LogsArgs, UsersArgs};

const LOG_FILE: &str = "stocktui.log";

#[derive(Parser, Debug)]
#[command(
    name = "stocktui",
    version,
    about = "Terminal client for the StockOverflow inventory API"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over STOCKTUI_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override api.base_url for this run
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// List and edit inventory items
    Items(ItemsArgs),
    /// List and edit users
    Users(UsersArgs),
    /// List, add and edit cars
    Cars(CarsArgs),
    /// Print the audit log
    Logs(LogsArgs),
    /// Check parts out against a car order
    Checkout(CheckoutArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);

    // The TUI owns the terminal, so its logs go to a file.
    let log_file = matches!(command, Commands::Tui).then(|| paths.log_dir.join(LOG_FILE));
    init_tracing(&cli.log_level, log_file.as_deref())
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let mut config = loader.load_or_init()?;
    config.apply_overrides(cli.api_url.as_deref());
    tracing::debug!(base_url = %config.api.base_url, "configuration loaded");

    let client = ApiClient::http(&config.api).context("building API client")?;
    let page_size = config.view.page_size;
    let output = match command {
        Commands::Tui => {
            let mut app = App::new(Arc::new(config), client)?;
            return app.run();
        }
        Commands::Items(args) => commands::run_items(&client, page_size, args.command)?,
        Commands::Users(args) => commands::run_users(&client, page_size, args.command)?,
        Commands::Cars(args) => commands::run_cars(&client, page_size, args.command)?,
        Commands::Logs(args) => commands::run_logs(&client, page_size, args)?,
        Commands::Checkout(args) => commands::run_checkout(&client, args)?,
    };
    print!("{output}");
    Ok(())
}

fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match log_file {
            Some(path) => {
                let file = open_log(path)?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
            None => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
        Ok(())
    })
    .map(|_| ())
}

fn open_log(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use clap::CommandFactory;

    use self::commands::{CarsCommand, ItemsCommand, UsersCommand};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_defaults_to_tui() {
        let cli = Cli::try_parse_from(["stocktui"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn parses_nested_commands_and_global_flags() {
        let cli = Cli::try_parse_from([
            "stocktui",
            "items",
            "list",
            "--low-stock",
            "--sort",
            "quantity",
            "--desc",
            "--api-url",
            "http://stock.local:8000",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://stock.local:8000"));
        assert_matches!(
            cli.command,
            Some(Commands::Items(ItemsArgs { command: ItemsCommand::List(args) }))
                if args.low_stock && args.view.desc && args.view.page == 1
        );

        let cli = Cli::try_parse_from(["stocktui", "users", "set", "4", "role=admin", "is_active=no"]).unwrap();
        assert_matches!(
            cli.command,
            Some(Commands::Users(UsersArgs { command: UsersCommand::Set(args) }))
                if args.id == 4 && args.assignments.len() == 2
        );
    }

    #[test]
    fn rejects_conflicting_flags() {
        assert!(Cli::try_parse_from(["stocktui", "items", "list", "--desc"]).is_err());
        assert!(Cli::try_parse_from(["stocktui", "items", "list", "--low-stock", "--empty"]).is_err());
        assert!(Cli::try_parse_from(["stocktui", "cars", "add", "--stdin", "--vin", "V1"]).is_err());
        assert!(Cli::try_parse_from(["stocktui", "cars", "add", "--vin", "V1"]).is_err());

        let cli = Cli::try_parse_from(["stocktui", "cars", "add", "--stdin"]).unwrap();
        assert_matches!(
            cli.command,
            Some(Commands::Cars(CarsArgs { command: CarsCommand::Add(args) })) if args.stdin
        );
    }
}
