//! Kasse CLI - card-swipe point of sale in your terminal

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

use commands::{balance, card, history, logs, serve, status, swipe, topup, user};

/// Kasse - card-swipe point of sale
#[derive(Parser)]
#[command(name = "kasse", version, about, long_about = None)]
struct Cli {
    /// Log filter, e.g. `info` or `kasse_core=debug`
    #[arg(long, global = true, env = "KASSE_LOG", default_value = "warn")]
    log_level: String,

    /// Log format: pretty, compact or json (always written to stderr)
    #[arg(long, global = true, env = "KASSE_LOG_FORMAT", default_value = "pretty")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the swipe service, reading hex card ids from stdin
    Serve {
        /// Register the next swiped card for this user
        #[arg(long)]
        register_user: Option<String>,
        /// Description of the card to register
        #[arg(long, requires = "register_user")]
        description: Option<String>,
        /// Report results through the log only
        #[arg(long)]
        headless: bool,
        /// Print results as JSON lines
        #[arg(long, conflicts_with = "headless")]
        json: bool,
    },

    /// Charge a card once
    Swipe {
        /// Card id as hex
        card: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        command: user::UserCommands,
    },

    /// Manage cards
    Card {
        #[command(subcommand)]
        command: card::CardCommands,
    },

    /// Credit a user's balance
    Topup {
        user: String,
        /// Amount, e.g. 10 or 12.50
        amount: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a user's balance
    Balance {
        user: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a user's transactions, newest first
    History {
        user: String,
        /// Number of transactions to show, 0 for all
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show store status and summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, &cli.log_format);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Serve {
            register_user,
            description,
            headless,
            json,
        } => serve::run(serve::ServeOptions {
            register_user,
            description,
            headless,
            json,
        }),
        Commands::Swipe { card, json } => swipe::run(&card, json),
        Commands::User { command } => user::run(command),
        Commands::Card { command } => card::run(command),
        Commands::Topup { user, amount, json } => topup::run(&user, &amount, json),
        Commands::Balance { user, json } => balance::run(&user, json),
        Commands::History { user, limit, json } => history::run(&user, limit, json),
        Commands::Status { json } => status::run(json),
        Commands::Logs { command } => logs::run(command),
    }
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(io::stderr))
                .init();
        }
        "compact" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(io::stderr))
                .init();
        }
    }
}
