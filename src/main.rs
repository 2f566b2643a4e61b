//! Ledger Core CLI
//!
//! Runs one ledger operation per invocation against a SQLite database and
//! prints the result as JSON.
//!
//! # Usage
//!
//! ```bash
//! ledger-core --db shop.db open-account alice UZS 100000.00
//! ledger-core --db shop.db transfer-user alice bob 25.00
//! ledger-core --db shop.db add-product "Tea" 12.50 10 --description "Green tea"
//! ledger-core --db shop.db purchase alice 1 2
//! ledger-core --db shop.db history alice --format csv
//! ```
//!
//! Failures print a `{kind, code, message}` JSON object and exit with status 1.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity
//! - `LEDGER_*`: see [`ledger_core::config`]

use clap::{Parser, Subcommand, ValueEnum};
use ledger_core::{Account, Failure, Ledger, LedgerConfig, LedgerError, Result, SqliteStore};
use log::warn;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

/// Ledger consistency engine: accounts, transfers, purchases and history
#[derive(Parser)]
#[command(name = "ledger-core")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database file path (overrides LEDGER_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database and the clearing account
    Init,

    /// Open an account for a user
    OpenAccount {
        user_id: String,
        /// Three-letter currency code, e.g. UZS
        currency: String,
        /// Opening balance
        #[arg(default_value = "100000.00", allow_hyphen_values = true)]
        balance: String,
    },

    /// Add a product to the catalog
    AddProduct {
        name: String,
        #[arg(allow_hyphen_values = true)]
        price: String,
        #[arg(allow_negative_numbers = true)]
        stock: i64,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Transfer between accounts by account id
    Transfer {
        from: i64,
        to: i64,
        #[arg(allow_hyphen_values = true)]
        amount: String,
    },

    /// Transfer between accounts by user id
    TransferUser {
        from: String,
        to: String,
        #[arg(allow_hyphen_values = true)]
        amount: String,
    },

    /// Buy a product
    Purchase {
        user_id: String,
        product_id: i64,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },

    /// Show a user's transaction history
    History {
        user_id: String,
        #[arg(long, default_value = "json")]
        format: HistoryFormat,
    },

    /// List all accounts
    Accounts,

    /// Show one account, by user id or account id
    Account { key: String },

    /// List all products
    Products,

    /// Show one product
    Product { id: i64 },

    /// List a user's orders
    Orders {
        #[arg(long)]
        user: String,
    },

    /// Show one order
    Order { id: i64 },
}

#[derive(Clone, Copy, ValueEnum)]
enum HistoryFormat {
    Json,
    Csv,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        // Failure details go to stdout for callers; the message goes to stderr.
        if let Err(write_err) = print_json(&Failure::from(&e)) {
            warn!("Could not write failure report: {}", write_err);
        }
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = LedgerConfig::from_env()?;
    if let Some(db) = cli.db {
        config = config.with_database_path(db);
    }
    let ledger = Ledger::open(&config)?;

    match cli.command {
        Command::Init => print_json(ledger.clearing_account()),
        Command::OpenAccount {
            user_id,
            currency,
            balance,
        } => print_json(&ledger.open_account(&user_id, &currency, &balance)?),
        Command::AddProduct {
            name,
            price,
            stock,
            description,
        } => print_json(&ledger.add_product(&name, &description, &price, stock)?),
        Command::Transfer { from, to, amount } => {
            print_json(&ledger.transfer(from, to, &amount)?)
        }
        Command::TransferUser { from, to, amount } => {
            print_json(&ledger.transfer_by_user(&from, &to, &amount)?)
        }
        Command::Purchase {
            user_id,
            product_id,
            quantity,
        } => print_json(&ledger.purchase(&user_id, product_id, quantity)?),
        Command::History { user_id, format } => {
            let report = ledger.history(&user_id)?;
            match format {
                HistoryFormat::Json => print_json(&report),
                HistoryFormat::Csv => report.write_csv(io::stdout().lock()),
            }
        }
        Command::Accounts => print_json(&ledger.accounts()?),
        Command::Account { key } => print_json(&find_account(&ledger, &key)?),
        Command::Products => print_json(&ledger.products()?),
        Command::Product { id } => print_json(&ledger.product(id)?),
        Command::Orders { user } => print_json(&ledger.orders_for_user(&user)?),
        Command::Order { id } => print_json(&ledger.order(id)?),
    }
}

/// Looks `key` up as an owner key first, then as a numeric account id.
fn find_account(ledger: &Ledger<SqliteStore>, key: &str) -> Result<Account> {
    match ledger.account_by_user(key) {
        Err(LedgerError::UserAccountNotFound(_)) => match key.parse::<i64>() {
            Ok(id) => ledger.account(id),
            Err(_) => Err(LedgerError::UserAccountNotFound(key.to_string())),
        },
        other => other,
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value)?;
    writeln!(handle)?;
    Ok(())
}
