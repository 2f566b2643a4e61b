//! # Ledger Core
//!
//! A ledger consistency engine: moves money between accounts and records
//! product purchases against a shared persistent store, keeping every balance
//! equal to the exact, conserved sum of completed transfers.
//!
//! ## Design Principles
//!
//! - **Exact decimals**: money is `rust_decimal` based, stored as text, never floating point
//! - **One atomic unit per operation**: a failure leaves the store untouched
//! - **Pessimistic locking**: rows are locked before they are checked, in a fixed order
//! - **No in-memory state**: the store is the only source of truth
//!
//! ## Example
//!
//! ```no_run
//! use ledger_core::{Ledger, LedgerConfig};
//!
//! let ledger = Ledger::open(&LedgerConfig::default()).unwrap();
//! ledger.open_account("alice", "UZS", "100.00").unwrap();
//! ledger.open_account("bob", "UZS", "0.00").unwrap();
//! ledger.transfer_by_user("alice", "bob", "25.00").unwrap();
//!
//! let report = ledger.history("bob").unwrap();
//! assert_eq!(report.balance.to_string(), "25.00");
//! ```

pub mod account;
pub mod bootstrap;
pub mod config;
pub mod decimal;
pub mod engine;
pub mod error;
pub mod history;
pub mod ledger;
pub mod purchase;
pub mod records;
pub mod registry;
pub mod store;
pub mod transfer;

pub use account::{Account, AccountId, NewAccount};
pub use bootstrap::SystemAccountBootstrap;
pub use config::LedgerConfig;
pub use decimal::{AmountError, Money};
pub use engine::Ledger;
pub use error::{ErrorKind, Failure, LedgerError, Result};
pub use history::{Direction, HistoryAggregator, HistoryEntry, HistoryReport, Reference};
pub use ledger::AccountLedger;
pub use purchase::{PurchaseEngine, PurchaseReceipt};
pub use records::{Order, OrderStatus, Product, Transfer, TransferStatus};
pub use registry::Registry;
pub use store::{AtomicUnit, LedgerReader, LedgerStore, SqliteSnapshot, SqliteStore};
pub use transfer::{TransferEngine, TransferReceipt};
