//! Store collaborator contract.
//!
//! The ledger never keeps state of its own; every read and write goes through
//! these traits. A store must provide:
//!
//! - an atomic unit ([`AtomicUnit`]) that is either fully committed or fully
//!   rolled back, where dropping an uncommitted unit rolls it back
//! - exclusive locks on the rows read through `lock_*`, held until the unit
//!   ends, so two units touching the same account or product serialize
//! - plain, non-locking reads ([`LedgerReader`]) for reporting
//! - read snapshots, where every read sees the same committed state
//!
//! [`SqliteStore`] is the bundled implementation.

mod schema;
mod sqlite;

pub use sqlite::{SqliteSnapshot, SqliteStore, SqliteUnit};

use crate::account::{Account, AccountId, NewAccount};
use crate::error::Result;
use crate::records::{
    NewOrder, NewProduct, NewTransfer, Order, OrderId, Product, ProductId, Transfer, TransferLeg,
};

/// One all-or-nothing group of reads and writes.
pub trait AtomicUnit {
    /// Reads an account by id and holds it exclusively until the unit ends.
    fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>>;

    /// Reads an account by owner key and holds it exclusively.
    fn lock_account_by_user(&mut self, user_id: &str) -> Result<Option<Account>>;

    /// Reads a product and holds it exclusively.
    fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Persists `account.balance`. The account must be locked in this unit.
    fn write_balance(&mut self, account: &Account) -> Result<()>;

    /// Persists a product's stock. The product must be locked in this unit.
    fn write_stock(&mut self, id: ProductId, stock: i64) -> Result<()>;

    /// Inserts an account unless one with the same owner key exists.
    ///
    /// Returns `None` on an owner-key conflict instead of failing, so
    /// create-if-absent sequences can re-read the winner.
    fn insert_account(&mut self, new: &NewAccount) -> Result<Option<Account>>;

    fn insert_transfer(&mut self, new: &NewTransfer) -> Result<Transfer>;

    fn insert_order(&mut self, new: &NewOrder) -> Result<Order>;

    fn insert_product(&mut self, new: &NewProduct) -> Result<Product>;

    /// Makes every write of this unit durable and visible.
    fn commit(self) -> Result<()>;
}

/// Read-only queries. Results are point-in-time and not tied to any unit.
pub trait LedgerReader {
    fn account(&self, id: AccountId) -> Result<Option<Account>>;

    fn account_by_user(&self, user_id: &str) -> Result<Option<Account>>;

    fn accounts(&self) -> Result<Vec<Account>>;

    fn product(&self, id: ProductId) -> Result<Option<Product>>;

    fn products(&self) -> Result<Vec<Product>>;

    fn order(&self, id: OrderId) -> Result<Option<Order>>;

    fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>>;

    /// Transfers sent by `account_id`, each with the recipient's owner key.
    fn outgoing_transfers(&self, account_id: AccountId) -> Result<Vec<TransferLeg>>;

    /// Transfers received by `account_id`, each with the sender's owner key.
    fn incoming_transfers(&self, account_id: AccountId) -> Result<Vec<TransferLeg>>;
}

/// A shared persistent store that can open atomic units.
pub trait LedgerStore: LedgerReader {
    type Unit: AtomicUnit;
    type Snapshot: LedgerReader;

    /// Starts a new atomic unit.
    fn begin(&self) -> Result<Self::Unit>;

    /// Opens a read-only view in which every query sees the same committed
    /// state. Writes committed after its first read are not visible to it.
    fn snapshot(&self) -> Result<Self::Snapshot>;
}
