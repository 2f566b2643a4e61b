//! SQLite implementation of the store contract.
//!
//! Every unit and every reporting query runs on its own connection to the
//! database file, so independent threads never share a handle. Units start
//! with `BEGIN IMMEDIATE`, which takes SQLite's write lock before the first
//! read: any row read through a unit is exclusively held until it commits or
//! rolls back, which is at least as strong as a `SELECT ... FOR UPDATE` row
//! lock. Competing units wait up to the configured busy timeout. Snapshots
//! are deferred read transactions that see one committed state throughout.

use super::{schema, AtomicUnit, LedgerReader, LedgerStore};
use crate::account::{Account, AccountId, NewAccount};
use crate::decimal::Money;
use crate::error::{LedgerError, Result};
use crate::records::{
    NewOrder, NewProduct, NewTransfer, Order, OrderId, OrderStatus, Product, ProductId, Transfer,
    TransferLeg, TransferStatus,
};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ACCOUNT_COLUMNS: &str = "id, user_id, currency, balance, created_at, updated_at";
const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, product_id, amount, quantity, status, created_at";

const OUTGOING_JOIN: &str = "JOIN accounts a ON a.id = t.to_account_id WHERE t.from_account_id = ?1";
const INCOMING_JOIN: &str = "JOIN accounts a ON a.id = t.from_account_id WHERE t.to_account_id = ?1";

/// Handle to a ledger database file.
///
/// Cheap to clone; holds only the path and connection settings.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and ensures the schema.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let store = SqliteStore {
            path: path.as_ref().to_path_buf(),
            busy_timeout,
        };

        let conn = store.connect()?;
        schema::init(&conn)?;
        info!("Opened ledger store at {}", store.path.display());

        Ok(store)
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(conn)
    }
}

impl LedgerStore for SqliteStore {
    type Unit = SqliteUnit;

    type Snapshot = SqliteSnapshot;

    fn begin(&self) -> Result<SqliteUnit> {
        let conn = self.connect()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(SqliteUnit { conn, open: true })
    }

    fn snapshot(&self) -> Result<SqliteSnapshot> {
        let conn = self.connect()?;
        conn.execute_batch("BEGIN")?;
        Ok(SqliteSnapshot { conn })
    }
}

impl LedgerReader for SqliteStore {
    fn account(&self, id: AccountId) -> Result<Option<Account>> {
        query_account(&self.connect()?, "WHERE id = ?1", params![id])
    }

    fn account_by_user(&self, user_id: &str) -> Result<Option<Account>> {
        query_account(&self.connect()?, "WHERE user_id = ?1", params![user_id])
    }

    fn accounts(&self) -> Result<Vec<Account>> {
        list_accounts(&self.connect()?)
    }

    fn product(&self, id: ProductId) -> Result<Option<Product>> {
        query_product(&self.connect()?, id)
    }

    fn products(&self) -> Result<Vec<Product>> {
        list_products(&self.connect()?)
    }

    fn order(&self, id: OrderId) -> Result<Option<Order>> {
        query_order(&self.connect()?, id)
    }

    fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        query_user_orders(&self.connect()?, user_id)
    }

    fn outgoing_transfers(&self, account_id: AccountId) -> Result<Vec<TransferLeg>> {
        query_legs(&self.connect()?, OUTGOING_JOIN, account_id)
    }

    fn incoming_transfers(&self, account_id: AccountId) -> Result<Vec<TransferLeg>> {
        query_legs(&self.connect()?, INCOMING_JOIN, account_id)
    }
}

/// A deferred read transaction on a dedicated connection.
///
/// In WAL mode the first query pins the committed state it sees; every later
/// query on the snapshot reads that same state, regardless of concurrent
/// commits. Writers are never blocked by it.
pub struct SqliteSnapshot {
    conn: Connection,
}

impl LedgerReader for SqliteSnapshot {
    fn account(&self, id: AccountId) -> Result<Option<Account>> {
        query_account(&self.conn, "WHERE id = ?1", params![id])
    }

    fn account_by_user(&self, user_id: &str) -> Result<Option<Account>> {
        query_account(&self.conn, "WHERE user_id = ?1", params![user_id])
    }

    fn accounts(&self) -> Result<Vec<Account>> {
        list_accounts(&self.conn)
    }

    fn product(&self, id: ProductId) -> Result<Option<Product>> {
        query_product(&self.conn, id)
    }

    fn products(&self) -> Result<Vec<Product>> {
        list_products(&self.conn)
    }

    fn order(&self, id: OrderId) -> Result<Option<Order>> {
        query_order(&self.conn, id)
    }

    fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        query_user_orders(&self.conn, user_id)
    }

    fn outgoing_transfers(&self, account_id: AccountId) -> Result<Vec<TransferLeg>> {
        query_legs(&self.conn, OUTGOING_JOIN, account_id)
    }

    fn incoming_transfers(&self, account_id: AccountId) -> Result<Vec<TransferLeg>> {
        query_legs(&self.conn, INCOMING_JOIN, account_id)
    }
}

impl Drop for SqliteSnapshot {
    fn drop(&mut self) {
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            warn!("Closing read snapshot failed: {}", e);
        }
    }
}

/// An open `BEGIN IMMEDIATE` transaction on a dedicated connection.
///
/// Rolled back on drop unless [`AtomicUnit::commit`] succeeded.
pub struct SqliteUnit {
    conn: Connection,
    open: bool,
}

impl AtomicUnit for SqliteUnit {
    // The unit already owns the database write lock, so a plain SELECT is
    // an exclusive read for the rest of the unit.
    fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>> {
        query_account(&self.conn, "WHERE id = ?1", params![id])
    }

    fn lock_account_by_user(&mut self, user_id: &str) -> Result<Option<Account>> {
        query_account(&self.conn, "WHERE user_id = ?1", params![user_id])
    }

    fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        query_product(&self.conn, id)
    }

    fn write_balance(&mut self, account: &Account) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE accounts SET balance = ?1, updated_at = ?2 WHERE id = ?3",
            params![account.balance.to_string(), timestamp(&now()), account.id],
        )?;
        expect_one_row(updated, "accounts", account.id)
    }

    fn write_stock(&mut self, id: ProductId, stock: i64) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE products SET stock = ?1, updated_at = ?2 WHERE id = ?3",
            params![stock, timestamp(&now()), id],
        )?;
        expect_one_row(updated, "products", id)
    }

    fn insert_account(&mut self, new: &NewAccount) -> Result<Option<Account>> {
        let created_at = timestamp(&now());
        let inserted = self.conn.execute(
            "INSERT INTO accounts (user_id, currency, balance, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(user_id) DO NOTHING",
            params![new.user_id, new.currency, new.balance.to_string(), created_at],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        let id = self.conn.last_insert_rowid();
        query_account(&self.conn, "WHERE id = ?1", params![id])
    }

    fn insert_transfer(&mut self, new: &NewTransfer) -> Result<Transfer> {
        let created_at = now();
        self.conn.execute(
            "INSERT INTO transfers (from_account_id, to_account_id, amount, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.from_account_id,
                new.to_account_id,
                new.amount.to_string(),
                new.status.as_str(),
                timestamp(&created_at),
            ],
        )?;

        Ok(Transfer {
            id: self.conn.last_insert_rowid(),
            from_account_id: new.from_account_id,
            to_account_id: new.to_account_id,
            amount: new.amount,
            status: new.status,
            created_at,
        })
    }

    fn insert_order(&mut self, new: &NewOrder) -> Result<Order> {
        let created_at = now();
        self.conn.execute(
            "INSERT INTO orders (user_id, product_id, amount, quantity, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.user_id,
                new.product_id,
                new.amount.to_string(),
                new.quantity,
                new.status.as_str(),
                timestamp(&created_at),
            ],
        )?;

        Ok(Order {
            id: self.conn.last_insert_rowid(),
            user_id: new.user_id.clone(),
            product_id: new.product_id,
            amount: new.amount,
            quantity: new.quantity,
            status: new.status,
            created_at,
        })
    }

    fn insert_product(&mut self, new: &NewProduct) -> Result<Product> {
        let created_at = now();
        self.conn.execute(
            "INSERT INTO products (name, description, price, stock, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                new.name,
                new.description,
                new.price.to_string(),
                new.stock,
                timestamp(&created_at),
            ],
        )?;

        Ok(Product {
            id: self.conn.last_insert_rowid(),
            name: new.name.clone(),
            description: new.description.clone(),
            price: new.price.to_string(),
            stock: new.stock,
            created_at,
            updated_at: created_at,
        })
    }

    fn commit(mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.open = false;
        Ok(())
    }
}

impl Drop for SqliteUnit {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => debug!("Atomic unit rolled back"),
            Err(e) => warn!("Rollback of atomic unit failed: {}", e),
        }
    }
}

/// Current time truncated to the stored precision, so values handed back
/// from inserts compare equal to values read later.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(table: &'static str, id: i64, text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(table, id, format!("bad timestamp '{}': {}", text, e)))
}

fn parse_money(table: &'static str, id: i64, text: &str) -> Result<Money> {
    Money::parse(text).map_err(|e| corrupt(table, id, e.to_string()))
}

fn corrupt(table: &'static str, id: i64, message: String) -> LedgerError {
    LedgerError::CorruptRecord { table, id, message }
}

fn expect_one_row(updated: usize, table: &'static str, id: i64) -> Result<()> {
    if updated == 1 {
        Ok(())
    } else {
        Err(corrupt(table, id, format!("expected 1 row updated, got {}", updated)))
    }
}

fn query_account<P: Params>(conn: &Connection, filter: &str, params: P) -> Result<Option<Account>> {
    let sql = format!("SELECT {} FROM accounts {}", ACCOUNT_COLUMNS, filter);
    conn.query_row(&sql, params, RawAccount::from_row)
        .optional()?
        .map(RawAccount::decode)
        .transpose()
}

fn query_product(conn: &Connection, id: ProductId) -> Result<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
    conn.query_row(&sql, params![id], RawProduct::from_row)
        .optional()?
        .map(RawProduct::decode)
        .transpose()
}

fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let sql = format!("SELECT {} FROM accounts ORDER BY id", ACCOUNT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], RawAccount::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(RawAccount::decode).collect()
}

fn list_products(conn: &Connection) -> Result<Vec<Product>> {
    let sql = format!("SELECT {} FROM products ORDER BY id", PRODUCT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], RawProduct::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(RawProduct::decode).collect()
}

fn query_order(conn: &Connection, id: OrderId) -> Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
    conn.query_row(&sql, params![id], RawOrder::from_row)
        .optional()?
        .map(RawOrder::decode)
        .transpose()
}

fn query_user_orders(conn: &Connection, user_id: &str) -> Result<Vec<Order>> {
    let sql = format!(
        "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY id",
        ORDER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id], RawOrder::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(RawOrder::decode).collect()
}

fn query_legs(conn: &Connection, join: &str, account_id: AccountId) -> Result<Vec<TransferLeg>> {
    let sql = format!(
        "SELECT t.id, t.from_account_id, t.to_account_id, t.amount, t.status, t.created_at,
                a.user_id
         FROM transfers t {}
         ORDER BY t.id",
        join
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![account_id], |row| {
            Ok((RawTransfer::from_row(row)?, row.get::<_, String>(6)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(raw, counterparty)| {
            Ok(TransferLeg {
                transfer: raw.decode()?,
                counterparty,
            })
        })
        .collect()
}

// Rows are read as plain text first and decoded afterwards, so a corrupt
// value surfaces as `CorruptRecord` instead of an opaque driver error.

struct RawAccount {
    id: i64,
    user_id: String,
    currency: String,
    balance: String,
    created_at: String,
    updated_at: String,
}

impl RawAccount {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawAccount {
            id: row.get(0)?,
            user_id: row.get(1)?,
            currency: row.get(2)?,
            balance: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn decode(self) -> Result<Account> {
        Ok(Account {
            balance: parse_money("accounts", self.id, &self.balance)?,
            created_at: parse_timestamp("accounts", self.id, &self.created_at)?,
            updated_at: parse_timestamp("accounts", self.id, &self.updated_at)?,
            id: self.id,
            user_id: self.user_id,
            currency: self.currency,
        })
    }
}

struct RawProduct {
    id: i64,
    name: String,
    description: String,
    price: String,
    stock: i64,
    created_at: String,
    updated_at: String,
}

impl RawProduct {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawProduct {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            price: row.get(3)?,
            stock: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<Product> {
        Ok(Product {
            created_at: parse_timestamp("products", self.id, &self.created_at)?,
            updated_at: parse_timestamp("products", self.id, &self.updated_at)?,
            id: self.id,
            name: self.name,
            description: self.description,
            price: self.price,
            stock: self.stock,
        })
    }
}

struct RawTransfer {
    id: i64,
    from_account_id: i64,
    to_account_id: i64,
    amount: String,
    status: String,
    created_at: String,
}

impl RawTransfer {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawTransfer {
            id: row.get(0)?,
            from_account_id: row.get(1)?,
            to_account_id: row.get(2)?,
            amount: row.get(3)?,
            status: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn decode(self) -> Result<Transfer> {
        let status = TransferStatus::parse(&self.status).ok_or_else(|| {
            corrupt("transfers", self.id, format!("unknown status '{}'", self.status))
        })?;

        Ok(Transfer {
            id: self.id,
            from_account_id: self.from_account_id,
            to_account_id: self.to_account_id,
            amount: parse_money("transfers", self.id, &self.amount)?,
            status,
            created_at: parse_timestamp("transfers", self.id, &self.created_at)?,
        })
    }
}

struct RawOrder {
    id: i64,
    user_id: String,
    product_id: i64,
    amount: String,
    quantity: i64,
    status: String,
    created_at: String,
}

impl RawOrder {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawOrder {
            id: row.get(0)?,
            user_id: row.get(1)?,
            product_id: row.get(2)?,
            amount: row.get(3)?,
            quantity: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<Order> {
        let status = OrderStatus::parse(&self.status).ok_or_else(|| {
            corrupt("orders", self.id, format!("unknown status '{}'", self.status))
        })?;

        Ok(Order {
            amount: parse_money("orders", self.id, &self.amount)?,
            created_at: parse_timestamp("orders", self.id, &self.created_at)?,
            id: self.id,
            user_id: self.user_id,
            product_id: self.product_id,
            quantity: self.quantity,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("ledger.db"), Duration::from_secs(5)).unwrap();
        (dir, store)
    }

    fn new_account(user: &str, balance: &str) -> NewAccount {
        NewAccount::new(user, "UZS", Money::parse(balance).unwrap()).unwrap()
    }

    #[test]
    fn test_committed_writes_are_visible() {
        let (_dir, store) = store();

        let mut unit = store.begin().unwrap();
        let mut alice = unit.insert_account(&new_account("alice", "10.00")).unwrap().unwrap();
        alice.balance = Money::parse("12.50").unwrap();
        unit.write_balance(&alice).unwrap();
        unit.commit().unwrap();

        let stored = store.account_by_user("alice").unwrap().unwrap();
        assert_eq!(stored.balance.to_string(), "12.50");
        assert_eq!(stored.currency, "UZS");
    }

    #[test]
    fn test_dropped_unit_rolls_back() {
        let (_dir, store) = store();

        {
            let mut unit = store.begin().unwrap();
            unit.insert_account(&new_account("alice", "10.00")).unwrap();
        }

        assert!(store.account_by_user("alice").unwrap().is_none());
        assert!(store.accounts().unwrap().is_empty());
    }

    #[test]
    fn test_insert_account_conflict_returns_none() {
        let (_dir, store) = store();

        let mut unit = store.begin().unwrap();
        assert!(unit.insert_account(&new_account("alice", "1.00")).unwrap().is_some());
        assert!(unit.insert_account(&new_account("alice", "2.00")).unwrap().is_none());
        unit.commit().unwrap();

        assert_eq!(store.accounts().unwrap().len(), 1);
    }

    #[test]
    fn test_inserted_timestamps_match_stored_ones() {
        let (_dir, store) = store();

        let mut unit = store.begin().unwrap();
        let a = unit.insert_account(&new_account("a", "5.00")).unwrap().unwrap();
        let b = unit.insert_account(&new_account("b", "0.00")).unwrap().unwrap();
        let transfer = unit
            .insert_transfer(&NewTransfer {
                from_account_id: a.id,
                to_account_id: b.id,
                amount: Money::parse("5.00").unwrap(),
                status: TransferStatus::Completed,
            })
            .unwrap();
        unit.commit().unwrap();

        let legs = store.outgoing_transfers(a.id).unwrap();
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].counterparty, "b");
        assert_eq!(legs[0].transfer.created_at, transfer.created_at);
        assert_eq!(legs[0].transfer.amount.to_string(), "5.00");

        let legs = store.incoming_transfers(b.id).unwrap();
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].counterparty, "a");
    }

    #[test]
    fn test_snapshot_ignores_later_commits() {
        let (_dir, store) = store();
        let mut unit = store.begin().unwrap();
        let a = unit.insert_account(&new_account("a", "5.00")).unwrap().unwrap();
        let b = unit.insert_account(&new_account("b", "0.00")).unwrap().unwrap();
        unit.commit().unwrap();

        let snapshot = store.snapshot().unwrap();
        let before = snapshot.account(a.id).unwrap().unwrap();

        let mut unit = store.begin().unwrap();
        let mut sender = unit.lock_account(a.id).unwrap().unwrap();
        sender.balance = Money::parse("0.00").unwrap();
        unit.write_balance(&sender).unwrap();
        unit.insert_transfer(&NewTransfer {
            from_account_id: a.id,
            to_account_id: b.id,
            amount: Money::parse("5.00").unwrap(),
            status: TransferStatus::Completed,
        })
        .unwrap();
        unit.commit().unwrap();

        assert!(snapshot.outgoing_transfers(a.id).unwrap().is_empty());
        assert_eq!(snapshot.account(a.id).unwrap().unwrap().balance, before.balance);
        assert_eq!(before.balance.to_string(), "5.00");

        assert_eq!(store.outgoing_transfers(a.id).unwrap().len(), 1);
        assert_eq!(store.account(a.id).unwrap().unwrap().balance.to_string(), "0.00");
    }

    #[test]
    fn test_corrupt_balance_is_reported() {
        let (_dir, store) = store();
        let conn = Connection::open(store.path()).unwrap();
        conn.execute(
            "INSERT INTO accounts (user_id, currency, balance, created_at, updated_at)
             VALUES ('eve', 'UZS', 'lots', '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z')",
            [],
        )
        .unwrap();

        let err = store.account_by_user("eve").unwrap_err();
        assert_eq!(err.code(), "CorruptRecord");
    }
}
