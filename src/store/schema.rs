//! SQLite schema for the ledger tables.
//!
//! Money columns are TEXT holding the canonical decimal string, so SQLite's
//! REAL affinity never touches them. Timestamps are RFC 3339 UTC with
//! microseconds, which sort lexicographically in time order.

use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT    NOT NULL UNIQUE,
    currency    TEXT    NOT NULL CHECK (length(currency) = 3),
    balance     TEXT    NOT NULL DEFAULT '0.00',
    created_at  TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT    NOT NULL,
    description TEXT    NOT NULL DEFAULT '',
    price       TEXT    NOT NULL,
    stock       INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
    created_at  TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS transfers (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    from_account_id INTEGER NOT NULL REFERENCES accounts(id),
    to_account_id   INTEGER NOT NULL REFERENCES accounts(id),
    amount          TEXT    NOT NULL,
    status          TEXT    NOT NULL,
    created_at      TEXT    NOT NULL,
    CHECK (from_account_id <> to_account_id)
);

CREATE INDEX IF NOT EXISTS idx_transfers_from ON transfers(from_account_id);
CREATE INDEX IF NOT EXISTS idx_transfers_to ON transfers(to_account_id);

CREATE TABLE IF NOT EXISTS orders (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT    NOT NULL,
    product_id  INTEGER NOT NULL REFERENCES products(id),
    amount      TEXT    NOT NULL,
    quantity    INTEGER NOT NULL CHECK (quantity > 0),
    status      TEXT    NOT NULL,
    created_at  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id);
";

/// Creates any missing tables and indexes and switches the file to WAL.
///
/// Safe to run on every start.
pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode answers with the resulting mode, so it must be queried.
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    log::debug!("SQLite journal mode: {}", mode);

    conn.execute_batch(SCHEMA)
}
