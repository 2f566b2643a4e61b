//! Read-side reconstruction of a user's transaction log.

use crate::decimal::Money;
use crate::error::{LedgerError, Result};
use crate::records::{OrderId, TransferId, TransferLeg};
use crate::store::{LedgerReader, LedgerStore};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Serialize, Serializer};
use std::fmt;
use std::io::Write;

/// Counterparty shown for orders.
pub const MARKETPLACE: &str = "marketplace";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outbound,
    Inbound,
}

/// Record an entry was derived from, rendered as `transfer_<id>` or `order_<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Transfer(TransferId),
    Order(OrderId),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Transfer(id) => write!(f, "transfer_{}", id),
            Reference::Order(id) => write!(f, "order_{}", id),
        }
    }
}

impl Serialize for Reference {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub date: DateTime<Utc>,
    pub direction: Direction,
    pub amount: Money,
    pub counterparty: String,
    pub reference: Reference,
}

/// A user's entries, most recent first, with the account's balance.
///
/// Entries and balance come from one read snapshot, so the balance reflects
/// exactly the entries listed.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryReport {
    pub user_id: String,
    pub history: Vec<HistoryEntry>,
    pub balance: Money,
    pub currency: String,
}

impl HistoryReport {
    /// Writes the entries as CSV with a `date,direction,amount,counterparty,reference` header.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["date", "direction", "amount", "counterparty", "reference"])?;
        for entry in &self.history {
            csv_writer.serialize((
                entry.date.to_rfc3339(),
                entry.direction,
                entry.amount,
                &entry.counterparty,
                entry.reference,
            ))?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

/// Builds history reports from committed transfers and orders.
pub struct HistoryAggregator<'s, S: LedgerStore> {
    store: &'s S,
}

impl<'s, S: LedgerStore> HistoryAggregator<'s, S> {
    pub fn new(store: &'s S) -> Self {
        HistoryAggregator { store }
    }

    pub fn history(&self, user_id: &str) -> Result<HistoryReport> {
        let view = self.store.snapshot()?;
        build_report(&view, user_id)
    }
}

fn build_report<R: LedgerReader>(view: &R, user_id: &str) -> Result<HistoryReport> {
    let account = view
        .account_by_user(user_id)?
        .ok_or_else(|| LedgerError::AccountNotFound {
            side: "User",
            key: user_id.to_string(),
        })?;

    let outgoing = view.outgoing_transfers(account.id)?;
    let incoming = view.incoming_transfers(account.id)?;
    let orders = view.orders_for_user(&account.user_id)?;

    let mut history = Vec::with_capacity(outgoing.len() + incoming.len() + orders.len());
    history.extend(outgoing.into_iter().map(|leg| leg_entry(leg, Direction::Outbound)));
    history.extend(incoming.into_iter().map(|leg| leg_entry(leg, Direction::Inbound)));
    history.extend(orders.into_iter().map(|order| HistoryEntry {
        date: order.created_at,
        direction: Direction::Outbound,
        amount: order.amount,
        counterparty: MARKETPLACE.to_string(),
        reference: Reference::Order(order.id),
    }));

    // Stable, so equal timestamps keep their gathering order.
    history.sort_by(|a, b| b.date.cmp(&a.date));

    debug!("Built history for {} with {} entries", user_id, history.len());

    Ok(HistoryReport {
        user_id: account.user_id,
        history,
        balance: account.balance,
        currency: account.currency,
    })
}

fn leg_entry(leg: TransferLeg, direction: Direction) -> HistoryEntry {
    HistoryEntry {
        date: leg.transfer.created_at,
        direction,
        amount: leg.transfer.amount,
        counterparty: leg.counterparty,
        reference: Reference::Transfer(leg.transfer.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::NewAccount;
    use crate::bootstrap::SystemAccountBootstrap;
    use crate::purchase::PurchaseEngine;
    use crate::records::NewProduct;
    use crate::store::{AtomicUnit, LedgerStore, SqliteStore};
    use crate::transfer::TransferEngine;
    use std::time::Duration;
    use tempfile::TempDir;

    fn dec(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    fn setup() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("ledger.db"), Duration::from_secs(5)).unwrap();
        SystemAccountBootstrap::default().run(&store).unwrap();

        let mut unit = store.begin().unwrap();
        for (user, balance) in [("alice", "100.00"), ("bob", "50.00")] {
            unit.insert_account(&NewAccount::new(user, "UZS", dec(balance)).unwrap())
                .unwrap();
        }
        unit.commit().unwrap();
        (dir, store)
    }

    #[test]
    fn test_transfers_most_recent_first() {
        let (_dir, store) = setup();
        let transfers = TransferEngine::new(&store);

        let out = transfers.transfer_by_user("alice", "bob", "20.00").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let back = transfers.transfer_by_user("bob", "alice", "5.00").unwrap();

        let report = HistoryAggregator::new(&store).history("alice").unwrap();

        assert_eq!(report.history.len(), 2);
        assert_eq!(report.history[0].direction, Direction::Inbound);
        assert_eq!(report.history[0].amount.to_string(), "5.00");
        assert_eq!(report.history[0].counterparty, "bob");
        assert_eq!(report.history[0].reference, Reference::Transfer(back.transfer_id));
        assert_eq!(report.history[1].direction, Direction::Outbound);
        assert_eq!(report.history[1].reference, Reference::Transfer(out.transfer_id));

        let stored = store.account_by_user("alice").unwrap().unwrap();
        assert_eq!(report.balance, stored.balance);
        assert_eq!(report.balance.to_string(), "85.00");
        assert_eq!(report.currency, "UZS");
    }

    #[test]
    fn test_purchase_listed_as_transfer_and_order() {
        let (_dir, store) = setup();
        let mut unit = store.begin().unwrap();
        let product = unit
            .insert_product(&NewProduct::new("Pen", "", dec("2.50"), 10).unwrap())
            .unwrap();
        unit.commit().unwrap();

        let receipt = PurchaseEngine::new(&store, "0")
            .purchase("bob", product.id, 2)
            .unwrap();

        let report = HistoryAggregator::new(&store).history("bob").unwrap();
        assert_eq!(report.history.len(), 2);
        assert!(report.history.iter().all(|e| e.direction == Direction::Outbound));
        assert!(report.history.iter().all(|e| e.amount.to_string() == "5.00"));

        let order = report
            .history
            .iter()
            .find(|e| e.reference == Reference::Order(receipt.order_id))
            .unwrap();
        assert_eq!(order.counterparty, MARKETPLACE);
        assert!(report.history.iter().any(|e| e.counterparty == "0"));
    }

    #[test]
    fn test_unknown_user() {
        let (_dir, store) = setup();
        let err = HistoryAggregator::new(&store).history("nobody").unwrap_err();
        assert_eq!(err.code(), "AccountNotFound");
        assert_eq!(err.to_string(), "User account nobody not found");
    }

    #[test]
    fn test_empty_history() {
        let (_dir, store) = setup();
        let report = HistoryAggregator::new(&store).history("alice").unwrap();
        assert!(report.history.is_empty());
        assert_eq!(report.balance.to_string(), "100.00");
    }

    #[test]
    fn test_csv_export() {
        let (_dir, store) = setup();
        TransferEngine::new(&store)
            .transfer_by_user("alice", "bob", "1.50")
            .unwrap();

        let report = HistoryAggregator::new(&store).history("alice").unwrap();
        let mut out = Vec::new();
        report.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,direction,amount,counterparty,reference");
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with(",outbound,1.50,bob,transfer_1"));
    }

    #[test]
    fn test_reference_serializes_as_text() {
        let json = serde_json::to_string(&Reference::Order(7)).unwrap();
        assert_eq!(json, "\"order_7\"");
    }
}
