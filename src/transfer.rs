//! Peer-to-peer transfers.
//!
//! Two entry points with identical semantics: parties addressed by internal
//! account id, or by external owner key. Each call is one atomic unit that
//! either commits the debit, the credit and the Transfer row together, or
//! leaves the store untouched.

use crate::account::{Account, AccountId};
use crate::decimal::Money;
use crate::error::{LedgerError, Result};
use crate::ledger::{ensure_compatible, AccountLedger};
use crate::records::{Transfer, TransferId, TransferStatus};
use crate::store::{AtomicUnit, LedgerStore};
use log::{debug, info};
use serde::Serialize;

/// Successful transfer outcome handed to the request layer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub transfer_id: TransferId,
    pub status: TransferStatus,
    pub message: String,
}

impl From<&Transfer> for TransferReceipt {
    fn from(transfer: &Transfer) -> Self {
        TransferReceipt {
            transfer_id: transfer.id,
            status: transfer.status,
            message: "Transfer completed successfully".to_string(),
        }
    }
}

/// Moves money between two accounts.
pub struct TransferEngine<'s, S: LedgerStore> {
    store: &'s S,
}

impl<'s, S: LedgerStore> TransferEngine<'s, S> {
    pub fn new(store: &'s S) -> Self {
        TransferEngine { store }
    }

    /// Transfers `amount` between accounts addressed by id.
    pub fn transfer(&self, from: AccountId, to: AccountId, amount: &str) -> Result<TransferReceipt> {
        let result = self.transfer_by_id(from, to, amount);
        Self::report(&from.to_string(), &to.to_string(), amount, result)
    }

    /// Transfers `amount` between accounts addressed by owner key.
    pub fn transfer_by_user(&self, from: &str, to: &str, amount: &str) -> Result<TransferReceipt> {
        let result = self.transfer_by_owner(from, to, amount);
        Self::report(from, to, amount, result)
    }

    fn transfer_by_id(&self, from: AccountId, to: AccountId, amount: &str) -> Result<Transfer> {
        if from == to {
            return Err(LedgerError::SameAccount);
        }

        let mut unit = self.store.begin()?;
        let mut ledger = AccountLedger::new(&mut unit);
        let (source, destination) = ledger.lock_pair(from, to)?;
        let mut source = source.ok_or_else(|| not_found("Sender", from.to_string()))?;
        let mut destination = destination.ok_or_else(|| not_found("Recipient", to.to_string()))?;

        let transfer = move_funds(&mut ledger, &mut source, &mut destination, amount)?;
        unit.commit()?;
        Ok(transfer)
    }

    fn transfer_by_owner(&self, from: &str, to: &str, amount: &str) -> Result<Transfer> {
        if from == to {
            return Err(LedgerError::SameAccount);
        }

        let mut unit = self.store.begin()?;
        let mut ledger = AccountLedger::new(&mut unit);
        let (source, destination) = ledger.lock_pair_by_user(from, to)?;
        let mut source = source.ok_or_else(|| not_found("Sender", from.to_string()))?;
        let mut destination = destination.ok_or_else(|| not_found("Recipient", to.to_string()))?;

        let transfer = move_funds(&mut ledger, &mut source, &mut destination, amount)?;
        unit.commit()?;
        Ok(transfer)
    }

    fn report(
        from: &str,
        to: &str,
        amount: &str,
        result: Result<Transfer>,
    ) -> Result<TransferReceipt> {
        match result {
            Ok(transfer) => {
                info!(
                    "Transfer {} completed: {} from {} to {}",
                    transfer.id, transfer.amount, from, to
                );
                Ok(TransferReceipt::from(&transfer))
            }
            Err(e) => {
                debug!("Transfer of '{}' from {} to {} rejected: {}", amount, from, to, e);
                Err(e)
            }
        }
    }
}

/// Runs the remaining preconditions in order, then settles.
fn move_funds<U: AtomicUnit>(
    ledger: &mut AccountLedger<'_, U>,
    source: &mut Account,
    destination: &mut Account,
    amount: &str,
) -> Result<Transfer> {
    ensure_compatible(source, destination)?;

    let amount = Money::parse(amount)?;
    if !amount.is_positive() {
        return Err(LedgerError::InvalidAmount(format!(
            "{} must be greater than zero",
            amount
        )));
    }

    ledger.settle(source, destination, amount)
}

fn not_found(side: &'static str, key: String) -> LedgerError {
    LedgerError::AccountNotFound { side, key }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::NewAccount;
    use crate::store::{LedgerReader, SqliteStore};
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(accounts: &[(&str, &str, &str)]) -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("ledger.db"), Duration::from_secs(5)).unwrap();
        let mut unit = store.begin().unwrap();
        for (user, currency, balance) in accounts {
            let balance = Money::parse(balance).unwrap();
            unit.insert_account(&NewAccount::new(user, currency, balance).unwrap())
                .unwrap();
        }
        unit.commit().unwrap();
        (dir, store)
    }

    fn balance(store: &SqliteStore, user: &str) -> String {
        store.account_by_user(user).unwrap().unwrap().balance.to_string()
    }

    #[test]
    fn test_transfer_by_id_moves_full_balance() {
        let (_dir, store) = setup(&[("x", "UZS", "100.00"), ("y", "UZS", "0.00")]);
        let x = store.account_by_user("x").unwrap().unwrap();
        let y = store.account_by_user("y").unwrap().unwrap();

        let receipt = TransferEngine::new(&store)
            .transfer(x.id, y.id, "100.00")
            .unwrap();

        assert_eq!(receipt.status, TransferStatus::Completed);
        assert_eq!(balance(&store, "x"), "0.00");
        assert_eq!(balance(&store, "y"), "100.00");
    }

    #[test]
    fn test_transfer_by_user() {
        let (_dir, store) = setup(&[("x", "UZS", "10.00"), ("y", "UZS", "1.00")]);

        TransferEngine::new(&store)
            .transfer_by_user("y", "x", "0.25")
            .unwrap();

        assert_eq!(balance(&store, "x"), "10.25");
        assert_eq!(balance(&store, "y"), "0.75");
    }

    #[test]
    fn test_same_account_is_rejected() {
        let (_dir, store) = setup(&[("x", "UZS", "10.00")]);
        let engine = TransferEngine::new(&store);

        assert_eq!(engine.transfer(1, 1, "1.00").unwrap_err().code(), "SameAccount");
        assert_eq!(
            engine.transfer_by_user("x", "x", "1.00").unwrap_err().code(),
            "SameAccount"
        );
    }

    #[test]
    fn test_missing_side_is_named() {
        let (_dir, store) = setup(&[("x", "UZS", "10.00")]);
        let engine = TransferEngine::new(&store);

        match engine.transfer_by_user("x", "ghost", "1.00").unwrap_err() {
            LedgerError::AccountNotFound { side, key } => {
                assert_eq!(side, "Recipient");
                assert_eq!(key, "ghost");
            }
            other => panic!("Expected AccountNotFound, got {:?}", other),
        }
        match engine.transfer_by_user("ghost", "x", "1.00").unwrap_err() {
            LedgerError::AccountNotFound { side, .. } => assert_eq!(side, "Sender"),
            other => panic!("Expected AccountNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_precondition_order() {
        let (_dir, store) = setup(&[("x", "UZS", "10.00"), ("y", "USD", "0.00")]);
        let engine = TransferEngine::new(&store);

        // Currency is checked before the amount is parsed.
        assert_eq!(
            engine.transfer_by_user("x", "y", "garbage").unwrap_err().code(),
            "CurrencyMismatch"
        );
    }

    #[test]
    fn test_invalid_amounts() {
        let (_dir, store) = setup(&[("x", "UZS", "10.00"), ("y", "UZS", "0.00")]);
        let engine = TransferEngine::new(&store);

        for amount in ["", "abc", "0", "0.00", "-5.00"] {
            let err = engine.transfer_by_user("x", "y", amount).unwrap_err();
            assert_eq!(err.code(), "InvalidAmount", "amount {:?}", amount);
        }
        assert_eq!(balance(&store, "x"), "10.00");
    }

    #[test]
    fn test_insufficient_funds_leaves_balances_untouched() {
        let (_dir, store) = setup(&[("x", "UZS", "50.00"), ("y", "UZS", "0.00")]);
        let x = store.account_by_user("x").unwrap().unwrap();

        let err = TransferEngine::new(&store)
            .transfer_by_user("x", "y", "100.00")
            .unwrap_err();

        assert_eq!(err.code(), "InsufficientFunds");
        assert_eq!(balance(&store, "x"), "50.00");
        assert_eq!(balance(&store, "y"), "0.00");
        assert!(store.outgoing_transfers(x.id).unwrap().is_empty());
    }
}
