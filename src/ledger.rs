//! Account ledger: locked reads and balance movement inside one atomic unit.
//!
//! Both engines move money exclusively through [`AccountLedger::settle`], so
//! the balance rules (same currency, positive amount, no overdraft) and the
//! Transfer record written alongside every movement live in one place.

use crate::account::{Account, AccountId};
use crate::decimal::Money;
use crate::error::{LedgerError, Result};
use crate::records::{NewTransfer, Transfer, TransferStatus};
use crate::store::AtomicUnit;
use log::debug;

/// Invariant-bearing view of accounts within a single atomic unit.
pub struct AccountLedger<'u, U: AtomicUnit> {
    unit: &'u mut U,
}

impl<'u, U: AtomicUnit> AccountLedger<'u, U> {
    pub fn new(unit: &'u mut U) -> Self {
        AccountLedger { unit }
    }

    /// Gives access to the underlying unit for non-account rows.
    pub fn unit(&mut self) -> &mut U {
        &mut *self.unit
    }

    /// Locks two accounts by id, lowest id first.
    ///
    /// The fixed order means two transfers in opposite directions between the
    /// same pair can never each hold one lock while waiting for the other.
    pub fn lock_pair(
        &mut self,
        from: AccountId,
        to: AccountId,
    ) -> Result<(Option<Account>, Option<Account>)> {
        if from <= to {
            let first = self.unit.lock_account(from)?;
            let second = self.unit.lock_account(to)?;
            Ok((first, second))
        } else {
            let first = self.unit.lock_account(to)?;
            let second = self.unit.lock_account(from)?;
            Ok((second, first))
        }
    }

    /// Locks two accounts by owner key, lowest key first.
    pub fn lock_pair_by_user(
        &mut self,
        from: &str,
        to: &str,
    ) -> Result<(Option<Account>, Option<Account>)> {
        if from <= to {
            let first = self.unit.lock_account_by_user(from)?;
            let second = self.unit.lock_account_by_user(to)?;
            Ok((first, second))
        } else {
            let first = self.unit.lock_account_by_user(to)?;
            let second = self.unit.lock_account_by_user(from)?;
            Ok((second, first))
        }
    }

    /// Moves `amount` from `from` to `to` and records a completed Transfer.
    ///
    /// Both accounts must have been locked through this ledger. On error
    /// nothing has been written and the caller drops the unit.
    pub fn settle(&mut self, from: &mut Account, to: &mut Account, amount: Money) -> Result<Transfer> {
        ensure_compatible(from, to)?;
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "{} must be greater than zero",
                amount
            )));
        }

        from.debit(amount)?;
        to.credit(amount)?;
        #[cfg(debug_assertions)]
        debug_assert!(from.check_invariant() && to.check_invariant());

        self.unit.write_balance(from)?;
        self.unit.write_balance(to)?;
        let transfer = self.unit.insert_transfer(&NewTransfer {
            from_account_id: from.id,
            to_account_id: to.id,
            amount,
            status: TransferStatus::Completed,
        })?;

        debug!(
            "Settled transfer {}: {} {} from {} to {}",
            transfer.id, amount, from.currency, from.user_id, to.user_id
        );
        Ok(transfer)
    }
}

/// Checks that money may move between the two accounts at all.
pub fn ensure_compatible(from: &Account, to: &Account) -> Result<()> {
    if from.id == to.id {
        return Err(LedgerError::SameAccount);
    }
    if from.currency != to.currency {
        return Err(LedgerError::CurrencyMismatch {
            from: from.currency.clone(),
            to: to.currency.clone(),
        });
    }
    Ok(())
}
