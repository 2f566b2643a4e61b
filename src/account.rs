//! Account model and balance operations.
//!
//! Maintains the invariant: `balance >= 0` after every operation.

use crate::decimal::Money;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Internal account identifier.
pub type AccountId = i64;

/// A user's money account as loaded inside one atomic unit.
///
/// # Invariants
///
/// - `balance` never becomes negative; `debit` refuses instead
/// - `currency` is fixed at creation and never rewritten
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: AccountId,

    /// External owner key (unique across accounts).
    pub user_id: String,

    /// Three-letter currency code.
    pub currency: String,

    pub balance: Money,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Removes `amount` from the balance.
    ///
    /// Fails with `InsufficientFunds` if the balance is smaller than
    /// `amount`; the account is left untouched in that case.
    pub fn debit(&mut self, amount: Money) -> Result<()> {
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                available: self.balance,
                required: amount,
            });
        }

        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(LedgerError::Overflow("debited balance"))?;
        Ok(())
    }

    /// Adds `amount` to the balance.
    pub fn credit(&mut self, amount: Money) -> Result<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow("credited balance"))?;
        Ok(())
    }

    /// Verifies the invariant: `balance >= 0`.
    #[cfg(debug_assertions)]
    pub fn check_invariant(&self) -> bool {
        !self.balance.is_negative()
    }
}

/// Data needed to insert a new account row.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: String,
    pub currency: String,
    pub balance: Money,
}

impl NewAccount {
    /// Validates an account opening request.
    pub fn new(user_id: &str, currency: &str, balance: Money) -> Result<Self> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(LedgerError::InvalidInput(
                "user id must not be empty".to_string(),
            ));
        }
        validate_currency(currency)?;
        if balance.is_negative() {
            return Err(LedgerError::InvalidAmount(format!(
                "opening balance {} is negative",
                balance
            )));
        }

        Ok(NewAccount {
            user_id: user_id.to_string(),
            currency: currency.to_string(),
            balance,
        })
    }
}

/// Checks that `code` is three uppercase ASCII letters, e.g. `UZS`.
pub fn validate_currency(code: &str) -> Result<()> {
    if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(LedgerError::InvalidCurrency(code.to_string()))
    }
}
