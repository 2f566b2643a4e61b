//! Start-up creation of the reserved clearing account.

use crate::account::{validate_currency, Account, NewAccount};
use crate::decimal::Money;
use crate::error::{LedgerError, Result};
use crate::store::{AtomicUnit, LedgerStore};
use log::{debug, info, warn};

/// Default owner key of the clearing account.
pub const DEFAULT_CLEARING_OWNER: &str = "0";

/// Default currency of the clearing account.
pub const DEFAULT_CLEARING_CURRENCY: &str = "UZS";

/// Ensures the clearing account that absorbs purchase proceeds exists.
///
/// Idempotent: run it on every start. Concurrent runs against the same store
/// cannot create two accounts because the owner key is unique and the insert
/// tolerates conflicts, re-reading whichever row won.
#[derive(Debug, Clone)]
pub struct SystemAccountBootstrap {
    owner: String,
    currency: String,
}

impl SystemAccountBootstrap {
    pub fn new(owner: &str, currency: &str) -> Result<Self> {
        if owner.trim().is_empty() {
            return Err(LedgerError::Config(
                "clearing account owner must not be empty".to_string(),
            ));
        }
        validate_currency(currency)?;

        Ok(SystemAccountBootstrap {
            owner: owner.trim().to_string(),
            currency: currency.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the clearing account, creating it with a zero balance if absent.
    pub fn run<S: LedgerStore>(&self, store: &S) -> Result<Account> {
        let mut unit = store.begin()?;

        let account = match unit.lock_account_by_user(&self.owner)? {
            Some(existing) => {
                debug!("Clearing account {} already present", existing.user_id);
                existing
            }
            None => {
                let new = NewAccount::new(&self.owner, &self.currency, Money::parse("0.00")?)?;
                match unit.insert_account(&new)? {
                    Some(created) => {
                        info!(
                            "Created clearing account {} ({})",
                            created.user_id, created.currency
                        );
                        created
                    }
                    None => unit
                        .lock_account_by_user(&self.owner)?
                        .ok_or_else(|| LedgerError::SystemAccountMissing(self.owner.clone()))?,
                }
            }
        };
        unit.commit()?;

        if account.currency != self.currency {
            warn!(
                "Clearing account {} holds {} but {} is configured; keeping stored currency",
                account.user_id, account.currency, self.currency
            );
        }

        Ok(account)
    }
}

impl Default for SystemAccountBootstrap {
    fn default() -> Self {
        SystemAccountBootstrap {
            owner: DEFAULT_CLEARING_OWNER.to_string(),
            currency: DEFAULT_CLEARING_CURRENCY.to_string(),
        }
    }
}
