//! Account opening, product catalog and order lookups.

use crate::account::{Account, AccountId, NewAccount};
use crate::decimal::Money;
use crate::error::{LedgerError, Result};
use crate::records::{NewProduct, Order, OrderId, Product, ProductId};
use crate::store::{AtomicUnit, LedgerStore};
use log::info;

/// Creates and looks up accounts, products and orders.
pub struct Registry<'s, S: LedgerStore> {
    store: &'s S,
    clearing_owner: &'s str,
}

impl<'s, S: LedgerStore> Registry<'s, S> {
    pub fn new(store: &'s S, clearing_owner: &'s str) -> Self {
        Registry {
            store,
            clearing_owner,
        }
    }

    /// Opens an account for `user_id` holding `opening_balance`.
    ///
    /// The clearing owner key is reserved and reported as a duplicate.
    pub fn open_account(
        &self,
        user_id: &str,
        currency: &str,
        opening_balance: &str,
    ) -> Result<Account> {
        let balance = Money::parse(opening_balance)?;
        let new = NewAccount::new(user_id, currency, balance)?;
        if new.user_id == self.clearing_owner {
            return Err(LedgerError::DuplicateAccount(new.user_id));
        }

        let mut unit = self.store.begin()?;
        let account = unit
            .insert_account(&new)?
            .ok_or_else(|| LedgerError::DuplicateAccount(new.user_id.clone()))?;
        unit.commit()?;

        info!(
            "Opened account {} for {} with {} {}",
            account.id, account.user_id, account.balance, account.currency
        );
        Ok(account)
    }

    pub fn account(&self, id: AccountId) -> Result<Account> {
        self.store
            .account(id)?
            .ok_or_else(|| LedgerError::AccountNotFound {
                side: "Requested",
                key: id.to_string(),
            })
    }

    pub fn account_by_user(&self, user_id: &str) -> Result<Account> {
        self.store
            .account_by_user(user_id)?
            .ok_or_else(|| LedgerError::UserAccountNotFound(user_id.to_string()))
    }

    pub fn accounts(&self) -> Result<Vec<Account>> {
        self.store.accounts()
    }

    pub fn add_product(
        &self,
        name: &str,
        description: &str,
        price: &str,
        stock: i64,
    ) -> Result<Product> {
        let new = NewProduct::new(name, description, Money::parse(price)?, stock)?;

        let mut unit = self.store.begin()?;
        let product = unit.insert_product(&new)?;
        unit.commit()?;

        info!(
            "Added product {} '{}' at {} ({} in stock)",
            product.id, product.name, product.price, product.stock
        );
        Ok(product)
    }

    pub fn product(&self, id: ProductId) -> Result<Product> {
        self.store
            .product(id)?
            .ok_or(LedgerError::ProductNotFound(id))
    }

    pub fn products(&self) -> Result<Vec<Product>> {
        self.store.products()
    }

    pub fn order(&self, id: OrderId) -> Result<Order> {
        self.store.order(id)?.ok_or(LedgerError::OrderNotFound(id))
    }

    pub fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        self.store.orders_for_user(user_id)
    }
}
