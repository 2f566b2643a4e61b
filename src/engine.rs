//! Ledger facade.
//!
//! Wires a store, the clearing account and the engines together behind one
//! handle. Opening a ledger always runs the clearing account bootstrap, so
//! every operation on a [`Ledger`] can assume the clearing account exists.

use crate::account::{Account, AccountId};
use crate::bootstrap::SystemAccountBootstrap;
use crate::config::LedgerConfig;
use crate::error::Result;
use crate::history::{HistoryAggregator, HistoryReport};
use crate::purchase::{PurchaseEngine, PurchaseReceipt};
use crate::records::{Order, OrderId, Product, ProductId};
use crate::registry::Registry;
use crate::store::{LedgerStore, SqliteStore};
use crate::transfer::{TransferEngine, TransferReceipt};
use log::info;

/// A ledger over a shared store.
///
/// Holds no balances or rows of its own; each call runs against the store and
/// returns a terminal result.
pub struct Ledger<S: LedgerStore> {
    store: S,
    clearing: Account,
}

impl Ledger<SqliteStore> {
    /// Opens the SQLite database named by `config` and bootstraps it.
    pub fn open(config: &LedgerConfig) -> Result<Self> {
        let store = SqliteStore::open(&config.database_path, config.busy_timeout)?;
        let bootstrap =
            SystemAccountBootstrap::new(&config.clearing_owner, &config.clearing_currency)?;
        Ledger::with_store(store, &bootstrap)
    }
}

impl<S: LedgerStore> Ledger<S> {
    /// Wraps an existing store, running `bootstrap` against it first.
    pub fn with_store(store: S, bootstrap: &SystemAccountBootstrap) -> Result<Self> {
        let clearing = bootstrap.run(&store)?;
        info!(
            "Ledger ready; clearing account {} ({})",
            clearing.user_id, clearing.currency
        );
        Ok(Ledger { store, clearing })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The clearing account as it was at open time.
    pub fn clearing_account(&self) -> &Account {
        &self.clearing
    }

    pub fn transfer(&self, from: AccountId, to: AccountId, amount: &str) -> Result<TransferReceipt> {
        TransferEngine::new(&self.store).transfer(from, to, amount)
    }

    pub fn transfer_by_user(&self, from: &str, to: &str, amount: &str) -> Result<TransferReceipt> {
        TransferEngine::new(&self.store).transfer_by_user(from, to, amount)
    }

    pub fn purchase(
        &self,
        user_id: &str,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<PurchaseReceipt> {
        PurchaseEngine::new(&self.store, &self.clearing.user_id).purchase(
            user_id,
            product_id,
            quantity,
        )
    }

    pub fn history(&self, user_id: &str) -> Result<HistoryReport> {
        HistoryAggregator::new(&self.store).history(user_id)
    }

    pub fn open_account(
        &self,
        user_id: &str,
        currency: &str,
        opening_balance: &str,
    ) -> Result<Account> {
        self.registry()
            .open_account(user_id, currency, opening_balance)
    }

    pub fn account(&self, id: AccountId) -> Result<Account> {
        self.registry().account(id)
    }

    pub fn account_by_user(&self, user_id: &str) -> Result<Account> {
        self.registry().account_by_user(user_id)
    }

    pub fn accounts(&self) -> Result<Vec<Account>> {
        self.registry().accounts()
    }

    pub fn add_product(
        &self,
        name: &str,
        description: &str,
        price: &str,
        stock: i64,
    ) -> Result<Product> {
        self.registry().add_product(name, description, price, stock)
    }

    pub fn product(&self, id: ProductId) -> Result<Product> {
        self.registry().product(id)
    }

    pub fn products(&self) -> Result<Vec<Product>> {
        self.registry().products()
    }

    pub fn order(&self, id: OrderId) -> Result<Order> {
        self.registry().order(id)
    }

    pub fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        self.registry().orders_for_user(user_id)
    }

    fn registry(&self) -> Registry<'_, S> {
        Registry::new(&self.store, &self.clearing.user_id)
    }
}
