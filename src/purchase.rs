//! Product purchases.
//!
//! A purchase is a single atomic unit: the product row is locked first so
//! two buyers cannot both pass a stale stock check, then the buyer pays the
//! clearing account through the account ledger, the stock is decremented and
//! the Order is recorded. Any failure drops the unit and nothing persists.

use crate::error::{LedgerError, Result};
use crate::ledger::{ensure_compatible, AccountLedger};
use crate::records::{NewOrder, Order, OrderId, OrderStatus, ProductId};
use crate::store::{AtomicUnit, LedgerStore};
use log::{debug, info};
use serde::Serialize;

/// Successful purchase outcome handed to the request layer.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub message: String,
}

/// Sells products against account balances.
pub struct PurchaseEngine<'s, S: LedgerStore> {
    store: &'s S,
    clearing_owner: &'s str,
}

impl<'s, S: LedgerStore> PurchaseEngine<'s, S> {
    /// `clearing_owner` is the owner key of the bootstrapped clearing account.
    pub fn new(store: &'s S, clearing_owner: &'s str) -> Self {
        PurchaseEngine {
            store,
            clearing_owner,
        }
    }

    /// Buys `quantity` units of `product_id` for `user_id`.
    pub fn purchase(
        &self,
        user_id: &str,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<PurchaseReceipt> {
        match self.place_order(user_id, product_id, quantity) {
            Ok(order) => {
                info!(
                    "Order {} paid: {} x product {} for {} by {}",
                    order.id, order.quantity, order.product_id, order.amount, order.user_id
                );
                Ok(PurchaseReceipt {
                    order_id: order.id,
                    status: order.status,
                    message: "Order created successfully".to_string(),
                })
            }
            Err(e) => {
                debug!(
                    "Purchase of {} x product {} by {} rejected: {}",
                    quantity, product_id, user_id, e
                );
                Err(e)
            }
        }
    }

    fn place_order(&self, user_id: &str, product_id: ProductId, quantity: i64) -> Result<Order> {
        if quantity < 1 {
            return Err(LedgerError::InvalidQuantity(quantity));
        }

        let mut unit = self.store.begin()?;
        let mut ledger = AccountLedger::new(&mut unit);

        let product = ledger
            .unit()
            .lock_product(product_id)?
            .ok_or(LedgerError::ProductNotFound(product_id))?;
        if product.stock < quantity {
            return Err(LedgerError::OutOfStock {
                available: product.stock,
                requested: quantity,
            });
        }

        let total = product
            .unit_price()?
            .checked_mul_quantity(quantity)
            .ok_or(LedgerError::Overflow("order total"))?;

        if user_id == self.clearing_owner {
            return Err(LedgerError::SameAccount);
        }
        let (buyer, clearing) = ledger.lock_pair_by_user(user_id, self.clearing_owner)?;
        let mut buyer = buyer.ok_or_else(|| LedgerError::UserAccountNotFound(user_id.to_string()))?;
        let mut clearing = clearing
            .ok_or_else(|| LedgerError::SystemAccountMissing(self.clearing_owner.to_string()))?;
        ensure_compatible(&buyer, &clearing)?;

        // Fails with InsufficientFunds before any write.
        ledger.settle(&mut buyer, &mut clearing, total)?;

        ledger
            .unit()
            .write_stock(product.id, product.stock - quantity)?;
        let order = ledger.unit().insert_order(&NewOrder {
            user_id: buyer.user_id.clone(),
            product_id: product.id,
            amount: total,
            quantity,
            status: OrderStatus::Paid,
        })?;

        unit.commit()?;
        Ok(order)
    }
}
