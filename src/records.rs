//! Ledger records: transfers, orders and products.
//!
//! Transfers and orders are append-only facts; once committed they are never
//! updated or deleted. Products are the only records whose row (stock) is
//! rewritten, and only inside a purchase.

use crate::account::AccountId;
use crate::decimal::Money;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub type TransferId = i64;
pub type OrderId = i64;
pub type ProductId = i64;

/// Lifecycle of a transfer.
///
/// Only `Completed` is ever persisted: failures abort before any write, and
/// there is no asynchronous settlement step that would observe `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Completed,
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Completed => "completed",
            TransferStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransferStatus::Pending),
            "completed" => Some(TransferStatus::Completed),
            "failed" => Some(TransferStatus::Failed),
            _ => None,
        }
    }
}

/// Lifecycle of an order. Only `Paid` is ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "failed" => Some(OrderStatus::Failed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// A committed balance movement between two accounts.
#[derive(Debug, Clone, Serialize)]
pub struct Transfer {
    pub id: TransferId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Money,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

/// Transfer row to be inserted. The store stamps `created_at`.
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Money,
    pub status: TransferStatus,
}

/// A transfer together with the owner key of the account on the other side.
///
/// Produced by the history queries, which join the counterparty account.
#[derive(Debug, Clone)]
pub struct TransferLeg {
    pub transfer: Transfer,
    pub counterparty: String,
}

/// A committed purchase.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: String,
    pub product_id: ProductId,

    /// `price * quantity` at the time of purchase.
    pub amount: Money,

    pub quantity: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Order row to be inserted. The store stamps `created_at`.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: String,
    pub product_id: ProductId,
    pub amount: Money,
    pub quantity: i64,
    pub status: OrderStatus,
}

/// A purchasable product.
///
/// `price` is kept as the stored text; it is parsed only when a purchase
/// needs it, so a corrupt price fails that purchase with `InvalidPrice`
/// rather than making the whole catalog unreadable.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: String,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Parses the stored unit price, which must be strictly positive.
    pub fn unit_price(&self) -> Result<Money> {
        match Money::parse(&self.price) {
            Ok(price) if price.is_positive() => Ok(price),
            _ => Err(LedgerError::InvalidPrice {
                product_id: self.id,
                price: self.price.clone(),
            }),
        }
    }
}

/// Product row to be inserted.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: i64,
}

impl NewProduct {
    /// Validates a catalog entry: non-empty name, price > 0, stock >= 0.
    pub fn new(name: &str, description: &str, price: Money, stock: i64) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidInput(
                "product name must not be empty".to_string(),
            ));
        }
        if !price.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "price {} must be greater than zero",
                price
            )));
        }
        if stock < 0 {
            return Err(LedgerError::InvalidInput(format!(
                "stock {} is negative",
                stock
            )));
        }

        Ok(NewProduct {
            name: name.to_string(),
            description: description.trim().to_string(),
            price,
            stock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: &str) -> Product {
        let now = Utc::now();
        Product {
            id: 3,
            name: "Tea".to_string(),
            description: String::new(),
            price: price.to_string(),
            stock: 5,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_text_round_trip() {
        for status in [
            TransferStatus::Pending,
            TransferStatus::Completed,
            TransferStatus::Failed,
        ] {
            assert_eq!(TransferStatus::parse(status.as_str()), Some(status));
        }
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Failed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TransferStatus::parse("settled"), None);
    }

    #[test]
    fn test_unit_price_parses_stored_text() {
        assert_eq!(product("10.00").unit_price().unwrap().to_string(), "10.00");
    }

    #[test]
    fn test_unparsable_price_is_invalid_price() {
        let err = product("ten").unit_price().unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPrice { product_id: 3, .. }));

        assert!(product("0.00").unit_price().is_err());
    }

    #[test]
    fn test_new_product_validation() {
        let price = Money::parse("1.00").unwrap();
        assert!(NewProduct::new("", "", price, 1).is_err());
        assert!(NewProduct::new("Tea", "", price, -1).is_err());
        assert!(NewProduct::new("Tea", "", Money::parse("-1").unwrap(), 1).is_err());
        assert!(NewProduct::new("Tea", "", Money::ZERO, 1).is_err());
        assert_eq!(NewProduct::new(" Tea ", "", price, 0).unwrap().name, "Tea");
    }
}
