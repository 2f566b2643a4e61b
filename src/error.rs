//! Error types for the ledger core.

use crate::decimal::{AmountError, Money};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Broad failure class, used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed caller input.
    Validation,
    /// A referenced account, product or order does not exist.
    NotFound,
    /// The request is well formed but conflicts with current state.
    Conflict,
    /// Store failure or a broken invariant inside the ledger itself.
    Internal,
}

/// Errors that can occur during ledger operations.
///
/// Every variant is returned only after the enclosing atomic unit has been
/// rolled back, so no failure implies partial success.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Amount text is empty, non-numeric or not strictly positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Purchase quantity below one
    #[error("Invalid quantity {0}: must be at least 1")]
    InvalidQuantity(i64),

    /// Owner key or product name is empty
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Currency code is not three uppercase ASCII letters
    #[error("Invalid currency code '{0}'")]
    InvalidCurrency(String),

    /// Account addressed by id or owner key is missing
    #[error("{side} account {key} not found")]
    AccountNotFound { side: &'static str, key: String },

    /// Buyer of a purchase has no account
    #[error("No account for user {0}")]
    UserAccountNotFound(String),

    #[error("Product {0} not found")]
    ProductNotFound(i64),

    #[error("Order {0} not found")]
    OrderNotFound(i64),

    /// Source and destination are the same account
    #[error("Cannot transfer to the same account")]
    SameAccount,

    #[error("Currency mismatch: {from} vs {to}")]
    CurrencyMismatch { from: String, to: String },

    #[error("Insufficient funds: balance {available}, required {required}")]
    InsufficientFunds { available: Money, required: Money },

    #[error("Out of stock: {available} available, {requested} requested")]
    OutOfStock { available: i64, requested: i64 },

    /// An account with this owner key already exists (or the key is reserved)
    #[error("Account for user {0} already exists")]
    DuplicateAccount(String),

    /// Reserved clearing account is absent; bootstrap did not run or failed
    #[error("System clearing account {0} is missing")]
    SystemAccountMissing(String),

    /// Stored product price cannot be parsed
    #[error("Product {product_id} has an invalid price '{price}'")]
    InvalidPrice { product_id: i64, price: String },

    /// A persisted row failed to decode (bad decimal, timestamp or status)
    #[error("Corrupt {table} record {id}: {message}")]
    CorruptRecord {
        table: &'static str,
        id: i64,
        message: String,
    },

    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying store failure
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    /// Classifies the error into the four failure kinds.
    pub fn kind(&self) -> ErrorKind {
        use LedgerError::*;
        match self {
            InvalidAmount(_) | InvalidQuantity(_) | InvalidInput(_) | InvalidCurrency(_) => {
                ErrorKind::Validation
            }
            AccountNotFound { .. }
            | UserAccountNotFound(_)
            | ProductNotFound(_)
            | OrderNotFound(_) => ErrorKind::NotFound,
            SameAccount
            | CurrencyMismatch { .. }
            | InsufficientFunds { .. }
            | OutOfStock { .. }
            | DuplicateAccount(_) => ErrorKind::Conflict,
            SystemAccountMissing(_)
            | InvalidPrice { .. }
            | CorruptRecord { .. }
            | Overflow(_)
            | Config(_)
            | Store(_)
            | Io(_)
            | Csv(_)
            | Json(_) => ErrorKind::Internal,
        }
    }

    /// Stable name of the specific outcome, e.g. `"InsufficientFunds"`.
    pub fn code(&self) -> &'static str {
        use LedgerError::*;
        match self {
            InvalidAmount(_) => "InvalidAmount",
            InvalidQuantity(_) => "InvalidQuantity",
            InvalidInput(_) => "InvalidInput",
            InvalidCurrency(_) => "InvalidCurrency",
            AccountNotFound { .. } => "AccountNotFound",
            UserAccountNotFound(_) => "UserAccountNotFound",
            ProductNotFound(_) => "ProductNotFound",
            OrderNotFound(_) => "OrderNotFound",
            SameAccount => "SameAccount",
            CurrencyMismatch { .. } => "CurrencyMismatch",
            InsufficientFunds { .. } => "InsufficientFunds",
            OutOfStock { .. } => "OutOfStock",
            DuplicateAccount(_) => "DuplicateAccount",
            SystemAccountMissing(_) => "SystemAccountMissing",
            InvalidPrice { .. } => "InvalidPrice",
            CorruptRecord { .. } => "CorruptRecord",
            Overflow(_) => "Overflow",
            Config(_) => "Config",
            Store(_) => "Store",
            Io(_) => "Io",
            Csv(_) => "Csv",
            Json(_) => "Json",
        }
    }
}

impl From<AmountError> for LedgerError {
    fn from(err: AmountError) -> Self {
        LedgerError::InvalidAmount(err.to_string())
    }
}

/// Structured failure handed back to the request layer.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
}

impl From<&LedgerError> for Failure {
    fn from(err: &LedgerError) -> Self {
        Failure {
            kind: err.kind(),
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_failures_are_classified() {
        assert_eq!(LedgerError::SameAccount.kind(), ErrorKind::Conflict);
        assert_eq!(LedgerError::InvalidQuantity(0).kind(), ErrorKind::Validation);
        assert_eq!(LedgerError::ProductNotFound(7).kind(), ErrorKind::NotFound);
        assert_eq!(
            LedgerError::SystemAccountMissing("0".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_amount_errors_become_invalid_amount() {
        let err: LedgerError = AmountError::Empty.into();
        assert_eq!(err.code(), "InvalidAmount");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_failure_carries_kind_code_and_message() {
        let err = LedgerError::OutOfStock {
            available: 0,
            requested: 1,
        };
        let failure = Failure::from(&err);
        assert_eq!(failure.kind, ErrorKind::Conflict);
        assert_eq!(failure.code, "OutOfStock");
        assert_eq!(failure.message, "Out of stock: 0 available, 1 requested");

        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("\"kind\":\"conflict\""));
    }
}
