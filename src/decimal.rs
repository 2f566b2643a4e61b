//! Exact decimal type for monetary values.
//!
//! Uses `rust_decimal` internally (a 96-bit integer mantissa plus a base-10
//! scale) so that balances, prices and amounts never pass through binary
//! floating point. The textual form is the canonical persisted form.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reasons a piece of text is not a valid amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// The input was empty or only whitespace.
    #[error("amount is empty")]
    Empty,

    /// The input is not a plain decimal number.
    #[error("'{0}' is not a valid decimal number")]
    Malformed(String),

    /// The input has more digits than fit without rounding.
    #[error("'{0}' cannot be represented without rounding")]
    Precision(String),
}

/// An exact decimal monetary value.
///
/// The scale of the parsed text is preserved through arithmetic, so
/// `"100.00" - "100.00"` prints as `"0.00"`. Equality and ordering compare
/// numeric value, not representation: `"5.0" == "5.00"`.
///
/// # Examples
///
/// ```
/// use ledger_core::Money;
///
/// let balance = Money::parse("100.00").unwrap();
/// let price = Money::parse("10.00").unwrap();
/// let total = price.checked_mul_quantity(2).unwrap();
///
/// assert_eq!(total.to_string(), "20.00");
/// assert_eq!(balance.checked_sub(total).unwrap().to_string(), "80.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Money(Decimal);

impl Money {
    /// Zero with no fractional digits.
    pub const ZERO: Self = Money(Decimal::ZERO);

    /// Parses a decimal string. Surrounding whitespace is ignored.
    pub fn parse(text: &str) -> Result<Self, AmountError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }
        // Plain notation only: no exponents or digit separators.
        if !trimmed
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+'))
        {
            return Err(AmountError::Malformed(trimmed.to_string()));
        }

        // `from_str` would silently round anything past 28 significant digits.
        match Decimal::from_str_exact(trimmed) {
            Ok(value) => Ok(Money(value)),
            Err(_) if Decimal::from_str(trimmed).is_ok() => {
                Err(AmountError::Precision(trimmed.to_string()))
            }
            Err(_) => Err(AmountError::Malformed(trimmed.to_string())),
        }
    }

    /// Returns `true` if this value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` if this value is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns `true` if this value is strictly less than zero.
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Exact addition, `None` on overflow or if the sum would be rounded.
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        let sum = self.0.checked_add(rhs.0)?;
        exact(sum, self.0.scale().max(rhs.0.scale()))
    }

    /// Exact subtraction, `None` on overflow or if the difference would be rounded.
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        let difference = self.0.checked_sub(rhs.0)?;
        exact(difference, self.0.scale().max(rhs.0.scale()))
    }

    /// Multiplies a unit price by an item count, `None` on overflow or rounding.
    pub fn checked_mul_quantity(self, quantity: i64) -> Option<Money> {
        let product = self.0.checked_mul(Decimal::from(quantity))?;
        exact(product, self.0.scale())
    }
}

// `rust_decimal` drops fractional digits instead of overflowing when a result
// needs more than 96 bits; a scale below the operands' means that happened.
fn exact(value: Decimal, scale: u32) -> Option<Money> {
    if value.scale() < scale {
        None
    } else {
        Some(Money(value))
    }
}

impl FromStr for Money {
    type Err = AmountError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print "-0.00".
        if self.0.is_zero() {
            write!(f, "{}", self.0.abs())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Money::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    #[test]
    fn test_parse_preserves_scale() {
        assert_eq!(m("100.00").to_string(), "100.00");
        assert_eq!(m("0.5").to_string(), "0.5");
        assert_eq!(m("  42.10  ").to_string(), "42.10");
        assert_eq!(m("7").to_string(), "7");
    }

    #[test]
    fn test_parse_rejects_empty_input() {
        assert_eq!(Money::parse(""), Err(AmountError::Empty));
        assert_eq!(Money::parse("   "), Err(AmountError::Empty));
    }

    #[test]
    fn test_parse_rejects_non_numeric_input() {
        assert!(matches!(Money::parse("abc"), Err(AmountError::Malformed(_))));
        assert!(matches!(Money::parse("10.00 UZS"), Err(AmountError::Malformed(_))));
        assert!(matches!(Money::parse("1.2.3"), Err(AmountError::Malformed(_))));
        assert!(matches!(Money::parse("1e2"), Err(AmountError::Malformed(_))));
        assert!(matches!(Money::parse("1_000"), Err(AmountError::Malformed(_))));
    }

    #[test]
    fn test_parse_rejects_digits_that_would_be_rounded() {
        assert!(matches!(
            Money::parse("100.0000000000000000000000000001"),
            Err(AmountError::Precision(_))
        ));
        assert!(matches!(
            Money::parse("0.000000000000000000000000000001"),
            Err(AmountError::Precision(_))
        ));
        assert_eq!(
            m("0.0000000000000000000000000001").to_string(),
            "0.0000000000000000000000000001"
        );
    }

    #[test]
    fn test_arithmetic_refuses_to_round() {
        let tiny = m("0.0000000000000000000000000001");
        assert!(m("100.00").checked_sub(tiny).is_none());
        assert!(m("100.00").checked_add(tiny).is_none());
        assert!(m("1.0000000000000000000000000001")
            .checked_mul_quantity(10)
            .is_none());
        assert_eq!(
            tiny.checked_add(tiny).unwrap().to_string(),
            "0.0000000000000000000000000002"
        );
    }

    #[test]
    fn test_round_trip_through_canonical_string() {
        for text in ["0", "0.00", "100.00", "-3.25", "0.0001", "999999999999.99"] {
            let value = m(text);
            assert_eq!(Money::parse(&value.to_string()).unwrap(), value);
        }
    }

    #[test]
    fn test_equality_ignores_representation() {
        assert_eq!(m("5.0"), m("5.00"));
        assert!(m("100.00") > m("99.99"));
        assert!(m("0.01") < m("0.1"));
    }

    #[test]
    fn test_arithmetic_is_exact() {
        let a = m("0.1");
        let b = m("0.2");
        assert_eq!(a.checked_add(b).unwrap(), m("0.3"));

        let emptied = m("100.00").checked_sub(m("100.00")).unwrap();
        assert_eq!(emptied.to_string(), "0.00");
        assert!(emptied.is_zero());
    }

    #[test]
    fn test_multiply_by_quantity() {
        assert_eq!(m("10.00").checked_mul_quantity(2).unwrap().to_string(), "20.00");
        assert_eq!(m("0.33").checked_mul_quantity(3).unwrap(), m("0.99"));
    }

    #[test]
    fn test_overflow_is_reported() {
        let max = Money(Decimal::MAX);
        assert!(max.checked_add(m("1")).is_none());
        assert!(max.checked_mul_quantity(2).is_none());
    }

    #[test]
    fn test_sign_helpers() {
        assert!(m("0.01").is_positive());
        assert!(!m("0.00").is_positive());
        assert!(m("-0.01").is_negative());
        assert!(!Money::ZERO.is_negative());
    }
}
