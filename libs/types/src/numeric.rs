//! Price and quantity newtypes
//!
//! Prices are fixed-point decimals (rust_decimal) for deterministic
//! arithmetic, serialized as strings to avoid JSON number precision loss.
//! Quantities are whole lots.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Limit price with fixed-point decimal representation
///
/// Must always be strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(Decimal);

impl Price {
    /// Create a new Price from a Decimal
    ///
    /// # Panics
    /// Panics if the price is negative or zero
    pub fn new(value: Decimal) -> Self {
        assert!(value > Decimal::ZERO, "Price must be positive");
        Self(value)
    }

    /// Try to create a Price, returning None if invalid
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create from integer (for testing/convenience)
    pub fn from_u64(value: u64) -> Self {
        Self::new(Decimal::from(value))
    }

    /// Create from string
    pub fn from_str(s: &str) -> Result<Self, rust_decimal::Error> {
        let decimal = Decimal::from_str(s)?;
        Ok(Self::new(decimal))
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// `(other - self) / self`, the fractional spread seen from this price.
    /// None when `other` does not exceed `self`.
    pub fn fractional_spread_to(&self, other: Price) -> Option<Decimal> {
        if other.0 > self.0 {
            Some((other.0 - self.0) / self.0)
        } else {
            None
        }
    }

    /// Round to specified decimal places, half away from zero.
    pub fn round_dp(&self, dp: u32) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero),
        )
    }
}

// Custom serialization to preserve precision
impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Self::try_new(decimal).ok_or_else(|| serde::de::Error::custom("Price must be positive"))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order quantity in whole lots
///
/// `Lots::new` rejects zero; zero only appears as a remaining quantity on a
/// fully matched order, via [`Lots::zero`] or subtraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lots(u32);

impl Lots {
    /// Create a new lot count
    ///
    /// # Panics
    /// Panics if the count is zero
    pub fn new(value: u32) -> Self {
        assert!(value > 0, "Lots must be positive");
        Self(value)
    }

    /// Try to create a lot count, returning None for zero
    pub fn try_new(value: u32) -> Option<Self> {
        if value > 0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }

    pub fn min(self, other: Lots) -> Lots {
        Lots(self.0.min(other.0))
    }

    /// Subtraction that refuses to go negative.
    pub fn checked_sub(self, other: Lots) -> Option<Lots> {
        self.0.checked_sub(other.0).map(Lots)
    }

    /// `self - other`, or zero when `other` is larger.
    pub fn saturating_sub(self, other: Lots) -> Lots {
        Lots(self.0.saturating_sub(other.0))
    }
}

impl Add for Lots {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Lots(self.0 + rhs.0)
    }
}

impl fmt::Display for Lots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_creation() {
        let price = Price::from_u64(100);
        assert_eq!(price.as_decimal(), Decimal::from(100));
    }

    #[test]
    #[should_panic(expected = "Price must be positive")]
    fn test_price_zero_panics() {
        Price::new(Decimal::ZERO);
    }

    #[test]
    fn test_price_try_new_rejects_negative() {
        assert!(Price::try_new(Decimal::from(-5)).is_none());
    }

    #[test]
    fn test_price_serialization_as_string() {
        let price = Price::from_str("100.25").unwrap();
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"100.25\"");

        let back: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(price, back);
    }

    #[test]
    fn test_price_deserialize_rejects_nonpositive() {
        assert!(serde_json::from_str::<Price>("\"0\"").is_err());
        assert!(serde_json::from_str::<Price>("\"-3\"").is_err());
    }

    #[test]
    fn test_fractional_spread() {
        let bid = Price::from_u64(100);
        let offer = Price::from_u64(110);
        assert_eq!(
            bid.fractional_spread_to(offer),
            Some(Decimal::from_str("0.1").unwrap())
        );
        // Equal or inverted prices have no spread.
        assert!(bid.fractional_spread_to(bid).is_none());
        assert!(offer.fractional_spread_to(bid).is_none());
    }

    #[test]
    fn test_lots_creation() {
        let lots = Lots::new(50);
        assert_eq!(lots.get(), 50);
        assert!(!lots.is_zero());
    }

    #[test]
    #[should_panic(expected = "Lots must be positive")]
    fn test_lots_zero_panics() {
        Lots::new(0);
    }

    #[test]
    fn test_lots_arithmetic() {
        let a = Lots::new(50);
        let b = Lots::new(15);

        assert_eq!(a.min(b), b);
        assert_eq!(a.checked_sub(b), Some(Lots::new(35)));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(b.saturating_sub(a), Lots::zero());
        assert_eq!(a + b, Lots::new(65));
    }

    #[test]
    fn test_lots_serialization_is_plain_integer() {
        let lots = Lots::new(15);
        assert_eq!(serde_json::to_string(&lots).unwrap(), "15");
        let back: Lots = serde_json::from_str("15").unwrap();
        assert_eq!(lots, back);
    }
}
