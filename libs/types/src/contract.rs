//! Contract identifiers
//!
//! A contract is a (monthyear, product) pair; each contract has its own
//! independent order book. The normalized form is `"<monthyear>-<product>"`,
//! e.g. `"jan26-silver"`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized contract identifier: `"<monthyear>-<product>"`
///
/// `monthyear` is three lowercase letters followed by two digits
/// (`jan26`); `product` is lowercase alpha, at least two characters
/// (`silver`). Only validated values can be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(String);

/// `jan26` shape: exactly three lowercase letters then two digits.
pub fn is_valid_monthyear(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 5
        && b[..3].iter().all(|c| c.is_ascii_lowercase())
        && b[3..].iter().all(|c| c.is_ascii_digit())
}

/// Product shape: lowercase alpha, length >= 2.
pub fn is_valid_product(s: &str) -> bool {
    s.len() >= 2 && s.bytes().all(|c| c.is_ascii_lowercase())
}

impl ContractId {
    /// Build from validated parts, returning None if either part is malformed.
    pub fn from_parts(monthyear: &str, product: &str) -> Option<Self> {
        if is_valid_monthyear(monthyear) && is_valid_product(product) {
            Some(Self(format!("{}-{}", monthyear, product)))
        } else {
            None
        }
    }

    /// Parse the normalized `"<monthyear>-<product>"` form.
    pub fn parse(s: &str) -> Option<Self> {
        let (monthyear, product) = s.split_once('-')?;
        Self::from_parts(monthyear, product)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `monthyear` component.
    pub fn monthyear(&self) -> &str {
        &self.0[..5]
    }

    /// The `product` component.
    pub fn product(&self) -> &str {
        &self.0[6..]
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
