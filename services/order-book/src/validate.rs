//! Order request validation
//!
//! All checks run before anything touches the store; a failed validation
//! has no side effects.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use types::contract::{is_valid_monthyear, is_valid_product, ContractId};
use types::errors::OrderError;
use types::numeric::{Lots, Price};

/// Validated create parameters.
#[derive(Debug)]
pub struct ValidCreate {
    pub contract: ContractId,
    pub price: Price,
    pub qty: Lots,
    pub expires_at: DateTime<Utc>,
}

pub fn validate_create(
    price: Decimal,
    monthyear: &str,
    product: &str,
    qty: u32,
    expires_at: Option<DateTime<Utc>>,
    expiry_hours: i64,
    now: DateTime<Utc>,
) -> Result<ValidCreate, OrderError> {
    let price = validate_price(price)?;
    let qty = validate_qty(qty)?;

    let monthyear = monthyear.trim().to_ascii_lowercase();
    let product = product.trim().to_ascii_lowercase();
    if !is_valid_monthyear(&monthyear) {
        return Err(OrderError::invalid(
            "monthyear",
            "expected three letters and two digits, e.g. jan26",
        ));
    }
    if !is_valid_product(&product) {
        return Err(OrderError::invalid(
            "product",
            "expected lowercase letters, at least two",
        ));
    }
    let contract = ContractId::from_parts(&monthyear, &product)
        .expect("validated parts always form a contract");

    let expires_at = match expires_at {
        Some(at) => validate_expiry(at, now)?,
        None => now + Duration::hours(expiry_hours),
    };

    Ok(ValidCreate {
        contract,
        price,
        qty,
        expires_at,
    })
}

pub fn validate_price(price: Decimal) -> Result<Price, OrderError> {
    Price::try_new(price).ok_or_else(|| OrderError::invalid("price", "must be positive"))
}

pub fn validate_qty(qty: u32) -> Result<Lots, OrderError> {
    Lots::try_new(qty).ok_or_else(|| OrderError::invalid("qty", "must be at least one lot"))
}

pub fn validate_expiry(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, OrderError> {
    if expires_at <= now {
        return Err(OrderError::invalid("expires_at", "must be in the future"));
    }
    Ok(expires_at)
}
