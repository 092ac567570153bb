//! Shared error taxonomy
//!
//! Order lifecycle errors surface synchronously to the caller with no side
//! effects; confirmation protocol errors go back to the responder only.

use crate::order::OrderStatus;
use thiserror::Error;

/// Errors from order create / update / cancel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        field: &'static str,
        reason: String,
    },

    #[error("active order limit reached ({limit})")]
    LimitExceeded { limit: usize },

    #[error("order not found")]
    NotFound,

    #[error("order is {status} and can no longer change")]
    Immutable { status: OrderStatus },

    #[error("storage unavailable, try again")]
    Internal(String),
}

impl OrderError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors from the quantity-confirmation protocol
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfirmationError {
    #[error("no pending confirmation matches '{token}'")]
    UnknownKey { token: String },

    #[error("the confirmation deadline has passed")]
    Expired,

    #[error("this confirmation belongs to another party")]
    NotParty,

    #[error("a confirmation for this pair is already pending")]
    Duplicate,

    #[error("could not parse response: {0}")]
    Unparseable(String),
}
