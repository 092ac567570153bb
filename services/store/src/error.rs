//! Store error taxonomy

use thiserror::Error;
use types::order::OrderStatus;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal corrupt at entry {sequence}: {detail}")]
    Corrupt { sequence: u64, detail: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("duplicate {entity} id")]
    Duplicate { entity: &'static str },

    #[error("referential integrity: {0}")]
    ForeignKey(String),

    #[error("order is {status}, not ACTIVE")]
    Inactive { status: OrderStatus },

    #[error("bid and offer prices do not cross")]
    NotCrossed,

    #[error("bid and offer belong to the same owner")]
    SelfTrade,

    #[error("orders are for different contracts")]
    ContractMismatch,
}

impl StoreError {
    /// Whether a retry on the next pass can succeed without intervention.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}

/// Map storage failures onto the order-lifecycle error surface.
impl From<StoreError> for types::errors::OrderError {
    fn from(err: StoreError) -> Self {
        use types::errors::OrderError;
        match err {
            StoreError::NotFound { .. } => OrderError::NotFound,
            StoreError::Inactive { status } => OrderError::Immutable { status },
            other => OrderError::Internal(other.to_string()),
        }
    }
}
