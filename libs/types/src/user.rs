//! Venue participants

use crate::ids::UserId;
use serde::{Deserialize, Serialize};

/// A registered trading participant
///
/// Registration and credential checks live outside the core; the engine only
/// needs a stable id, a display name, an optional messaging-channel handle
/// for out-of-band notifications, and the admin flag for admin-room fanout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Recipient identifier on the external messaging channel, if linked
    pub messaging_handle: Option<String>,
    pub is_admin: bool,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            messaging_handle: None,
            is_admin: false,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.messaging_handle = Some(handle.into());
        self
    }

    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }
}
