//! Market cache: process-wide TTL key-value store plus the event bus
//!
//! The cache is best-effort everywhere: a read miss falls back to the
//! store, a write failure is logged and swallowed. It is never a source of
//! truth.

pub mod bus;
pub mod cache;
pub mod keys;

pub use bus::EventBus;
pub use cache::TtlCache;
