//! Session fan-out
//!
//! Authenticated-session rooms, the event routing matrix, and the
//! external messaging sink adapter.

pub mod fanout;
pub mod rooms;
pub mod routing;
pub mod sink;

pub use fanout::SessionFanout;
pub use rooms::{Room, RoomRegistry, SessionId};
pub use routing::route;
pub use sink::{HttpMessageSink, MessageSink, NullSink, RecordingSink, SinkError};
