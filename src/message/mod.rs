//! Message model: the envelope that crosses process boundaries.
//!
//! ```text
//! Message
//! ├── MessageHeader  id, topic, type, correlation id, handled count, bag, timestamp
//! └── MessageBody    bytes + content type
//! ```
//!
//! Besides application messages (`Command`, `Event`, `Document`) three sentinel
//! types flow through channels: `None` (receive timed out), `Quit` (stop the
//! performer) and `Unacceptable` (the transport could not parse the frame).

mod body;
mod header;
mod message;

pub use body::MessageBody;
pub use header::{MessageHeader, MessageType};
pub use message::Message;
