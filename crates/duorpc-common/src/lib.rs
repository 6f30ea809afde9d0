//! Shared protocol layer for duorpc.
//!
//! This crate defines the [`Message`](protocol::Message) envelope that both
//! sides exchange, the command grammar carried in request payloads, the error
//! types, and the framed TCP transport (length-prefixed JSON) used by the
//! client proxy and the server dispatcher.

pub mod protocol;
pub mod transport;

pub use protocol::{CallError, Command, DuorpcError, Message, Result};
pub use transport::{connect, split, MessageSink, MessageStream};
