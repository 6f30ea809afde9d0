pub mod command;
pub mod error;
pub mod message;

pub use command::{Command, CommandError, UNDEFINED_OPERATION};
pub use error::{CallError, DuorpcError, Result};
pub use message::{Message, MessageId};
