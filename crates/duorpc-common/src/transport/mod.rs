pub mod codec;
pub mod conn;

pub use codec::JsonCodec;
pub use conn::{connect, split, MessageSink, MessageStream, MAX_FRAME_SIZE};
