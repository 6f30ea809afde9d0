use std::time::Duration;

use thiserror::Error;

/// Errors raised by the transport and protocol layers.
#[derive(Error, Debug)]
pub enum DuorpcError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Frame too large: {len} bytes (max {max} bytes)")]
    FrameTooLarge { len: usize, max: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DuorpcError>;

/// The per-request outcome delivered to callbacks and deferred-result
/// handles.
///
/// Unlike [`DuorpcError`] this is cheap to clone, because a result cell in a
/// terminal failed state hands the stored error out on every `get`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The server replied with an error payload (domain error or
    /// unrecognized operation). The string is the reply payload verbatim.
    #[error("remote error: {0}")]
    Remote(String),

    /// The request could not be sent, or the connection was lost while the
    /// request was still pending. The proxy must be re-created.
    #[error("connection error: {0}")]
    Connection(String),

    /// The local handle was canceled. The remote computation is not
    /// retracted.
    #[error("request canceled")]
    Canceled,

    /// A bounded wait elapsed before the result arrived. The underlying
    /// request stays pending.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
