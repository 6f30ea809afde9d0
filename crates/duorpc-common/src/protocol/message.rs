use serde::{Deserialize, Serialize};

/// Identifier for a message, unique per sender.
///
/// Client request ids and server reply ids are drawn from independent
/// monotonically increasing counters. They are never compared against each
/// other: only `correlation_id` participates in reply matching.
pub type MessageId = u64;

/// The wire envelope exchanged in both directions.
///
/// Requests carry an opaque command string (`"<op> <args>"`) as payload and a
/// zero `correlation_id`. Replies carry the result-or-error text as payload
/// and echo the originating request's id in `correlation_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub correlation_id: MessageId,
    pub payload: String,
}

impl Message {
    /// Builds a request envelope. Requests are not correlated to anything,
    /// so `correlation_id` is left at zero and never inspected.
    pub fn request(id: MessageId, payload: impl Into<String>) -> Self {
        Message {
            id,
            correlation_id: 0,
            payload: payload.into(),
        }
    }

    /// Builds a reply envelope correlated to the request with id
    /// `correlation_id`. The reply's own `id` comes from the server's
    /// counter and is irrelevant to matching.
    pub fn reply(id: MessageId, correlation_id: MessageId, payload: impl Into<String>) -> Self {
        Message {
            id,
            correlation_id,
            payload: payload.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_has_zero_correlation() {
        let msg = Message::request(7, "increment 42");
        assert_eq!(msg.id, 7);
        assert_eq!(msg.correlation_id, 0);
        assert_eq!(msg.payload, "increment 42");
    }

    #[test]
    fn reply_echoes_request_id() {
        let msg = Message::reply(100, 7, "43");
        assert_eq!(msg.correlation_id, 7);
        assert_eq!(msg.payload, "43");
    }
}
