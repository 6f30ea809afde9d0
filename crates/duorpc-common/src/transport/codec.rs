use crate::protocol::error::Result;
use crate::protocol::Message;

/// JSON codec for the [`Message`] envelope.
///
/// JSON is the only wire format; framing (length prefix) is handled by the
/// connection layer, so the codec only maps between a `Message` and the
/// bytes inside one frame.
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode(message: &Message) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(message)?)
    }

    pub fn decode(data: &[u8]) -> Result<Message> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_request() {
        let msg = Message::request(1, "increment 42");
        let encoded = JsonCodec::encode(&msg).unwrap();
        let decoded = JsonCodec::decode(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn round_trips_a_reply() {
        let msg = Message::reply(9, 1, "43");
        let decoded = JsonCodec::decode(&JsonCodec::encode(&msg).unwrap()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn rejects_garbage() {
        assert!(JsonCodec::decode(b"not json at all").is_err());
    }

    #[test]
    fn rejects_wrong_shape() {
        // Valid JSON, wrong fields.
        assert!(JsonCodec::decode(br#"{"method": "increment"}"#).is_err());
    }
}
