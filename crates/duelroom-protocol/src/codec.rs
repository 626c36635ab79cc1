//! Codec trait and the JSON implementation.
//!
//! Events travel as WebSocket text frames, so a codec encodes to a
//! `String` and decodes from raw frame bytes.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts events to text frames and frames back to events.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes frame bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`), the format browser
/// clients speak natively.
///
/// ```rust
/// use duelroom_protocol::{ClientEvent, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let frame = codec.encode(&ClientEvent::FindGame).unwrap();
/// assert_eq!(frame, r#"{"event":"findGame"}"#);
///
/// let decoded: ClientEvent = codec.decode(frame.as_bytes()).unwrap();
/// assert_eq!(decoded, ClientEvent::FindGame);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientEvent, RoomId, ServerEvent};

    #[test]
    fn test_json_codec_decodes_client_event() {
        let frame = br#"{"event":"placeBet","data":{"roomId":4,"betAmount":100}}"#;
        let event: ClientEvent = JsonCodec.decode(frame).unwrap();
        assert_eq!(
            event,
            ClientEvent::PlaceBet {
                room_id: RoomId(4),
                bet_amount: 100,
            }
        );
    }

    #[test]
    fn test_json_codec_rejects_unknown_event() {
        let result: Result<ClientEvent, _> = JsonCodec.decode(br#"{"event":"teleport"}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_rejects_missing_required_field() {
        let result: Result<ClientEvent, _> =
            JsonCodec.decode(br#"{"event":"makeMove","data":{"roomId":1}}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_encodes_server_event_as_text() {
        let frame = JsonCodec
            .encode(&ServerEvent::UpdateUserCount { count: 3 })
            .unwrap();
        assert_eq!(frame, r#"{"event":"updateUserCount","data":{"count":3}}"#);
    }
}
