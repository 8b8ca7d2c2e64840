use serde::Deserialize;

use crate::broker::message::{ErrorBody, ErrorCode, MessageData};

/// A request sent by a client over the WebSocket, discriminated by `type`.
///
/// Every request carries a `request_id` echoed back in the terminal ack or
/// error. `subscribe` and `unsubscribe` always require a `client_id`;
/// `publish` needs one only while the session is still unbound.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Subscribe {
        topic: String,
        client_id: String,
        #[serde(default)]
        last_n: usize,
        request_id: String,
    },
    Unsubscribe {
        topic: String,
        client_id: String,
        request_id: String,
    },
    Publish {
        topic: String,
        message: MessageData,
        #[serde(default)]
        client_id: Option<String>,
        request_id: String,
    },
    Ping {
        request_id: String,
    },
}

/// Parses an inbound JSON request.
///
/// The `type` discriminator is sniffed before the full decode so that an
/// unknown type maps to `INVALID_MESSAGE_TYPE` while malformed JSON or
/// missing/ill-typed fields map to `BAD_REQUEST`.
pub fn parse_request(text: &str) -> Result<ClientMessage, ErrorBody> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| ErrorBody::new(ErrorCode::BadRequest, format!("invalid JSON: {e}")))?;

    match value.get("type").and_then(serde_json::Value::as_str) {
        Some("subscribe") | Some("unsubscribe") | Some("publish") | Some("ping") => {
            serde_json::from_value(value)
                .map_err(|e| ErrorBody::new(ErrorCode::BadRequest, e.to_string()))
        }
        Some(other) => Err(ErrorBody::new(
            ErrorCode::InvalidMessageType,
            format!("unknown message type: {other}"),
        )),
        None => Err(ErrorBody::new(ErrorCode::BadRequest, "type is required")),
    }
}
