use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An immutable published message: a client-supplied UUID and an arbitrary
/// JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    pub id: String,
    pub payload: serde_json::Value,
}

/// Protocol error codes surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    InvalidMessageType,
    SubscribeFailed,
    UnsubscribeFailed,
    PublishFailed,
    ProcessingError,
    ClientOverloaded,
    InternalError,
}

/// The `error` object carried inside an error frame.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Every frame the server writes to a client, discriminated by `type`.
///
/// Delivery frames (`event`, `info`) are produced by the broker core and are
/// the only variants stored in history and overflow rings; `ack`, `error` and
/// `pong` are produced by the connection session. All frames travel through
/// the same per-connection outbox channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Event {
        topic: String,
        message: MessageData,
        ts: DateTime<Utc>,
    },
    Info {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
        msg: String,
        ts: DateTime<Utc>,
    },
    Ack {
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
        status: String,
        ts: DateTime<Utc>,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        error: ErrorBody,
        ts: DateTime<Utc>,
    },
    Pong {
        request_id: String,
        ts: DateTime<Utc>,
    },
}

impl ServerMessage {
    pub fn event(topic: impl Into<String>, message: MessageData) -> Self {
        Self::Event {
            topic: topic.into(),
            message,
            ts: Utc::now(),
        }
    }

    pub fn info(topic: Option<String>, msg: impl Into<String>) -> Self {
        Self::Info {
            topic,
            msg: msg.into(),
            ts: Utc::now(),
        }
    }

    pub fn ack(request_id: impl Into<String>, topic: Option<String>) -> Self {
        Self::Ack {
            request_id: request_id.into(),
            topic,
            status: "ok".to_string(),
            ts: Utc::now(),
        }
    }

    pub fn error(request_id: Option<String>, error: ErrorBody) -> Self {
        Self::Error {
            request_id,
            error,
            ts: Utc::now(),
        }
    }

    pub fn pong(request_id: impl Into<String>) -> Self {
        Self::Pong {
            request_id: request_id.into(),
            ts: Utc::now(),
        }
    }
}
