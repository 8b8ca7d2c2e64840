//! The `error` module defines the error types surfaced by the broker core.
//!
//! Transport code maps these onto protocol error frames; the variants carry
//! enough context to produce a descriptive human-readable message.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BrokerError {
    #[error("topic {0} already exists")]
    TopicExists(String),

    #[error("topic {0} not found")]
    TopicNotFound(String),

    #[error("client {client} is not subscribed to topic {topic}")]
    NotSubscribed { client: String, topic: String },
}

pub type Result<T> = std::result::Result<T, BrokerError>;
