//! The `broker` module is the core of the Pub/Sub system.
//!
//! It contains the following main components:
//!
//! - `Broker`: the registry engine that manages topics, clients, and the
//!   subscription edges between them.
//! - `Topic`: a named channel holding a subscriber set and a bounded history
//!   ring.
//! - `RingBuffer`: the drop-oldest circular buffer backing topic history and
//!   per-client overflow buffering.
//! - `ServerMessage`: the outbound wire frames the broker and sessions emit.
//!
//! The broker is responsible for routing messages from publishers to
//! subscribers; delivery is lossy and never blocks a publisher.

pub mod engine;
pub mod message;
pub mod ring_buffer;
pub mod topic;

pub use engine::Broker;

#[cfg(test)]
mod tests;
