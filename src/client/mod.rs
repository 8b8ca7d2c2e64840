//! The `client` module defines the representation of a client in the Pub/Sub
//! system.
//!
//! It provides the `Client` struct, which encapsulates the delivery state of
//! a single client identity: the bounded outbox channel drained by the
//! owning connection, the overflow ring that absorbs bursts, and the
//! liveness flag consulted during fan-out.

pub mod pubsub_client;
pub use pubsub_client::Client;
