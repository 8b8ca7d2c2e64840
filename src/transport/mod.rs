//! The `transport` module is responsible for handling network communication
//! with clients.
//!
//! It defines the messaging protocol used between clients and the server,
//! implements the per-connection WebSocket session, and serves the HTTP
//! control surface from the same router.

pub mod http;
pub mod message;
pub mod websocket;
