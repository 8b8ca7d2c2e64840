//! # topicast
//!
//! `topicast` is a minimalist, in-memory publish/subscribe server built with
//! Rust. Clients talk to it over a WebSocket connection at `/ws`; topics are
//! managed and inspected through a small HTTP control surface on the same
//! port. Each topic keeps a bounded tail of its history so a late subscriber
//! can ask for the last N messages, and every subscriber gets a bounded,
//! lossy delivery queue so one slow client can never stall the rest.
//!
//! ## Core Modules
//!
//! The library is structured into several modules, each with a distinct responsibility:
//!
//! - `broker`: the central component that manages topics, subscribers, and message routing.
//! - `client`: the per-client delivery state (outbox channel, overflow ring, liveness).
//! - `config`: handles loading and managing server configuration.
//! - `transport`: the WebSocket session and the HTTP control surface.
//! - `utils`: shared utilities, such as error handling and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod tests;
