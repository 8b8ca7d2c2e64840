//! The `utils` module provides a collection of shared definitions used across
//! the `topicast` application.
//!
//! It centralizes reusable components, such as the broker error types and the
//! logging bootstrap, to promote consistency and reduce duplication.

pub mod error;
pub mod logging;
