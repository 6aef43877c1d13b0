//! Connection, commands, error classification and transactions.
//!
//! ## Modules
//!
//! - [`classify`] - Transport and server error classification
//! - [`command`] - Command builders and status parsing
//! - [`connection`] - The blocking connection trait and its stream impl
//! - [`builder`] - TCP connection builder
//! - [`transaction`] - MULTI/EXEC/DISCARD state machine

pub use crate::proto::error::{Error, ErrorKind, Result};

/// Connection builder configuration.
pub mod builder;
pub mod classify;
/// Command construction helpers.
pub mod command;
/// Blocking connection management.
pub mod connection;
pub mod transaction;
