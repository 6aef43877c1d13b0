//! # redis-txn
//!
//! Client-side Redis error classification and MULTI/EXEC transactions over
//! a blocking connection.
//!
//! - Transport failures and server error replies are mapped onto one closed
//!   [`Error`] taxonomy, including cluster redirects (`MOVED`, `ASK`) and
//!   watch aborts.
//! - [`Transaction`] drives MULTI, the `QUEUED` acknowledgments, and EXEC
//!   or DISCARD, in immediate or pipelined mode.
//!
//! Nothing here retries. Callers inspect [`Error::kind`] and decide.
//!
//! ## Features
//!
//! - `test-utils` - Scripted [`testing::MockConnection`]
//!
//! ## Example
//!
//! ```no_run
//! use redis_txn::core::command::Cmd;
//! use redis_txn::{ConnectionBuilder, Error, QueuedTransaction};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = ConnectionBuilder::new()
//!         .address("redis://localhost:6379")
//!         .build()?;
//!
//!     let mut tx = QueuedTransaction::new(&mut conn, false)?;
//!     tx.command(Cmd::new("SET").arg("k").arg("v"))?;
//!     match tx.exec() {
//!         Ok(replies) => println!("{} replies", replies.len()),
//!         Err(Error::WatchAborted) => println!("retry"),
//!         Err(e) => return Err(e.into()),
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod core;
pub mod proto;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use crate::core::builder::ConnectionBuilder;
pub use crate::core::classify::{
    classify_reply_error, classify_transport_error, ErrorCode, TransportError,
};
pub use crate::core::connection::{BlockingConnection, Connection};
pub use crate::core::transaction::{QueuedReplies, QueuedTransaction, Transaction};
pub use crate::core::{Error, ErrorKind, Result};
pub use crate::proto::reply::{Reply, ReplyArray};
