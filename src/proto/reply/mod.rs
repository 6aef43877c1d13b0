//! RESP reply types.
//!
//! This module defines the reply tree returned by the server: status and
//! error lines, integers, bulk strings, arrays and nil.

/// Reply type definitions.
pub mod types;

pub use types::{Reply, ReplyArray};
