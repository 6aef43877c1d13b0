//! Wire-level types: replies, the RESP codec and the error taxonomy.
//!
//! ## Modules
//!
//! - [`codec`] - Encoder and decoder for RESP2
//! - [`error`] - Error taxonomy shared by every layer
//! - [`reply`] - Reply tree returned by the server

pub mod codec;
/// Error types.
pub mod error;
pub mod reply;
