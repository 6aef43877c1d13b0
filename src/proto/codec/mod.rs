//! RESP protocol encoder and decoder.
//!
//! # Modules
//!
//! - [`encoder`] - Reply and command encoding to bytes
//! - [`decoder`] - Streaming reply decoder from bytes

/// Streaming RESP2 decoder.
pub mod decoder;
/// RESP2 encoder.
pub mod encoder;

pub use decoder::Decoder;
pub use encoder::Encoder;
