//! Maps transport failures and server error replies onto [`Error`].
//!
//! Two inputs are classified:
//! - a [`TransportError`] reported by a connection when a send or receive
//!   fails below the protocol level
//! - an error reply (`-PREFIX rest`) sent by the server
//!
//! Server errors are split at the first space or newline. The prefix is
//! looked up in [`REDIRECT_PREFIXES`]; unknown prefixes become
//! [`Error::Reply`] carrying the whole text.

use std::fmt;
use std::io;

use tracing::debug;

use crate::proto::error::Error;
use crate::proto::reply::Reply;

/// Transport error codes, numbered like hiredis' `REDIS_ERR_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Read or write failed. The OS error decides between Io and Timeout.
    Io,
    /// Miscellaneous failure with a message.
    Other,
    /// The peer closed the stream.
    Eof,
    /// The peer sent bytes that are not valid RESP.
    Protocol,
    /// Allocation failed.
    OutOfMemory,
    /// An operation exceeded its deadline.
    Timeout,
    /// A code this crate does not know.
    Unknown(i32),
}

impl ErrorCode {
    /// Converts a raw numeric code.
    pub fn from_raw(code: i32) -> Self {
        match code {
            1 => ErrorCode::Io,
            2 => ErrorCode::Other,
            3 => ErrorCode::Eof,
            4 => ErrorCode::Protocol,
            5 => ErrorCode::OutOfMemory,
            6 => ErrorCode::Timeout,
            other => ErrorCode::Unknown(other),
        }
    }

    /// Returns the raw numeric code.
    pub fn as_raw(self) -> i32 {
        match self {
            ErrorCode::Io => 1,
            ErrorCode::Other => 2,
            ErrorCode::Eof => 3,
            ErrorCode::Protocol => 4,
            ErrorCode::OutOfMemory => 5,
            ErrorCode::Timeout => 6,
            ErrorCode::Unknown(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_raw())
    }
}

/// A failure reported by the transport, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// Category reported by the transport.
    pub code: ErrorCode,
    /// OS-level error behind an [`ErrorCode::Io`] failure, if known.
    pub os_error: Option<io::ErrorKind>,
    /// Human-readable description, if the transport produced one.
    pub text: Option<String>,
}

impl TransportError {
    /// Creates a transport error with a description.
    pub fn new(code: ErrorCode, text: impl Into<String>) -> Self {
        Self {
            code,
            os_error: None,
            text: Some(text.into()),
        }
    }

    /// Attaches the OS-level error kind.
    pub fn with_os_error(mut self, kind: io::ErrorKind) -> Self {
        self.os_error = Some(kind);
        self
    }

    /// Builds a transport error from an `io::Error`.
    ///
    /// `UnexpectedEof` becomes [`ErrorCode::Eof`]; everything else is an
    /// [`ErrorCode::Io`] failure carrying the OS error kind.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::new(ErrorCode::Eof, err.to_string()),
            kind => Self::new(ErrorCode::Io, err.to_string()).with_os_error(kind),
        }
    }
}

/// Classifies a transport failure.
///
/// Every message starts with `context`, a colon, and the transport text,
/// so the failing call site shows up in logs.
pub fn classify_transport_error(context: &str, err: &TransportError) -> Error {
    let Some(text) = err.text.as_deref() else {
        return Error::generic(format!("{}: null error message: {}", context, err.code));
    };

    let message = format!("{}: {}", context, text);

    let error = match err.code {
        ErrorCode::Io if is_timeout(err.os_error) => Error::Timeout { message },
        ErrorCode::Io => Error::Io { message },
        ErrorCode::Eof => Error::ClosedConnection { message },
        ErrorCode::Protocol => Error::Protocol { message },
        ErrorCode::OutOfMemory => Error::OutOfMemory { message },
        ErrorCode::Timeout => Error::Timeout { message },
        ErrorCode::Other => Error::Generic { message },
        ErrorCode::Unknown(code) => Error::Generic {
            message: format!("{}: unknown error code {}", message, code),
        },
    };

    debug!(code = %err.code, error = %error, "classified transport error");
    error
}

fn is_timeout(os_error: Option<io::ErrorKind>) -> bool {
    matches!(
        os_error,
        Some(io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
    )
}

/// Error prefixes that carry a cluster redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `MOVED <slot> <host>:<port>`
    Moved,
    /// `ASK <slot> <host>:<port>`
    Ask,
}

/// Prefixes with a dedicated error variant. Anything else is a plain
/// [`Error::Reply`].
pub const REDIRECT_PREFIXES: &[(&str, RedirectKind)] =
    &[("MOVED", RedirectKind::Moved), ("ASK", RedirectKind::Ask)];

/// Splits an error text into its prefix and remainder.
///
/// Returns the redirect kind if the prefix is in [`REDIRECT_PREFIXES`],
/// and the text after the separator.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the text has no space or newline.
pub fn parse_error_prefix(text: &str) -> Result<(Option<RedirectKind>, &str), Error> {
    let idx = text
        .find([' ', '\n'])
        .ok_or_else(|| Error::protocol(format!("no error prefix: {}", text)))?;

    let prefix = &text[..idx];
    let kind = REDIRECT_PREFIXES
        .iter()
        .find(|(name, _)| *name == prefix)
        .map(|(_, kind)| *kind);

    Ok((kind, &text[idx + 1..]))
}

/// Classifies an error reply from the server.
///
/// Redirects keep only the text after the prefix; every other error keeps
/// the full original text. A text without any separator cannot be
/// classified and yields [`Error::Protocol`].
pub fn classify_reply_error(reply: &Reply) -> Error {
    let text = match reply {
        Reply::Error(text) => text,
        other => {
            return Error::generic(format!("not an error reply: {}", other.type_name()));
        }
    };

    if text.is_empty() {
        return Error::generic("null error reply");
    }

    match parse_error_prefix(text) {
        Ok((Some(RedirectKind::Moved), rest)) => Error::Moved {
            detail: rest.to_string(),
        },
        Ok((Some(RedirectKind::Ask), rest)) => Error::Ask {
            detail: rest.to_string(),
        },
        Ok((None, _)) => Error::Reply {
            message: text.clone(),
        },
        Err(e) => e,
    }
}
