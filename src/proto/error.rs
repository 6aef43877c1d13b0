use thiserror::Error;

/// Result type alias for redis-txn operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the connection layer, the error classifier and the
/// transaction driver.
///
/// The set of variants is closed so callers can match exhaustively. Use
/// [`Error::kind`] when only the category matters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// An I/O failure on the underlying transport.
    #[error("IO error: {message}")]
    Io {
        /// Description of the failure, prefixed with the call site.
        message: String,
    },

    /// A read or write did not complete in time.
    #[error("timeout: {message}")]
    Timeout {
        /// Description of the failure, prefixed with the call site.
        message: String,
    },

    /// The server closed the connection.
    #[error("connection closed: {message}")]
    ClosedConnection {
        /// Description of the failure, prefixed with the call site.
        message: String,
    },

    /// The server sent something that violates the protocol.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },

    /// The transport failed to allocate memory.
    #[error("out of memory: {message}")]
    OutOfMemory {
        /// Description of the failure, prefixed with the call site.
        message: String,
    },

    /// Any failure that does not fit another category.
    #[error("{message}")]
    Generic {
        /// Description of the failure.
        message: String,
    },

    /// The server returned an error reply.
    ///
    /// The message is the complete error text, prefix included
    /// (e.g. `"ERR unknown command"`).
    #[error("reply error: {message}")]
    Reply {
        /// Full error text as sent by the server.
        message: String,
    },

    /// Redis Cluster: the slot is permanently served by another node.
    ///
    /// `detail` is the raw text after the `MOVED` prefix, e.g.
    /// `"3999 127.0.0.1:7000"`. Parsing it into slot and address is left to
    /// the cluster router.
    #[error("MOVED {detail}")]
    Moved {
        /// Redirect target, `<slot> <host>:<port>`.
        detail: String,
    },

    /// Redis Cluster: the slot is being migrated, retry once on the target.
    #[error("ASK {detail}")]
    Ask {
        /// Redirect target, `<slot> <host>:<port>`.
        detail: String,
    },

    /// EXEC returned nil because a watched key was modified.
    #[error("transaction aborted: watched key has been modified")]
    WatchAborted,
}

/// Category of an [`Error`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Io`].
    Io,
    /// See [`Error::Timeout`].
    Timeout,
    /// See [`Error::ClosedConnection`].
    ClosedConnection,
    /// See [`Error::Protocol`].
    Protocol,
    /// See [`Error::OutOfMemory`].
    OutOfMemory,
    /// See [`Error::Generic`].
    Generic,
    /// See [`Error::Reply`].
    ReplyError,
    /// See [`Error::Moved`].
    Moved,
    /// See [`Error::Ask`].
    Ask,
    /// See [`Error::WatchAborted`].
    WatchAborted,
}

impl Error {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }

    pub(crate) fn generic(message: impl Into<String>) -> Self {
        Error::Generic {
            message: message.into(),
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io { .. } => ErrorKind::Io,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::ClosedConnection { .. } => ErrorKind::ClosedConnection,
            Error::Protocol { .. } => ErrorKind::Protocol,
            Error::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Error::Generic { .. } => ErrorKind::Generic,
            Error::Reply { .. } => ErrorKind::ReplyError,
            Error::Moved { .. } => ErrorKind::Moved,
            Error::Ask { .. } => ErrorKind::Ask,
            Error::WatchAborted => ErrorKind::WatchAborted,
        }
    }

    /// Returns the redirect target of a `MOVED` or `ASK` error.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Error::Moved { detail } | Error::Ask { detail } => Some(detail),
            _ => None,
        }
    }

    /// Returns true for cluster redirects (`MOVED` and `ASK`).
    #[inline]
    pub fn is_redirect(&self) -> bool {
        matches!(self, Error::Moved { .. } | Error::Ask { .. })
    }

    /// Returns true if the whole transaction may be rebuilt and retried.
    ///
    /// Redirects must be retried against another node. Nothing in this
    /// crate retries on its own.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        self.is_redirect() || matches!(self, Error::WatchAborted)
    }
}
