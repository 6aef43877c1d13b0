use bytes::Bytes;

use crate::core::classify::classify_reply_error;
use crate::proto::error::{Error, Result};
use crate::proto::reply::Reply;

/// A command ready to be sent to Redis.
///
/// # Example
///
/// ```
/// use redis_txn::core::command::{exec, multi, Cmd};
///
/// let cmd = Cmd::new("SET").arg("key").arg("value");
/// assert_eq!(cmd.name(), "SET");
/// assert_eq!(multi().name(), "MULTI");
/// assert_eq!(exec().args().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    args: Vec<Bytes>,
}

impl Cmd {
    /// Creates a new command with the given name.
    #[inline]
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            args: vec![name.into()],
        }
    }

    /// Appends an argument to the command.
    #[inline]
    pub fn arg<T: Into<Bytes>>(mut self, arg: T) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Command name followed by its arguments.
    #[inline]
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Command name, lossily decoded for logging.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.args[0]).into_owned()
    }
}

/// Creates a MULTI command.
#[inline]
pub fn multi() -> Cmd {
    Cmd::new("MULTI")
}

/// Creates an EXEC command.
#[inline]
pub fn exec() -> Cmd {
    Cmd::new("EXEC")
}

/// Creates a DISCARD command.
#[inline]
pub fn discard() -> Cmd {
    Cmd::new("DISCARD")
}

/// Creates a WATCH command.
pub fn watch<I, K>(keys: I) -> Cmd
where
    I: IntoIterator<Item = K>,
    K: Into<Bytes>,
{
    keys.into_iter().fold(Cmd::new("WATCH"), Cmd::arg)
}

/// Creates an UNWATCH command.
#[inline]
pub fn unwatch() -> Cmd {
    Cmd::new("UNWATCH")
}

/// Parses a reply as a status line.
///
/// An error reply is classified; any other shape is a protocol error.
pub fn to_status(reply: Reply) -> Result<String> {
    match reply {
        Reply::Status(s) => Ok(s),
        Reply::Error(_) => Err(classify_reply_error(&reply)),
        other => Err(Error::protocol(format!(
            "expected status reply, got {}",
            other.type_name()
        ))),
    }
}

/// Parses a reply that must be the status `OK`.
pub fn parse_ok(reply: Reply) -> Result<()> {
    let status = to_status(reply)?;
    if status != "OK" {
        return Err(Error::protocol(format!("expected OK status, got {}", status)));
    }
    Ok(())
}
