//! MULTI/EXEC transactions.
//!
//! [`Transaction`] is the protocol state machine: it opens the transaction,
//! consumes pending `QUEUED` acknowledgments and closes it with EXEC or
//! DISCARD. [`QueuedTransaction`] wraps it with the command-queuing side
//! and keeps the queued command count consistent with the pipelining mode.
//!
//! A transaction and its connection belong to one caller at a time. The
//! server queues commands per connection, so commands from another caller
//! sent between MULTI and EXEC end up inside this transaction.

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::core::classify::classify_reply_error;
use crate::core::command::{self, Cmd};
use crate::core::connection::Connection;
use crate::proto::error::{Error, Result};
use crate::proto::reply::Reply;

/// The MULTI/EXEC/DISCARD state machine for one connection.
///
/// States are closed (initial), open, and closed (terminal). `execute` and
/// `discard` close the transaction before doing any I/O, so a failed close
/// still leaves it closed and a second terminal call always fails.
///
/// # Pipelined mode
///
/// A transaction built with `pipelined = true` assumes the caller sent every
/// queued command without reading its `QUEUED` acknowledgment; `execute` and
/// `discard` read exactly `queued` acknowledgments before EXEC or DISCARD.
/// With `pipelined = false` the caller must have read each acknowledgment
/// already. Mixing the two corrupts the reply stream.
#[derive(Debug)]
pub struct Transaction {
    is_open: bool,
    is_pipelined: bool,
}

impl Transaction {
    /// Creates a closed transaction.
    pub fn new(pipelined: bool) -> Self {
        Self {
            is_open: false,
            is_pipelined: pipelined,
        }
    }

    /// Returns true between a successful [`open`](Self::open) and the
    /// terminal call.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Returns true if queued acknowledgments are consumed at close time.
    #[inline]
    pub fn is_pipelined(&self) -> bool {
        self.is_pipelined
    }

    /// Sends WATCH for `keys`. Only valid before the transaction is opened.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generic`] if the transaction is open, or any error
    /// from sending WATCH and parsing its `OK`.
    pub fn watch<C, I, K>(&self, conn: &mut C, keys: I) -> Result<()>
    where
        C: Connection + ?Sized,
        I: IntoIterator<Item = K>,
        K: Into<Bytes>,
    {
        if self.is_open {
            return Err(Error::generic("WATCH inside MULTI is not allowed"));
        }
        conn.send(&command::watch(keys))?;
        command::parse_ok(conn.recv()?)
    }

    /// Sends MULTI and waits for `OK`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generic`] if the transaction is already open (this
    /// is a caller bug, never retryable) or if the server answers with a
    /// status other than `OK`. Transport and reply errors are propagated.
    pub fn open<C: Connection + ?Sized>(&mut self, conn: &mut C) -> Result<()> {
        if self.is_open {
            return Err(Error::generic("transaction is already open"));
        }

        conn.send(&command::multi())?;
        let status = command::to_status(conn.recv()?)?;
        if status != "OK" {
            return Err(Error::generic(format!(
                "failed to open transaction: {}",
                status
            )));
        }

        debug!(pipelined = self.is_pipelined, "transaction opened");
        self.is_open = true;
        Ok(())
    }

    /// Runs EXEC and returns one reply per queued command, in order.
    ///
    /// Error replies for individual commands are returned as
    /// [`Reply::Error`] values; they do not fail the call.
    ///
    /// # Errors
    ///
    /// - [`Error::WatchAborted`] if EXEC returned nil
    /// - [`Error::Protocol`] if EXEC returned a non-array, an empty array, or
    ///   an array with an absent element
    /// - [`Error::Generic`] if the transaction is not open or a `QUEUED`
    ///   acknowledgment is wrong
    pub fn execute<C: Connection + ?Sized>(
        &mut self,
        conn: &mut C,
        queued: usize,
    ) -> Result<Vec<Reply>> {
        self.close()?;
        self.consume_queued(conn, queued)?;

        conn.send(&command::exec())?;
        let reply = conn.recv()?;

        let array = match reply {
            Reply::Nil => {
                warn!("transaction aborted, watched key modified");
                return Err(Error::WatchAborted);
            }
            Reply::Array(array) => array,
            other => {
                return Err(Error::protocol(format!(
                    "expected array reply, got {}",
                    other.type_name()
                )));
            }
        };

        // EXEC is never sent for an empty transaction.
        if array.is_empty() {
            return Err(Error::protocol("null array reply"));
        }

        let replies = array.into_replies()?;
        debug!(replies = replies.len(), "transaction executed");
        Ok(replies)
    }

    /// Runs DISCARD, dropping every queued command on the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generic`] if the transaction is not open or a
    /// `QUEUED` acknowledgment is wrong, and the status parsing error if the
    /// DISCARD reply is not a status.
    pub fn discard<C: Connection + ?Sized>(&mut self, conn: &mut C, queued: usize) -> Result<()> {
        self.close()?;
        self.consume_queued(conn, queued)?;

        conn.send(&command::discard())?;
        command::to_status(conn.recv()?)?;
        debug!("transaction discarded");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.is_open {
            return Err(Error::generic("no command in transaction"));
        }
        self.is_open = false;
        Ok(())
    }

    fn consume_queued<C: Connection + ?Sized>(&self, conn: &mut C, queued: usize) -> Result<()> {
        if !self.is_pipelined {
            return Ok(());
        }
        for _ in 0..queued {
            read_queued(&mut *conn)?;
        }
        trace!(queued, "consumed QUEUED acknowledgments");
        Ok(())
    }
}

fn read_queued<C: Connection + ?Sized>(conn: &mut C) -> Result<()> {
    let status = command::to_status(conn.recv()?)?;
    if status != "QUEUED" {
        return Err(Error::generic(format!("invalid QUEUED reply: {}", status)));
    }
    Ok(())
}

/// A transaction together with its queued commands.
///
/// Construction sends MULTI. Each [`command`](Self::command) is sent
/// immediately; in non-pipelined mode its `QUEUED` acknowledgment is read
/// right away, in pipelined mode it is left for EXEC/DISCARD to consume.
/// Dropping it without [`exec`](Self::exec) or [`discard`](Self::discard)
/// leaves the server inside MULTI.
///
/// # Example
///
/// ```no_run
/// use redis_txn::core::command::Cmd;
/// use redis_txn::{ConnectionBuilder, QueuedTransaction};
///
/// # fn main() -> redis_txn::Result<()> {
/// let mut conn = ConnectionBuilder::new().address("redis://localhost:6379").build()?;
/// let mut tx = QueuedTransaction::new(&mut conn, true)?;
/// tx.command(Cmd::new("INCR").arg("counter"))?;
/// tx.command(Cmd::new("GET").arg("counter"))?;
/// let replies = tx.exec()?;
/// assert_eq!(replies.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct QueuedTransaction<'c, C: Connection + ?Sized> {
    conn: &'c mut C,
    tx: Transaction,
    queued: usize,
}

impl<'c, C: Connection + ?Sized> QueuedTransaction<'c, C> {
    /// Opens a transaction on `conn`.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Transaction::open`]. Nothing is queued in
    /// that case and the connection is not inside MULTI.
    pub fn new(conn: &'c mut C, pipelined: bool) -> Result<Self> {
        let mut tx = Transaction::new(pipelined);
        tx.open(&mut *conn)?;
        Ok(Self {
            conn,
            tx,
            queued: 0,
        })
    }

    /// Number of commands queued so far.
    #[inline]
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Queues one command.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is closed, the send fails, or (non-pipelined)
    /// the server does not answer `QUEUED`. A command the server rejects at
    /// queue time is surfaced here as the classified error.
    pub fn command(&mut self, cmd: Cmd) -> Result<&mut Self> {
        if !self.tx.is_open() {
            return Err(Error::generic("transaction is closed"));
        }
        self.conn.send(&cmd)?;
        if !self.tx.is_pipelined() {
            read_queued(&mut *self.conn)?;
        }
        self.queued += 1;
        Ok(self)
    }

    /// Executes the queued commands.
    ///
    /// With nothing queued, the transaction is discarded instead and an
    /// empty result is returned.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Transaction::execute`], or from
    /// [`Transaction::discard`] when nothing was queued. Error replies for
    /// individual commands are kept in the returned [`QueuedReplies`].
    pub fn exec(mut self) -> Result<QueuedReplies> {
        if self.queued == 0 {
            self.tx.discard(&mut *self.conn, 0)?;
            return Ok(QueuedReplies::default());
        }
        let replies = self.tx.execute(&mut *self.conn, self.queued)?;
        Ok(QueuedReplies { replies })
    }

    /// Discards the queued commands.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Transaction::discard`].
    pub fn discard(mut self) -> Result<()> {
        self.tx.discard(&mut *self.conn, self.queued)
    }
}

/// Replies returned by EXEC, one per queued command.
#[derive(Debug, Default, PartialEq)]
pub struct QueuedReplies {
    replies: Vec<Reply>,
}

impl QueuedReplies {
    /// Number of replies.
    #[inline]
    pub fn len(&self) -> usize {
        self.replies.len()
    }

    /// Returns true if there are no replies.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }

    /// Borrows the raw reply of the command at `idx`.
    pub fn get(&self, idx: usize) -> Option<&Reply> {
        self.replies.get(idx)
    }

    /// Moves out the reply of the command at `idx`, leaving nil behind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generic`] if `idx` is out of range, and the
    /// classified error if that command failed on the server.
    pub fn take(&mut self, idx: usize) -> Result<Reply> {
        let slot = self
            .replies
            .get_mut(idx)
            .ok_or_else(|| Error::generic(format!("no reply at index {}", idx)))?;
        match std::mem::replace(slot, Reply::Nil) {
            reply @ Reply::Error(_) => Err(classify_reply_error(&reply)),
            reply => Ok(reply),
        }
    }
}

impl IntoIterator for QueuedReplies {
    type Item = Reply;
    type IntoIter = std::vec::IntoIter<Reply>;

    fn into_iter(self) -> Self::IntoIter {
        self.replies.into_iter()
    }
}
