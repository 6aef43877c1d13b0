//! Test helpers.
//!
//! [`MockConnection`] replays scripted replies and records every command it
//! is asked to send, so transaction logic can be tested without a server.

use std::collections::VecDeque;

use crate::core::classify::{classify_reply_error, classify_transport_error, TransportError};
use crate::core::command::Cmd;
use crate::core::connection::Connection;
use crate::proto::error::{Error, Result};
use crate::proto::reply::Reply;

#[derive(Debug)]
enum Scripted {
    Reply(Reply),
    Error(Error),
    Transport(TransportError),
}

/// A scripted [`Connection`].
///
/// Replies are returned in the order they were pushed. A top-level
/// [`Reply::Error`] is classified on receipt, as a real connection does.
/// Receiving with nothing scripted yields [`Error::ClosedConnection`].
#[derive(Debug, Default)]
pub struct MockConnection {
    replies: VecDeque<Scripted>,
    sent: Vec<Cmd>,
    fail_sends: Option<Error>,
    last_error: Option<TransportError>,
}

impl MockConnection {
    /// Creates a connection with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the next `recv`.
    pub fn push_reply(&mut self, reply: Reply) -> &mut Self {
        self.replies.push_back(Scripted::Reply(reply));
        self
    }

    /// Queues a failure for the next `recv`.
    pub fn push_error(&mut self, error: Error) -> &mut Self {
        self.replies.push_back(Scripted::Error(error));
        self
    }

    /// Queues a transport failure for the next `recv`. It is classified with
    /// the `"receive reply"` context and recorded as the last error.
    pub fn push_transport_error(&mut self, err: TransportError) -> &mut Self {
        self.replies.push_back(Scripted::Transport(err));
        self
    }

    /// Makes every subsequent `send` fail with `error`.
    pub fn fail_sends(&mut self, error: Error) -> &mut Self {
        self.fail_sends = Some(error);
        self
    }

    /// Commands sent so far, in order.
    pub fn sent(&self) -> &[Cmd] {
        &self.sent
    }

    /// Number of scripted replies not yet received.
    pub fn pending(&self) -> usize {
        self.replies.len()
    }
}

impl Connection for MockConnection {
    fn send(&mut self, cmd: &Cmd) -> Result<()> {
        self.last_error = None;
        if let Some(error) = &self.fail_sends {
            return Err(error.clone());
        }
        self.sent.push(cmd.clone());
        Ok(())
    }

    fn recv(&mut self) -> Result<Reply> {
        self.last_error = None;
        match self.replies.pop_front() {
            Some(Scripted::Reply(reply @ Reply::Error(_))) => Err(classify_reply_error(&reply)),
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Error(error)) => Err(error),
            Some(Scripted::Transport(err)) => {
                let error = classify_transport_error("receive reply", &err);
                self.last_error = Some(err);
                Err(error)
            }
            None => Err(Error::ClosedConnection {
                message: "receive reply: no scripted reply".to_string(),
            }),
        }
    }

    fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }
}
