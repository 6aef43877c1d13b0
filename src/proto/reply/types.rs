use bytes::Bytes;

use crate::proto::error::{Error, Result};

/// A single RESP reply from the server.
///
/// Each node owns its children. Children of an [`Reply::Array`] are moved
/// out through [`ReplyArray::take`], never copied.
#[derive(Debug, PartialEq)]
pub enum Reply {
    /// Status line (+OK).
    Status(String),
    /// Error line (-ERR ...).
    Error(String),
    /// Integer (:1000).
    Integer(i64),
    /// Bulk string ($6\r\nfoobar).
    BulkString(Bytes),
    /// Array (*2\r\n...).
    Array(ReplyArray),
    /// Nil bulk string or nil array ($-1, *-1).
    Nil,
}

impl Reply {
    /// Returns true if this reply is nil.
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    /// Returns true if this reply is an array.
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Reply::Array(_))
    }

    /// Returns the text of a status reply.
    pub fn as_status(&self) -> Option<&str> {
        match self {
            Reply::Status(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the text of an error reply.
    pub fn as_error(&self) -> Option<&str> {
        match self {
            Reply::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Short name of the reply shape, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Reply::Status(_) => "status",
            Reply::Error(_) => "error",
            Reply::Integer(_) => "integer",
            Reply::BulkString(_) => "bulk string",
            Reply::Array(_) => "array",
            Reply::Nil => "nil",
        }
    }
}

impl From<Vec<Reply>> for Reply {
    fn from(items: Vec<Reply>) -> Self {
        Reply::Array(ReplyArray::from(items))
    }
}

/// Children of an array reply.
///
/// Every slot owns at most one reply. [`take`](ReplyArray::take) moves the
/// child out and leaves the slot empty, so a reply can never be reachable
/// from both the array and the caller.
#[derive(Debug, Default, PartialEq)]
pub struct ReplyArray {
    slots: Vec<Option<Reply>>,
}

impl ReplyArray {
    /// Creates an array from raw slots. `None` marks an absent element.
    pub fn from_slots(slots: Vec<Option<Reply>>) -> Self {
        Self { slots }
    }

    /// Number of slots, taken or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the array has no slots.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Borrows the child at `idx`, if the slot is still filled.
    pub fn get(&self, idx: usize) -> Option<&Reply> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    /// Moves the child at `idx` out of the array, clearing its slot.
    ///
    /// Returns `None` if `idx` is out of range or the slot was already taken.
    pub fn take(&mut self, idx: usize) -> Option<Reply> {
        self.slots.get_mut(idx).and_then(Option::take)
    }

    /// Consumes the array, returning every child in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if any slot is empty.
    pub fn into_replies(self) -> Result<Vec<Reply>> {
        self.slots
            .into_iter()
            .map(|slot| slot.ok_or_else(|| Error::protocol("null sub reply")))
            .collect()
    }

    /// Iterates over the filled slots.
    pub fn iter(&self) -> impl Iterator<Item = &Reply> {
        self.slots.iter().flatten()
    }

    pub(crate) fn slots(&self) -> &[Option<Reply>] {
        &self.slots
    }
}

impl From<Vec<Reply>> for ReplyArray {
    fn from(items: Vec<Reply>) -> Self {
        Self {
            slots: items.into_iter().map(Some).collect(),
        }
    }
}
