use bytes::{BufMut, Bytes, BytesMut};

use crate::proto::reply::Reply;

/// A RESP encoder for requests and replies.
///
/// Commands are written as arrays of bulk strings with
/// [`encode_command`](Encoder::encode_command). [`encode`](Encoder::encode)
/// writes any [`Reply`], which mock servers use to answer requests.
///
/// # Example
///
/// ```
/// use redis_txn::proto::codec::Encoder;
/// use redis_txn::proto::reply::Reply;
///
/// let mut encoder = Encoder::new();
/// encoder.encode(&Reply::Status("OK".to_string()));
/// assert_eq!(encoder.take().as_ref(), b"+OK\r\n");
/// ```
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    /// Creates a new encoder with an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Encodes a command, given as its arguments, into the buffer.
    pub fn encode_command(&mut self, args: &[Bytes]) {
        self.put_header(b'*', args.len());
        for arg in args {
            self.put_bulk(arg);
        }
    }

    /// Encodes a reply into the internal buffer.
    ///
    /// Empty array slots are written as nil.
    pub fn encode(&mut self, reply: &Reply) {
        match reply {
            Reply::Status(s) => {
                self.buf.put_u8(b'+');
                self.buf.extend_from_slice(s.as_bytes());
                self.buf.extend_from_slice(b"\r\n");
            }
            Reply::Error(e) => {
                self.buf.put_u8(b'-');
                self.buf.extend_from_slice(e.as_bytes());
                self.buf.extend_from_slice(b"\r\n");
            }
            Reply::Integer(n) => {
                self.buf.put_u8(b':');
                self.buf.extend_from_slice(n.to_string().as_bytes());
                self.buf.extend_from_slice(b"\r\n");
            }
            Reply::BulkString(data) => self.put_bulk(data),
            Reply::Array(array) => {
                self.put_header(b'*', array.len());
                for slot in array.slots() {
                    match slot {
                        Some(item) => self.encode(item),
                        None => self.buf.extend_from_slice(b"$-1\r\n"),
                    }
                }
            }
            Reply::Nil => {
                self.buf.extend_from_slice(b"$-1\r\n");
            }
        }
    }

    /// Takes the encoded data from the buffer, leaving it empty.
    pub fn take(&mut self) -> BytesMut {
        std::mem::take(&mut self.buf)
    }

    fn put_header(&mut self, marker: u8, len: usize) {
        self.buf.put_u8(marker);
        self.buf.extend_from_slice(len.to_string().as_bytes());
        self.buf.extend_from_slice(b"\r\n");
    }

    fn put_bulk(&mut self, data: &[u8]) {
        self.put_header(b'$', data.len());
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
    }
}
