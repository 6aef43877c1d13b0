use std::fmt;
use std::io::{self, Read, Write};

use tracing::trace;

use crate::core::classify::{
    classify_reply_error, classify_transport_error, ErrorCode, TransportError,
};
use crate::core::command::Cmd;
use crate::proto::codec::{Decoder, Encoder};
use crate::proto::error::Result;
use crate::proto::reply::Reply;

const READ_CHUNK: usize = 4096;

/// A blocking request/response channel to one Redis server.
///
/// Implementations must not be shared between callers while a transaction
/// is open: the server queues commands per connection, so interleaving
/// commands from two callers corrupts both transactions. Both methods take
/// `&mut self`; callers that share a connection across threads must check
/// it out exclusively.
pub trait Connection {
    /// Writes one command.
    ///
    /// # Errors
    ///
    /// Transport failures are classified with the `"send command"` context.
    fn send(&mut self, cmd: &Cmd) -> Result<()>;

    /// Reads one reply, blocking until it is complete.
    ///
    /// # Errors
    ///
    /// A top-level error reply is returned as the classified error (see
    /// [`classify_reply_error`]). Error replies nested inside an array are
    /// left in place. Transport failures are classified with the
    /// `"receive reply"` context.
    fn recv(&mut self) -> Result<Reply>;

    /// The transport failure of the most recent `send` or `recv`, if that
    /// call failed below the protocol level. Cleared when the next call
    /// starts.
    fn last_error(&self) -> Option<&TransportError>;
}

/// A [`Connection`] over any blocking byte stream.
///
/// # Example
///
/// ```no_run
/// use redis_txn::core::command;
/// use redis_txn::core::connection::{BlockingConnection, Connection};
/// use std::net::TcpStream;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let stream = TcpStream::connect("127.0.0.1:6379")?;
/// let mut conn = BlockingConnection::new(stream);
/// conn.send(&command::multi())?;
/// let reply = conn.recv()?;
/// # Ok(())
/// # }
/// ```
pub struct BlockingConnection<S> {
    stream: S,
    decoder: Decoder,
    encoder: Encoder,
    last_error: Option<TransportError>,
}

impl<S> BlockingConnection<S>
where
    S: Read + Write,
{
    /// Creates a new connection over the given stream.
    pub fn new(stream: S) -> Self {
        Self::with_decoder(stream, Decoder::new())
    }

    /// Creates a new connection with a preconfigured decoder.
    pub fn with_decoder(stream: S, decoder: Decoder) -> Self {
        Self {
            stream,
            decoder,
            encoder: Encoder::new(),
            last_error: None,
        }
    }

    /// Returns a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Consumes the connection, returning the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn fail(&mut self, context: &str, err: TransportError) -> crate::Error {
        let error = classify_transport_error(context, &err);
        self.last_error = Some(err);
        error
    }

    fn read_reply(&mut self) -> std::result::Result<Reply, TransportError> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match self.decoder.decode() {
                Ok(Some(reply)) => return Ok(reply),
                Ok(None) => {}
                Err(e) => return Err(TransportError::new(ErrorCode::Protocol, e)),
            }

            let n = match self.stream.read(&mut buf) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::from_io(&e)),
            };
            if n == 0 {
                return Err(TransportError::new(
                    ErrorCode::Eof,
                    "Server closed the connection",
                ));
            }
            self.decoder.append(&buf[..n]);
        }
    }
}

impl<S> Connection for BlockingConnection<S>
where
    S: Read + Write,
{
    fn send(&mut self, cmd: &Cmd) -> Result<()> {
        self.last_error = None;
        self.encoder.encode_command(cmd.args());
        let data = self.encoder.take();
        trace!(command = %cmd.name(), bytes = data.len(), "sending command");

        let written = self
            .stream
            .write_all(&data)
            .and_then(|()| self.stream.flush());
        written.map_err(|e| {
            let err = TransportError::from_io(&e);
            self.fail("send command", err)
        })
    }

    fn recv(&mut self) -> Result<Reply> {
        self.last_error = None;
        let reply = self
            .read_reply()
            .map_err(|err| self.fail("receive reply", err))?;

        if let Reply::Error(_) = reply {
            return Err(classify_reply_error(&reply));
        }
        Ok(reply)
    }

    fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }
}

impl<S> fmt::Debug for BlockingConnection<S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingConnection")
            .field("stream", &self.stream)
            .field("last_error", &self.last_error)
            .finish()
    }
}
