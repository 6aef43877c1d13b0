use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::core::classify::{classify_transport_error, TransportError};
use crate::core::connection::BlockingConnection;
use crate::proto::codec::Decoder;
use crate::{Error, Result};

const DEFAULT_PORT: u16 = 6379;

/// Builder for configuring and opening a [`BlockingConnection`] over TCP.
///
/// # Example
///
/// ```no_run
/// use redis_txn::ConnectionBuilder;
/// use std::time::Duration;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let conn = ConnectionBuilder::new()
///     .address("redis://localhost:6379")
///     .read_timeout(Some(Duration::from_secs(2)))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConnectionBuilder {
    address: Option<String>,
    connection_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    max_frame_size: Option<usize>,
}

impl ConnectionBuilder {
    /// Creates a new [`ConnectionBuilder`] instance.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Redis server address, `redis://host:port`.
    #[inline]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the connection timeout.
    #[inline]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Sets the read timeout. `None` blocks indefinitely.
    ///
    /// An expired read surfaces as [`Error::Timeout`].
    #[inline]
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the write timeout. `None` blocks indefinitely.
    #[inline]
    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets the largest reply the decoder will accept, in bytes.
    #[inline]
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = Some(size);
        self
    }

    /// Connects and returns the configured connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generic`] if the address is missing or invalid, and
    /// a classified transport error if the TCP connect or socket setup fails.
    pub fn build(self) -> Result<BlockingConnection<TcpStream>> {
        let address = self
            .address
            .as_deref()
            .ok_or_else(|| Error::generic("address is required"))?;
        let addr = resolve(address)?;

        debug!(%addr, "connecting");
        let stream = match self.connection_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(|e| classify_transport_error("connect", &TransportError::from_io(&e)))?;

        stream
            .set_read_timeout(self.read_timeout)
            .and_then(|()| stream.set_write_timeout(self.write_timeout))
            .and_then(|()| stream.set_nodelay(true))
            .map_err(|e| {
                classify_transport_error("configure socket", &TransportError::from_io(&e))
            })?;

        let decoder = match self.max_frame_size {
            Some(size) => Decoder::with_max_frame_size(size),
            None => Decoder::new(),
        };
        Ok(BlockingConnection::with_decoder(stream, decoder))
    }
}

/// Parses `redis://host:port` and resolves it to a socket address.
fn resolve(address: &str) -> Result<SocketAddr> {
    let parsed_url =
        url::Url::parse(address).map_err(|_| Error::generic("invalid address format"))?;

    if parsed_url.scheme() != "redis" {
        return Err(Error::generic("invalid scheme, expected redis://"));
    }

    let host = parsed_url
        .host_str()
        .ok_or_else(|| Error::generic("missing host in address"))?;
    let port = parsed_url.port().unwrap_or(DEFAULT_PORT);

    (host, port)
        .to_socket_addrs()
        .map_err(|e| classify_transport_error("resolve address", &TransportError::from_io(&e)))?
        .next()
        .ok_or_else(|| Error::generic(format!("no address found for {}", host)))
}
