use bytes::{Buf, Bytes, BytesMut};

use crate::proto::reply::{Reply, ReplyArray};

const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024; // 512 MB default
const DEFAULT_MAX_DEPTH: usize = 128;

/// A RESP2 decoder that converts bytes to [`Reply`] values.
///
/// The decoder handles streaming input. Call [`append`](Decoder::append) to
/// add data, then [`decode`](Decoder::decode) to parse replies. Returns
/// `Ok(None)` when more data is needed; the buffer is only consumed once a
/// whole reply is available.
///
/// Decoding runs in two passes. A scan walks frame headers and bulk lengths
/// without allocating and remembers where it stopped, so bytes already
/// scanned are not looked at again when more data arrives. Once the scan
/// reaches the end of a reply, the [`Reply`] tree is built in one go.
///
/// # Example
///
/// ```
/// use redis_txn::proto::codec::Decoder;
/// use redis_txn::proto::reply::Reply;
///
/// let mut decoder = Decoder::new();
/// decoder.append(b"+QUEUED\r\n");
/// let reply = decoder.decode().unwrap().unwrap();
/// assert_eq!(reply, Reply::Status("QUEUED".to_string()));
/// ```
#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    max_frame_size: usize,
    max_depth: usize,
    /// Start of the first header the scan has not finished.
    scan_pos: usize,
    /// Elements still expected by each array the scan is inside of.
    open_arrays: Vec<usize>,
}

impl Decoder {
    /// Creates a new decoder with an empty buffer.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a new decoder with a custom maximum frame size.
    ///
    /// # Arguments
    ///
    /// * `max_frame_size` - Maximum size in bytes for a single reply
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_size,
            max_depth: DEFAULT_MAX_DEPTH,
            scan_pos: 0,
            open_arrays: Vec::new(),
        }
    }

    /// Sets how many arrays may be nested inside each other in one reply.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Appends raw bytes to the internal buffer.
    ///
    /// Buffer size limits are checked during decode, not append.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Returns true if there are buffered bytes not yet decoded.
    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Attempts to decode one reply from the buffer.
    ///
    /// Returns `Ok(Some(Reply))` if a complete reply was decoded,
    /// `Ok(None)` if more data is needed, and `Err(...)` if the data is
    /// malformed or nested deeper than the configured maximum.
    pub fn decode(&mut self) -> Result<Option<Reply>, String> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        if self.buf.len() > self.max_frame_size {
            return Err("Buffer size exceeded maximum frame size".to_string());
        }

        let Some(end) = self.scan()? else {
            return Ok(None);
        };

        let (reply, consumed) = self.parse(0, 0)?;
        debug_assert_eq!(consumed, end);
        self.buf.advance(end);
        self.scan_pos = 0;
        self.open_arrays.clear();
        Ok(Some(reply))
    }

    /// Advances the scan over complete frames.
    ///
    /// Returns the end of the first reply once all of it is buffered.
    fn scan(&mut self) -> Result<Option<usize>, String> {
        loop {
            let Some((marker, len, next)) = self.header(self.scan_pos)? else {
                return Ok(None);
            };

            match marker {
                b'$' if len >= 0 => {
                    let end = bulk_end(len, next, self.max_frame_size)?;
                    if self.buf.len() < end {
                        return Ok(None);
                    }
                    if &self.buf[end - 2..end] != b"\r\n" {
                        return Err("bulk string missing CRLF terminator".to_string());
                    }
                    self.scan_pos = end;
                }
                b'*' if len > 0 => {
                    let len = array_len(len, self.max_frame_size)?;
                    if self.open_arrays.len() >= self.max_depth {
                        return Err("nesting depth exceeds maximum".to_string());
                    }
                    self.open_arrays.push(len);
                    self.scan_pos = next;
                    continue;
                }
                _ => self.scan_pos = next,
            }

            // One element is complete; close every array it completes.
            loop {
                let Some(remaining) = self.open_arrays.last_mut() else {
                    return Ok(Some(self.scan_pos));
                };
                *remaining -= 1;
                if *remaining > 0 {
                    break;
                }
                self.open_arrays.pop();
            }
        }
    }

    /// Reads the header line at `pos`.
    ///
    /// Returns the type marker, the parsed length for `$` and `*` (zero for
    /// other types) and the position just past the line.
    fn header(&self, pos: usize) -> Result<Option<(u8, i64, usize)>, String> {
        let Some(&marker) = self.buf.get(pos) else {
            return Ok(None);
        };
        if !matches!(marker, b'+' | b'-' | b':' | b'$' | b'*') {
            return Err(format!("unknown frame type: {}", marker as char));
        }
        let Some(end) = self.find_crlf(pos + 1) else {
            return Ok(None);
        };
        let line = &self.buf[pos + 1..end];
        let len = match marker {
            b':' | b'$' | b'*' => parse_int(line)?,
            _ => 0,
        };
        Ok(Some((marker, len, end + 2)))
    }

    /// Builds the reply starting at `pos` from fully scanned bytes.
    ///
    /// Returns the reply and the position just past it.
    fn parse(&self, pos: usize, depth: usize) -> Result<(Reply, usize), String> {
        let (marker, len, next) = self.header(pos)?.ok_or_else(truncated)?;
        let line = &self.buf[pos + 1..next - 2];

        match marker {
            b'+' => Ok((Reply::Status(line_to_string(line)), next)),
            b'-' => Ok((Reply::Error(line_to_string(line)), next)),
            b':' => Ok((Reply::Integer(len), next)),
            b'$' if len == -1 => Ok((Reply::Nil, next)),
            b'$' => {
                let end = bulk_end(len, next, self.max_frame_size)?;
                let data = self.buf.get(next..end - 2).ok_or_else(truncated)?;
                Ok((Reply::BulkString(Bytes::copy_from_slice(data)), end))
            }
            b'*' if len == -1 => Ok((Reply::Nil, next)),
            _ => self.parse_array(array_len(len, self.max_frame_size)?, next, depth + 1),
        }
    }

    fn parse_array(
        &self,
        len: usize,
        start: usize,
        depth: usize,
    ) -> Result<(Reply, usize), String> {
        if len > 0 && depth > self.max_depth {
            return Err("nesting depth exceeds maximum".to_string());
        }

        let mut items = Vec::with_capacity(len);
        let mut pos = start;
        for _ in 0..len {
            let (reply, next) = self.parse(pos, depth)?;
            items.push(reply);
            pos = next;
        }

        Ok((Reply::Array(ReplyArray::from(items)), pos))
    }

    /// Searches for the next CRLF at or after `from`.
    fn find_crlf(&self, from: usize) -> Option<usize> {
        self.buf
            .get(from..)?
            .windows(2)
            .position(|w| w == b"\r\n")
            .map(|i| from + i)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn line_to_string(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

fn bulk_end(len: i64, start: usize, max_frame_size: usize) -> Result<usize, String> {
    let len = usize::try_from(len).map_err(|_| format!("invalid bulk length: {}", len))?;
    if len > max_frame_size {
        return Err("Bulk string length exceeds maximum frame size".to_string());
    }
    Ok(start + len + 2)
}

fn array_len(len: i64, max_frame_size: usize) -> Result<usize, String> {
    let len = usize::try_from(len).map_err(|_| format!("invalid array length: {}", len))?;
    // Assume minimum 16 bytes per item
    if len > max_frame_size / 16 {
        return Err("Array length exceeds reasonable maximum".to_string());
    }
    Ok(len)
}

fn truncated() -> String {
    "truncated frame".to_string()
}

fn parse_int(line: &[u8]) -> Result<i64, String> {
    std::str::from_utf8(line)
        .map_err(|e| e.to_string())?
        .parse::<i64>()
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_status() {
        let mut decoder = Decoder::new();
        decoder.append(b"+OK\r\n");
        let reply = decoder.decode().unwrap().unwrap();
        assert_eq!(reply, Reply::Status("OK".to_string()));
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_decode_error() {
        let mut decoder = Decoder::new();
        decoder.append(b"-MOVED 3999 127.0.0.1:7000\r\n");
        let reply = decoder.decode().unwrap().unwrap();
        assert_eq!(reply, Reply::Error("MOVED 3999 127.0.0.1:7000".to_string()));
    }

    #[test]
    fn test_decode_integer() {
        let mut decoder = Decoder::new();
        decoder.append(b":-42\r\n");
        assert_eq!(decoder.decode().unwrap().unwrap(), Reply::Integer(-42));
    }

    #[test]
    fn test_decode_bulk_string() {
        let mut decoder = Decoder::new();
        decoder.append(b"$5\r\nhello\r\n");
        let reply = decoder.decode().unwrap().unwrap();
        assert_eq!(reply, Reply::BulkString(Bytes::from("hello")));
    }

    #[test]
    fn test_decode_nil_bulk_and_array() {
        let mut decoder = Decoder::new();
        decoder.append(b"$-1\r\n*-1\r\n");
        assert_eq!(decoder.decode().unwrap().unwrap(), Reply::Nil);
        assert_eq!(decoder.decode().unwrap().unwrap(), Reply::Nil);
    }

    #[test]
    fn test_decode_empty_array() {
        let mut decoder = Decoder::new();
        decoder.append(b"*0\r\n");
        assert_eq!(
            decoder.decode().unwrap().unwrap(),
            Reply::Array(ReplyArray::default())
        );
    }

    #[test]
    fn test_decode_nested_exec_reply() {
        let mut decoder = Decoder::new();
        decoder.append(b"*3\r\n+OK\r\n:2\r\n-WRONGTYPE bad\r\n");
        let reply = decoder.decode().unwrap().unwrap();
        assert_eq!(
            reply,
            Reply::from(vec![
                Reply::Status("OK".to_string()),
                Reply::Integer(2),
                Reply::Error("WRONGTYPE bad".to_string()),
            ])
        );
    }

    #[test]
    fn test_decode_partial_array_keeps_buffer() {
        let mut decoder = Decoder::new();
        decoder.append(b"*2\r\n$3\r\nfoo\r\n");
        assert!(decoder.decode().unwrap().is_none());
        decoder.append(b"$3\r\nbar\r\n");
        let reply = decoder.decode().unwrap().unwrap();
        assert_eq!(
            reply,
            Reply::from(vec![
                Reply::BulkString(Bytes::from("foo")),
                Reply::BulkString(Bytes::from("bar")),
            ])
        );
    }

    #[test]
    fn test_decode_partial_line() {
        let mut decoder = Decoder::new();
        decoder.append(b"+QUEUED\r");
        assert!(decoder.decode().unwrap().is_none());
        decoder.append(b"\n");
        let reply = decoder.decode().unwrap().unwrap();
        assert_eq!(reply, Reply::Status("QUEUED".to_string()));
    }

    #[test]
    fn test_decode_unknown_type() {
        let mut decoder = Decoder::new();
        decoder.append(b"?what\r\n");
        assert!(decoder.decode().unwrap_err().contains("unknown frame type"));
    }

    #[test]
    fn test_decoder_bulk_string_exceeds_max_size() {
        let mut decoder = Decoder::with_max_frame_size(10);
        decoder.append(b"$100\r\n");
        let result = decoder.decode();
        assert!(result
            .unwrap_err()
            .contains("Bulk string length exceeds maximum"));
    }

    #[test]
    fn test_decoder_buffer_exceeds_max_on_decode() {
        let mut decoder = Decoder::with_max_frame_size(10);
        decoder.append(b"+");
        decoder.append(&[b'x'; 20]);
        decoder.append(b"\r\n");
        let result = decoder.decode();
        assert!(result.unwrap_err().contains("Buffer size exceeded maximum"));
    }

    #[test]
    fn test_decode_depth_limit() {
        let mut decoder = Decoder::new().with_max_depth(2);
        decoder.append(b"*1\r\n*1\r\n:1\r\n");
        assert_eq!(
            decoder.decode().unwrap().unwrap(),
            Reply::from(vec![Reply::from(vec![Reply::Integer(1)])])
        );

        decoder.append(b"*1\r\n*1\r\n*1\r\n:1\r\n");
        assert_eq!(
            decoder.decode().unwrap_err(),
            "nesting depth exceeds maximum"
        );
    }

    #[test]
    fn test_decode_empty_arrays_do_not_count_as_nesting() {
        let mut decoder = Decoder::new().with_max_depth(1);
        decoder.append(b"*2\r\n*0\r\n*-1\r\n");
        assert_eq!(
            decoder.decode().unwrap().unwrap(),
            Reply::from(vec![Reply::Array(ReplyArray::default()), Reply::Nil])
        );
    }

    #[test]
    fn test_decode_deep_nesting_is_error() {
        let mut decoder = Decoder::new();
        for _ in 0..100_000 {
            decoder.append(b"*1\r\n");
        }
        decoder.append(b":1\r\n");
        assert!(decoder.decode().unwrap_err().contains("nesting depth"));
    }

    #[test]
    fn test_decode_large_array_in_chunks() {
        let value = [b'v'; 1024];
        let mut raw = Vec::new();
        raw.extend_from_slice(b"*500\r\n");
        for _ in 0..500 {
            raw.extend_from_slice(b"$1024\r\n");
            raw.extend_from_slice(&value);
            raw.extend_from_slice(b"\r\n");
        }
        raw.extend_from_slice(b"+OK\r\n");

        let mut decoder = Decoder::new();
        let mut decoded = Vec::new();
        for chunk in raw.chunks(4096) {
            decoder.append(chunk);
            while let Some(reply) = decoder.decode().unwrap() {
                decoded.push(reply);
            }
            if decoded.is_empty() {
                // The scan resumes where the previous call stopped.
                assert!(decoder.scan_pos > 0);
                assert_eq!(decoder.open_arrays.len(), 1);
            }
        }

        assert_eq!(decoded.len(), 2);
        let Reply::Array(array) = decoded.remove(0) else {
            panic!("expected array reply");
        };
        assert_eq!(array.len(), 500);
        assert!(array
            .iter()
            .all(|r| *r == Reply::BulkString(Bytes::copy_from_slice(&value))));
        assert_eq!(decoded[0], Reply::Status("OK".to_string()));
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_decode_bulk_split_across_appends() {
        let mut decoder = Decoder::new();
        decoder.append(b"*2\r\n$5\r\nhel");
        assert!(decoder.decode().unwrap().is_none());
        decoder.append(b"lo\r\n:3");
        assert!(decoder.decode().unwrap().is_none());
        decoder.append(b"\r\n");
        assert_eq!(
            decoder.decode().unwrap().unwrap(),
            Reply::from(vec![
                Reply::BulkString(Bytes::from("hello")),
                Reply::Integer(3),
            ])
        );
    }
}
