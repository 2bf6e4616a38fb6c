//! RESP2 encoder and decoder
//!
//! Commands are always sent as arrays of bulk strings, so keys and values are
//! binary safe in both directions.

use std::io::{self, BufRead};

use super::error::ProtocolError;

/// RESP value types
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple string (+OK\r\n)
    SimpleString(String),
    /// Error (-ERR message\r\n)
    Error(String),
    /// Integer (:1000\r\n)
    Integer(i64),
    /// Bulk string ($6\r\nfoobar\r\n)
    BulkString(Vec<u8>),
    /// Null bulk string or null array ($-1\r\n, *-1\r\n)
    Null,
    /// Array (*2\r\n...)
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Whether this is a `+OK` status reply
    pub fn is_ok(&self) -> bool {
        matches!(self, RespValue::SimpleString(s) if s == "OK")
    }

    /// Get as string (for simple string or UTF-8 bulk string)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Take the payload of a bulk string
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            RespValue::BulkString(b) => Some(b),
            _ => None,
        }
    }

    /// Short human-readable rendering for error messages
    pub fn describe(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("+{}", s),
            RespValue::Error(e) => format!("-{}", e),
            RespValue::Integer(i) => format!(":{}", i),
            RespValue::BulkString(b) if b.len() <= 64 => {
                format!("\"{}\"", String::from_utf8_lossy(b))
            }
            RespValue::BulkString(b) => format!("<{} bytes>", b.len()),
            RespValue::Null => "(nil)".to_string(),
            RespValue::Array(arr) => format!("<array of {}>", arr.len()),
        }
    }
}

/// RESP encoder with pre-allocated buffer
pub struct RespEncoder {
    buf: Vec<u8>,
}

impl RespEncoder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Clear buffer for reuse
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Encode a command as RESP array of bulk strings
    pub fn encode_command(&mut self, args: &[&[u8]]) {
        self.buf.push(b'*');
        self.write_int(args.len() as i64);
        self.buf.extend_from_slice(b"\r\n");

        for arg in args {
            self.buf.push(b'$');
            self.write_int(arg.len() as i64);
            self.buf.extend_from_slice(b"\r\n");
            self.buf.extend_from_slice(arg);
            self.buf.extend_from_slice(b"\r\n");
        }
    }

    /// Encode a command from string slices
    pub fn encode_command_str(&mut self, args: &[&str]) {
        let byte_args: Vec<&[u8]> = args.iter().map(|s| s.as_bytes()).collect();
        self.encode_command(&byte_args);
    }

    #[inline]
    fn write_int(&mut self, value: i64) {
        let mut buffer = itoa::Buffer::new();
        self.buf.extend_from_slice(buffer.format(value).as_bytes());
    }
}

/// RESP decoder for streaming reads
pub struct RespDecoder<R> {
    reader: R,
    line_buf: Vec<u8>,
}

impl<R: BufRead> RespDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buf: Vec::with_capacity(256),
        }
    }

    /// Decode next RESP value from stream
    pub fn decode(&mut self) -> io::Result<RespValue> {
        self.line_buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.line_buf)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Connection closed",
            ));
        }
        if !self.line_buf.ends_with(b"\r\n") {
            return Err(ProtocolError::MissingTerminator.into());
        }

        let line = &self.line_buf[..self.line_buf.len() - 2];
        let Some((&type_byte, content)) = line.split_first() else {
            return Err(ProtocolError::InvalidType(b'\r').into());
        };
        let content = String::from_utf8_lossy(content).into_owned();

        match type_byte {
            b'+' => Ok(RespValue::SimpleString(content)),
            b'-' => Ok(RespValue::Error(content)),
            b':' => {
                let value: i64 = content
                    .parse()
                    .map_err(|_| ProtocolError::InvalidInteger(content.clone()))?;
                Ok(RespValue::Integer(value))
            }
            b'$' => {
                let len: i64 = content
                    .parse()
                    .map_err(|_| ProtocolError::InvalidLength(content.clone()))?;
                if len < 0 {
                    return Ok(RespValue::Null);
                }

                let mut data = vec![0u8; len as usize];
                self.reader.read_exact(&mut data)?;

                let mut crlf = [0u8; 2];
                self.reader.read_exact(&mut crlf)?;
                if &crlf != b"\r\n" {
                    return Err(ProtocolError::MissingTerminator.into());
                }

                Ok(RespValue::BulkString(data))
            }
            b'*' => {
                let count: i64 = content
                    .parse()
                    .map_err(|_| ProtocolError::InvalidLength(content.clone()))?;
                if count < 0 {
                    return Ok(RespValue::Null);
                }

                let mut elements = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    elements.push(self.decode()?);
                }
                Ok(RespValue::Array(elements))
            }
            other => Err(ProtocolError::InvalidType(other).into()),
        }
    }
}
