//! Line framing for the command protocol.
//!
//! Inbound bytes are buffered per connection and split on `\n`; a trailing
//! `\r` is dropped. A fragment without a terminator is kept until the rest
//! arrives, and whatever is left at end of stream is yielded as a final line.
//! Lines longer than the configured limit are skipped up to the next `\n`
//! and reported once as [`Inbound::Oversized`].

use std::cmp;
use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// One decoded inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// A complete line without its terminator. May be empty.
    Line(String),
    /// A line exceeded the length limit and was discarded.
    Oversized,
}

/// Framing errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The underlying stream failed.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// `\n`-delimited text codec with a per-line length limit.
#[derive(Clone, Debug)]
pub struct CommandCodec {
    max_line_length: usize,
    /// Bytes of the buffer already scanned for `\n`.
    next_index: usize,
    /// Inside an oversized line; skip until the next `\n`.
    discarding: bool,
}

impl CommandCodec {
    /// Create a codec accepting lines of at most `max_line_length` bytes.
    pub fn new(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            next_index: 0,
            discarding: false,
        }
    }

    /// Configured limit.
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Frame one line body. The limit applies after the `\r` is dropped.
    fn frame(&self, bytes: &[u8]) -> Inbound {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        if bytes.len() > self.max_line_length {
            return Inbound::Oversized;
        }
        Inbound::Line(String::from_utf8_lossy(bytes).into_owned())
    }
}

impl Decoder for CommandCodec {
    type Item = Inbound;
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Inbound>, CodecError> {
        loop {
            // Room for a full line plus `\r\n`.
            let read_to = cmp::min(self.max_line_length.saturating_add(2), buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    buf.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                    return Ok(Some(Inbound::Oversized));
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(end + 1);
                    return Ok(Some(self.frame(&line[..end])));
                }
                (false, None) if buf.len() > self.max_line_length.saturating_add(1) => {
                    self.discarding = true;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Inbound>, CodecError> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        self.next_index = 0;
        if self.discarding {
            self.discarding = false;
            buf.clear();
            return Ok(Some(Inbound::Oversized));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        let rest = buf.split_to(buf.len());
        Ok(Some(self.frame(&rest)))
    }
}

impl Encoder<Arc<str>> for CommandCodec {
    type Error = CodecError;

    fn encode(&mut self, line: Arc<str>, dst: &mut BytesMut) -> Result<(), CodecError> {
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
