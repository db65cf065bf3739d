//! Line framing for the chat transport.
//!
//! Wraps [`LinesCodec`] so the reader also learns about bytes that have
//! arrived without completing a line yet. The server uses those
//! [`Inbound::Partial`] frames to keep its idle watchdog from firing on a
//! client that is slowly typing a long line.
//!
//! Framing rules:
//! - lines end with `\n`, a trailing `\r` is stripped
//! - an unterminated final line is still yielded at end of stream
//! - lines over the maximum length are discarded up to the next `\n`
//! - invalid UTF-8 lines are consumed and reported, not fatal

use std::io;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// Maximum accepted inbound line length (64 KiB).
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A complete line without its terminator.
    Line(String),

    /// New bytes arrived but no line is complete yet.
    Partial,

    /// A line exceeded the maximum length and is being discarded.
    TooLong,

    /// A complete line that was not valid UTF-8.
    InvalidUtf8,
}

/// Newline codec that reports partial activity.
#[derive(Debug)]
pub struct LineCodec {
    lines: LinesCodec,
    max_length: usize,
    /// Buffer length seen at the end of the previous decode call.
    buffered: usize,
}

impl LineCodec {
    /// Creates a codec with [`MAX_LINE_LENGTH`].
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    /// Creates a codec with a custom maximum line length.
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
            max_length,
            buffered: 0,
        }
    }

    /// Returns the maximum line length.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn map_result(
        result: Result<Option<String>, LinesCodecError>,
    ) -> Result<Option<Inbound>, io::Error> {
        match result {
            Ok(line) => Ok(line.map(Inbound::Line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Inbound::TooLong)),
            Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                Ok(Some(Inbound::InvalidUtf8))
            }
            Err(LinesCodecError::Io(e)) => Err(e),
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Inbound;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Inbound>, io::Error> {
        let grew = buf.len() > self.buffered;
        let frame = Self::map_result(self.lines.decode(buf))?;
        self.buffered = buf.len();

        match frame {
            Some(frame) => Ok(Some(frame)),
            None if grew => Ok(Some(Inbound::Partial)),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Inbound>, io::Error> {
        let frame = Self::map_result(self.lines.decode_eof(buf))?;
        self.buffered = buf.len();
        Ok(frame)
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: T, buf: &mut BytesMut) -> Result<(), io::Error> {
        self.lines.encode(line, buf).map_err(|e| match e {
            LinesCodecError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        })
    }
}
