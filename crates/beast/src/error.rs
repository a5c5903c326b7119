//! Decoder and encoder error types

use std::io;

use bytes::Bytes;
use contracts::FrameKind;
use thiserror::Error;

/// Decoder error
#[derive(Debug, Error)]
pub enum DecodeError {
    /// First byte is not an escape, or the escape is followed by another escape
    #[error("unexpected start of frame")]
    InvalidFrame,

    /// An escape inside the frame body was not doubled
    #[error("unescaped escape followed by {found:#04x} after {} bytes", .consumed.len())]
    UnescapedEscape {
        /// Byte found where the second escape was expected
        found: u8,
        /// Every byte consumed for this frame, `found` included
        consumed: Bytes,
    },

    /// Stream closed, possibly mid-frame
    #[error("end of stream")]
    EndOfStream,

    /// Underlying read failure
    #[error("read error: {0}")]
    Io(io::Error),
}

impl DecodeError {
    /// True for framing errors: the caller should call the decoder again on
    /// the same stream. False means the stream is unusable.
    pub fn is_resync(&self) -> bool {
        matches!(self, Self::InvalidFrame | Self::UnescapedEscape { .. })
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidFrame => "invalid_frame",
            Self::UnescapedEscape { .. } => "unescaped_escape",
            Self::EndOfStream => "end_of_stream",
            Self::Io(_) => "io",
        }
    }
}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::EndOfStream
        } else {
            Self::Io(e)
        }
    }
}

/// Encoder error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{kind} payload must be {expected} bytes, got {actual}")]
    PayloadLength {
        kind: FrameKind,
        expected: usize,
        actual: usize,
    },

    #[error("timestamp {0:#x} does not fit in 48 bits")]
    TimestampOverflow(u64),
}
