//! Frame - unit of data relayed from upstreams to subscribers
//!
//! Beast binary framing:
//!
//! ```text
//! <esc> "1" : 6 byte MLAT timestamp, 1 byte signal level, 2 byte Mode-AC
//! <esc> "2" : 6 byte MLAT timestamp, 1 byte signal level, 7 byte Mode-S short
//! <esc> "3" : 6 byte MLAT timestamp, 1 byte signal level, 14 byte Mode-S long
//! <esc><esc>: literal 0x1a inside timestamp/signal/payload
//! ```

use std::fmt;

use bytes::Bytes;

/// Frame start marker, doubled when it appears as data
pub const ESCAPE: u8 = 0x1a;

/// MLAT timestamp width in bytes
pub const TIMESTAMP_LEN: usize = 6;

/// Signal level width in bytes
pub const SIGNAL_LEN: usize = 1;

/// Escape byte plus type tag
pub const HEADER_LEN: usize = 2;

/// Beast message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// `'1'` Mode-A/C reply
    ModeAc,
    /// `'2'` Mode-S short (56 bit)
    ModeSShort,
    /// `'3'` Mode-S long (112 bit)
    ModeSLong,
}

impl FrameKind {
    /// Map a type tag to a kind. Unknown tags return `None`.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'1' => Some(Self::ModeAc),
            b'2' => Some(Self::ModeSShort),
            b'3' => Some(Self::ModeSLong),
            _ => None,
        }
    }

    /// Type tag byte on the wire
    pub fn tag(self) -> u8 {
        match self {
            Self::ModeAc => b'1',
            Self::ModeSShort => b'2',
            Self::ModeSLong => b'3',
        }
    }

    /// Payload length in logical (unescaped) bytes
    pub fn payload_len(self) -> usize {
        match self {
            Self::ModeAc => 2,
            Self::ModeSShort => 7,
            Self::ModeSLong => 14,
        }
    }

    /// Logical bytes following the type tag: timestamp + signal + payload
    pub fn body_len(self) -> usize {
        TIMESTAMP_LEN + SIGNAL_LEN + self.payload_len()
    }

    /// Shortest wire size (no escaped bytes)
    pub fn min_wire_len(self) -> usize {
        HEADER_LEN + self.body_len()
    }

    /// Longest wire size (every body byte escaped)
    pub fn max_wire_len(self) -> usize {
        HEADER_LEN + 2 * self.body_len()
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ModeAc => "mode-ac",
            Self::ModeSShort => "mode-s-short",
            Self::ModeSLong => "mode-s-long",
        };
        f.write_str(name)
    }
}

/// One complete frame in wire representation.
///
/// Immutable after creation. Cloning shares the underlying buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    wire: Bytes,
}

impl Frame {
    /// Wrap already-validated wire bytes.
    ///
    /// Callers are the decoder and encoder, which guarantee the bytes start
    /// with `<esc><tag>` for `kind`.
    pub fn from_wire(kind: FrameKind, wire: Bytes) -> Self {
        Self { kind, wire }
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Exact bytes to replay to subscribers
    pub fn as_bytes(&self) -> &[u8] {
        &self.wire
    }

    pub fn len(&self) -> usize {
        self.wire.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wire.is_empty()
    }

    /// Lowercase hex of the wire bytes, used for traffic dumps
    pub fn to_hex(&self) -> String {
        const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";
        let mut s = String::with_capacity(self.wire.len() * 2);
        for &b in self.wire.iter() {
            s.push(HEX_CHARS[(b >> 4) as usize] as char);
            s.push(HEX_CHARS[(b & 0x0f) as usize] as char);
        }
        s
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("kind", &self.kind)
            .field("wire", &self.to_hex())
            .finish()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
