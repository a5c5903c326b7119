//! Frame encoder
//!
//! Used by test feeders and the loopback tooling; the relay path itself
//! never re-encodes.

use bytes::{BufMut, BytesMut};

use contracts::{Frame, FrameKind, ESCAPE};

use crate::error::EncodeError;

const MAX_TIMESTAMP: u64 = (1 << 48) - 1;

fn put_escaped(buf: &mut BytesMut, b: u8) {
    buf.put_u8(b);
    if b == ESCAPE {
        buf.put_u8(ESCAPE);
    }
}

/// Build a frame from its logical fields.
///
/// `timestamp` is the 48-bit MLAT counter, written big-endian. Every escape
/// byte in timestamp, signal or payload is doubled.
pub fn encode_frame(
    kind: FrameKind,
    timestamp: u64,
    signal: u8,
    payload: &[u8],
) -> Result<Frame, EncodeError> {
    if payload.len() != kind.payload_len() {
        return Err(EncodeError::PayloadLength {
            kind,
            expected: kind.payload_len(),
            actual: payload.len(),
        });
    }
    if timestamp > MAX_TIMESTAMP {
        return Err(EncodeError::TimestampOverflow(timestamp));
    }

    let mut buf = BytesMut::with_capacity(kind.max_wire_len());
    buf.put_u8(ESCAPE);
    buf.put_u8(kind.tag());

    for &b in &timestamp.to_be_bytes()[2..] {
        put_escaped(&mut buf, b);
    }
    put_escaped(&mut buf, signal);
    for &b in payload {
        put_escaped(&mut buf, b);
    }

    Ok(Frame::from_wire(kind, buf.freeze()))
}
