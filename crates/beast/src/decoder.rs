//! Streaming frame decoder
//!
//! Frames carry no length prefix and no trailer, but each type has a fixed
//! logical body length. The decoder reads exactly that many logical bytes,
//! collapsing `<esc><esc>` pairs for counting while keeping both bytes in the
//! output. It never reads past the end of the current frame, so a frame is
//! delivered as soon as its last byte arrives.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

use contracts::{Frame, FrameKind, ESCAPE};

use crate::error::DecodeError;

/// Read buffer for socket-backed readers
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Outcome of one successful decoder call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete frame in wire representation
    Frame(Frame),
    /// Escape followed by an unknown type tag. Nothing to relay; the stream
    /// continues right after the tag.
    Skipped { tag: u8 },
}

/// Decode the next frame from `reader`.
///
/// On `InvalidFrame` only the bytes examined so far are consumed (one for a
/// bad start byte, two for `<esc><esc>`), so calling again resumes at the
/// next byte. Not cancel safe: dropping the future mid-frame loses the
/// partially read bytes.
pub async fn read_frame<R>(reader: &mut R) -> Result<Decoded, DecodeError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if reader.read_u8().await? != ESCAPE {
        return Err(DecodeError::InvalidFrame);
    }

    let tag = reader.read_u8().await?;
    if tag == ESCAPE {
        return Err(DecodeError::InvalidFrame);
    }

    let Some(kind) = FrameKind::from_tag(tag) else {
        return Ok(Decoded::Skipped { tag });
    };

    let mut buf = BytesMut::with_capacity(kind.max_wire_len());
    buf.put_u8(ESCAPE);
    buf.put_u8(tag);

    for _ in 0..kind.body_len() {
        let b = reader.read_u8().await?;
        buf.put_u8(b);

        if b == ESCAPE {
            let next = reader.read_u8().await?;
            buf.put_u8(next);
            if next != ESCAPE {
                return Err(DecodeError::UnescapedEscape {
                    found: next,
                    consumed: buf.freeze(),
                });
            }
        }
    }

    Ok(Decoded::Frame(Frame::from_wire(kind, buf.freeze())))
}

/// Buffered frame reader over a byte stream
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, inner),
        }
    }

    /// Decode the next frame. See [`read_frame`].
    pub async fn read(&mut self) -> Result<Decoded, DecodeError> {
        read_frame(&mut self.reader).await
    }
}
