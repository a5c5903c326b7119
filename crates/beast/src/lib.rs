//! # Beast
//!
//! Mode-S Beast binary framing.
//!
//! Responsibilities:
//! - Recover frame boundaries from a raw byte stream without waiting for the
//!   next frame's start byte
//! - Keep escape doubling intact so frames can be relayed verbatim
//! - Classify malformed input so callers can resynchronize at the next byte
//!
//! ## Usage Example
//!
//! ```ignore
//! use beast::{Decoded, FrameReader};
//!
//! let mut reader = FrameReader::new(socket);
//! loop {
//!     match reader.read().await {
//!         Ok(Decoded::Frame(frame)) => forward(frame).await,
//!         Ok(Decoded::Skipped { .. }) => continue,
//!         Err(e) if e.is_resync() => continue,
//!         Err(e) => break,
//!     }
//! }
//! ```

mod decoder;
mod encoder;
mod error;

pub use contracts::{Frame, FrameKind, ESCAPE};
pub use decoder::{read_frame, Decoded, FrameReader};
pub use encoder::encode_frame;
pub use error::{DecodeError, EncodeError};
