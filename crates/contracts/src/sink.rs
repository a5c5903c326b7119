//! FrameSink trait - Dispatcher output interface
//!
//! A subscriber is a write-only sink for relayed frames.

use crate::{ContractError, Frame};

/// Frame output trait
///
/// Implemented by TCP subscribers and by test doubles.
#[trait_variant::make(FrameSink: Send)]
pub trait LocalFrameSink {
    /// Sink name (peer address for TCP subscribers, used for logging)
    fn name(&self) -> &str;

    /// Write one frame verbatim
    ///
    /// # Errors
    /// Any error marks the sink dead; it is never retried.
    async fn write(&mut self, frame: &Frame) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
