//! # Contracts
//!
//! Shared interface contracts between the proxy crates: the wire `Frame`,
//! the subscriber sink trait, the configuration model and the common error type.
//! Business crates depend on this crate only, never on each other's internals.
//!
//! ## Wire model
//! - A frame is kept as its literal wire bytes, escape doubling included
//! - Frames are reference counted, one allocation serves every subscriber

mod blueprint;
mod error;
mod frame;
mod sink;

pub use blueprint::*;
pub use error::*;
pub use frame::*;
pub use sink::*;
