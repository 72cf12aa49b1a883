//! Blocking byte-channel abstraction for SPiiPlus controller links.
//!
//! The binary array protocol only needs a duplex byte channel with
//! per-call timeouts, an input flush, and switchable end-of-string
//! delimiters. This crate defines that contract ([`ByteChannel`]) and ships
//! two implementations:
//! - [`StreamChannel`] over any blocking stream (TCP, Unix sockets)
//! - [`MemoryChannel`], a scripted in-memory peer for tests and offline tools

pub mod error;
pub mod memory;
pub mod stream;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryChannel;
pub use stream::{StreamChannel, TimeoutStream};
pub use traits::{ByteChannel, Eos};
