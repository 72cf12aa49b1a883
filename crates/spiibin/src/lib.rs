//! SPiiPlus binary array protocol for Rust.
//!
//! Bulk numeric transfers to and from ACS SPiiPlus motion controllers use a
//! binary framing that runs alongside the ASCII command channel. This crate
//! gathers the pieces:
//!
//! # Crate Structure
//!
//! - [`transport`]: blocking byte channels (TCP, Unix sockets, in-memory)
//! - [`frame`]: command encoding, write-slice planning, error-frame decoding
//! - [`link`]: packetized `read_array`/`write_array` over a channel (behind
//!   the `link` feature, on by default)

/// Re-export transport types.
pub mod transport {
    pub use spiibin_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use spiibin_frame::*;
}

/// Re-export link types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use spiibin_link::*;
}
