//! Packetized array transfers for SPiiPlus controllers.
//!
//! A [`Link`] owns a [`ByteChannel`](spiibin_transport::ByteChannel) and
//! turns one logical array read or write into the sequence of binary
//! request/response exchanges the controller needs: continuation slices for
//! large reads, single-digit slice indices with wraparound for large writes,
//! and error-frame classification on every reply.
//!
//! Exactly one packet is in flight at a time. Share a link between threads
//! with [`SharedLink`], which holds its lock for a whole transfer.

pub mod config;
pub mod error;
pub mod globals;
pub mod link;
pub mod raw;
pub mod read;
pub mod shared;
pub mod write;

pub use config::LinkConfig;
pub use error::{ErrorCategory, LinkError, Result};
pub use globals::{ensure_global_real, GlobalCheck, GlobalVariables};
pub use link::Link;
pub use raw::RawModeGuard;
pub use read::SliceState;
pub use shared::SharedLink;
pub use write::WriteReport;
