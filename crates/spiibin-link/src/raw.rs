use std::ops::{Deref, DerefMut};

use spiibin_transport::{ByteChannel, Eos};
use tracing::{trace, warn};

use crate::error::Result;

/// Puts a channel into raw binary mode for the lifetime of the guard.
///
/// Entering saves the channel's delimiters, clears them, and discards stale
/// input. Dropping the guard restores the saved delimiters, including when
/// the transfer fails part way.
pub struct RawModeGuard<'a, C: ByteChannel + ?Sized> {
    channel: &'a mut C,
    saved: Option<Eos>,
}

impl<'a, C: ByteChannel + ?Sized> RawModeGuard<'a, C> {
    pub fn enter(channel: &'a mut C) -> Result<Self> {
        let saved = channel.eos();
        channel.set_eos(Eos::none())?;
        let mut guard = Self {
            channel,
            saved: Some(saved),
        };
        guard.channel.flush()?;
        trace!("entered raw binary mode");
        Ok(guard)
    }
}

impl<C: ByteChannel + ?Sized> Deref for RawModeGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.channel
    }
}

impl<C: ByteChannel + ?Sized> DerefMut for RawModeGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.channel
    }
}

impl<C: ByteChannel + ?Sized> Drop for RawModeGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            if let Err(err) = self.channel.set_eos(saved) {
                warn!(error = %err, "failed to restore channel delimiters");
            }
        }
    }
}
