//! Multi-packet write planning.
//!
//! A sliced write carries a one-digit slice index, so a descriptor can be
//! sent in at most ten packets. Longer transfers wrap: the index restarts at
//! 0 and the descriptor is rebased past the elements already sent. A wrap
//! inside a row of a two-dimensional block first finishes that row under
//! its own one-row descriptor.

use tracing::debug;

use crate::command::chunk_layout;
use crate::descriptor::{ArrayDescriptor, ElementKind, IndexRange};
use crate::error::{FrameError, Result};

/// Number of distinct write slice indices (`0`..=`9`).
pub const MAX_WRITE_SLICES: u8 = 10;

/// What follows a write slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceStep {
    /// Send the next packet with this index.
    Next(u8),
    /// The index space is used up; restart at 0 with a rebased descriptor.
    Wrap,
}

/// Advance a write slice index.
pub fn next_slice(current: u8) -> SliceStep {
    match current.checked_add(1) {
        Some(next) if next < MAX_WRITE_SLICES => SliceStep::Next(next),
        _ => SliceStep::Wrap,
    }
}

/// Descriptor for the next block of `original` after its first `sent`
/// elements.
///
/// When `sent` is a whole number of rows the block is every remaining row.
/// Otherwise it is the rest of the current row, and the rebase that follows
/// it lands on a row boundary.
pub fn rebase_descriptor(original: &ArrayDescriptor, sent: usize) -> Result<ArrayDescriptor> {
    let total = original.num_elements()?;
    if sent == 0 || sent >= total {
        return Err(FrameError::ProtocolLimit(format!(
            "cannot rebase {original} after {sent} of {total} elements"
        )));
    }

    let mut rebased = original.clone();
    let row_len = original.row_len();
    let (rows, column) = (sent / row_len, sent % row_len);
    if column == 0 {
        rebased.dim1 = IndexRange::new(offset(original.dim1.start, rows)?, original.dim1.end)?;
    } else {
        rebased.dim1 = IndexRange::scalar(offset(original.dim1.start, rows)?);
        rebased.dim2 = IndexRange::new(offset(original.dim2.start, column)?, original.dim2.end)?;
    }
    Ok(rebased)
}

fn offset(start: u32, by: usize) -> Result<u32> {
    u32::try_from(by)
        .ok()
        .and_then(|by| start.checked_add(by))
        .ok_or_else(|| FrameError::ProtocolLimit(format!("index {start} + {by} overflows")))
}

/// One packet of a planned write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteChunk {
    /// Slice digit sent with this packet.
    pub slice_index: u8,
    /// Descriptor the packet is encoded against (rebased after a wrap).
    pub descriptor: ArrayDescriptor,
    pub elements_in_chunk: usize,
    /// First element of this packet within the original data.
    pub data_offset_elements: usize,
    /// First element of this packet within `descriptor`'s data.
    pub segment_offset_elements: usize,
    /// Packets left in the plan after this one.
    pub remaining_slices: usize,
    /// Sent with a `%<digit>` prefix and the sliced write opcode.
    pub sliced: bool,
}

impl WriteChunk {
    /// First element of `descriptor` within the original data.
    pub fn segment_start(&self) -> usize {
        self.data_offset_elements - self.segment_offset_elements
    }

    /// True when the packet is encoded without a slice prefix.
    pub fn is_single(&self) -> bool {
        !self.sliced
    }
}

/// Every packet needed to write a descriptor, computed before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePlan {
    descriptor: ArrayDescriptor,
    kind: ElementKind,
    chunks: Vec<WriteChunk>,
    total_elements: usize,
    wraps: usize,
}

impl WritePlan {
    pub fn new(descriptor: &ArrayDescriptor, kind: ElementKind) -> Result<Self> {
        if kind.write_opcodes().is_none() {
            return Err(FrameError::UnsupportedWrite(kind));
        }

        let total = descriptor.num_elements()?;
        let mut chunks = Vec::new();
        let mut segment = descriptor.clone();
        let mut sent = 0usize;
        let mut wraps = 0usize;

        loop {
            let layout = chunk_layout(&segment, kind)?;
            let segment_start = sent;
            let mut slice = 0u8;
            loop {
                let Some(elements) = layout.elements_in_slice(usize::from(slice)) else {
                    break;
                };
                chunks.push(WriteChunk {
                    slice_index: slice,
                    descriptor: segment.clone(),
                    elements_in_chunk: elements,
                    data_offset_elements: sent,
                    segment_offset_elements: sent - segment_start,
                    remaining_slices: 0,
                    sliced: layout.sliced,
                });
                sent += elements;
                match next_slice(slice) {
                    SliceStep::Next(next) => slice = next,
                    SliceStep::Wrap => break,
                }
            }

            if sent >= total {
                break;
            }
            segment = rebase_descriptor(descriptor, sent)?;
            wraps += 1;
            debug!(%descriptor, sent, rebased = %segment, "write restarts on rebased descriptor");
        }

        let count = chunks.len();
        for (i, chunk) in chunks.iter_mut().enumerate() {
            chunk.remaining_slices = count - i - 1;
        }

        Ok(Self {
            descriptor: descriptor.clone(),
            kind,
            chunks,
            total_elements: total,
            wraps,
        })
    }

    pub fn descriptor(&self) -> &ArrayDescriptor {
        &self.descriptor
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn chunks(&self) -> &[WriteChunk] {
        &self.chunks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WriteChunk> {
        self.chunks.iter()
    }

    /// Number of packets.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_elements(&self) -> usize {
        self.total_elements
    }

    /// Times the slice index restarts at 0 on a rebased descriptor.
    pub fn wraps(&self) -> usize {
        self.wraps
    }
}

impl<'a> IntoIterator for &'a WritePlan {
    type Item = &'a WriteChunk;
    type IntoIter = std::slice::Iter<'a, WriteChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}
