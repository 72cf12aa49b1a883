use bytes::{BufMut, BytesMut};
use spiibin_frame::{
    decode_error, decode_inline_error, encode_array_write_command, ArrayDescriptor, ElementKind,
    FrameError, MalformedReply, ReplyStatus, WritePlan,
};
use spiibin_transport::ByteChannel;
use tracing::{debug, warn};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::link::{send_packet, Link};
use crate::raw::RawModeGuard;

/// Summary of a completed array write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// Packets sent and acknowledged.
    pub packets: usize,
    pub elements: usize,
    /// Times the slice index restarted at 0.
    pub wraps: usize,
}

impl<C: ByteChannel> Link<C> {
    /// Write an array from little-endian element bytes.
    ///
    /// The whole packet schedule is computed before anything is sent. A
    /// failure on any packet aborts the transfer; packets already
    /// acknowledged stay written on the controller.
    pub fn write_array(
        &mut self,
        descriptor: &ArrayDescriptor,
        kind: ElementKind,
        data: &[u8],
    ) -> Result<WriteReport> {
        if kind.write_opcodes().is_none() {
            return Err(FrameError::UnsupportedWrite(kind).into());
        }
        let expected = descriptor.data_bytes(kind)?;
        if data.len() != expected {
            return Err(FrameError::DataLength {
                expected,
                actual: data.len(),
            }
            .into());
        }
        let plan = WritePlan::new(descriptor, kind)?;
        debug!(
            %descriptor,
            %kind,
            packets = plan.len(),
            wraps = plan.wraps(),
            "array write"
        );

        let Link { channel, config } = self;
        let mut raw = RawModeGuard::enter(channel)?;
        let size = kind.size();

        for (sent, chunk) in plan.iter().enumerate() {
            let start = chunk.segment_start() * size;
            let segment = &data[start..start + chunk.descriptor.data_bytes(kind)?];
            let command =
                encode_array_write_command(&chunk.descriptor, kind, segment, chunk.slice_index)?;
            debug!(
                descriptor = %chunk.descriptor,
                slice = chunk.slice_index,
                elements = command.elements_in_chunk,
                remaining = chunk.remaining_slices,
                "array write slice"
            );

            let exchange = send_packet(&mut *raw, &command.frame, config.array_timeout)
                .and_then(|()| read_ack(&mut *raw, config, command.opcode));
            if let Err(err) = exchange {
                if sent > 0 {
                    warn!(
                        %descriptor,
                        packets_written = sent,
                        error = %err,
                        "array write aborted after partial update"
                    );
                }
                return Err(err);
            }
        }

        Ok(WriteReport {
            packets: plan.len(),
            elements: plan.total_elements(),
            wraps: plan.wraps(),
        })
    }

    pub fn write_f64_array(
        &mut self,
        descriptor: &ArrayDescriptor,
        values: &[f64],
    ) -> Result<WriteReport> {
        let mut data = BytesMut::with_capacity(values.len() * 8);
        for value in values {
            data.put_f64_le(*value);
        }
        self.write_array(descriptor, ElementKind::Float64, &data)
    }
}

/// Read a write acknowledgement, or the error frame sent in its place.
fn read_ack<C: ByteChannel + ?Sized>(
    channel: &mut C,
    config: &LinkConfig,
    opcode: u8,
) -> Result<()> {
    let mut ack = [0u8; 2];
    let mut n = channel.read(&mut ack, config.ack_timeout)?;
    if n == 1 && ack[0] == config.ack_byte {
        n += channel.read(&mut ack[1..], config.ack_timeout)?;
    }
    if n == 0 {
        return Err(LinkError::ShortRead {
            expected: ack.len(),
            actual: 0,
        });
    }

    if ack[0] == config.ack_byte {
        if n < ack.len() {
            return Err(LinkError::ShortRead {
                expected: ack.len(),
                actual: n,
            });
        }
        if ack[1] != opcode {
            warn!(sent = opcode, echoed = ack[1], "write acknowledged with a different opcode");
        }
        return Ok(());
    }

    let mut reply = BytesMut::with_capacity(config.max_message_len);
    reply.extend_from_slice(&ack[..n]);
    let mut rest = vec![0u8; config.max_message_len.saturating_sub(n)];
    let more = channel.read(&mut rest, config.ack_timeout)?;
    reply.extend_from_slice(&rest[..more]);
    debug!(len = reply.len(), first = ack[0], "write not acknowledged");

    let status = match decode_error(&reply) {
        ReplyStatus::Data => decode_inline_error(&reply, false).unwrap_or(ReplyStatus::Data),
        status => status,
    };
    match status {
        ReplyStatus::Fault(fault) => Err(fault.into()),
        ReplyStatus::Malformed(malformed) => Err(malformed.into()),
        ReplyStatus::Data => Err(MalformedReply::NotAcknowledged(ack[0]).into()),
    }
}
