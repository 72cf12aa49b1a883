use serde::Serialize;
use spiibin_frame::{encode_array_write_command, opcode_name, ElementKind, WritePlan};

use crate::cmd::PlanArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print, OutputFormat, Render};

pub fn run(args: PlanArgs, format: OutputFormat) -> CliResult<i32> {
    let descriptor = args.target.descriptor()?;
    let out = PlanOutput::build(&descriptor).map_err(|err| frame_error("plan failed", err))?;
    print(&out, format);
    Ok(SUCCESS)
}

#[derive(Serialize)]
pub struct PlanOutput {
    pub descriptor: String,
    pub elements: usize,
    pub packets: usize,
    pub wraps: usize,
    pub chunks: Vec<ChunkOutput>,
}

#[derive(Serialize)]
pub struct ChunkOutput {
    pub slice: u8,
    pub descriptor: String,
    pub elements: usize,
    pub data_offset: usize,
    pub remaining: usize,
    pub opcode: String,
    pub out_bytes: usize,
}

impl PlanOutput {
    /// Encode every chunk against zeroed data to report its opcode and size.
    pub fn build(descriptor: &spiibin_frame::ArrayDescriptor) -> spiibin_frame::Result<Self> {
        let kind = ElementKind::Float64;
        let plan = WritePlan::new(descriptor, kind)?;
        let mut chunks = Vec::with_capacity(plan.len());
        for chunk in &plan {
            let zeros = vec![0u8; chunk.descriptor.data_bytes(kind)?];
            let command =
                encode_array_write_command(&chunk.descriptor, kind, &zeros, chunk.slice_index)?;
            chunks.push(ChunkOutput {
                slice: chunk.slice_index,
                descriptor: chunk.descriptor.to_string(),
                elements: chunk.elements_in_chunk,
                data_offset: chunk.data_offset_elements,
                remaining: chunk.remaining_slices,
                opcode: format!("{:#04X} ({})", command.opcode, opcode_name(command.opcode)),
                out_bytes: command.out_bytes,
            });
        }
        Ok(Self {
            descriptor: descriptor.to_string(),
            elements: plan.total_elements(),
            packets: plan.len(),
            wraps: plan.wraps(),
            chunks,
        })
    }
}

impl Render for PlanOutput {
    fn headers(&self) -> Vec<&'static str> {
        vec![
            "SLICE",
            "DESCRIPTOR",
            "ELEMENTS",
            "OFFSET",
            "REMAINING",
            "OPCODE",
            "BYTES",
        ]
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.chunks
            .iter()
            .map(|chunk| {
                vec![
                    chunk.slice.to_string(),
                    chunk.descriptor.clone(),
                    chunk.elements.to_string(),
                    chunk.data_offset.to_string(),
                    chunk.remaining.to_string(),
                    chunk.opcode.clone(),
                    chunk.out_bytes.to_string(),
                ]
            })
            .collect()
    }

    fn pretty(&self) -> String {
        let mut out = format!(
            "{}: {} elements in {} packets ({} wraps)",
            self.descriptor, self.elements, self.packets, self.wraps
        );
        for chunk in &self.chunks {
            out.push_str(&format!(
                "\n  slice {} {} elements={} offset={} bytes={}",
                chunk.slice, chunk.descriptor, chunk.elements, chunk.data_offset, chunk.out_bytes
            ));
        }
        out
    }
}
