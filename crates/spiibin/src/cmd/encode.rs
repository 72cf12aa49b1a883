use bytes::Bytes;
use serde::Serialize;
use spiibin_frame::{
    encode_array_read_command, encode_array_slice_read_command, opcode_name, ElementKind,
};

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{hex, print, OutputFormat, Render};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let descriptor = args.target.descriptor()?;
    let kind = ElementKind::from(args.kind);
    let command = match args.slice {
        Some(slice) => encode_array_slice_read_command(&descriptor, kind, slice),
        None => encode_array_read_command(&descriptor, kind),
    }
    .map_err(|err| frame_error("encode failed", err))?;

    let out = EncodeOutput {
        descriptor: descriptor.to_string(),
        kind: kind.to_string(),
        slice: args.slice,
        opcode: format!("{:#04X}", command.opcode),
        opcode_name: opcode_name(command.opcode),
        data_bytes: command.data_bytes,
        expected_reply_bytes: command.expected_reply_bytes,
        frame_len: command.frame.len(),
        frame: hex(&command.frame),
        raw: command.frame,
    };
    print(&out, format);
    Ok(SUCCESS)
}

#[derive(Serialize)]
pub struct EncodeOutput {
    pub descriptor: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice: Option<u32>,
    pub opcode: String,
    pub opcode_name: &'static str,
    pub data_bytes: usize,
    pub expected_reply_bytes: usize,
    pub frame_len: usize,
    pub frame: String,
    #[serde(skip)]
    raw: Bytes,
}

impl Render for EncodeOutput {
    fn headers(&self) -> Vec<&'static str> {
        vec!["FIELD", "VALUE"]
    }

    fn rows(&self) -> Vec<Vec<String>> {
        let mut rows = vec![
            vec!["descriptor".to_string(), self.descriptor.clone()],
            vec!["kind".to_string(), self.kind.clone()],
        ];
        if let Some(slice) = self.slice {
            rows.push(vec!["slice".to_string(), slice.to_string()]);
        }
        rows.extend([
            vec![
                "opcode".to_string(),
                format!("{} ({})", self.opcode, self.opcode_name),
            ],
            vec!["data bytes".to_string(), self.data_bytes.to_string()],
            vec![
                "expected reply".to_string(),
                self.expected_reply_bytes.to_string(),
            ],
            vec!["frame".to_string(), self.frame.clone()],
        ]);
        rows
    }

    fn pretty(&self) -> String {
        format!(
            "{} {} opcode={} ({}) data={} reply={}\n{}",
            self.descriptor,
            self.kind,
            self.opcode,
            self.opcode_name,
            self.data_bytes,
            self.expected_reply_bytes,
            self.frame
        )
    }

    fn raw(&self) -> Option<&[u8]> {
        Some(self.raw.as_ref())
    }
}
