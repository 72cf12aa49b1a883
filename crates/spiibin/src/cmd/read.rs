use bytes::Bytes;
use serde::Serialize;
use spiibin_frame::{ArrayDescriptor, ElementKind};
use spiibin_link::Link;
use spiibin_transport::StreamChannel;
use tracing::info;

use crate::cmd::{LinkArgs, ReadArgs};
use crate::config::resolve_link_config;
use crate::exit::{link_error, transport_error, CliResult, SUCCESS};
use crate::output::{print, OutputFormat, Render};

pub fn run(args: ReadArgs, link_args: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let descriptor = args.target.descriptor()?;
    let kind = ElementKind::from(args.kind);
    let config = resolve_link_config(link_args)?;

    let channel = StreamChannel::connect(&args.addr)
        .map_err(|err| transport_error("connect failed", err))?;
    let mut link =
        Link::with_config(channel, config).map_err(|err| link_error("invalid link config", err))?;
    let bytes = link
        .read_array(&descriptor, kind)
        .map_err(|err| link_error("read failed", err))?;
    info!(%descriptor, bytes = bytes.len(), "read complete");

    print(&ReadOutput::new(&descriptor, kind, bytes), format);
    Ok(SUCCESS)
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum Values {
    Float64(Vec<f64>),
    Int32(Vec<i32>),
}

impl Values {
    pub fn decode(bytes: &[u8], kind: ElementKind) -> Self {
        match kind {
            ElementKind::Float64 => Values::Float64(
                bytes
                    .chunks_exact(8)
                    .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
            ElementKind::Int32 => Values::Int32(
                bytes
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
        }
    }

    fn len(&self) -> usize {
        match self {
            Values::Float64(v) => v.len(),
            Values::Int32(v) => v.len(),
        }
    }

    fn display(&self, i: usize) -> String {
        match self {
            Values::Float64(v) => v[i].to_string(),
            Values::Int32(v) => v[i].to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct ReadOutput {
    pub descriptor: String,
    pub kind: String,
    pub elements: usize,
    pub values: Values,
    #[serde(skip)]
    indices: Vec<String>,
    #[serde(skip)]
    bytes: Bytes,
}

impl ReadOutput {
    pub fn new(descriptor: &ArrayDescriptor, kind: ElementKind, bytes: Bytes) -> Self {
        let values = Values::decode(&bytes, kind);
        let row_len = descriptor.row_len();
        let indices = (0..values.len())
            .map(|i| {
                format!(
                    "({})({})",
                    descriptor.dim1.start as usize + i / row_len,
                    descriptor.dim2.start as usize + i % row_len
                )
            })
            .collect();
        Self {
            descriptor: descriptor.to_string(),
            kind: kind.to_string(),
            elements: values.len(),
            values,
            indices,
            bytes,
        }
    }
}

impl Render for ReadOutput {
    fn headers(&self) -> Vec<&'static str> {
        vec!["INDEX", "VALUE"]
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.indices
            .iter()
            .enumerate()
            .map(|(i, index)| vec![format!("{}{index}", self.variable()), self.values.display(i)])
            .collect()
    }

    fn pretty(&self) -> String {
        let values: Vec<String> = (0..self.values.len()).map(|i| self.values.display(i)).collect();
        format!("{} [{}] = {}", self.descriptor, self.kind, values.join(", "))
    }

    fn raw(&self) -> Option<&[u8]> {
        Some(self.bytes.as_ref())
    }
}

impl ReadOutput {
    fn variable(&self) -> &str {
        self.descriptor
            .split_once('(')
            .map_or(self.descriptor.as_str(), |(var, _)| var)
    }
}
