use std::fs;
use std::path::Path;

use serde::Serialize;
use spiibin_link::{Link, WriteReport};
use spiibin_transport::StreamChannel;
use tracing::info;

use crate::cmd::{LinkArgs, WriteArgs};
use crate::config::resolve_link_config;
use crate::exit::{
    frame_error, io_error, link_error, transport_error, CliError, CliResult, DATA_INVALID,
    SUCCESS, USAGE,
};
use crate::output::{print, OutputFormat, Render};

pub fn run(args: WriteArgs, link_args: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let descriptor = args.target.descriptor()?;
    let values = match (&args.values, &args.file) {
        (Some(values), _) => values.clone(),
        (None, Some(path)) => read_values(path)?,
        (None, None) => return Err(CliError::new(USAGE, "--values or --file is required")),
    };
    let expected = descriptor
        .num_elements()
        .map_err(|err| frame_error("invalid target", err))?;
    if values.len() != expected {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{descriptor} holds {expected} values, got {}", values.len()),
        ));
    }
    let config = resolve_link_config(link_args)?;

    let channel = StreamChannel::connect(&args.addr)
        .map_err(|err| transport_error("connect failed", err))?;
    let mut link =
        Link::with_config(channel, config).map_err(|err| link_error("invalid link config", err))?;
    let report = link
        .write_f64_array(&descriptor, &values)
        .map_err(|err| link_error("write failed", err))?;
    info!(%descriptor, packets = report.packets, "write complete");

    print(&WriteOutput::new(descriptor.to_string(), report), format);
    Ok(SUCCESS)
}

fn read_values(path: &Path) -> CliResult<Vec<f64>> {
    let text = fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
    parse_values(&text)
}

/// Numbers separated by whitespace and/or commas.
pub fn parse_values(text: &str) -> CliResult<Vec<f64>> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| CliError::new(DATA_INVALID, format!("invalid value: {token:?}")))
        })
        .collect()
}

#[derive(Serialize)]
pub struct WriteOutput {
    pub descriptor: String,
    pub packets: usize,
    pub elements: usize,
    pub wraps: usize,
}

impl WriteOutput {
    pub fn new(descriptor: String, report: WriteReport) -> Self {
        Self {
            descriptor,
            packets: report.packets,
            elements: report.elements,
            wraps: report.wraps,
        }
    }
}

impl Render for WriteOutput {
    fn headers(&self) -> Vec<&'static str> {
        vec!["DESCRIPTOR", "ELEMENTS", "PACKETS", "WRAPS"]
    }

    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![
            self.descriptor.clone(),
            self.elements.to_string(),
            self.packets.to_string(),
            self.wraps.to_string(),
        ]]
    }

    fn pretty(&self) -> String {
        format!(
            "wrote {} ({} elements in {} packets, {} wraps)",
            self.descriptor, self.elements, self.packets, self.wraps
        )
    }
}
