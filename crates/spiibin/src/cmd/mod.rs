use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use spiibin_frame::{ArrayDescriptor, ElementKind};

use crate::exit::{frame_error, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod plan;
pub mod read;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read an array from a controller.
    Read(ReadArgs),
    /// Write float64 values to a controller array.
    Write(WriteArgs),
    /// Print the binary read command for an array (offline).
    Encode(EncodeArgs),
    /// Print the packet schedule for writing an array (offline).
    Plan(PlanArgs),
    /// Classify a raw reply given in hex (offline).
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Read(args) => read::run(args, link, format),
        Command::Write(args) => write::run(args, link, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Plan(args) => plan::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Link settings shared by every controller command.
#[derive(Args, Debug, Default)]
pub struct LinkArgs {
    /// JSON file with link settings (millisecond timeouts, ack byte).
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
    /// Write timeout per request packet (e.g. 1s, 500ms).
    #[arg(long, value_name = "DURATION", global = true)]
    pub command_timeout: Option<String>,
    /// Read timeout per array reply.
    #[arg(long, value_name = "DURATION", global = true)]
    pub array_timeout: Option<String>,
    /// Read timeout per write acknowledgement.
    #[arg(long, value_name = "DURATION", global = true)]
    pub ack_timeout: Option<String>,
}

/// Variable and index ranges naming the array block.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Controller variable name.
    #[arg(long = "var", value_name = "NAME")]
    pub variable: String,
    /// First-dimension range `start,end` (or a single index).
    #[arg(long, value_name = "RANGE", value_parser = parse_range, default_value = "0,0")]
    pub dim1: (u32, u32),
    /// Second-dimension range `start,end` (or a single index).
    #[arg(long, value_name = "RANGE", value_parser = parse_range, default_value = "0,0")]
    pub dim2: (u32, u32),
}

impl TargetArgs {
    pub fn descriptor(&self) -> CliResult<ArrayDescriptor> {
        ArrayDescriptor::new(self.variable.as_str())
            .and_then(|desc| desc.dim1(self.dim1.0, self.dim1.1))
            .and_then(|desc| desc.dim2(self.dim2.0, self.dim2.1))
            .map_err(|err| frame_error("invalid array", err))
    }
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum KindArg {
    #[default]
    F64,
    I32,
}

impl From<KindArg> for ElementKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::F64 => ElementKind::Float64,
            KindArg::I32 => ElementKind::Int32,
        }
    }
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Controller address (host:port).
    pub addr: String,
    #[command(flatten)]
    pub target: TargetArgs,
    /// Element type.
    #[arg(long, value_enum, default_value_t = KindArg::F64)]
    pub kind: KindArg,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Controller address (host:port).
    pub addr: String,
    #[command(flatten)]
    pub target: TargetArgs,
    /// Values to write (comma-separated).
    #[arg(
        long,
        value_delimiter = ',',
        allow_negative_numbers = true,
        conflicts_with = "file",
        required_unless_present = "file"
    )]
    pub values: Option<Vec<f64>>,
    /// Read values from a file (whitespace or comma separated).
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Element type.
    #[arg(long, value_enum, default_value_t = KindArg::F64)]
    pub kind: KindArg,
    /// Encode the continuation read for this slice instead of the first read.
    #[arg(long)]
    pub slice: Option<u32>,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Reply bytes in hex (spaces and `0x` prefixes allowed).
    #[arg(required = true, num_args = 1..)]
    pub hex: Vec<String>,
    /// Treat the reply as a short array-read reply and look for an inline error.
    #[arg(long)]
    pub short: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// `start,end` or a single index.
pub fn parse_range(input: &str) -> Result<(u32, u32), String> {
    let parse = |text: &str| {
        text.trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid index: {text:?}"))
    };
    match input.split_once(',') {
        Some((start, end)) => {
            let (start, end) = (parse(start)?, parse(end)?);
            if end < start {
                return Err(format!("range end {end} is before start {start}"));
            }
            Ok((start, end))
        }
        None => {
            let index = parse(input)?;
            Ok((index, index))
        }
    }
}
