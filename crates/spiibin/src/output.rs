use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// Raw bytes where a command produces bytes; otherwise pretty.
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Command output that can be rendered in every [`OutputFormat`].
pub trait Render: Serialize {
    fn headers(&self) -> Vec<&'static str>;
    fn rows(&self) -> Vec<Vec<String>>;
    fn pretty(&self) -> String;
    /// Bytes for [`OutputFormat::Raw`], if the output has a byte form.
    fn raw(&self) -> Option<&[u8]> {
        None
    }
}

pub fn print<R: Render>(value: &R, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(value.headers());
            for row in value.rows() {
                table.add_row(row);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", value.pretty()),
        OutputFormat::Raw => match value.raw() {
            Some(bytes) => print_raw(bytes),
            None => println!("{}", value.pretty()),
        },
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Uppercase hex with a space between bytes.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| ::hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}
