//! Link settings from defaults, an optional JSON file, and flags.
//!
//! Later layers win: defaults < `--config` file < `--*-timeout` flags.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use spiibin_link::LinkConfig;

use crate::cmd::LinkArgs;
use crate::exit::{io_error, link_error, CliError, CliResult, DATA_INVALID, USAGE};

/// On-disk form of [`LinkConfig`]; every field is optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub command_timeout_ms: Option<u64>,
    pub array_timeout_ms: Option<u64>,
    pub ack_timeout_ms: Option<u64>,
    pub ack_byte: Option<u8>,
    pub max_message_len: Option<usize>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        serde_json::from_str(&text).map_err(|err| {
            CliError::new(
                DATA_INVALID,
                format!("invalid config {}: {err}", path.display()),
            )
        })
    }

    fn apply(&self, config: &mut LinkConfig) {
        if let Some(ms) = self.command_timeout_ms {
            config.command_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.array_timeout_ms {
            config.array_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.ack_timeout_ms {
            config.ack_timeout = Duration::from_millis(ms);
        }
        if let Some(byte) = self.ack_byte {
            config.ack_byte = byte;
        }
        if let Some(len) = self.max_message_len {
            config.max_message_len = len;
        }
    }
}

pub fn resolve_link_config(args: &LinkArgs) -> CliResult<LinkConfig> {
    let mut config = LinkConfig::default();
    if let Some(path) = &args.config {
        ConfigFile::load(path)?.apply(&mut config);
    }
    if let Some(value) = &args.command_timeout {
        config.command_timeout = parse_duration(value)?;
    }
    if let Some(value) = &args.array_timeout {
        config.array_timeout = parse_duration(value)?;
    }
    if let Some(value) = &args.ack_timeout {
        config.ack_timeout = parse_duration(value)?;
    }
    config
        .validate()
        .map_err(|err| link_error("invalid link settings", err))?;
    Ok(config)
}

/// Parse `5s`, `500ms`, or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
