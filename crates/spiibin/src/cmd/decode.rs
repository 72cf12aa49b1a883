use serde::Serialize;
use spiibin_frame::{
    decode_error, decode_inline_error, opcode_name, reply_data, ReplyHeader, ReplyStatus,
};

use crate::cmd::DecodeArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print, OutputFormat, Render};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex.join(" "))?;
    print(&DecodeOutput::classify(&bytes, args.short), format);
    Ok(SUCCESS)
}

/// Hex bytes, optionally `0x`-prefixed, separated by spaces/commas or packed.
/// A single-digit token is one byte.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let mut bytes = Vec::new();
    for token in input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
    {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        let decoded = if digits.len() == 1 {
            hex::decode(format!("0{digits}"))
        } else {
            hex::decode(digits)
        };
        let decoded = decoded
            .map_err(|err| CliError::new(USAGE, format!("invalid hex {token:?}: {err}")))?;
        bytes.extend(decoded);
    }
    if bytes.is_empty() {
        return Err(CliError::new(USAGE, "no hex bytes given"));
    }
    Ok(bytes)
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DecodeOutput {
    pub status: &'static str,
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub more_slices: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl DecodeOutput {
    pub fn classify(bytes: &[u8], short: bool) -> Self {
        let mut status = decode_error(bytes);
        if short && status.is_data() {
            status = decode_inline_error(bytes, false).unwrap_or(status);
        }

        let mut out = Self {
            status: "data",
            length: bytes.len(),
            opcode: bytes
                .get(1)
                .map(|op| format!("{op:#04X} ({})", opcode_name(*op))),
            code: None,
            legacy: None,
            data_bytes: None,
            more_slices: None,
            detail: None,
        };
        match status {
            ReplyStatus::Fault(fault) => {
                out.status = "fault";
                out.code = Some(fault.code);
                out.legacy = Some(fault.legacy);
            }
            ReplyStatus::Malformed(malformed) => {
                out.status = "malformed";
                out.detail = Some(malformed.to_string());
            }
            ReplyStatus::Data => match reply_data(bytes) {
                Ok(data) => {
                    out.data_bytes = Some(data.len());
                    out.more_slices = ReplyHeader::parse(bytes).map(|h| h.more_slices);
                }
                Err(malformed) => {
                    out.status = "malformed";
                    out.detail = Some(malformed.to_string());
                }
            },
        }
        out
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("status", self.status.to_string()),
            ("length", self.length.to_string()),
        ];
        if let Some(opcode) = &self.opcode {
            fields.push(("opcode", opcode.clone()));
        }
        if let Some(code) = self.code {
            fields.push(("code", code.to_string()));
        }
        if let Some(legacy) = self.legacy {
            fields.push(("legacy", legacy.to_string()));
        }
        if let Some(data_bytes) = self.data_bytes {
            fields.push(("data bytes", data_bytes.to_string()));
        }
        if let Some(more) = self.more_slices {
            fields.push(("more slices", more.to_string()));
        }
        if let Some(detail) = &self.detail {
            fields.push(("detail", detail.clone()));
        }
        fields
    }
}

impl Render for DecodeOutput {
    fn headers(&self) -> Vec<&'static str> {
        vec!["FIELD", "VALUE"]
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.fields()
            .into_iter()
            .map(|(name, value)| vec![name.to_string(), value])
            .collect()
    }

    fn pretty(&self) -> String {
        self.fields()
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex("E3 37 36").expect("spaced"), vec![0xE3, 0x37, 0x36]);
        assert_eq!(parse_hex("e33736").expect("packed"), vec![0xE3, 0x37, 0x36]);
        assert_eq!(parse_hex("0xE3,0x6").expect("prefixed"), vec![0xE3, 0x06]);
        assert_eq!(parse_hex("E3 3").expect("nibble"), vec![0xE3, 0x03]);
        assert_eq!(parse_hex("").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("E3Z").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("GG").unwrap_err().code, USAGE);
    }

    #[test]
    fn odd_length_tokens_are_rejected() {
        assert_eq!(parse_hex("ABC DEF").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("0xABC").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("E3 37 3").expect("nibble"), vec![0xE3, 0x37, 0x03]);
    }

    #[test]
    fn classifies_documented_fault() {
        let bytes = parse_hex("E3 37 36 3F 31 30 36 34 0D E6").expect("hex");
        let out = DecodeOutput::classify(&bytes, false);
        assert_eq!(out.status, "fault");
        assert_eq!(out.code, Some(1064));
        assert_eq!(out.legacy, Some(false));
    }

    #[test]
    fn classifies_data_with_continuation() {
        let mut bytes = vec![0xE3, 0x41, 0x08, 0x80];
        bytes.extend_from_slice(&[0u8; 8]);
        bytes.push(0xE6);
        let out = DecodeOutput::classify(&bytes, false);
        assert_eq!(out.status, "data");
        assert_eq!(out.data_bytes, Some(8));
        assert_eq!(out.more_slices, Some(true));
    }

    #[test]
    fn inline_only_when_short() {
        let bytes = parse_hex("E3 F0 07 00 3F 32 30 31 32 0D 0A E6").expect("hex");
        assert_eq!(DecodeOutput::classify(&bytes, false).status, "data");
        let short = DecodeOutput::classify(&bytes, true);
        assert_eq!(short.status, "fault");
        assert_eq!(short.code, Some(2012));
        assert_eq!(short.legacy, Some(false));
    }

    #[test]
    fn bad_markers_are_malformed() {
        let out = DecodeOutput::classify(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05], false);
        assert_eq!(out.status, "malformed");
        assert!(out.detail.is_some());
    }
}
