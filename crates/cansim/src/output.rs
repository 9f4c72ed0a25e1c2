use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::BytesMut;
use cansim_frame::{effective_id, encode, encode_wire, ControllerFrame, WIRE_FRAME_SIZE};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

/// Whether a printed frame was sent or received by this process.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Tx,
    Rx,
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    direction: Direction,
    channel: &'a str,
    id: String,
    extended: bool,
    remote: bool,
    error: bool,
    dlc: u8,
    data: String,
    timestamp: String,
}

pub fn print_frame(frame: &ControllerFrame, channel: &str, direction: Direction, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                direction,
                channel,
                id: format_id(frame),
                extended: frame.is_extended,
                remote: frame.is_remote,
                error: frame.is_error,
                dlc: frame.dlc,
                data: hex_payload(frame),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "ID", "FLAGS", "DLC", "DATA"])
                .add_row(vec![
                    channel.to_string(),
                    format_id(frame),
                    flags(frame),
                    frame.dlc.to_string(),
                    hex_payload(frame),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", pretty_line(frame, channel)),
        OutputFormat::Raw => print_raw(&wire_bytes(frame)),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn wire_bytes(frame: &ControllerFrame) -> BytesMut {
    let mut buf = BytesMut::with_capacity(WIRE_FRAME_SIZE);
    encode_wire(&encode(frame), &mut buf);
    buf
}

/// One candump-style line: `  vcan0  123   [4]  01 02 03 04`.
fn pretty_line(frame: &ControllerFrame, channel: &str) -> String {
    let body = if frame.is_remote {
        "remote request".to_string()
    } else {
        hex_payload(frame)
    };
    format!(
        "  {channel}  {:>8}   [{}]  {body}",
        format_id(frame),
        frame.dlc
    )
    .trim_end()
    .to_string()
}

fn format_id(frame: &ControllerFrame) -> String {
    let id = effective_id(frame);
    if frame.is_extended {
        format!("{id:08X}")
    } else {
        format!("{id:03X}")
    }
}

fn flags(frame: &ControllerFrame) -> String {
    let mut out = Vec::new();
    if frame.is_extended {
        out.push("EFF");
    }
    if frame.is_remote {
        out.push("RTR");
    }
    if frame.is_error {
        out.push("ERR");
    }
    out.join(",")
}

fn hex_payload(frame: &ControllerFrame) -> String {
    if frame.is_remote {
        return String::new();
    }
    frame
        .payload()
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_frame_formats_like_candump() {
        let frame = ControllerFrame::new(0x123, false, &[1, 2, 3, 4]).unwrap();
        assert_eq!(pretty_line(&frame, "vcan0"), "  vcan0       123   [4]  01 02 03 04");
    }

    #[test]
    fn standard_id_is_shown_masked_to_eleven_bits() {
        let mut frame = ControllerFrame::new(0x7FF, false, &[]).unwrap();
        frame.id = 0x1800;
        assert_eq!(format_id(&frame), "000");
    }

    #[test]
    fn raw_output_is_one_wire_frame() {
        let frame = ControllerFrame::new(0x123, false, &[0xAA]).unwrap();
        let bytes = wire_bytes(&frame);
        assert_eq!(bytes.len(), WIRE_FRAME_SIZE);
        assert_eq!(&bytes[..], &encode(&frame).to_bytes()[..]);
        assert_eq!(bytes[4], 1);
        assert_eq!(bytes[8], 0xAA);
    }

    #[test]
    fn extended_remote_frame_has_no_payload() {
        let frame = ControllerFrame::remote(0x1FFF_FFFF, true, 2).unwrap();
        assert_eq!(format_id(&frame), "1FFFFFFF");
        assert_eq!(flags(&frame), "EFF,RTR");
        assert_eq!(hex_payload(&frame), "");
        assert!(pretty_line(&frame, "can0").ends_with("[2]  remote request"));
    }
}
