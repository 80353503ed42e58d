use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use commlink_frame::Packet;
use serde::Serialize;

/// Longest payload text shown before truncation in table/pretty output.
const PREVIEW_LIMIT: usize = 64;

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

#[derive(Serialize)]
struct PacketOutput<'a> {
    tid: u16,
    size: usize,
    timestamp_us: u64,
    peer: &'a str,
    payload: String,
    received_at: u64,
}

pub fn print_packet(packet: &Packet, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                tid: packet.transaction_id(),
                size: packet.len(),
                timestamp_us: packet.timestamp_us(),
                peer,
                payload: payload_text(packet.payload()),
                received_at: now_unix_seconds(),
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
                .set_header(vec!["TID", "SIZE", "TIMESTAMP_US", "PEER", "PAYLOAD"])
                .add_row(vec![
                    packet.transaction_id().to_string(),
                    packet.len().to_string(),
                    packet.timestamp_us().to_string(),
                    peer.to_string(),
                    payload_preview(packet.payload()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "tid={} size={} ts={}us peer={} payload={}",
                packet.transaction_id(),
                packet.len(),
                packet.timestamp_us(),
                peer,
                payload_preview(packet.payload())
            );
        }
        OutputFormat::Raw => {
            print_raw(packet.payload());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_text(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => hex(payload),
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if text.chars().count() > PREVIEW_LIMIT => {
            let head: String = text.chars().take(PREVIEW_LIMIT).collect();
            format!("{head}...")
        }
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
