//! Top-level dispatch (spec.md §4.7): turns one wire message into the fixed
//! log line `C{conn:03}:{bytes:04}B:{direction}:S{seq:05}: {kind} {name}({code}): {body}`.
//!
//! Also implements the release-mode resync policy (SPEC_FULL.md §1.1):
//! per-message parsers assert their invariants in debug builds and, in
//! release builds, a caught panic degrades to "skip to the next 4-byte
//! boundary" rather than desynchronizing or crashing the relay.

use std::panic::{self, AssertUnwindSafe};

use crate::decoder::align::pad;
use crate::decoder::byteorder::{ByteOrder, Reader, Truncated};
use crate::decoder::connection::{Connection, Direction};
use crate::decoder::format::Ws;
use crate::decoder::{errors, events, replies, requests};
use crate::settings::Settings;

/// What the fixed top-line log format calls the message class.
#[derive(Debug, Clone, Copy)]
pub enum Kind {
    Request,
    Reply,
    Event,
    Error,
}

impl Kind {
    fn label(self) -> &'static str {
        match self {
            Kind::Request => "REQ",
            Kind::Reply => "REP",
            Kind::Event => "EVT",
            Kind::Error => "ERR",
        }
    }
}

pub fn format_line(
    conn_id: u32,
    bytes: usize,
    direction: Direction,
    seq: u16,
    kind: Kind,
    name: &str,
    code: u8,
    body: &str,
) -> String {
    format_line_seq(conn_id, bytes, direction, &format!("{:05}", seq), kind, name, code, body)
}

/// `KeymapNotify` has no sequence-number field on the wire (spec.md §4.6);
/// its log line renders the placeholder `?????` instead of a real number.
fn format_line_seq(
    conn_id: u32,
    bytes: usize,
    direction: Direction,
    seq: &str,
    kind: Kind,
    name: &str,
    code: u8,
    body: &str,
) -> String {
    format!(
        "C{:03}:{:04}B:{}:S{}: {} {}({}): {}",
        conn_id,
        bytes,
        direction.label(),
        seq,
        kind.label(),
        name,
        code,
        body
    )
}

/// What happened while decoding one message: a normal parse, or a resync
/// (spec.md §9 / SPEC_FULL.md §1.1: "assert in debug, skip to next message
/// boundary in release").
pub enum DecodeOutcome {
    Parsed {
        bytes_parsed: usize,
        line: String,
        /// A single-byte rewrite the relay must apply to the bytes it
        /// forwards downstream, at an offset relative to this message's
        /// start (spec.md §9's "one sanctioned mutation").
        patch: Option<(usize, u8)>,
    },
    /// Not enough bytes buffered yet; the caller should read more from the
    /// socket and retry rather than treat this as corruption.
    Incomplete,
    /// A per-message parser's invariant assertion failed (caught in release
    /// builds rather than propagated as a panic). The caller skips `skip`
    /// bytes and resumes scanning for the next message boundary.
    Resync { skip: usize },
}

/// Decode one client-to-server request. `data` must start at the opcode
/// byte. Returns the number of bytes the caller should advance the stream
/// by, which is always a multiple of 4.
pub fn decode_request(conn: &mut Connection, data: &[u8], settings: &Settings) -> DecodeOutcome {
    let order = match conn.byte_order() {
        Some(o) => o,
        None => ByteOrder::Little, // unreachable once setup has been observed
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| decode_request_inner(conn, data, order, settings)));

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(Truncated)) => DecodeOutcome::Incomplete,
        Err(_) => DecodeOutcome::Resync { skip: pad(data.len().min(4)).max(4) },
    }
}

fn decode_request_inner(
    conn: &mut Connection,
    data: &[u8],
    order: ByteOrder,
    settings: &Settings,
) -> Result<DecodeOutcome, Truncated> {
    let mut header = Reader::new(data, order);
    let major_opcode = header.read_u8()?;
    let minor_opcode = header.read_u8()?;
    let declared_units = header.read_u16()? as usize;

    let (total_bytes, body_start) = if declared_units == 0 && conn.big_requests_active {
        let extended = header.read_u32()? as usize;
        (units::size_of(extended), 8)
    } else {
        (units::size_of(declared_units), 4)
    };

    if data.len() < total_bytes {
        return Err(Truncated);
    }

    let seq = conn.next_sequence();
    let mut body_reader = Reader::new(&data[body_start..total_bytes], order);
    let dispatched = requests::dispatch(major_opcode, minor_opcode, &mut body_reader, conn, seq, settings, Ws::root(settings.multiline))?;

    if requests::produces_reply(major_opcode) {
        conn.open_request(seq, major_opcode, dispatched.multi_reply);
    }

    let name = extension_request_name(conn, major_opcode).unwrap_or_else(|| requests::name(major_opcode));
    let line = format_line(
        conn.id,
        total_bytes,
        Direction::ClientToServer,
        seq,
        Kind::Request,
        &name,
        major_opcode,
        &dispatched.body,
    );
    Ok(DecodeOutcome::Parsed { bytes_parsed: total_bytes, line, patch: None })
}

/// Decode one server-to-client message: a reply (code 1), an error (code 0),
/// or an event (code 2..=255, bit 0x80 marking a `SendEvent` relay).
pub fn decode_server_message(conn: &mut Connection, data: &[u8], settings: &Settings) -> DecodeOutcome {
    let order = match conn.byte_order() {
        Some(o) => o,
        None => ByteOrder::Little,
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| decode_server_message_inner(conn, data, order, settings)));

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(Truncated)) => DecodeOutcome::Incomplete,
        Err(_) => DecodeOutcome::Resync { skip: 32.min(data.len()).max(1) },
    }
}

fn decode_server_message_inner(
    conn: &mut Connection,
    data: &[u8],
    order: ByteOrder,
    settings: &Settings,
) -> Result<DecodeOutcome, Truncated> {
    if data.is_empty() {
        return Err(Truncated);
    }
    match data[0] {
        0 => decode_error(conn, data, order, settings),
        1 => decode_reply(conn, data, order, settings),
        _ => decode_event(conn, data, order, settings),
    }
}

fn decode_error(conn: &mut Connection, data: &[u8], order: ByteOrder, settings: &Settings) -> Result<DecodeOutcome, Truncated> {
    if data.len() < 32 {
        return Err(Truncated);
    }
    let mut reader = Reader::new(&data[..32], order);
    reader.skip(1)?;
    let error_code = reader.read_u8()?;
    let seq = reader.read_u16()?;
    let body = errors::dispatch(error_code, &mut reader, settings, Ws::root(settings.multiline))?;
    let name = if (1..=17).contains(&error_code) {
        errors::name(error_code)
    } else {
        conn.extensions
            .by_error_code(error_code)
            .map(|(ext_name, _)| format!("{ext_name}:{error_code}"))
            .unwrap_or_else(|| errors::name(error_code))
    };
    let line = format_line(
        conn.id,
        32,
        Direction::ServerToClient,
        seq,
        Kind::Error,
        &name,
        error_code,
        &body,
    );
    conn.close_request(seq);
    Ok(DecodeOutcome::Parsed { bytes_parsed: 32, line, patch: None })
}

fn decode_reply(conn: &mut Connection, data: &[u8], order: ByteOrder, settings: &Settings) -> Result<DecodeOutcome, Truncated> {
    if data.len() < 8 {
        return Err(Truncated);
    }
    let mut header = Reader::new(&data[..8], order);
    header.skip(1)?;
    let first_byte = header.read_u8()?;
    let seq = header.read_u16()?;
    let extra_units = header.read_u32()? as usize;
    let total_bytes = 32 + extra_units * 4;
    if data.len() < total_bytes {
        return Err(Truncated);
    }

    let open_request = conn.peek_open_request(seq);
    let major_opcode = open_request.map(|r| r.major_opcode).unwrap_or(0);

    let mut body_reader = Reader::new(&data[8..total_bytes], order);
    let dispatched = replies::dispatch(major_opcode, first_byte, seq, &mut body_reader, conn, settings, Ws::root(settings.multiline))?;

    if !dispatched.keep_open {
        conn.close_request(seq);
    }

    let name = extension_request_name(conn, major_opcode).unwrap_or_else(|| requests::name(major_opcode));
    let line = format_line(
        conn.id,
        total_bytes,
        Direction::ServerToClient,
        seq,
        Kind::Reply,
        &name,
        major_opcode,
        &dispatched.body,
    );
    Ok(DecodeOutcome::Parsed { bytes_parsed: total_bytes, line, patch: dispatched.patch })
}

fn decode_event(conn: &mut Connection, data: &[u8], order: ByteOrder, settings: &Settings) -> Result<DecodeOutcome, Truncated> {
    if data.len() < 32 {
        return Err(Truncated);
    }
    let raw_code = data[0];
    let code = raw_code & !events::SYNTHETIC_BIT;
    let mut reader = Reader::new(&data[1..32], order);
    let body = events::dispatch(raw_code, &mut reader, &conn.atoms, settings, Ws::root(settings.multiline))?;

    let name = if (2..=34).contains(&code) {
        events::name(code)
    } else {
        conn.extensions
            .by_event_code(code)
            .map(|(ext_name, _)| format!("{ext_name}:{code}"))
            .unwrap_or_else(|| events::name(code))
    };

    let line = if code == 11 {
        format_line_seq(conn.id, 32, Direction::ServerToClient, "?????", Kind::Event, &name, code, &body)
    } else {
        let mut peek = Reader::new(&data[1..32], order);
        let seq = peek.read_u16()?;
        format_line(conn.id, 32, Direction::ServerToClient, seq, Kind::Event, &name, code, &body)
    };
    Ok(DecodeOutcome::Parsed { bytes_parsed: 32, line, patch: None })
}

/// Request/reply naming for extension opcodes (>= 128): resolved through the
/// connection's extension table (spec.md §9's open question on event/error
/// ranges applies equally to major-opcode ownership) rather than
/// `requests::name`'s built-in `Unknown{opcode}` fallback. Core opcodes
/// (< 128) are never looked up here.
fn extension_request_name(conn: &Connection, major_opcode: u8) -> Option<String> {
    if major_opcode < 128 {
        return None;
    }
    conn.extensions.by_major_opcode(major_opcode).map(|(name, _)| format!("{name}:{major_opcode}"))
}

/// Extracted so `units`-sized arithmetic reads the same in both request
/// length modes (spec.md §4.1/§4.6's BIG-REQUESTS interplay).
mod units {
    pub fn size_of(declared_units: usize) -> usize {
        declared_units * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn map_window_request_decodes_s1() {
        let mut conn = Connection::new(1);
        conn.set_byte_order(ByteOrder::Little);
        let data = [8u8, 0, 2, 0, 0x34, 0x12, 0x00, 0x00]; // MapWindow, window 0x1234
        match decode_request(&mut conn, &data, &settings()) {
            DecodeOutcome::Parsed { bytes_parsed, line, .. } => {
                assert_eq!(bytes_parsed, 8);
                assert!(line.contains("MapWindow"));
                assert!(line.contains("S00001"));
            }
            _ => panic!("expected a clean parse"),
        }
    }

    #[test]
    fn activated_extension_opcode_resolves_to_its_name() {
        use crate::decoder::extensions::ExtensionActivation;

        let mut conn = Connection::new(1);
        conn.set_byte_order(ByteOrder::Little);
        conn.extensions.activate(
            "SHAPE".into(),
            ExtensionActivation { present: true, major_opcode: 140, first_event: 64, first_error: 138 },
        );
        let data = [140u8, 0, 1, 0]; // extension opcode 140, length 1 unit
        match decode_request(&mut conn, &data, &settings()) {
            DecodeOutcome::Parsed { line, .. } => assert!(line.contains("SHAPE:140")),
            _ => panic!("expected a clean parse"),
        }
    }

    #[test]
    fn truncated_request_reports_incomplete_instead_of_panicking() {
        let mut conn = Connection::new(1);
        conn.set_byte_order(ByteOrder::Little);
        let data = [8u8, 0, 2, 0]; // claims 8 bytes, only has 4
        match decode_request(&mut conn, &data, &settings()) {
            DecodeOutcome::Incomplete => {}
            _ => panic!("truncated request must report Incomplete"),
        }
    }

    /// S3: once BIG-REQUESTS is active, a zeroed 2-byte length field means
    /// the real length is the 4-byte word immediately following the header,
    /// in aligned units.
    #[test]
    fn big_request_mode_reads_extended_length_s3() {
        let mut conn = Connection::new(1);
        conn.set_byte_order(ByteOrder::Little);
        conn.big_requests_active = true;

        let units: u32 = 3; // 12 bytes total: 8-byte extended header + 4-byte PutImage window id
        let mut data = vec![72u8, 0, 0, 0]; // PutImage opcode, minor unused, length=0
        data.extend_from_slice(&units.to_le_bytes());
        data.extend_from_slice(&0x0000_0099u32.to_le_bytes()); // opaque 4-byte payload tail

        match decode_request(&mut conn, &data, &settings()) {
            DecodeOutcome::Parsed { bytes_parsed, line, .. } => {
                assert_eq!(bytes_parsed, 12);
                assert!(line.contains("PutImage"));
            }
            DecodeOutcome::Incomplete => panic!("expected a clean parse under big-requests mode, got Incomplete"),
            DecodeOutcome::Resync { .. } => panic!("expected a clean parse under big-requests mode, got Resync"),
        }
    }
}
