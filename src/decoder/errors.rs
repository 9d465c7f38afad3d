//! Error dispatch (spec.md §4.6): codes 1..=17. Every error is 32 bytes:
//! code(1, always 0) + error-code(1) + sequence(2) + bad-value(4) +
//! minor-opcode(2) + major-opcode(1) + unused(21). `dispatch` is called
//! with the error-code byte already consumed and 30 bytes remaining.

use crate::decoder::byteorder::{Reader, Truncated};
use crate::decoder::format::{resource_id, scalar, Struct, Ws};
use crate::decoder::requests;
use crate::settings::Settings;

pub const NAMES: &[(u8, &str)] = &[
    (1, "Request"),
    (2, "Value"),
    (3, "Window"),
    (4, "Pixmap"),
    (5, "Atom"),
    (6, "Cursor"),
    (7, "Font"),
    (8, "Match"),
    (9, "Drawable"),
    (10, "Access"),
    (11, "Alloc"),
    (12, "Colormap"),
    (13, "GContext"),
    (14, "IDChoice"),
    (15, "Name"),
    (16, "Length"),
    (17, "Implementation"),
];

pub fn name(code: u8) -> String {
    NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, n)| n.to_string())
        .unwrap_or_else(|| format!("UnknownError{code}"))
}

/// Resource-id errors carry the offending id in `bad-value`; `Value` carries
/// an arbitrary CARD32; `Request`/`Length`/`Match`/`Access`/`Alloc`/
/// `Implementation` leave it unused.
fn bad_value_is_resource_id(code: u8) -> bool {
    matches!(code, 3 | 4 | 5 | 6 | 7 | 9 | 12 | 13 | 14)
}

pub fn dispatch(error_code: u8, reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(2)?; // sequence number, already shown on the log's top line
    let bad_value = reader.read_u32()?;
    let minor_opcode = reader.read_u16()?;
    let major_opcode = reader.read_u8()?;
    reader.skip(21)?;

    let bad_value_rendered = if bad_value_is_resource_id(error_code) {
        resource_id(bad_value, settings)
    } else {
        scalar(bad_value, None, settings)
    };

    Ok(Struct::new(ws)
        .field("bad_value", bad_value_rendered)
        .field("minor_opcode", minor_opcode.to_string())
        .field("major_opcode", format!("{}({})", major_opcode, requests::name(major_opcode)))
        .render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::byteorder::ByteOrder;

    #[test]
    fn every_error_handler_consumes_exactly_30_bytes() {
        let settings = Settings::default();
        for code in 1u8..=17 {
            let data = [0u8; 30];
            let mut r = Reader::new(&data, ByteOrder::Little);
            dispatch(code, &mut r, &settings, Ws::root(false)).unwrap();
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn window_error_renders_bad_value_as_resource_id() {
        let settings = Settings::default();
        let mut data = vec![0u8; 30];
        data[0..4].copy_from_slice(&0x0000_0042u32.to_le_bytes());
        let mut r = Reader::new(&data, ByteOrder::Little);
        let out = dispatch(3, &mut r, &settings, Ws::root(false)).unwrap();
        assert!(out.contains("bad_value"));
    }
}
