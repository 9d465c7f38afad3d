//! Event dispatch (spec.md §4.6): codes 2..=34. Bit 0x80 marks an event
//! relayed via `SendEvent` rather than generated by the server directly; it
//! is stripped before dispatch and the caller decides whether to annotate
//! it (spec.md §4.6: "carried into the output without affecting dispatch").
//! All core events are exactly 32 bytes (spec.md §4.1 fixed-size class):
//! code(1) + detail-or-format(1) + sequence(2) + a 28-byte body.

use crate::decoder::atoms::AtomTable;
use crate::decoder::byteorder::{Reader, Truncated};
use crate::decoder::format::{resource_id, scalar, timestamp, Struct, Ws};
use crate::settings::Settings;

pub const SYNTHETIC_BIT: u8 = 0x80;

/// Contextual name table for an ATOM-typed field whose wire value `0`
/// means "no property/target selected" rather than "atom 0".
const NONE_ATOM: crate::decoder::format::NameTable = &[(0, "None")];

pub const NAMES: &[(u8, &str)] = &[
    (2, "KeyPress"),
    (3, "KeyRelease"),
    (4, "ButtonPress"),
    (5, "ButtonRelease"),
    (6, "MotionNotify"),
    (7, "EnterNotify"),
    (8, "LeaveNotify"),
    (9, "FocusIn"),
    (10, "FocusOut"),
    (11, "KeymapNotify"),
    (12, "Expose"),
    (13, "GraphicsExposure"),
    (14, "NoExposure"),
    (15, "VisibilityNotify"),
    (16, "CreateNotify"),
    (17, "DestroyNotify"),
    (18, "UnmapNotify"),
    (19, "MapNotify"),
    (20, "MapRequest"),
    (21, "ReparentNotify"),
    (22, "ConfigureNotify"),
    (23, "ConfigureRequest"),
    (24, "GravityNotify"),
    (25, "ResizeRequest"),
    (26, "CirculateNotify"),
    (27, "CirculateRequest"),
    (28, "PropertyNotify"),
    (29, "SelectionClear"),
    (30, "SelectionRequest"),
    (31, "SelectionNotify"),
    (32, "ColormapNotify"),
    (33, "ClientMessage"),
    (34, "MappingNotify"),
];

pub fn name(code: u8) -> String {
    NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, n)| n.to_string())
        .unwrap_or_else(|| format!("UnknownEvent{code}"))
}

/// Dispatch a 32-byte event body. `raw_code` is the byte as it appears on
/// the wire (bit 0x80 still set, if present); `reader` must be positioned
/// right after it, with exactly 31 bytes remaining.
pub fn dispatch(raw_code: u8, reader: &mut Reader, atoms: &AtomTable, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    let code = raw_code & !SYNTHETIC_BIT;

    let body = match code {
        2 | 3 | 4 | 5 | 6 => input_event(reader, settings, ws)?,
        7 | 8 => crossing_event(reader, settings, ws)?,
        9 | 10 => focus_event(reader, settings, ws)?,
        11 => {
            // No detail/sequence fields; the remaining 31 bytes are a
            // keycode bitmap. Its rendered sequence is always the
            // placeholder, never a real number (spec.md §4.6).
            let n = reader.remaining();
            reader.read_bytes(n)?;
            "{ keys = ????? }".to_string()
        }
        12 => expose_event(reader, settings, ws)?,
        13 => graphics_exposure(reader, settings, ws)?,
        14 => no_exposure(reader, settings, ws)?,
        15 => visibility_notify(reader, settings, ws)?,
        16 => create_notify(reader, settings, ws)?,
        17 => destroy_notify(reader, settings, ws)?,
        18 => unmap_notify(reader, settings, ws)?,
        19 => map_notify(reader, settings, ws)?,
        20 => map_request(reader, settings, ws)?,
        21 => reparent_notify(reader, settings, ws)?,
        22 => configure_notify(reader, settings, ws)?,
        23 => configure_request(reader, settings, ws)?,
        24 => gravity_notify(reader, settings, ws)?,
        25 => resize_request(reader, settings, ws)?,
        26 | 27 => circulate_event(reader, settings, ws)?,
        28 => property_notify(reader, atoms, settings, ws)?,
        29 => selection_clear(reader, atoms, settings, ws)?,
        30 => selection_request(reader, atoms, settings, ws)?,
        31 => selection_notify(reader, atoms, settings, ws)?,
        32 => colormap_notify(reader, settings, ws)?,
        33 => client_message(reader, atoms, settings, ws)?,
        34 => mapping_notify(reader, settings, ws)?,
        _ => {
            reader.skip(3)?; // detail/format + sequence, still honored
            let n = reader.remaining();
            reader.read_bytes(n)?;
            format!("<{n} bytes>")
        }
    };
    Ok(body)
}

fn input_event(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    let detail = reader.read_u8()?;
    reader.skip(2)?; // sequence number
    let time = reader.read_u32()?;
    let root = reader.read_u32()?;
    let event = reader.read_u32()?;
    let child = reader.read_u32()?;
    let (root_x, root_y, event_x, event_y) =
        (reader.read_i16()?, reader.read_i16()?, reader.read_i16()?, reader.read_i16()?);
    let state = reader.read_u16()?;
    let same_screen = reader.read_u8()? != 0;
    reader.skip(1)?;
    Ok(Struct::new(ws)
        .field("detail", detail.to_string())
        .field("time", timestamp(time, settings))
        .field("root", resource_id(root, settings))
        .field("event", resource_id(event, settings))
        .field("child", resource_id(child, settings))
        .field("root_x", root_x.to_string())
        .field("root_y", root_y.to_string())
        .field("event_x", event_x.to_string())
        .field("event_y", event_y.to_string())
        .field("state", crate::decoder::masks::key_but_mask(state, settings))
        .field("same_screen", same_screen.to_string())
        .render())
}

fn crossing_event(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    let detail = reader.read_u8()?;
    reader.skip(2)?;
    let time = reader.read_u32()?;
    let root = reader.read_u32()?;
    let event = reader.read_u32()?;
    let child = reader.read_u32()?;
    let (root_x, root_y, event_x, event_y) =
        (reader.read_i16()?, reader.read_i16()?, reader.read_i16()?, reader.read_i16()?);
    let state = reader.read_u16()?;
    let mode = reader.read_u8()?;
    let flags = reader.read_u8()?;
    Ok(Struct::new(ws)
        .field("detail", detail.to_string())
        .field("time", timestamp(time, settings))
        .field("root", resource_id(root, settings))
        .field("event", resource_id(event, settings))
        .field("child", resource_id(child, settings))
        .field("root_x", root_x.to_string())
        .field("root_y", root_y.to_string())
        .field("event_x", event_x.to_string())
        .field("event_y", event_y.to_string())
        .field("state", crate::decoder::masks::key_but_mask(state, settings))
        .field("mode", mode.to_string())
        .field("flags", format!("0x{:02x}", flags))
        .render())
}

fn focus_event(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    let detail = reader.read_u8()?;
    reader.skip(2)?;
    let event = reader.read_u32()?;
    let mode = reader.read_u8()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("detail", detail.to_string())
        .field("event", resource_id(event, settings))
        .field("mode", mode.to_string())
        .render())
}

fn expose_event(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let window = reader.read_u32()?;
    let (x, y, width, height) = (reader.read_u16()?, reader.read_u16()?, reader.read_u16()?, reader.read_u16()?);
    let count = reader.read_u16()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("window", resource_id(window, settings))
        .field("x", x.to_string())
        .field("y", y.to_string())
        .field("width", width.to_string())
        .field("height", height.to_string())
        .field("count", count.to_string())
        .render())
}

fn create_notify(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let parent = reader.read_u32()?;
    let window = reader.read_u32()?;
    let (x, y, width, height, border_width) = (
        reader.read_i16()?,
        reader.read_i16()?,
        reader.read_u16()?,
        reader.read_u16()?,
        reader.read_u16()?,
    );
    let override_redirect = reader.read_u8()? != 0;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("parent", resource_id(parent, settings))
        .field("window", resource_id(window, settings))
        .field("x", x.to_string())
        .field("y", y.to_string())
        .field("width", width.to_string())
        .field("height", height.to_string())
        .field("border_width", border_width.to_string())
        .field("override_redirect", override_redirect.to_string())
        .render())
}

fn destroy_notify(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let event = reader.read_u32()?;
    let window = reader.read_u32()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("event", resource_id(event, settings))
        .field("window", resource_id(window, settings))
        .render())
}

fn unmap_notify(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let event = reader.read_u32()?;
    let window = reader.read_u32()?;
    let from_configure = reader.read_u8()? != 0;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("event", resource_id(event, settings))
        .field("window", resource_id(window, settings))
        .field("from_configure", from_configure.to_string())
        .render())
}

fn map_notify(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let event = reader.read_u32()?;
    let window = reader.read_u32()?;
    let override_redirect = reader.read_u8()? != 0;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("event", resource_id(event, settings))
        .field("window", resource_id(window, settings))
        .field("override_redirect", override_redirect.to_string())
        .render())
}

fn map_request(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let parent = reader.read_u32()?;
    let window = reader.read_u32()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("parent", resource_id(parent, settings))
        .field("window", resource_id(window, settings))
        .render())
}

fn reparent_notify(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let event = reader.read_u32()?;
    let window = reader.read_u32()?;
    let parent = reader.read_u32()?;
    let x = reader.read_i16()?;
    let y = reader.read_i16()?;
    let override_redirect = reader.read_u8()? != 0;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("event", resource_id(event, settings))
        .field("window", resource_id(window, settings))
        .field("parent", resource_id(parent, settings))
        .field("x", x.to_string())
        .field("y", y.to_string())
        .field("override_redirect", override_redirect.to_string())
        .render())
}

fn gravity_notify(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let event = reader.read_u32()?;
    let window = reader.read_u32()?;
    let x = reader.read_i16()?;
    let y = reader.read_i16()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("event", resource_id(event, settings))
        .field("window", resource_id(window, settings))
        .field("x", x.to_string())
        .field("y", y.to_string())
        .render())
}

fn resize_request(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let window = reader.read_u32()?;
    let width = reader.read_u16()?;
    let height = reader.read_u16()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("window", resource_id(window, settings))
        .field("width", width.to_string())
        .field("height", height.to_string())
        .render())
}

fn circulate_event(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let event = reader.read_u32()?;
    let window = reader.read_u32()?;
    reader.skip(4)?; // unused
    let place = reader.read_u8()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("event", resource_id(event, settings))
        .field("window", resource_id(window, settings))
        .field("place", scalar(place as u32, Some(&[(0, "PlaceOnTop"), (1, "PlaceOnBottom")]), settings))
        .render())
}

fn configure_request(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    let stack_mode = reader.read_u8()?;
    reader.skip(2)?; // sequence
    let parent = reader.read_u32()?;
    let window = reader.read_u32()?;
    let sibling = reader.read_u32()?;
    let x = reader.read_i16()?;
    let y = reader.read_i16()?;
    let width = reader.read_u16()?;
    let height = reader.read_u16()?;
    let border_width = reader.read_u16()?;
    let value_mask = reader.read_u16()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("stack_mode", scalar(stack_mode as u32, Some(&[(0, "Above"), (1, "Below"), (2, "TopIf"), (3, "BottomIf"), (4, "Opposite")]), settings))
        .field("parent", resource_id(parent, settings))
        .field("window", resource_id(window, settings))
        .field("sibling", resource_id(sibling, settings))
        .field("x", x.to_string())
        .field("y", y.to_string())
        .field("width", width.to_string())
        .field("height", height.to_string())
        .field("border_width", border_width.to_string())
        .field("value_mask", format!("0x{:04x}", value_mask))
        .render())
}

fn visibility_notify(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let window = reader.read_u32()?;
    let state = reader.read_u8()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("window", resource_id(window, settings))
        .field(
            "state",
            scalar(state as u32, Some(&[(0, "Unobscured"), (1, "PartiallyObscured"), (2, "FullyObscured")]), settings),
        )
        .render())
}

fn graphics_exposure(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let drawable = reader.read_u32()?;
    let x = reader.read_u16()?;
    let y = reader.read_u16()?;
    let width = reader.read_u16()?;
    let height = reader.read_u16()?;
    let minor_opcode = reader.read_u16()?;
    let count = reader.read_u16()?;
    let major_opcode = reader.read_u8()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("drawable", resource_id(drawable, settings))
        .field("x", x.to_string())
        .field("y", y.to_string())
        .field("width", width.to_string())
        .field("height", height.to_string())
        .field("minor_opcode", minor_opcode.to_string())
        .field("count", count.to_string())
        .field("major_opcode", major_opcode.to_string())
        .render())
}

fn no_exposure(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let drawable = reader.read_u32()?;
    let minor_opcode = reader.read_u16()?;
    let major_opcode = reader.read_u8()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("drawable", resource_id(drawable, settings))
        .field("minor_opcode", minor_opcode.to_string())
        .field("major_opcode", major_opcode.to_string())
        .render())
}

fn selection_clear(reader: &mut Reader, atoms: &AtomTable, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let time = reader.read_u32()?;
    let owner = reader.read_u32()?;
    let selection = reader.read_u32()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("time", timestamp(time, settings))
        .field("owner", resource_id(owner, settings))
        .field("selection", crate::decoder::format::atom(selection, atoms, None, settings))
        .render())
}

fn selection_request(reader: &mut Reader, atoms: &AtomTable, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let time = reader.read_u32()?;
    let owner = reader.read_u32()?;
    let requestor = reader.read_u32()?;
    let selection = reader.read_u32()?;
    let target = reader.read_u32()?;
    let property = reader.read_u32()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("time", timestamp(time, settings))
        .field("owner", resource_id(owner, settings))
        .field("requestor", resource_id(requestor, settings))
        .field("selection", crate::decoder::format::atom(selection, atoms, None, settings))
        .field("target", crate::decoder::format::atom(target, atoms, None, settings))
        .field("property", crate::decoder::format::atom(property, atoms, Some(NONE_ATOM), settings))
        .render())
}

fn selection_notify(reader: &mut Reader, atoms: &AtomTable, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let time = reader.read_u32()?;
    let requestor = reader.read_u32()?;
    let selection = reader.read_u32()?;
    let target = reader.read_u32()?;
    let property = reader.read_u32()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("time", timestamp(time, settings))
        .field("requestor", resource_id(requestor, settings))
        .field("selection", crate::decoder::format::atom(selection, atoms, None, settings))
        .field("target", crate::decoder::format::atom(target, atoms, None, settings))
        .field("property", crate::decoder::format::atom(property, atoms, Some(NONE_ATOM), settings))
        .render())
}

fn colormap_notify(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let window = reader.read_u32()?;
    let colormap = reader.read_u32()?;
    let new = reader.read_u8()? != 0;
    let state = reader.read_u8()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("window", resource_id(window, settings))
        .field("colormap", resource_id(colormap, settings))
        .field("new", new.to_string())
        .field("state", scalar(state as u32, Some(&[(0, "Uninstalled"), (1, "Installed")]), settings))
        .render())
}

fn mapping_notify(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let request = reader.read_u8()?;
    let first_keycode = reader.read_u8()?;
    let count = reader.read_u8()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("request", scalar(request as u32, Some(&[(0, "Modifier"), (1, "Keyboard"), (2, "Pointer")]), settings))
        .field("first_keycode", first_keycode.to_string())
        .field("count", count.to_string())
        .render())
}

fn configure_notify(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let event = reader.read_u32()?;
    let window = reader.read_u32()?;
    let above_sibling = reader.read_u32()?;
    let (x, y, width, height, border_width) = (
        reader.read_i16()?,
        reader.read_i16()?,
        reader.read_u16()?,
        reader.read_u16()?,
        reader.read_u16()?,
    );
    let override_redirect = reader.read_u8()? != 0;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("event", resource_id(event, settings))
        .field("window", resource_id(window, settings))
        .field("above_sibling", resource_id(above_sibling, settings))
        .field("x", x.to_string())
        .field("y", y.to_string())
        .field("width", width.to_string())
        .field("height", height.to_string())
        .field("border_width", border_width.to_string())
        .field("override_redirect", override_redirect.to_string())
        .render())
}

fn property_notify(reader: &mut Reader, atoms: &AtomTable, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    reader.skip(3)?; // unused + sequence
    let window = reader.read_u32()?;
    let atom = reader.read_u32()?;
    let time = reader.read_u32()?;
    let state = reader.read_u8()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(ws)
        .field("window", resource_id(window, settings))
        .field("atom", crate::decoder::format::atom(atom, atoms, None, settings))
        .field("time", timestamp(time, settings))
        .field("state", scalar(state as u32, Some(&[(0, "NewValue"), (1, "Deleted")]), settings))
        .render())
}

fn client_message(reader: &mut Reader, atoms: &AtomTable, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    let format_bits = reader.read_u8()?;
    reader.skip(2)?; // sequence
    let window = reader.read_u32()?;
    let message_type = reader.read_u32()?;
    let data = reader.read_bytes(20)?;
    Ok(Struct::new(ws)
        .field("format", format_bits.to_string())
        .field("window", resource_id(window, settings))
        .field("message_type", crate::decoder::format::atom(message_type, atoms, None, settings))
        .field("data", format!("{:02x?}", data))
        .render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::byteorder::ByteOrder;

    #[test]
    fn synthetic_bit_masked_before_dispatch() {
        let settings = Settings::default();
        let atoms = AtomTable::new();
        let data = [0u8; 31];
        let mut r = Reader::new(&data, ByteOrder::Little);
        let out = dispatch(19 | SYNTHETIC_BIT, &mut r, &atoms, &settings, Ws::root(false)).unwrap();
        assert!(out.contains("window"));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn keymap_notify_uses_placeholder_sequence() {
        let settings = Settings::default();
        let atoms = AtomTable::new();
        let data = [0u8; 31];
        let mut r = Reader::new(&data, ByteOrder::Little);
        let out = dispatch(11, &mut r, &atoms, &settings, Ws::root(false)).unwrap();
        assert!(out.contains("?????"));
    }

    #[test]
    fn every_event_handler_consumes_exactly_31_bytes() {
        let settings = Settings::default();
        let atoms = AtomTable::new();
        for code in 2u8..=34 {
            let data = [0u8; 31];
            let mut r = Reader::new(&data, ByteOrder::Little);
            dispatch(code, &mut r, &atoms, &settings, Ws::root(false)).unwrap();
            assert_eq!(r.remaining(), 0, "code {code} left {} bytes unconsumed", r.remaining());
        }
    }
}
