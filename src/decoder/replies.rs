//! Reply dispatch (spec.md §4.6/§4.7). A reply carries no opcode of its
//! own; the caller looks one up from the connection's open-request table by
//! sequence number and passes it in here. Every reply is `32 + 4*n` bytes;
//! `dispatch` receives `first_byte` (the header's second byte, which several
//! replies overload for small values) and a reader scoped to the remaining
//! `24 + 4*n` bytes.

use crate::decoder::atoms::AtomTable;
use crate::decoder::byteorder::{Reader, Truncated};
use crate::decoder::connection::{Connection, Stash};
use crate::decoder::extensions::ExtensionActivation;
use crate::decoder::format::{atom, resource_id, scalar, Struct, Ws};
use crate::settings::Settings;

/// Outcome of dispatching one reply: its rendered body, whether the
/// open-request entry should stay alive for another reply (`ListFontsWithInfo`
/// only, spec.md §4.6), and an optional single-byte patch the relay must
/// apply to the bytes it forwards downstream (spec.md §9's "one sanctioned
/// mutation": denying an extension overwrites its `QueryExtension` reply's
/// `present` byte before the client ever sees it).
pub struct Dispatched {
    pub body: String,
    pub keep_open: bool,
    /// `(byte offset from the start of the reply, new value)`.
    pub patch: Option<(usize, u8)>,
}

fn opaque(reader: &mut Reader) -> Result<String, Truncated> {
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(format!("<{n} bytes>"))
}

pub fn dispatch(
    major_opcode: u8,
    first_byte: u8,
    seq: u16,
    reader: &mut Reader,
    conn: &mut Connection,
    settings: &Settings,
    ws: Ws,
) -> Result<Dispatched, Truncated> {
    if major_opcode == 98 {
        let (body, patch) = query_extension_reply(first_byte, reader, conn, seq, settings)?;
        return Ok(Dispatched { body, keep_open: false, patch });
    }
    if major_opcode == 50 {
        let (body, keep_open) = list_fonts_with_info_reply(first_byte, reader, settings)?;
        return Ok(Dispatched { body, keep_open, patch: None });
    }

    let body = match major_opcode {
        16 => intern_atom_reply(reader, conn, seq, settings)?,
        17 => get_atom_name_reply(reader, settings)?,
        20 => get_property_reply(first_byte, reader, &conn.atoms, settings)?,
        3 => get_window_attributes_reply(first_byte, reader, settings)?,
        15 => query_tree_reply(reader, settings, ws)?,
        73 => get_image_reply(first_byte, reader, settings)?,
        101 => get_keyboard_mapping_reply(first_byte, reader)?,
        119 => get_modifier_mapping_reply(first_byte, reader)?,
        133 => big_req_enable_reply(reader, conn)?,
        _ => opaque(reader)?,
    };
    Ok(Dispatched { body, keep_open: false, patch: None })
}

fn intern_atom_reply(reader: &mut Reader, conn: &mut Connection, seq: u16, settings: &Settings) -> Result<String, Truncated> {
    let atom_id = reader.read_u32()?;
    reader.skip(reader.remaining())?;
    if atom_id != 0 {
        if let Some(Stash::InternAtomName(name)) = conn.take_stash(seq) {
            conn.atoms.insert(atom_id, name);
        }
    }
    Ok(Struct::new(Ws::root(settings.multiline)).field("atom", atom(atom_id, &conn.atoms, None, settings)).render())
}

fn get_atom_name_reply(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let name_len = reader.read_u16()? as usize;
    reader.skip(22)?;
    let name = reader.read_str_lossy(name_len)?;
    reader.skip(reader.remaining())?;
    Ok(Struct::new(Ws::root(settings.multiline)).field("name", format!("{:?}", name)).render())
}

fn get_property_reply(
    format_bits: u8,
    reader: &mut Reader,
    atoms: &AtomTable,
    settings: &Settings,
) -> Result<String, Truncated> {
    let prop_type = reader.read_u32()?;
    let bytes_after = reader.read_u32()?;
    let value_len = reader.read_u32()? as usize;
    reader.skip(12)?;
    let unit_bytes = (format_bits as usize / 8).max(1);
    let total_bytes = value_len * unit_bytes;
    let value = reader.read_bytes(total_bytes)?;
    reader.skip(reader.remaining())?;

    let rendered_value = if prop_type == crate::decoder::atoms::STRING_ATOM {
        format!("{:?}", value.iter().map(|&b| b as char).collect::<String>())
    } else {
        format!("{:02x?}", value)
    };

    Ok(Struct::new(Ws::root(settings.multiline))
        .field("type", atom(prop_type, atoms, None, settings))
        .field("format", format_bits.to_string())
        .field("bytes_after", bytes_after.to_string())
        .field("value", rendered_value)
        .render())
}

/// `QueryExtension` reply (spec.md §4.6): registers the name stashed by the
/// request into the extension table. BIG-REQUESTS activation stays
/// incomplete until its `BigReqEnable` reply (spec.md §9's deferred-activation
/// resolution) — the table entry is still written here so request dispatch
/// by major opcode works, but `big_requests_active` is untouched.
fn query_extension_reply(
    first_byte: u8,
    reader: &mut Reader,
    conn: &mut Connection,
    seq: u16,
    settings: &Settings,
) -> Result<(String, Option<(usize, u8)>), Truncated> {
    let mut present = first_byte != 0;
    let major_opcode = reader.read_u8()?;
    let first_event = reader.read_u8()?;
    let first_error = reader.read_u8()?;
    reader.skip(reader.remaining())?;
    let mut patch = None;

    if let Some(Stash::QueryExtensionName(name)) = conn.take_stash(seq) {
        // The one sanctioned mutation (spec.md §9): a denied extension's
        // `present` byte is forced false before the reply is forwarded. The
        // `present` byte sits at offset 1 of the 32-byte reply.
        if settings.denied_extensions.contains(&name) && present {
            present = false;
            patch = Some((1, 0u8));
        }
        conn.extensions.activate(name, ExtensionActivation { present, major_opcode, first_event, first_error });
    }

    let body = Struct::new(Ws::root(settings.multiline))
        .field("present", present.to_string())
        .field("major_opcode", major_opcode.to_string())
        .field("first_event", first_event.to_string())
        .field("first_error", first_error.to_string())
        .render();
    Ok((body, patch))
}

fn get_window_attributes_reply(first_byte: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let visual = reader.read_u32()?;
    let class = reader.read_u16()?;
    let bit_gravity = reader.read_u8()?;
    let win_gravity = reader.read_u8()?;
    let backing_planes = reader.read_u32()?;
    let backing_pixel = reader.read_u32()?;
    let save_under = reader.read_u8()? != 0;
    let map_is_installed = reader.read_u8()? != 0;
    let map_state = reader.read_u8()?;
    let override_redirect = reader.read_u8()? != 0;
    let colormap = reader.read_u32()?;
    let all_event_masks = reader.read_u32()?;
    let your_event_mask = reader.read_u32()?;
    let do_not_propagate_mask = reader.read_u16()?;
    reader.skip(reader.remaining())?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field(
            "backing_store",
            scalar(first_byte as u32, Some(&[(0, "NotUseful"), (1, "WhenMapped"), (2, "Always")]), settings),
        )
        .field("visual", resource_id(visual, settings))
        .field("class", scalar(class as u32, Some(&[(1, "InputOutput"), (2, "InputOnly")]), settings))
        .field("bit_gravity", bit_gravity.to_string())
        .field("win_gravity", win_gravity.to_string())
        .field("backing_planes", format!("0x{:08x}", backing_planes))
        .field("backing_pixel", format!("0x{:08x}", backing_pixel))
        .field("save_under", save_under.to_string())
        .field("map_is_installed", map_is_installed.to_string())
        .field(
            "map_state",
            scalar(map_state as u32, Some(&[(0, "Unmapped"), (1, "Unviewable"), (2, "Viewable")]), settings),
        )
        .field("override_redirect", override_redirect.to_string())
        .field("colormap", resource_id(colormap, settings))
        .field("all_event_masks", crate::decoder::masks::event_mask(all_event_masks, settings))
        .field("your_event_mask", crate::decoder::masks::event_mask(your_event_mask, settings))
        .field("do_not_propagate_mask", crate::decoder::masks::event_mask(do_not_propagate_mask as u32, settings))
        .render())
}

fn query_tree_reply(reader: &mut Reader, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    let root = reader.read_u32()?;
    let parent = reader.read_u32()?;
    let num_children = reader.read_u16()? as usize;
    reader.skip(14)?;
    let children = crate::decoder::list::fixed_count(reader, num_children, |r| r.read_u32())?;
    let rendered: Vec<String> = children.iter().map(|c| resource_id(*c, settings)).collect();
    Ok(Struct::new(ws)
        .field("root", resource_id(root, settings))
        .field("parent", resource_id(parent, settings))
        .field("children", crate::decoder::format::render_list(ws.nested(true), &rendered))
        .render())
}

fn get_image_reply(depth: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    reader.skip(20)?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("depth", depth.to_string())
        .field("data", format!("<{n} bytes>"))
        .render())
}

fn get_keyboard_mapping_reply(keysyms_per_keycode: u8, reader: &mut Reader) -> Result<String, Truncated> {
    reader.skip(24)?;
    let n = reader.remaining();
    let keysym_count = n / 4;
    let keysyms = crate::decoder::list::fixed_count(reader, keysym_count, |r| r.read_u32())?;
    let rendered: Vec<String> = keysyms.iter().map(|&k| crate::decoder::format::keysym(k)).collect();
    Ok(Struct::new(Ws::root(false))
        .field("keysyms_per_keycode", keysyms_per_keycode.to_string())
        .field("keysym_count", keysym_count.to_string())
        .field("keysyms", crate::decoder::format::render_list(Ws::root(false), &rendered))
        .render())
}

fn get_modifier_mapping_reply(keycodes_per_modifier: u8, reader: &mut Reader) -> Result<String, Truncated> {
    reader.skip(24)?;
    let keycode_count = 8 * keycodes_per_modifier as usize;
    let keycodes = crate::decoder::list::fixed_count(reader, keycode_count, |r| r.read_u8())?;
    let rendered: Vec<String> = keycodes.iter().map(|k| k.to_string()).collect();
    Ok(Struct::new(Ws::root(false))
        .field("keycodes_per_modifier", keycodes_per_modifier.to_string())
        .field("keycodes", crate::decoder::format::render_list(Ws::root(false), &rendered))
        .render())
}

/// `ListFontsWithInfo`'s last reply is an all-zero sentinel with
/// `name_len == 0` (spec.md §4.6); every other reply in the sequence keeps
/// the open-request entry alive.
fn list_fonts_with_info_reply(name_len: u8, reader: &mut Reader, settings: &Settings) -> Result<(String, bool), Truncated> {
    if name_len == 0 {
        reader.skip(reader.remaining())?;
        return Ok(("{ <end of font list> }".to_string(), false));
    }
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok((
        Struct::new(Ws::root(settings.multiline)).field("name_len", name_len.to_string()).render(),
        true,
    ))
}

fn big_req_enable_reply(reader: &mut Reader, conn: &mut Connection) -> Result<String, Truncated> {
    let max_request_length = reader.read_u32()?;
    reader.skip(reader.remaining())?;
    conn.big_requests_active = true;
    Ok(Struct::new(Ws::root(false)).field("maximum_request_length", max_request_length.to_string()).render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::byteorder::ByteOrder;

    #[test]
    fn intern_atom_reply_registers_stashed_name_s1() {
        let mut conn = Connection::new(1);
        let seq = conn.next_sequence();
        conn.stash(seq, Stash::InternAtomName("WM_PROTOCOLS".into()));
        let mut data = vec![0u8; 24];
        data[0..4].copy_from_slice(&0x0000_0123u32.to_le_bytes());
        let mut r = Reader::new(&data, ByteOrder::Little);
        let settings = Settings::default();
        intern_atom_reply(&mut r, &mut conn, seq, &settings).unwrap();
        assert_eq!(conn.atoms.lookup(0x0123), Some("WM_PROTOCOLS"));
    }

    #[test]
    fn query_extension_reply_activates_big_requests() {
        let mut conn = Connection::new(1);
        let seq = conn.next_sequence();
        conn.stash(seq, Stash::QueryExtensionName("BIG-REQUESTS".into()));
        let data = [133u8, 0, 0, 21]; // major_opcode=133, first_event=0, first_error=21
        let mut r = Reader::new(&data, ByteOrder::Little);
        let settings = Settings::default();
        let (_, patch) = query_extension_reply(1, &mut r, &mut conn, seq, &settings).unwrap();
        assert!(conn.extensions.by_major_opcode(133).is_some());
        assert!(!conn.big_requests_active);
        assert!(patch.is_none());
    }

    #[test]
    fn denied_extension_patches_present_byte_to_false() {
        let mut conn = Connection::new(1);
        let seq = conn.next_sequence();
        conn.stash(seq, Stash::QueryExtensionName("MIT-SHM".into()));
        let data = [150u8, 0, 0, 0];
        let mut r = Reader::new(&data, ByteOrder::Little);
        let mut settings = Settings::default();
        settings.denied_extensions.insert("MIT-SHM".into());
        let (body, patch) = query_extension_reply(1, &mut r, &mut conn, seq, &settings).unwrap();
        assert_eq!(patch, Some((1, 0)));
        assert!(body.contains("present"));
        assert!(conn.extensions.by_major_opcode(150).is_none());
    }

    #[test]
    fn big_req_enable_reply_activates_extended_length() {
        let mut conn = Connection::new(1);
        let data = [0u8, 0, 0, 0];
        let mut r = Reader::new(&data, ByteOrder::Little);
        big_req_enable_reply(&mut r, &mut conn).unwrap();
        assert!(conn.big_requests_active);
    }

    #[test]
    fn get_keyboard_mapping_reply_skips_unused_prefix_and_renders_keysyms() {
        let mut data = vec![0u8; 24]; // unused prefix
        data.extend_from_slice(&0x0000_ffeeu32.to_le_bytes());
        data.extend_from_slice(&0x0000_ffefu32.to_le_bytes());
        let mut r = Reader::new(&data, ByteOrder::Little);
        let out = get_keyboard_mapping_reply(1, &mut r).unwrap();
        assert!(out.contains("keysym_count=2"));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn get_modifier_mapping_reply_uses_eight_times_keycodes_per_modifier() {
        let mut data = vec![0u8; 24];
        data.extend_from_slice(&[10, 11, 12, 13, 14, 15, 16, 17]); // 8 keycodes, one per modifier
        let mut r = Reader::new(&data, ByteOrder::Little);
        let out = get_modifier_mapping_reply(1, &mut r).unwrap();
        assert!(out.contains("keycodes_per_modifier=1"));
        assert!(out.contains("10") && out.contains("17"));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn get_window_attributes_reply_renders_all_fields() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x0000_0021u32.to_le_bytes()); // visual
        data.extend_from_slice(&1u16.to_le_bytes()); // class = InputOutput
        data.push(1); // bit_gravity
        data.push(1); // win_gravity
        data.extend_from_slice(&0u32.to_le_bytes()); // backing_planes
        data.extend_from_slice(&0u32.to_le_bytes()); // backing_pixel
        data.push(0); // save_under
        data.push(1); // map_is_installed
        data.push(2); // map_state = Viewable
        data.push(0); // override_redirect
        data.extend_from_slice(&0u32.to_le_bytes()); // colormap = None
        data.extend_from_slice(&0u32.to_le_bytes()); // all_event_masks
        data.extend_from_slice(&0u32.to_le_bytes()); // your_event_mask
        data.extend_from_slice(&0u16.to_le_bytes()); // do_not_propagate_mask
        data.extend_from_slice(&0u16.to_le_bytes()); // unused pad
        let mut r = Reader::new(&data, ByteOrder::Little);
        let settings = Settings::default();
        let out = get_window_attributes_reply(1, &mut r, &settings).unwrap();
        assert!(out.contains("WhenMapped"));
        assert!(out.contains("InputOutput"));
        assert!(out.contains("Viewable"));
        assert_eq!(r.remaining(), 0);
    }
}
