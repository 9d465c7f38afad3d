//! Request dispatch (spec.md §4.6): one row per core-protocol opcode
//! (1..=119, plus 127 for `NoOperation`). The large majority of core opcodes
//! get a real field-level parser; a handful of requests whose VALUE-list
//! shape is already covered elsewhere (`CreateGC`/`ChangeGC`'s graphics
//! context attributes, `ChangeKeyboardControl`) and extension opcodes
//! (>= 128, resolved through the connection's extension table rather than
//! this table) still fall back to a named, length-correct but field-opaque
//! rendering (spec.md §7: unclassified traffic still advances the stream and
//! logs an opaque summary line rather than desyncing).
//!
//! Grounded on the teacher's `x11/requests` opcode enumeration for naming,
//! restructured per spec.md §9 as a table plus a match that only branches on
//! opcodes that need bespoke parsing, rather than one parser-per-opcode
//! struct hierarchy.

use crate::decoder::atoms::AtomTable;
use crate::decoder::byteorder::{Reader, Truncated};
use crate::decoder::connection::{Connection, Stash};
use crate::decoder::format::{atom, keysym, render_list, resource_id, scalar, set_of_keymask, timestamp, NameTable, Struct, Ws};
use crate::decoder::list;
use crate::settings::Settings;

/// `(wire value, name)` for ATOM fields whose value `0` means "none" rather
/// than "atom 0" (spec.md §4.4's ATOM rendering plus a contextual override).
const NONE_ATOM: NameTable = &[(0, "None")];

/// SETofKEYMASK's flag-name table (spec.md §4.4): the eight modifier bits,
/// shared by `GrabButton`/`GrabKey`/`GrabKeyboard`'s `modifiers` field.
const MODIFIER_NAMES: NameTable = &[
    (0x0001, "Shift"),
    (0x0002, "Lock"),
    (0x0004, "Control"),
    (0x0008, "Mod1"),
    (0x0010, "Mod2"),
    (0x0020, "Mod3"),
    (0x0040, "Mod4"),
    (0x0080, "Mod5"),
];

/// `(opcode, name)` for every core request. Extension opcodes (>= 128) are
/// resolved through the connection's extension table instead.
pub const NAMES: &[(u8, &str)] = &[
    (1, "CreateWindow"),
    (2, "ChangeWindowAttributes"),
    (3, "GetWindowAttributes"),
    (4, "DestroyWindow"),
    (5, "DestroySubwindows"),
    (6, "ChangeSaveSet"),
    (7, "ReparentWindow"),
    (8, "MapWindow"),
    (9, "MapSubwindows"),
    (10, "UnmapWindow"),
    (11, "UnmapSubwindows"),
    (12, "ConfigureWindow"),
    (13, "CirculateWindow"),
    (14, "GetGeometry"),
    (15, "QueryTree"),
    (16, "InternAtom"),
    (17, "GetAtomName"),
    (18, "ChangeProperty"),
    (19, "DeleteProperty"),
    (20, "GetProperty"),
    (21, "ListProperties"),
    (22, "SetSelectionOwner"),
    (23, "GetSelectionOwner"),
    (24, "ConvertSelection"),
    (25, "SendEvent"),
    (26, "GrabPointer"),
    (27, "UngrabPointer"),
    (28, "GrabButton"),
    (29, "UngrabButton"),
    (30, "ChangeActivePointerGrab"),
    (31, "GrabKeyboard"),
    (32, "UngrabKeyboard"),
    (33, "GrabKey"),
    (34, "UngrabKey"),
    (35, "AllowEvents"),
    (36, "GrabServer"),
    (37, "UngrabServer"),
    (38, "QueryPointer"),
    (39, "GetMotionEvents"),
    (40, "TranslateCoordinates"),
    (41, "WarpPointer"),
    (42, "SetInputFocus"),
    (43, "GetInputFocus"),
    (44, "QueryKeymap"),
    (45, "OpenFont"),
    (46, "CloseFont"),
    (47, "QueryFont"),
    (48, "QueryTextExtents"),
    (49, "ListFonts"),
    (50, "ListFontsWithInfo"),
    (51, "SetFontPath"),
    (52, "GetFontPath"),
    (53, "CreatePixmap"),
    (54, "FreePixmap"),
    (55, "CreateGC"),
    (56, "ChangeGC"),
    (57, "CopyGC"),
    (58, "SetDashes"),
    (59, "SetClipRectangles"),
    (60, "FreeGC"),
    (61, "ClearArea"),
    (62, "CopyArea"),
    (63, "CopyPlane"),
    (64, "PolyPoint"),
    (65, "PolyLine"),
    (66, "PolySegment"),
    (67, "PolyRectangle"),
    (68, "PolyArc"),
    (69, "FillPoly"),
    (70, "PolyFillRectangle"),
    (71, "PolyFillArc"),
    (72, "PutImage"),
    (73, "GetImage"),
    (74, "PolyText8"),
    (75, "PolyText16"),
    (76, "ImageText8"),
    (77, "ImageText16"),
    (78, "CreateColormap"),
    (79, "FreeColormap"),
    (80, "CopyColormapAndFree"),
    (81, "InstallColormap"),
    (82, "UninstallColormap"),
    (83, "ListInstalledColormaps"),
    (84, "AllocColor"),
    (85, "AllocNamedColor"),
    (86, "AllocColorCells"),
    (87, "AllocColorPlanes"),
    (88, "FreeColors"),
    (89, "StoreColors"),
    (90, "StoreNamedColor"),
    (91, "QueryColors"),
    (92, "LookupColor"),
    (93, "CreateCursor"),
    (94, "CreateGlyphCursor"),
    (95, "FreeCursor"),
    (96, "RecolorCursor"),
    (97, "QueryBestSize"),
    (98, "QueryExtension"),
    (99, "ListExtensions"),
    (100, "ChangeKeyboardMapping"),
    (101, "GetKeyboardMapping"),
    (102, "ChangeKeyboardControl"),
    (103, "GetKeyboardControl"),
    (104, "Bell"),
    (105, "ChangePointerControl"),
    (106, "GetPointerControl"),
    (107, "SetScreenSaver"),
    (108, "GetScreenSaver"),
    (109, "ChangeHosts"),
    (110, "ListHosts"),
    (111, "SetAccessControl"),
    (112, "SetCloseDownMode"),
    (113, "KillClient"),
    (114, "RotateProperties"),
    (115, "ForceScreenSaver"),
    (116, "SetPointerMapping"),
    (117, "GetPointerMapping"),
    (118, "SetModifierMapping"),
    (119, "GetModifierMapping"),
    (127, "NoOperation"),
];

/// Opcodes that generate a reply (spec.md §4.7's open-request table is only
/// populated for these).
pub const PRODUCES_REPLY: &[u8] = &[
    3, 14, 15, 17, 20, 21, 23, 26, 31, 38, 39, 40, 43, 44, 47, 48, 49, 50, 52, 73, 83, 84, 85, 86, 87,
    91, 92, 97, 98, 99, 101, 103, 106, 108, 110, 116, 117, 118, 119,
];

pub fn produces_reply(opcode: u8) -> bool {
    PRODUCES_REPLY.contains(&opcode)
}

pub fn name(opcode: u8) -> String {
    NAMES
        .iter()
        .find(|(op, _)| *op == opcode)
        .map(|(_, n)| n.to_string())
        .unwrap_or_else(|| format!("Unknown{opcode}"))
}

/// Result of dispatching one request: its rendered body and whether it
/// starts a multi-reply sequence (only `ListFontsWithInfo`, spec.md §4.6).
pub struct Dispatched {
    pub body: String,
    pub multi_reply: bool,
}

fn opaque(reader: &mut Reader) -> Result<String, Truncated> {
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(format!("<{n} bytes>"))
}

/// Dispatch one request. `reader` is scoped to exactly this request's body
/// (the 4-byte header has already been consumed by the caller); the parser
/// must consume it to the end to keep the stream in sync in release builds.
pub fn dispatch(
    major_opcode: u8,
    minor_opcode: u8,
    reader: &mut Reader,
    conn: &mut Connection,
    seq: u16,
    settings: &Settings,
    ws: Ws,
) -> Result<Dispatched, Truncated> {
    let multi_reply = major_opcode == 50; // ListFontsWithInfo

    let body = match major_opcode {
        1 | 2 => create_or_change_window_attributes(major_opcode, reader, &conn.atoms, settings, ws)?,
        3 | 4 | 5 | 8 | 9 | 10 | 11 => window_only(reader, settings)?,
        6 => change_save_set(minor_opcode, reader, settings)?,
        7 => reparent_window(reader, settings)?,
        12 => configure_window(reader, &conn.atoms, settings, ws)?,
        13 => circulate_window(minor_opcode, reader, settings)?,
        14 => drawable_only(reader, settings, "drawable")?,
        15 => window_only(reader, settings)?,
        16 => intern_atom(reader, conn, seq, settings)?,
        17 => get_atom_name(reader, settings)?,
        18 => change_property(reader, &conn.atoms, settings)?,
        19 => delete_property(reader, &conn.atoms, settings)?,
        20 => get_property(reader, &conn.atoms, settings)?,
        21 => window_only(reader, settings)?,
        22 => set_selection_owner(reader, &conn.atoms, settings)?,
        23 => atom_only(reader, &conn.atoms, settings, "selection")?,
        24 => convert_selection(reader, &conn.atoms, settings)?,
        25 => send_event(reader, &conn.atoms, settings, ws)?,
        26 => grab_pointer(minor_opcode, reader, settings)?,
        27 => time_only(reader, settings)?,
        28 => grab_button(minor_opcode, reader, settings)?,
        29 => ungrab_button(minor_opcode, reader, settings)?,
        30 => change_active_pointer_grab(reader, settings)?,
        31 => grab_keyboard(minor_opcode, reader, settings)?,
        32 => time_only(reader, settings)?,
        33 => grab_key(minor_opcode, reader, settings)?,
        34 => ungrab_key(minor_opcode, reader, settings)?,
        35 => allow_events(minor_opcode, reader, settings)?,
        36 | 37 | 43 | 44 | 52 | 99 | 103 | 106 | 108 | 110 | 117 | 119 => empty_body(reader)?,
        38 => window_only(reader, settings)?,
        39 => get_motion_events(reader, settings)?,
        40 => translate_coordinates(reader, settings)?,
        41 => warp_pointer(reader, settings)?,
        42 => set_input_focus(minor_opcode, reader, settings)?,
        45 => open_font(reader, settings)?,
        46 => drawable_only(reader, settings, "fid")?,
        47 => query_font(reader, settings)?,
        48 => query_text_extents(minor_opcode, reader, settings)?,
        49 | 50 => list_fonts(reader, settings)?,
        51 => set_font_path(reader, settings)?,
        53 => create_pixmap(minor_opcode, reader, settings)?,
        54 | 60 | 79 | 81 | 82 | 95 => resource_only(reader, settings)?,
        61 => clear_area(minor_opcode, reader, settings)?,
        62 | 63 => copy_area_or_plane(major_opcode, reader, settings)?,
        64 | 65 => poly_point_or_line(minor_opcode, reader, settings)?,
        66 => poly_segment(reader, settings)?,
        67 | 70 => poly_rectangle(reader, settings)?,
        68 | 71 => poly_arc(reader, settings)?,
        69 => fill_poly(reader, settings)?,
        73 => get_image(minor_opcode, reader, settings)?,
        78 => create_colormap(minor_opcode, reader, settings)?,
        80 => copy_colormap_and_free(reader, settings)?,
        83 => window_only(reader, settings)?,
        84 => alloc_color(reader, settings)?,
        85 => alloc_named_color(reader, settings)?,
        88 => free_colors(reader, settings)?,
        89 => store_colors(reader, settings)?,
        90 => store_named_color(minor_opcode, reader, settings)?,
        91 => query_colors(reader, settings)?,
        92 => lookup_color(reader, settings)?,
        93 => create_cursor(reader, settings)?,
        94 => create_glyph_cursor(reader, settings)?,
        96 => recolor_cursor(reader, settings)?,
        97 => query_best_size(minor_opcode, reader, settings)?,
        98 => query_extension(reader, conn, seq, settings)?,
        100 => change_keyboard_mapping(minor_opcode, reader, settings)?,
        101 => get_keyboard_mapping_request(reader, settings)?,
        104 => bell(minor_opcode)?,
        105 => change_pointer_control(reader, settings)?,
        107 => set_screen_saver(reader, settings)?,
        111 => set_access_control(minor_opcode)?,
        112 => set_close_down_mode(minor_opcode)?,
        109 => change_hosts(minor_opcode, reader, settings)?,
        113 => resource_only(reader, settings)?,
        114 => rotate_properties(reader, settings)?,
        115 => force_screen_saver(minor_opcode)?,
        116 => set_pointer_mapping(minor_opcode, reader)?,
        118 => set_modifier_mapping(minor_opcode, reader)?,
        127 => no_operation(reader)?,
        133 => big_req_enable(reader)?,
        _ => opaque(reader)?,
    };

    Ok(Dispatched { body, multi_reply })
}

fn window_only(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let window = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline)).field("window", resource_id(window, settings)).render())
}

fn value_mask_field_names(opcode: u8) -> &'static [(u32, &'static str)] {
    match opcode {
        1 | 2 => &[
            (0x0001, "background-pixmap"),
            (0x0002, "background-pixel"),
            (0x0004, "border-pixmap"),
            (0x0008, "border-pixel"),
            (0x0010, "bit-gravity"),
            (0x0020, "win-gravity"),
            (0x0040, "backing-store"),
            (0x0080, "backing-planes"),
            (0x0100, "backing-pixel"),
            (0x0200, "override-redirect"),
            (0x0400, "save-under"),
            (0x0800, "event-mask"),
            (0x1000, "do-not-propagate-mask"),
            (0x2000, "colormap"),
            (0x4000, "cursor"),
        ],
        12 => &[
            (0x0001, "x"),
            (0x0002, "y"),
            (0x0004, "width"),
            (0x0008, "height"),
            (0x0010, "border-width"),
            (0x0020, "sibling"),
            (0x0040, "stack-mode"),
        ],
        _ => &[],
    }
}

fn create_or_change_window_attributes(
    opcode: u8,
    reader: &mut Reader,
    atoms: &AtomTable,
    settings: &Settings,
    ws: Ws,
) -> Result<String, Truncated> {
    let s = Struct::new(ws);
    let s = if opcode == 1 {
        let window = reader.read_u32()?;
        let parent = reader.read_u32()?;
        let (x, y, w, h, bw) = (
            reader.read_i16()?,
            reader.read_i16()?,
            reader.read_u16()?,
            reader.read_u16()?,
            reader.read_u16()?,
        );
        reader.skip(2)?; // class, depth/visual alignment handled below
        let _visual = reader.read_u32()?;
        let mask = reader.read_u32()?;
        let schema = value_schema_for(opcode);
        let values = crate::decoder::format::list_of_value(reader, mask, &schema, atoms, settings, ws)?;
        s.field("window", resource_id(window, settings))
            .field("parent", resource_id(parent, settings))
            .field("x", x.to_string())
            .field("y", y.to_string())
            .field("width", w.to_string())
            .field("height", h.to_string())
            .field("border_width", bw.to_string())
            .field("value_mask", format!("0x{:08x}", mask))
            .field("value_list", values)
    } else {
        let window = reader.read_u32()?;
        reader.skip(2)?;
        let mask = reader.read_u32()?;
        let schema = value_schema_for(opcode);
        let values = crate::decoder::format::list_of_value(reader, mask, &schema, atoms, settings, ws)?;
        s.field("window", resource_id(window, settings))
            .field("value_mask", format!("0x{:08x}", mask))
            .field("value_list", values)
    };
    Ok(s.render())
}

/// Render function for each VALUE entry, by field name (spec.md §4.5's
/// "traits" driving how a 4-byte VALUE slot is interpreted once its mask
/// bit is found set).
fn value_renderer_for(opcode: u8, bit: u32) -> fn(u32, &AtomTable, &Settings) -> String {
    use crate::decoder::format::{render_bool_u32, render_colormap_u32, render_cursor_u32, render_pixmap_u32, render_plain_u32};
    use crate::decoder::masks::render_event_mask_u32;

    match (opcode, bit) {
        (1 | 2, 0x0001) | (1 | 2, 0x0004) => render_pixmap_u32, // background-pixmap, border-pixmap
        (1 | 2, 0x0200) | (1 | 2, 0x0400) => render_bool_u32, // override-redirect, save-under
        (1 | 2, 0x0800) | (1 | 2, 0x1000) => render_event_mask_u32, // event-mask, do-not-propagate-mask
        (1 | 2, 0x2000) => render_colormap_u32,
        (1 | 2, 0x4000) => render_cursor_u32,
        (12, 0x0020) => render_pixmap_u32, // sibling (a WINDOW, same top-3-bits-zero id rule)
        _ => render_plain_u32,
    }
}

fn value_schema_for(opcode: u8) -> Vec<crate::decoder::format::ValueField> {
    value_mask_field_names(opcode)
        .iter()
        .map(|(bit, name)| crate::decoder::format::ValueField {
            bit: *bit,
            name,
            render: value_renderer_for(opcode, *bit),
        })
        .collect()
}

fn configure_window(
    reader: &mut Reader,
    atoms: &AtomTable,
    settings: &Settings,
    ws: Ws,
) -> Result<String, Truncated> {
    let window = reader.read_u32()?;
    let mask = reader.read_u16()? as u32;
    reader.skip(2)?;
    let schema = value_schema_for(12);
    let values = crate::decoder::format::list_of_value(reader, mask, &schema, atoms, settings, ws)?;
    Ok(Struct::new(ws)
        .field("window", resource_id(window, settings))
        .field("value_mask", format!("0x{:04x}", mask))
        .field("value_list", values)
        .render())
}

fn intern_atom(reader: &mut Reader, conn: &mut Connection, seq: u16, settings: &Settings) -> Result<String, Truncated> {
    let only_if_exists = reader.read_u8()? != 0;
    reader.skip(2)?;
    let name_len = reader.read_u16()? as usize;
    let name = reader.read_str_lossy(name_len)?;
    reader.skip(crate::decoder::align::pad(name_len) - name_len)?;
    conn.stash(seq, Stash::InternAtomName(name.clone()));
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("only_if_exists", only_if_exists.to_string())
        .field("name", format!("{:?}", name))
        .render())
}

fn get_atom_name(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let atom = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline)).field("atom", scalar(atom, None, settings)).render())
}

fn change_property(reader: &mut Reader, atoms: &AtomTable, settings: &Settings) -> Result<String, Truncated> {
    let window = reader.read_u32()?;
    let property = reader.read_u32()?;
    let prop_type = reader.read_u32()?;
    let format_bits = reader.read_u8()?;
    reader.skip(3)?;
    let data_len = reader.read_u32()? as usize;
    let unit_bytes = (format_bits as usize / 8).max(1);
    let total_bytes = data_len * unit_bytes;
    reader.read_bytes(total_bytes)?;
    reader.skip(crate::decoder::align::pad(total_bytes) - total_bytes)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("window", resource_id(window, settings))
        .field("property", crate::decoder::format::atom(property, atoms, None, settings))
        .field("type", crate::decoder::format::atom(prop_type, atoms, None, settings))
        .field("format", format_bits.to_string())
        .field("data_len", data_len.to_string())
        .render())
}

fn get_property(reader: &mut Reader, atoms: &AtomTable, settings: &Settings) -> Result<String, Truncated> {
    let delete = reader.read_u8()? != 0;
    reader.skip(3)?;
    let window = reader.read_u32()?;
    let property = reader.read_u32()?;
    let prop_type = reader.read_u32()?;
    let long_offset = reader.read_u32()?;
    let long_length = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("window", resource_id(window, settings))
        .field("property", crate::decoder::format::atom(property, atoms, None, settings))
        .field("type", crate::decoder::format::atom(prop_type, atoms, None, settings))
        .field("delete", delete.to_string())
        .field("long_offset", long_offset.to_string())
        .field("long_length", long_length.to_string())
        .render())
}

fn open_font(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let fid = reader.read_u32()?;
    let name_len = reader.read_u16()? as usize;
    reader.skip(2)?;
    let name = reader.read_str_lossy(name_len)?;
    reader.skip(crate::decoder::align::pad(name_len) - name_len)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("fid", resource_id(fid, settings))
        .field("name", format!("{:?}", name))
        .render())
}

/// `QueryExtension`: stash the requested name so the reply handler can
/// register it in the extension table (spec.md §4.6).
fn query_extension(reader: &mut Reader, conn: &mut Connection, seq: u16, settings: &Settings) -> Result<String, Truncated> {
    let name_len = reader.read_u16()? as usize;
    reader.skip(2)?;
    let name = reader.read_str_lossy(name_len)?;
    reader.skip(crate::decoder::align::pad(name_len) - name_len)?;
    conn.stash(seq, Stash::QueryExtensionName(name.clone()));
    Ok(Struct::new(Ws::root(settings.multiline)).field("name", format!("{:?}", name)).render())
}

/// `SendEvent`: the 32-byte event payload is re-dispatched through the event
/// table and annotated `(generated)` (spec.md §4.6), since the client is
/// synthesizing wire-identical event bytes rather than the server emitting one.
fn send_event(reader: &mut Reader, atoms: &AtomTable, settings: &Settings, ws: Ws) -> Result<String, Truncated> {
    let propagate = reader.read_u8()? != 0;
    reader.skip(2)?;
    let destination = reader.read_u32()?;
    let event_mask = reader.read_u32()?;
    let event_bytes = reader.read_bytes(32)?;
    let mut event_reader = Reader::new(event_bytes, reader.order());
    let code = event_reader.read_u8()?;
    let rendered_event = crate::decoder::events::dispatch(code, &mut event_reader, atoms, settings, ws.nested(true))
        .unwrap_or_else(|_| "<truncated event>".to_string());
    Ok(Struct::new(ws)
        .field("propagate", propagate.to_string())
        .field("destination", resource_id(destination, settings))
        .field("event_mask", format!("0x{:08x}", event_mask))
        .field("event", format!("{} (generated)", rendered_event))
        .render())
}

/// `GrabButton`: exercises SETofEVENT (event-mask) and SETofKEYMASK
/// (modifiers, with its `AnyModifier` short-circuit) side by side, the two
/// bitmask flavors spec.md §4.4 calls out by name.
fn grab_button(owner_events: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let grab_window = reader.read_u32()?;
    let event_mask = reader.read_u16()? as u32;
    let pointer_mode = reader.read_u8()?;
    let keyboard_mode = reader.read_u8()?;
    let confine_to = reader.read_u32()?;
    let cursor = reader.read_u32()?;
    let button = reader.read_u8()?;
    reader.skip(1)?;
    let modifiers = reader.read_u16()? as u32;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("owner_events", (owner_events != 0).to_string())
        .field("grab_window", resource_id(grab_window, settings))
        .field("event_mask", crate::decoder::masks::event_mask(event_mask, settings))
        .field("pointer_mode", pointer_mode.to_string())
        .field("keyboard_mode", keyboard_mode.to_string())
        .field("confine_to", resource_id(confine_to, settings))
        .field("cursor", resource_id(cursor, settings))
        .field("button", button.to_string())
        .field("modifiers", set_of_keymask(modifiers, MODIFIER_NAMES, settings))
        .render())
}

fn empty_body(reader: &mut Reader) -> Result<String, Truncated> {
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok("{}".to_string())
}

fn drawable_only(reader: &mut Reader, settings: &Settings, field: &'static str) -> Result<String, Truncated> {
    let id = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline)).field(field, resource_id(id, settings)).render())
}

fn resource_only(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    drawable_only(reader, settings, "id")
}

fn atom_only(reader: &mut Reader, atoms: &AtomTable, settings: &Settings, field: &'static str) -> Result<String, Truncated> {
    let value = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline)).field(field, atom(value, atoms, None, settings)).render())
}

fn time_only(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let time = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline)).field("time", timestamp(time, settings)).render())
}

fn query_font(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    drawable_only(reader, settings, "font")
}

/// `odd_length` (the request's minor-opcode byte, bit 0) marks that the last
/// CHAR2B in the string is padding-only; the string itself is still read in
/// full 2-byte units since the trailing pad byte is already part of the
/// request's own 4-byte alignment, not a partial character.
fn query_text_extents(odd_length: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let font = reader.read_u32()?;
    let count = reader.remaining() / 2;
    let chars = list::fixed_count(reader, count, |r| Ok((r.read_u8()?, r.read_u8()?)))?;
    let rendered: Vec<String> = chars.iter().map(|(b1, b2)| crate::decoder::format::char2b(*b1, *b2)).collect();
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("font", resource_id(font, settings))
        .field("odd_length", (odd_length & 1 != 0).to_string())
        .field("string", render_list(Ws::root(false), &rendered))
        .render())
}

fn store_colors(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let cmap = reader.read_u32()?;
    let count = reader.remaining() / 12;
    let items = list::fixed_count(reader, count, |r| {
        let pixel = r.read_u32()?;
        let red = r.read_u16()?;
        let green = r.read_u16()?;
        let blue = r.read_u16()?;
        let flags = r.read_u8()?;
        r.skip(1)?;
        Ok((pixel, red, green, blue, flags))
    })?;
    let rendered: Vec<String> = items
        .iter()
        .map(|(pixel, r, g, b, flags)| format!("(0x{pixel:08x},{r},{g},{b},0x{flags:02x})"))
        .collect();
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("cmap", resource_id(cmap, settings))
        .field("items", render_list(Ws::root(false), &rendered))
        .render())
}

fn change_save_set(mode: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let window = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("mode", scalar(mode as u32, Some(&[(0, "Insert"), (1, "Delete")]), settings))
        .field("window", resource_id(window, settings))
        .render())
}

fn reparent_window(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let window = reader.read_u32()?;
    let parent = reader.read_u32()?;
    let x = reader.read_i16()?;
    let y = reader.read_i16()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("window", resource_id(window, settings))
        .field("parent", resource_id(parent, settings))
        .field("x", x.to_string())
        .field("y", y.to_string())
        .render())
}

fn circulate_window(direction: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let window = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("direction", scalar(direction as u32, Some(&[(0, "RaiseLowest"), (1, "LowerHighest")]), settings))
        .field("window", resource_id(window, settings))
        .render())
}

fn delete_property(reader: &mut Reader, atoms: &AtomTable, settings: &Settings) -> Result<String, Truncated> {
    let window = reader.read_u32()?;
    let property = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("window", resource_id(window, settings))
        .field("property", atom(property, atoms, None, settings))
        .render())
}

fn set_selection_owner(reader: &mut Reader, atoms: &AtomTable, settings: &Settings) -> Result<String, Truncated> {
    let owner = reader.read_u32()?;
    let selection = reader.read_u32()?;
    let time = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("owner", resource_id(owner, settings))
        .field("selection", atom(selection, atoms, None, settings))
        .field("time", timestamp(time, settings))
        .render())
}

fn convert_selection(reader: &mut Reader, atoms: &AtomTable, settings: &Settings) -> Result<String, Truncated> {
    let requestor = reader.read_u32()?;
    let selection = reader.read_u32()?;
    let target = reader.read_u32()?;
    let property = reader.read_u32()?;
    let time = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("requestor", resource_id(requestor, settings))
        .field("selection", atom(selection, atoms, None, settings))
        .field("target", atom(target, atoms, None, settings))
        .field("property", atom(property, atoms, Some(NONE_ATOM), settings))
        .field("time", timestamp(time, settings))
        .render())
}

fn grab_pointer(owner_events: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let grab_window = reader.read_u32()?;
    let event_mask = reader.read_u16()? as u32;
    let pointer_mode = reader.read_u8()?;
    let keyboard_mode = reader.read_u8()?;
    let confine_to = reader.read_u32()?;
    let cursor = reader.read_u32()?;
    let time = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("owner_events", (owner_events != 0).to_string())
        .field("grab_window", resource_id(grab_window, settings))
        .field("event_mask", crate::decoder::masks::event_mask(event_mask, settings))
        .field("pointer_mode", pointer_mode.to_string())
        .field("keyboard_mode", keyboard_mode.to_string())
        .field("confine_to", resource_id(confine_to, settings))
        .field("cursor", resource_id(cursor, settings))
        .field("time", timestamp(time, settings))
        .render())
}

fn ungrab_button(button: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let grab_window = reader.read_u32()?;
    let modifiers = reader.read_u16()? as u32;
    reader.skip(2)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("button", button.to_string())
        .field("grab_window", resource_id(grab_window, settings))
        .field("modifiers", set_of_keymask(modifiers, MODIFIER_NAMES, settings))
        .render())
}

fn change_active_pointer_grab(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let cursor = reader.read_u32()?;
    let time = reader.read_u32()?;
    let event_mask = reader.read_u16()? as u32;
    reader.skip(2)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("cursor", resource_id(cursor, settings))
        .field("time", timestamp(time, settings))
        .field("event_mask", crate::decoder::masks::event_mask(event_mask, settings))
        .render())
}

fn grab_keyboard(owner_events: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let grab_window = reader.read_u32()?;
    let time = reader.read_u32()?;
    let pointer_mode = reader.read_u8()?;
    let keyboard_mode = reader.read_u8()?;
    reader.skip(2)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("owner_events", (owner_events != 0).to_string())
        .field("grab_window", resource_id(grab_window, settings))
        .field("time", timestamp(time, settings))
        .field("pointer_mode", pointer_mode.to_string())
        .field("keyboard_mode", keyboard_mode.to_string())
        .render())
}

fn grab_key(owner_events: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let grab_window = reader.read_u32()?;
    let modifiers = reader.read_u16()? as u32;
    let key = reader.read_u8()?;
    let pointer_mode = reader.read_u8()?;
    let keyboard_mode = reader.read_u8()?;
    reader.skip(3)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("owner_events", (owner_events != 0).to_string())
        .field("grab_window", resource_id(grab_window, settings))
        .field("modifiers", set_of_keymask(modifiers, MODIFIER_NAMES, settings))
        .field("key", key.to_string())
        .field("pointer_mode", pointer_mode.to_string())
        .field("keyboard_mode", keyboard_mode.to_string())
        .render())
}

fn ungrab_key(key: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let grab_window = reader.read_u32()?;
    let modifiers = reader.read_u16()? as u32;
    reader.skip(2)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("key", key.to_string())
        .field("grab_window", resource_id(grab_window, settings))
        .field("modifiers", set_of_keymask(modifiers, MODIFIER_NAMES, settings))
        .render())
}

fn allow_events(mode: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let time = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field(
            "mode",
            scalar(
                mode as u32,
                Some(&[
                    (0, "AsyncPointer"),
                    (1, "SyncPointer"),
                    (2, "ReplayPointer"),
                    (3, "AsyncKeyboard"),
                    (4, "SyncKeyboard"),
                    (5, "ReplayKeyboard"),
                    (6, "AsyncBoth"),
                    (7, "SyncBoth"),
                ]),
                settings,
            ),
        )
        .field("time", timestamp(time, settings))
        .render())
}

fn get_motion_events(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let window = reader.read_u32()?;
    let start = reader.read_u32()?;
    let stop = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("window", resource_id(window, settings))
        .field("start", timestamp(start, settings))
        .field("stop", timestamp(stop, settings))
        .render())
}

fn translate_coordinates(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let src_window = reader.read_u32()?;
    let dst_window = reader.read_u32()?;
    let src_x = reader.read_i16()?;
    let src_y = reader.read_i16()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("src_window", resource_id(src_window, settings))
        .field("dst_window", resource_id(dst_window, settings))
        .field("src_x", src_x.to_string())
        .field("src_y", src_y.to_string())
        .render())
}

fn warp_pointer(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let src_window = reader.read_u32()?;
    let dst_window = reader.read_u32()?;
    let src_x = reader.read_i16()?;
    let src_y = reader.read_i16()?;
    let src_width = reader.read_u16()?;
    let src_height = reader.read_u16()?;
    let dst_x = reader.read_i16()?;
    let dst_y = reader.read_i16()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("src_window", resource_id(src_window, settings))
        .field("dst_window", resource_id(dst_window, settings))
        .field("src_x", src_x.to_string())
        .field("src_y", src_y.to_string())
        .field("src_width", src_width.to_string())
        .field("src_height", src_height.to_string())
        .field("dst_x", dst_x.to_string())
        .field("dst_y", dst_y.to_string())
        .render())
}

fn set_input_focus(revert_to: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let focus = reader.read_u32()?;
    let time = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("revert_to", scalar(revert_to as u32, Some(&[(0, "None"), (1, "PointerRoot"), (2, "Parent")]), settings))
        .field("focus", resource_id(focus, settings))
        .field("time", timestamp(time, settings))
        .render())
}

fn list_fonts(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let max_names = reader.read_u16()?;
    let pattern_len = reader.read_u16()? as usize;
    let pattern = reader.read_str_lossy(pattern_len)?;
    reader.skip(crate::decoder::align::pad(pattern_len) - pattern_len)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("max_names", max_names.to_string())
        .field("pattern", format!("{:?}", pattern))
        .render())
}

fn set_font_path(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let path_count = reader.read_u16()? as usize;
    reader.skip(2)?;
    let start = reader.offset();
    let total = reader.remaining();
    let paths = list::byte_bounded(reader, start, total, |r| {
        let len = r.read_u8()? as usize;
        r.read_str_lossy(len)
    })?;
    let rendered: Vec<String> = paths.iter().map(|p| format!("{:?}", p)).collect();
    reader.skip(reader.remaining())?; // trailing alignment padding, if any
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("path_count", path_count.to_string())
        .field("path", render_list(Ws::root(false), &rendered))
        .render())
}

fn create_pixmap(depth: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let pid = reader.read_u32()?;
    let drawable = reader.read_u32()?;
    let width = reader.read_u16()?;
    let height = reader.read_u16()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("depth", depth.to_string())
        .field("pid", resource_id(pid, settings))
        .field("drawable", resource_id(drawable, settings))
        .field("width", width.to_string())
        .field("height", height.to_string())
        .render())
}

fn clear_area(exposures: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let window = reader.read_u32()?;
    let x = reader.read_i16()?;
    let y = reader.read_i16()?;
    let width = reader.read_u16()?;
    let height = reader.read_u16()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("exposures", (exposures != 0).to_string())
        .field("window", resource_id(window, settings))
        .field("x", x.to_string())
        .field("y", y.to_string())
        .field("width", width.to_string())
        .field("height", height.to_string())
        .render())
}

fn copy_area_or_plane(opcode: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let src_drawable = reader.read_u32()?;
    let dst_drawable = reader.read_u32()?;
    let gc = reader.read_u32()?;
    let src_x = reader.read_i16()?;
    let src_y = reader.read_i16()?;
    let dst_x = reader.read_i16()?;
    let dst_y = reader.read_i16()?;
    let width = reader.read_u16()?;
    let height = reader.read_u16()?;
    let s = Struct::new(Ws::root(settings.multiline))
        .field("src_drawable", resource_id(src_drawable, settings))
        .field("dst_drawable", resource_id(dst_drawable, settings))
        .field("gc", resource_id(gc, settings))
        .field("src_x", src_x.to_string())
        .field("src_y", src_y.to_string())
        .field("dst_x", dst_x.to_string())
        .field("dst_y", dst_y.to_string())
        .field("width", width.to_string())
        .field("height", height.to_string());
    if opcode == 63 {
        let bit_plane = reader.read_u32()?;
        Ok(s.field("bit_plane", format!("0x{:08x}", bit_plane)).render())
    } else {
        Ok(s.render())
    }
}

fn poly_point_or_line(coordinate_mode: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let drawable = reader.read_u32()?;
    let gc = reader.read_u32()?;
    let count = reader.remaining() / 4;
    let points = list::fixed_count(reader, count, |r| Ok((r.read_i16()?, r.read_i16()?)))?;
    let rendered: Vec<String> = points.iter().map(|(x, y)| format!("({x},{y})")).collect();
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("coordinate_mode", scalar(coordinate_mode as u32, Some(&[(0, "Origin"), (1, "Previous")]), settings))
        .field("drawable", resource_id(drawable, settings))
        .field("gc", resource_id(gc, settings))
        .field("points", render_list(Ws::root(false), &rendered))
        .render())
}

fn poly_segment(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let drawable = reader.read_u32()?;
    let gc = reader.read_u32()?;
    let count = reader.remaining() / 8;
    let segments =
        list::fixed_count(reader, count, |r| Ok((r.read_i16()?, r.read_i16()?, r.read_i16()?, r.read_i16()?)))?;
    let rendered: Vec<String> = segments.iter().map(|(x1, y1, x2, y2)| format!("({x1},{y1})-({x2},{y2})")).collect();
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("drawable", resource_id(drawable, settings))
        .field("gc", resource_id(gc, settings))
        .field("segments", render_list(Ws::root(false), &rendered))
        .render())
}

fn poly_rectangle(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let drawable = reader.read_u32()?;
    let gc = reader.read_u32()?;
    let count = reader.remaining() / 8;
    let rects = list::fixed_count(reader, count, |r| {
        Ok((r.read_i16()?, r.read_i16()?, r.read_u16()?, r.read_u16()?))
    })?;
    let rendered: Vec<String> = rects.iter().map(|(x, y, w, h)| format!("({x},{y},{w}x{h})")).collect();
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("drawable", resource_id(drawable, settings))
        .field("gc", resource_id(gc, settings))
        .field("rectangles", render_list(Ws::root(false), &rendered))
        .render())
}

fn poly_arc(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let drawable = reader.read_u32()?;
    let gc = reader.read_u32()?;
    let count = reader.remaining() / 12;
    let arcs = list::fixed_count(reader, count, |r| {
        Ok((r.read_i16()?, r.read_i16()?, r.read_u16()?, r.read_u16()?, r.read_i16()?, r.read_i16()?))
    })?;
    let rendered: Vec<String> = arcs
        .iter()
        .map(|(x, y, w, h, a1, a2)| format!("({x},{y},{w}x{h},{a1}..{a2})"))
        .collect();
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("drawable", resource_id(drawable, settings))
        .field("gc", resource_id(gc, settings))
        .field("arcs", render_list(Ws::root(false), &rendered))
        .render())
}

fn fill_poly(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let drawable = reader.read_u32()?;
    let gc = reader.read_u32()?;
    let shape = reader.read_u8()?;
    let coordinate_mode = reader.read_u8()?;
    reader.skip(2)?;
    let count = reader.remaining() / 4;
    let points = list::fixed_count(reader, count, |r| Ok((r.read_i16()?, r.read_i16()?)))?;
    let rendered: Vec<String> = points.iter().map(|(x, y)| format!("({x},{y})")).collect();
    Ok(Struct::new(Ws::root(settings.multiline))
        .field(
            "shape",
            scalar(shape as u32, Some(&[(0, "Complex"), (1, "Nonconvex"), (2, "Convex")]), settings),
        )
        .field("coordinate_mode", scalar(coordinate_mode as u32, Some(&[(0, "Origin"), (1, "Previous")]), settings))
        .field("drawable", resource_id(drawable, settings))
        .field("gc", resource_id(gc, settings))
        .field("points", render_list(Ws::root(false), &rendered))
        .render())
}

fn get_image(format: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let drawable = reader.read_u32()?;
    let x = reader.read_i16()?;
    let y = reader.read_i16()?;
    let width = reader.read_u16()?;
    let height = reader.read_u16()?;
    let plane_mask = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("format", scalar(format as u32, Some(&[(1, "XYPixmap"), (2, "ZPixmap")]), settings))
        .field("drawable", resource_id(drawable, settings))
        .field("x", x.to_string())
        .field("y", y.to_string())
        .field("width", width.to_string())
        .field("height", height.to_string())
        .field("plane_mask", format!("0x{:08x}", plane_mask))
        .render())
}

fn create_colormap(alloc: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let mid = reader.read_u32()?;
    let window = reader.read_u32()?;
    let visual = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("alloc", scalar(alloc as u32, Some(&[(0, "None"), (1, "All")]), settings))
        .field("mid", resource_id(mid, settings))
        .field("window", resource_id(window, settings))
        .field("visual", resource_id(visual, settings))
        .render())
}

fn copy_colormap_and_free(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let mid = reader.read_u32()?;
    let src_cmap = reader.read_u32()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("mid", resource_id(mid, settings))
        .field("src_cmap", resource_id(src_cmap, settings))
        .render())
}

fn alloc_color(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let cmap = reader.read_u32()?;
    let red = reader.read_u16()?;
    let green = reader.read_u16()?;
    let blue = reader.read_u16()?;
    reader.skip(2)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("cmap", resource_id(cmap, settings))
        .field("red", red.to_string())
        .field("green", green.to_string())
        .field("blue", blue.to_string())
        .render())
}

fn alloc_named_color(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let cmap = reader.read_u32()?;
    let name_len = reader.read_u16()? as usize;
    reader.skip(2)?;
    let name = reader.read_str_lossy(name_len)?;
    reader.skip(crate::decoder::align::pad(name_len) - name_len)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("cmap", resource_id(cmap, settings))
        .field("name", format!("{:?}", name))
        .render())
}

fn free_colors(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let cmap = reader.read_u32()?;
    let plane_mask = reader.read_u32()?;
    let count = reader.remaining() / 4;
    let pixels = list::fixed_count(reader, count, |r| r.read_u32())?;
    let rendered: Vec<String> = pixels.iter().map(|p| format!("0x{:08x}", p)).collect();
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("cmap", resource_id(cmap, settings))
        .field("plane_mask", format!("0x{:08x}", plane_mask))
        .field("pixels", render_list(Ws::root(false), &rendered))
        .render())
}

fn store_named_color(flags: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let cmap = reader.read_u32()?;
    let pixel = reader.read_u32()?;
    let name_len = reader.read_u16()? as usize;
    reader.skip(2)?;
    let name = reader.read_str_lossy(name_len)?;
    reader.skip(crate::decoder::align::pad(name_len) - name_len)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("flags", format!("0x{:02x}", flags))
        .field("cmap", resource_id(cmap, settings))
        .field("pixel", format!("0x{:08x}", pixel))
        .field("name", format!("{:?}", name))
        .render())
}

fn query_colors(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let cmap = reader.read_u32()?;
    let count = reader.remaining() / 4;
    let pixels = list::fixed_count(reader, count, |r| r.read_u32())?;
    let rendered: Vec<String> = pixels.iter().map(|p| format!("0x{:08x}", p)).collect();
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("cmap", resource_id(cmap, settings))
        .field("pixels", render_list(Ws::root(false), &rendered))
        .render())
}

fn lookup_color(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let cmap = reader.read_u32()?;
    let name_len = reader.read_u16()? as usize;
    reader.skip(2)?;
    let name = reader.read_str_lossy(name_len)?;
    reader.skip(crate::decoder::align::pad(name_len) - name_len)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("cmap", resource_id(cmap, settings))
        .field("name", format!("{:?}", name))
        .render())
}

fn create_glyph_cursor(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let cid = reader.read_u32()?;
    let source_font = reader.read_u32()?;
    let mask_font = reader.read_u32()?;
    let source_char = reader.read_u16()?;
    let mask_char = reader.read_u16()?;
    let fore_red = reader.read_u16()?;
    let fore_green = reader.read_u16()?;
    let fore_blue = reader.read_u16()?;
    let back_red = reader.read_u16()?;
    let back_green = reader.read_u16()?;
    let back_blue = reader.read_u16()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("cid", resource_id(cid, settings))
        .field("source_font", resource_id(source_font, settings))
        .field("mask_font", resource_id(mask_font, settings))
        .field("source_char", source_char.to_string())
        .field("mask_char", mask_char.to_string())
        .field("fore_rgb", format!("#{fore_red:04x}{fore_green:04x}{fore_blue:04x}"))
        .field("back_rgb", format!("#{back_red:04x}{back_green:04x}{back_blue:04x}"))
        .render())
}

fn recolor_cursor(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let cursor = reader.read_u32()?;
    let fore_red = reader.read_u16()?;
    let fore_green = reader.read_u16()?;
    let fore_blue = reader.read_u16()?;
    let back_red = reader.read_u16()?;
    let back_green = reader.read_u16()?;
    let back_blue = reader.read_u16()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("cursor", resource_id(cursor, settings))
        .field("fore_rgb", format!("#{fore_red:04x}{fore_green:04x}{fore_blue:04x}"))
        .field("back_rgb", format!("#{back_red:04x}{back_green:04x}{back_blue:04x}"))
        .render())
}

fn change_hosts(mode: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let family = reader.read_u8()?;
    reader.skip(1)?;
    let address_len = reader.read_u16()? as usize;
    let address = reader.read_bytes(address_len)?.to_vec();
    reader.skip(crate::decoder::align::pad(address_len) - address_len)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("mode", scalar(mode as u32, Some(&[(0, "Insert"), (1, "Delete")]), settings))
        .field("family", scalar(family as u32, Some(&[(0, "Internet"), (1, "DECnet"), (2, "Chaos"), (6, "InternetV6")]), settings))
        .field("address", format!("{:02x?}", address))
        .render())
}

fn rotate_properties(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let window = reader.read_u32()?;
    let count = reader.read_u16()? as usize;
    let delta = reader.read_i16()?;
    let properties = list::fixed_count(reader, count, |r| r.read_u32())?;
    let rendered: Vec<String> = properties.iter().map(|a| format!("0x{:08x}", a)).collect();
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("window", resource_id(window, settings))
        .field("delta", delta.to_string())
        .field("properties", render_list(Ws::root(false), &rendered))
        .render())
}

fn create_cursor(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let cid = reader.read_u32()?;
    let source = reader.read_u32()?;
    let mask = reader.read_u32()?;
    let fore_red = reader.read_u16()?;
    let fore_green = reader.read_u16()?;
    let fore_blue = reader.read_u16()?;
    let back_red = reader.read_u16()?;
    let back_green = reader.read_u16()?;
    let back_blue = reader.read_u16()?;
    let x = reader.read_u16()?;
    let y = reader.read_u16()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("cid", resource_id(cid, settings))
        .field("source", resource_id(source, settings))
        .field("mask", resource_id(mask, settings))
        .field("fore_rgb", format!("#{fore_red:04x}{fore_green:04x}{fore_blue:04x}"))
        .field("back_rgb", format!("#{back_red:04x}{back_green:04x}{back_blue:04x}"))
        .field("x", x.to_string())
        .field("y", y.to_string())
        .render())
}

fn query_best_size(class: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let drawable = reader.read_u32()?;
    let width = reader.read_u16()?;
    let height = reader.read_u16()?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("class", scalar(class as u32, Some(&[(0, "Cursor"), (1, "Tile"), (2, "Stipple")]), settings))
        .field("drawable", resource_id(drawable, settings))
        .field("width", width.to_string())
        .field("height", height.to_string())
        .render())
}

fn change_keyboard_mapping(keycode_count: u8, reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let first_keycode = reader.read_u8()?;
    let keysyms_per_keycode = reader.read_u8()?;
    reader.skip(2)?;
    let count = keycode_count as usize * keysyms_per_keycode as usize;
    let keysyms = list::fixed_count(reader, count, |r| r.read_u32())?;
    let rendered: Vec<String> = keysyms.iter().map(|k| keysym(*k)).collect();
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("first_keycode", first_keycode.to_string())
        .field("keysyms_per_keycode", keysyms_per_keycode.to_string())
        .field("keysyms", render_list(Ws::root(false), &rendered))
        .render())
}

fn get_keyboard_mapping_request(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let first_keycode = reader.read_u8()?;
    let count = reader.read_u8()?;
    reader.skip(2)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("first_keycode", first_keycode.to_string())
        .field("count", count.to_string())
        .render())
}

fn bell(percent: u8) -> Result<String, Truncated> {
    Ok(Struct::new(Ws::root(false)).field("percent", (percent as i8).to_string()).render())
}

fn change_pointer_control(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let accel_numerator = reader.read_i16()?;
    let accel_denominator = reader.read_i16()?;
    let threshold = reader.read_i16()?;
    let do_accel = reader.read_u8()? != 0;
    let do_threshold = reader.read_u8()? != 0;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("accel_numerator", accel_numerator.to_string())
        .field("accel_denominator", accel_denominator.to_string())
        .field("threshold", threshold.to_string())
        .field("do_accel", do_accel.to_string())
        .field("do_threshold", do_threshold.to_string())
        .render())
}

fn set_screen_saver(reader: &mut Reader, settings: &Settings) -> Result<String, Truncated> {
    let timeout = reader.read_i16()?;
    let interval = reader.read_i16()?;
    let prefer_blanking = reader.read_u8()?;
    let allow_exposures = reader.read_u8()?;
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok(Struct::new(Ws::root(settings.multiline))
        .field("timeout", timeout.to_string())
        .field("interval", interval.to_string())
        .field("prefer_blanking", scalar(prefer_blanking as u32, Some(&[(0, "No"), (1, "Yes"), (2, "Default")]), settings))
        .field("allow_exposures", scalar(allow_exposures as u32, Some(&[(0, "No"), (1, "Yes"), (2, "Default")]), settings))
        .render())
}

fn set_access_control(mode: u8) -> Result<String, Truncated> {
    Ok(Struct::new(Ws::root(false))
        .field("mode", if mode == 0 { "Disable".to_string() } else { "Enable".to_string() })
        .render())
}

fn set_close_down_mode(mode: u8) -> Result<String, Truncated> {
    let names: NameTable = &[(0, "Destroy"), (1, "RetainPermanent"), (2, "RetainTemporary")];
    Ok(Struct::new(Ws::root(false)).field("mode", scalar(mode as u32, Some(names), &Settings::default())).render())
}

fn force_screen_saver(mode: u8) -> Result<String, Truncated> {
    Ok(Struct::new(Ws::root(false))
        .field("mode", if mode == 0 { "Reset".to_string() } else { "Activate".to_string() })
        .render())
}

fn set_pointer_mapping(map_len: u8, reader: &mut Reader) -> Result<String, Truncated> {
    let n = map_len as usize;
    let map = list::fixed_count(reader, n, |r| r.read_u8())?;
    reader.skip(crate::decoder::align::pad(n) - n)?;
    Ok(Struct::new(Ws::root(false))
        .field("map", render_list(Ws::root(false), &map.iter().map(|b| b.to_string()).collect::<Vec<_>>()))
        .render())
}

fn set_modifier_mapping(keycodes_per_modifier: u8, reader: &mut Reader) -> Result<String, Truncated> {
    let count = 8 * keycodes_per_modifier as usize;
    let keycodes = list::fixed_count(reader, count, |r| r.read_u8())?;
    Ok(Struct::new(Ws::root(false))
        .field("keycodes_per_modifier", keycodes_per_modifier.to_string())
        .field(
            "keycodes",
            render_list(Ws::root(false), &keycodes.iter().map(|b| b.to_string()).collect::<Vec<_>>()),
        )
        .render())
}

fn no_operation(reader: &mut Reader) -> Result<String, Truncated> {
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok("{}".to_string())
}

/// `BigReqEnable` (BIG-REQUESTS extension, opcode assigned at activation
/// time; 133 is its conventional value and is only reached once the
/// extension table has routed here). Carries no fields beyond the header.
fn big_req_enable(reader: &mut Reader) -> Result<String, Truncated> {
    let n = reader.remaining();
    reader.read_bytes(n)?;
    Ok("{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::byteorder::ByteOrder;

    #[test]
    fn intern_atom_request_stashes_name_s1() {
        let mut conn = Connection::new(1);
        let seq = conn.next_sequence();
        let mut data = vec![0u8, 0, 0, 12, 0, 0];
        data.extend_from_slice(b"WM_PROTOCOLS");
        let mut r = Reader::new(&data, ByteOrder::Little);
        let settings = Settings::default();
        let out = intern_atom(&mut r, &mut conn, seq, &settings).unwrap();
        assert!(out.contains("WM_PROTOCOLS"));
        match conn.take_stash(seq) {
            Some(Stash::InternAtomName(n)) => assert_eq!(n, "WM_PROTOCOLS"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn opaque_fallback_consumes_remaining_bytes() {
        let data = [0u8; 16];
        let mut r = Reader::new(&data, ByteOrder::Little);
        let out = opaque(&mut r).unwrap();
        assert_eq!(out, "<16 bytes>");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn name_table_resolves_intern_atom() {
        assert_eq!(name(16), "InternAtom");
        assert_eq!(name(200), "Unknown200");
    }

    /// S5: SendEvent carrying a synthetic Expose payload renders the inner
    /// event annotated `(generated)`.
    #[test]
    fn send_event_recurses_into_event_dispatcher_s5() {
        let atoms = AtomTable::new();
        let settings = Settings::default();
        let mut data = vec![1u8, 0, 0]; // propagate=true, pad(2)
        data.extend_from_slice(&0x0000_0042u32.to_le_bytes()); // destination window
        data.extend_from_slice(&0x0000_8000u32.to_le_bytes()); // event_mask = Exposure
        let mut event = vec![0u8; 32]; // exactly one 32-byte event payload
        event[0] = 12; // Expose
        event[4..8].copy_from_slice(&0x0000_0042u32.to_le_bytes()); // window, inside the unused+seq+window prefix
        data.extend_from_slice(&event);

        let mut r = Reader::new(&data, ByteOrder::Little);
        let out = send_event(&mut r, &atoms, &settings, Ws::root(false)).unwrap();
        assert!(out.contains("(generated)"));
        assert_eq!(r.remaining(), 0);
    }

    /// S3: a BIG-REQUESTS-mode request whose extended 4-byte length is
    /// parsed instead of the (zeroed) 2-byte header field. Covered at the
    /// dispatch layer since that's where the extended-length branch lives;
    /// see `decoder::dispatch::tests`.
    #[test]
    fn big_req_enable_consumes_remaining_bytes() {
        let data = [0u8; 0];
        let mut r = Reader::new(&data, ByteOrder::Little);
        assert_eq!(big_req_enable(&mut r).unwrap(), "{}");
    }

    /// S6: `GrabButton`'s `modifiers` field short-circuits to `AnyModifier`
    /// rather than decomposing bit-by-bit.
    #[test]
    fn grab_button_renders_any_modifier() {
        let settings = Settings::default();
        let mut data = vec![];
        data.extend_from_slice(&0x0000_0042u32.to_le_bytes()); // grab-window
        data.extend_from_slice(&0x0000_0004u16.to_le_bytes()); // event-mask: ButtonPress
        data.push(1); // pointer-mode
        data.push(1); // keyboard-mode
        data.extend_from_slice(&0u32.to_le_bytes()); // confine-to: None
        data.extend_from_slice(&0u32.to_le_bytes()); // cursor: None
        data.push(0); // button: AnyButton
        data.push(0); // unused
        data.extend_from_slice(&0x8000u16.to_le_bytes()); // modifiers: AnyModifier

        let mut r = Reader::new(&data, ByteOrder::Little);
        let out = grab_button(1, &mut r, &settings).unwrap();
        assert!(out.contains("AnyModifier"));
        assert!(out.contains("ButtonPress") || out.contains("BUTTON_PRESS"));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn query_text_extents_reads_char2b_string() {
        let settings = Settings::default();
        let mut data = vec![];
        data.extend_from_slice(&0x0000_0051u32.to_le_bytes()); // font
        data.extend_from_slice(&[0x00, 0x41, 0x00, 0x42]); // "AB" as CHAR2B pairs
        let mut r = Reader::new(&data, ByteOrder::Little);
        let out = query_text_extents(0, &mut r, &settings).unwrap();
        assert!(out.contains("0x0041"));
        assert!(out.contains("0x0042"));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn store_colors_reads_coloritem_list() {
        let settings = Settings::default();
        let mut data = vec![];
        data.extend_from_slice(&0x0000_0060u32.to_le_bytes()); // cmap
        data.extend_from_slice(&0x0000_00ffu32.to_le_bytes()); // pixel
        data.extend_from_slice(&0xffffu16.to_le_bytes()); // red
        data.extend_from_slice(&0x0000u16.to_le_bytes()); // green
        data.extend_from_slice(&0x0000u16.to_le_bytes()); // blue
        data.push(0x07); // flags: R|G|B
        data.push(0); // unused
        let mut r = Reader::new(&data, ByteOrder::Little);
        let out = store_colors(&mut r, &settings).unwrap();
        assert!(out.contains("65535"));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn poly_segment_renders_endpoint_pairs() {
        let settings = Settings::default();
        let mut data = vec![];
        data.extend_from_slice(&0x0000_0010u32.to_le_bytes()); // drawable
        data.extend_from_slice(&0x0000_0011u32.to_le_bytes()); // gc
        data.extend_from_slice(&0i16.to_le_bytes());
        data.extend_from_slice(&0i16.to_le_bytes());
        data.extend_from_slice(&10i16.to_le_bytes());
        data.extend_from_slice(&10i16.to_le_bytes());
        let mut r = Reader::new(&data, ByteOrder::Little);
        let out = poly_segment(&mut r, &settings).unwrap();
        assert!(out.contains("(0,0)-(10,10)"));
        assert_eq!(r.remaining(), 0);
    }
}
