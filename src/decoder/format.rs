//! Whitespace/format context (spec.md §4.3) and the value formatter (§4.4).
//!
//! There is no teacher file that does this directly — rxserver renders
//! protocol state for its own server bookkeeping, not for a trace a human
//! reads — so this module is newly written, but it follows the teacher's
//! general shape elsewhere in the tree: small immutable value types with
//! `Copy`/`Clone`, `is_*`/`with_*`-style builder methods (`core/args.rs`,
//! `protocol/endianness.rs`), and free functions over struct methods when
//! there's no state to own.

use std::collections::HashMap;

use crate::decoder::atoms::AtomTable;
use crate::settings::Settings;

/// `(wire value, name)` table for an enum-like field, or for a single flag
/// bit in a bitmask field (value there is the bit's mask, e.g. `0x0002`).
pub type NameTable = &'static [(u32, &'static str)];

/// Immutable rendering context at one nesting depth (spec.md §4.3).
#[derive(Debug, Clone, Copy)]
pub struct Ws {
    depth: usize,
    multiline: bool,
}

impl Ws {
    pub fn root(multiline: bool) -> Self {
        Ws { depth: 0, multiline }
    }

    /// Next-deeper context. `force_singleline` collapses this sub-tree to
    /// single-line regardless of the root's setting (used for LISTs of
    /// scalars nested inside a structured parent).
    pub fn nested(&self, force_singleline: bool) -> Self {
        Ws {
            depth: self.depth + 1,
            multiline: self.multiline && !force_singleline,
        }
    }

    pub fn multiline(&self) -> bool {
        self.multiline
    }

    fn enclosure_indent(&self) -> String {
        "  ".repeat(self.depth)
    }

    fn member_indent(&self) -> String {
        "  ".repeat(self.depth + 1)
    }

    fn eq_token(&self) -> &'static str {
        if self.multiline { " = " } else { "=" }
    }

    fn sep_token(&self) -> &'static str {
        if self.multiline { "\n" } else { " " }
    }
}

/// Accumulates named members for one brace-delimited record and renders
/// them per spec.md §4.4's "simple structs" rule: multiline column-aligns
/// field names to the longest one, single-line does not.
pub struct Struct {
    ws: Ws,
    fields: Vec<(&'static str, String)>,
}

impl Struct {
    pub fn new(ws: Ws) -> Self {
        Struct { ws, fields: Vec::new() }
    }

    pub fn field(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((name, value.into()));
        self
    }

    pub fn field_if(self, include: bool, name: &'static str, value: impl Into<String>) -> Self {
        if include { self.field(name, value) } else { self }
    }

    pub fn render(self) -> String {
        if self.fields.is_empty() {
            return "{}".to_string();
        }
        let width = if self.ws.multiline() {
            self.fields.iter().map(|(n, _)| n.len()).max().unwrap_or(0)
        } else {
            0
        };
        let sep = self.ws.sep_token();
        let eq = self.ws.eq_token();
        let member_indent = if self.ws.multiline() { self.ws.member_indent() } else { String::new() };

        let mut body = String::new();
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                body.push_str(sep);
            }
            body.push_str(&member_indent);
            body.push_str(name);
            for _ in name.len()..width {
                body.push(' ');
            }
            body.push_str(eq);
            body.push_str(value);
        }

        if self.ws.multiline() {
            format!("{{\n{}\n{}}}", body, self.ws.enclosure_indent())
        } else {
            format!("{{ {} }}", body)
        }
    }
}

/// Render a homogeneous list body, given already-formatted elements
/// (spec.md §4.5 delegates element formatting to the caller and only
/// decides the brackets/separators here).
pub fn render_list(ws: Ws, elements: &[String]) -> String {
    if elements.is_empty() {
        return "[]".to_string();
    }
    if ws.multiline() {
        let indent = ws.member_indent();
        let body: Vec<String> = elements.iter().map(|e| format!("{indent}{e}")).collect();
        format!("[\n{}\n{}]", body.join(",\n"), ws.enclosure_indent())
    } else {
        format!("[{}]", elements.join(", "))
    }
}

fn hex(value: u32) -> String {
    format!("0x{:08x}", value)
}

/// Unknown scalar / enum-named scalar (spec.md §4.4): `0x12(18)` or
/// `0x12(NamedValue)`.
pub fn scalar(value: u32, table: Option<NameTable>, settings: &Settings) -> String {
    let name = table.and_then(|t| t.iter().find(|(v, _)| *v == value).map(|(_, n)| *n));
    match (name, settings.verbose) {
        (Some(n), true) => format!("{}({})", hex(value), n),
        (Some(n), false) => n.to_string(),
        (None, true) => format!("{}({})", hex(value), value),
        (None, false) => format!("{}", value),
    }
}

/// Bitmask decomposition (spec.md §4.4): `0x12(FlagA,FlagC)`, bits
/// enumerated in ascending order. Terse mode drops the hex prefix when at
/// least one flag matched.
pub fn bitmask(value: u32, flags: NameTable, settings: &Settings) -> String {
    let mut matched: Vec<&'static str> = flags
        .iter()
        .filter(|(bit, _)| value & bit == *bit && *bit != 0)
        .map(|(_, name)| *name)
        .collect();
    matched.sort_by_key(|name| flags.iter().find(|(_, n)| n == name).map(|(b, _)| *b).unwrap_or(0));

    if matched.is_empty() {
        return scalar(value, None, settings);
    }
    let list = matched.join(",");
    if settings.verbose {
        format!("{}({})", hex(value), list)
    } else {
        list
    }
}

/// Which resource-id type a value is, purely for the top-3-bits-zero
/// assertion spec.md §4.4 requires (`WINDOW`, `ATOM`, `FONT`, `GCONTEXT`,
/// `COLORMAP`, `CURSOR`, `PIXMAP`, and the `DRAWABLE`/`FONTABLE` unions).
pub fn resource_id(value: u32, settings: &Settings) -> String {
    debug_assert_eq!(value & 0xE000_0000, 0, "resource id top 3 bits must be zero");
    scalar(value, None, settings)
}

/// ATOM: after the integer rendering, append `(name)` from the interned
/// table unless a contextual enum already covered it (spec.md §4.4).
pub fn atom(value: u32, atoms: &AtomTable, contextual: Option<NameTable>, settings: &Settings) -> String {
    if value == 0 {
        return scalar(value, contextual, settings);
    }
    if let Some(table) = contextual {
        if table.iter().any(|(v, _)| *v == value) {
            return scalar(value, contextual, settings);
        }
    }
    let rendered = scalar(value, None, settings);
    match atoms.lookup(value) {
        Some(name) => format!("{}({})", rendered, name),
        None => rendered,
    }
}

/// TIMESTAMP: always hex; optionally appends a wall-clock rendering
/// computed from `settings.reference_tick`/`reference_unix_time` (1000
/// ticks/second, per spec.md §4.4).
pub fn timestamp(value: u32, settings: &Settings) -> String {
    if !settings.relative_timestamps {
        return hex(value);
    }
    let delta_ms = value as i64 - settings.reference_tick as i64;
    let unix_ms = settings.reference_unix_time * 1000 + delta_ms;
    match chrono::DateTime::from_timestamp_millis(unix_ms) {
        Some(dt) => format!("{}({})", hex(value), dt.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
        None => hex(value),
    }
}

/// `AnyModifier` (0x8000) short-circuits SETofKEYMASK decomposition
/// (spec.md §4.4).
pub const ANY_MODIFIER: u32 = 0x8000;

pub fn set_of_keymask(value: u32, flags: NameTable, settings: &Settings) -> String {
    if value == ANY_MODIFIER {
        return "AnyModifier".to_string();
    }
    debug_assert_eq!(value & !0x9fff, 0, "SETofKEYMASK reserved bits must be zero");
    bitmask(value, flags, settings)
}

/// Generic SETofEVENT decomposition against a caller-supplied flag table and
/// reserved-bit mask. The one fixed core-protocol event-mask (requests'
/// `event-mask`/`do-not-propagate-mask` VALUE entries, and events' `state`
/// field) goes through `decoder::masks::event_mask` instead, which has the
/// fixed flag table as a real `bitflags!` type; this function is here for an
/// extension-defined SETofEVENT-shaped field with its own flag table.
pub fn set_of_event(value: u32, flags: NameTable, reserved_mask: u32, settings: &Settings) -> String {
    debug_assert_eq!(value & reserved_mask, 0, "SETofEVENT reserved bits must be zero");
    bitmask(value, flags, settings)
}

/// KEYSYM, CHAR2B: hex, no enum lookup (spec.md §4.4).
pub fn keysym(value: u32) -> String {
    format!("0x{:08x}", value)
}

pub fn char2b(b1: u8, b2: u8) -> String {
    format!("0x{:02x}{:02x}", b1, b2)
}

/// LISTofVALUE schema entry: bit position, field name, and how to render
/// the 4-byte VALUE once the bit is found set (spec.md §4.5).
pub struct ValueField {
    pub bit: u32,
    pub name: &'static str,
    pub render: fn(u32, &AtomTable, &Settings) -> String,
}

pub fn render_plain_u32(v: u32, _atoms: &AtomTable, settings: &Settings) -> String {
    scalar(v, None, settings)
}

pub fn render_bool_u32(v: u32, _atoms: &AtomTable, settings: &Settings) -> String {
    scalar(v, Some(&[(0, "False"), (1, "True")]), settings)
}

pub fn render_pixmap_u32(v: u32, _atoms: &AtomTable, settings: &Settings) -> String {
    resource_id(v, settings)
}

pub fn render_colormap_u32(v: u32, _atoms: &AtomTable, settings: &Settings) -> String {
    resource_id(v, settings)
}

pub fn render_cursor_u32(v: u32, _atoms: &AtomTable, settings: &Settings) -> String {
    resource_id(v, settings)
}

/// Parse a LISTofVALUE tail: for each bit set in `mask` (ascending order),
/// consume 4 bytes and format via the schema entry for that bit.
pub fn list_of_value(
    reader: &mut crate::decoder::byteorder::Reader,
    mask: u32,
    schema: &[ValueField],
    atoms: &AtomTable,
    settings: &Settings,
    ws: Ws,
) -> Result<String, crate::decoder::byteorder::Truncated> {
    let mut present: Vec<&ValueField> = schema.iter().filter(|f| mask & f.bit != 0).collect();
    present.sort_by_key(|f| f.bit);

    let mut rendered = Vec::with_capacity(present.len());
    for field in present {
        let raw = reader.read_u32()?;
        rendered.push(format!("{}={}", field.name, (field.render)(raw, atoms, settings)));
    }
    Ok(render_list(ws.nested(true), &rendered))
}

/// Lookup table used when rendering extension names inline (e.g. opaque
/// logging of unregistered extension traffic, spec.md §7).
pub type ExtensionNames = HashMap<u8, &'static str>;

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(verbose: bool) -> Settings {
        let mut s = Settings::default();
        s.verbose = verbose;
        s
    }

    #[test]
    fn scalar_unknown_is_hex_and_decimal_when_verbose() {
        assert_eq!(scalar(18, None, &settings(true)), "0x00000012(18)");
        assert_eq!(scalar(18, None, &settings(false)), "18");
    }

    #[test]
    fn scalar_named_drops_hex_in_terse_mode() {
        let table: NameTable = &[(18, "NamedValue")];
        assert_eq!(scalar(18, Some(table), &settings(true)), "0x00000012(NamedValue)");
        assert_eq!(scalar(18, Some(table), &settings(false)), "NamedValue");
    }

    #[test]
    fn bitmask_ascending_order_s6() {
        // S6: value_mask bits for BackgroundPixmap (bit0) + BorderPixmap (bit2).
        let flags: NameTable = &[
            (0x0001, "BackgroundPixmap"),
            (0x0002, "BackgroundPixel"),
            (0x0004, "BorderPixmap"),
        ];
        let out = bitmask(0b101, flags, &settings(true));
        assert_eq!(out, "0x00000005(BackgroundPixmap,BorderPixmap)");
    }

    #[test]
    fn keymask_any_modifier_short_circuits() {
        let flags: NameTable = &[(1, "Shift"), (2, "Lock")];
        assert_eq!(set_of_keymask(ANY_MODIFIER, flags, &settings(true)), "AnyModifier");
    }

    #[test]
    fn atom_appends_interned_name() {
        let mut atoms = AtomTable::new();
        atoms.insert(0x0123, "WM_PROTOCOLS");
        assert_eq!(atom(0x0123, &atoms, None, &settings(true)), "0x00000123(WM_PROTOCOLS)");
    }

    #[test]
    fn struct_multiline_aligns_field_names() {
        let ws = Ws::root(true);
        let rendered = Struct::new(ws).field("x", "1").field("longname", "2").render();
        assert!(rendered.contains("x        = 1"));
        assert!(rendered.contains("longname = 2"));
    }

    #[test]
    fn struct_single_line_has_no_padding() {
        let ws = Ws::root(false);
        let rendered = Struct::new(ws).field("x", "1").field("y", "2").render();
        assert_eq!(rendered, "{ x=1 y=2 }");
    }
}
