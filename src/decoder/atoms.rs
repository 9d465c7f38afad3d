//! Predefined atoms 1..68 (spec.md §3) and the per-connection interned-atom
//! mirror that §4.4 consults when rendering an ATOM value.
//!
//! The predefined list is grounded on the teacher's `x11/resources/types/atom.rs`
//! `PredefinedAtom` enum, which enumerates the same protocol-fixed names; here
//! it is expressed as a static table rather than an enum-plus-match, since
//! there is no behavior attached to each variant beyond its name (spec.md §9's
//! design note: "prefer tables over switch/match chains").

use std::collections::HashMap;

/// `(atom id, name)` for every predefined X11 atom. Id 0 is never assigned
/// (it means "no atom" on the wire); ids 1..=68 are fixed by the protocol.
pub const PREDEFINED: &[(u32, &str)] = &[
    (1, "PRIMARY"),
    (2, "SECONDARY"),
    (3, "ARC"),
    (4, "ATOM"),
    (5, "BITMAP"),
    (6, "CARDINAL"),
    (7, "COLORMAP"),
    (8, "CURSOR"),
    (9, "CUT_BUFFER0"),
    (10, "CUT_BUFFER1"),
    (11, "CUT_BUFFER2"),
    (12, "CUT_BUFFER3"),
    (13, "CUT_BUFFER4"),
    (14, "CUT_BUFFER5"),
    (15, "CUT_BUFFER6"),
    (16, "CUT_BUFFER7"),
    (17, "DRAWABLE"),
    (18, "FONT"),
    (19, "INTEGER"),
    (20, "PIXMAP"),
    (21, "POINT"),
    (22, "RECTANGLE"),
    (23, "RESOURCE_MANAGER"),
    (24, "RGB_COLOR_MAP"),
    (25, "RGB_BEST_MAP"),
    (26, "RGB_BLUE_MAP"),
    (27, "RGB_DEFAULT_MAP"),
    (28, "RGB_GRAY_MAP"),
    (29, "RGB_GREEN_MAP"),
    (30, "RGB_RED_MAP"),
    (31, "STRING"),
    (32, "VISUALID"),
    (33, "WINDOW"),
    (34, "WM_COMMAND"),
    (35, "WM_HINTS"),
    (36, "WM_CLIENT_MACHINE"),
    (37, "WM_ICON_NAME"),
    (38, "WM_ICON_SIZE"),
    (39, "WM_NAME"),
    (40, "WM_NORMAL_HINTS"),
    (41, "WM_SIZE_HINTS"),
    (42, "WM_ZOOM_HINTS"),
    (43, "MIN_SPACE"),
    (44, "NORM_SPACE"),
    (45, "MAX_SPACE"),
    (46, "END_SPACE"),
    (47, "SUPERSCRIPT_X"),
    (48, "SUPERSCRIPT_Y"),
    (49, "SUBSCRIPT_X"),
    (50, "SUBSCRIPT_Y"),
    (51, "UNDERLINE_POSITION"),
    (52, "UNDERLINE_THICKNESS"),
    (53, "STRIKEOUT_ASCENT"),
    (54, "STRIKEOUT_DESCENT"),
    (55, "ITALIC_ANGLE"),
    (56, "X_HEIGHT"),
    (57, "QUAD_WIDTH"),
    (58, "WEIGHT"),
    (59, "POINT_SIZE"),
    (60, "RESOLUTION"),
    (61, "COPYRIGHT"),
    (62, "NOTICE"),
    (63, "FONT_NAME"),
    (64, "FAMILY_NAME"),
    (65, "FULL_NAME"),
    (66, "CAP_HEIGHT"),
    (67, "WM_CLASS"),
    (68, "WM_TRANSIENT_FOR"),
];

/// The atom id of the predefined `STRING` atom, used by `GetProperty`'s
/// reply parser (spec.md §4.6) to decide whether to render the value bytes
/// as a quoted string or a hex byte list.
pub const STRING_ATOM: u32 = 31;

/// Per-connection mirror of the server's atom table (spec.md §3). Pre-seeded
/// with [`PREDEFINED`]; extended by `InternAtom` replies and, optionally, by
/// the startup pre-fetch helper via [`AtomTable::insert`].
#[derive(Debug, Clone)]
pub struct AtomTable {
    names: HashMap<u32, String>,
}

impl AtomTable {
    pub fn new() -> Self {
        let mut names = HashMap::with_capacity(PREDEFINED.len());
        for &(id, name) in PREDEFINED {
            names.insert(id, name.to_string());
        }
        AtomTable { names }
    }

    /// Associate `id` with `name`, overwriting any prior binding. The
    /// protocol permits atom re-use across a session's lifetime (spec.md
    /// §4.6: InternAtom reply — "allow rebinding").
    pub fn insert(&mut self, id: u32, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    pub fn lookup(&self, id: u32) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }
}

impl Default for AtomTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predefined_seeded_on_construction() {
        let atoms = AtomTable::new();
        assert_eq!(atoms.lookup(1), Some("PRIMARY"));
        assert_eq!(atoms.lookup(68), Some("WM_TRANSIENT_FOR"));
        assert_eq!(atoms.lookup(0), None);
    }

    #[test]
    fn intern_atom_reply_rebinds() {
        let mut atoms = AtomTable::new();
        atoms.insert(0x0123, "WM_PROTOCOLS");
        assert_eq!(atoms.lookup(0x0123), Some("WM_PROTOCOLS"));
        atoms.insert(0x0123, "_NET_WM_NAME");
        assert_eq!(atoms.lookup(0x0123), Some("_NET_WM_NAME"));
    }

    #[test]
    fn predefined_table_has_68_entries() {
        assert_eq!(PREDEFINED.len(), 68);
    }
}
