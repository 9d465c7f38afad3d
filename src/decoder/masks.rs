//! SETofKEYBUTMASK and SETofEVENT decomposition (spec.md §4.4). Unlike the
//! ad-hoc `NameTable` bitmasks in `format.rs` (extension-specific VALUE
//! fields, whose flag sets are small and local to one request), these two
//! sets are fixed by the core protocol and reused across dozens of request
//! and event parsers, so they get real `bitflags!` types: the flag set is
//! declared once, ascending-bit iteration (spec.md §8 property 7) comes
//! from the crate instead of a hand-sorted table.

use bitflags::bitflags;

use crate::decoder::atoms::AtomTable;
use crate::decoder::format::scalar;
use crate::settings::Settings;

bitflags! {
    /// The pointer/keyboard modifier-and-button state carried by input
    /// events (`KeyPress`, `ButtonPress`, `MotionNotify`, ...). 16 bits;
    /// bits 13..15 are reserved and must be zero (spec.md §4.4).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeyButMask: u16 {
        const SHIFT    = 0x0001;
        const LOCK     = 0x0002;
        const CONTROL  = 0x0004;
        const MOD1     = 0x0008;
        const MOD2     = 0x0010;
        const MOD3     = 0x0020;
        const MOD4     = 0x0040;
        const MOD5     = 0x0080;
        const BUTTON1  = 0x0100;
        const BUTTON2  = 0x0200;
        const BUTTON3  = 0x0400;
        const BUTTON4  = 0x0800;
        const BUTTON5  = 0x1000;
    }
}

bitflags! {
    /// The event-selection mask carried by `CreateWindow`/
    /// `ChangeWindowAttributes`'s `event-mask` VALUE and several requests'
    /// `event_mask` fields (spec.md §4.4 SETofEVENT).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventMask: u32 {
        const KEY_PRESS             = 0x0000_0001;
        const KEY_RELEASE           = 0x0000_0002;
        const BUTTON_PRESS          = 0x0000_0004;
        const BUTTON_RELEASE        = 0x0000_0008;
        const ENTER_WINDOW          = 0x0000_0010;
        const LEAVE_WINDOW          = 0x0000_0020;
        const POINTER_MOTION        = 0x0000_0040;
        const POINTER_MOTION_HINT   = 0x0000_0080;
        const BUTTON1_MOTION        = 0x0000_0100;
        const BUTTON2_MOTION        = 0x0000_0200;
        const BUTTON3_MOTION        = 0x0000_0400;
        const BUTTON4_MOTION        = 0x0000_0800;
        const BUTTON5_MOTION        = 0x0000_1000;
        const BUTTON_MOTION         = 0x0000_2000;
        const KEYMAP_STATE          = 0x0000_4000;
        const EXPOSURE              = 0x0000_8000;
        const VISIBILITY_CHANGE     = 0x0001_0000;
        const STRUCTURE_NOTIFY      = 0x0002_0000;
        const RESIZE_REDIRECT       = 0x0004_0000;
        const SUBSTRUCTURE_NOTIFY   = 0x0008_0000;
        const SUBSTRUCTURE_REDIRECT = 0x0010_0000;
        const FOCUS_CHANGE          = 0x0020_0000;
        const PROPERTY_CHANGE       = 0x0040_0000;
        const COLORMAP_CHANGE       = 0x0080_0000;
        const OWNER_GRAB_BUTTON     = 0x0100_0000;
    }
}

/// Bits 13..15 of KeyButMask are reserved (spec.md §4.4: "validate the
/// 'must be zero' bits").
const KEY_BUT_MASK_RESERVED: u16 = !0x1fff;

/// `bitflags!` constants are SCREAMING_SNAKE_CASE by Rust convention; X11's
/// own names for the same bits are PascalCase (`requests::MODIFIER_NAMES`
/// uses that spelling directly). Translate at render time rather than
/// renaming the constants, so the same modifier spells identically whether
/// it reaches the trace through here or through a request's own flag table.
const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("SHIFT", "Shift"),
    ("LOCK", "Lock"),
    ("CONTROL", "Control"),
    ("MOD1", "Mod1"),
    ("MOD2", "Mod2"),
    ("MOD3", "Mod3"),
    ("MOD4", "Mod4"),
    ("MOD5", "Mod5"),
    ("BUTTON1", "Button1"),
    ("BUTTON2", "Button2"),
    ("BUTTON3", "Button3"),
    ("BUTTON4", "Button4"),
    ("BUTTON5", "Button5"),
    ("KEY_PRESS", "KeyPress"),
    ("KEY_RELEASE", "KeyRelease"),
    ("BUTTON_PRESS", "ButtonPress"),
    ("BUTTON_RELEASE", "ButtonRelease"),
    ("ENTER_WINDOW", "EnterWindow"),
    ("LEAVE_WINDOW", "LeaveWindow"),
    ("POINTER_MOTION", "PointerMotion"),
    ("POINTER_MOTION_HINT", "PointerMotionHint"),
    ("BUTTON1_MOTION", "Button1Motion"),
    ("BUTTON2_MOTION", "Button2Motion"),
    ("BUTTON3_MOTION", "Button3Motion"),
    ("BUTTON4_MOTION", "Button4Motion"),
    ("BUTTON5_MOTION", "Button5Motion"),
    ("BUTTON_MOTION", "ButtonMotion"),
    ("KEYMAP_STATE", "KeymapState"),
    ("EXPOSURE", "Exposure"),
    ("VISIBILITY_CHANGE", "VisibilityChange"),
    ("STRUCTURE_NOTIFY", "StructureNotify"),
    ("RESIZE_REDIRECT", "ResizeRedirect"),
    ("SUBSTRUCTURE_NOTIFY", "SubstructureNotify"),
    ("SUBSTRUCTURE_REDIRECT", "SubstructureRedirect"),
    ("FOCUS_CHANGE", "FocusChange"),
    ("PROPERTY_CHANGE", "PropertyChange"),
    ("COLORMAP_CHANGE", "ColormapChange"),
    ("OWNER_GRAB_BUTTON", "OwnerGrabButton"),
];

fn display_name(raw: &'static str) -> &'static str {
    DISPLAY_NAMES.iter().find(|(r, _)| *r == raw).map(|(_, d)| *d).unwrap_or(raw)
}

/// Render SETofKEYBUTMASK (spec.md §4.4): validates the reserved bits are
/// zero, then decomposes set bits in ascending order.
pub fn key_but_mask(value: u16, settings: &Settings) -> String {
    debug_assert_eq!(value & KEY_BUT_MASK_RESERVED, 0, "KeyButMask reserved bits must be zero");
    let flags = KeyButMask::from_bits_truncate(value);
    let names: Vec<&'static str> = flags.iter_names().map(|(n, _)| display_name(n)).collect();
    if names.is_empty() {
        return scalar(value as u32, None, settings);
    }
    let joined = names.join(",");
    if settings.verbose {
        format!("0x{:04x}({})", flags.bits(), joined)
    } else {
        joined
    }
}

/// Render SETofEVENT (spec.md §4.4). No reserved-bit validation here: the
/// core protocol defines every bit through `OwnerGrabButton` (0x0100_0000);
/// extensions that add events beyond that range are out of scope for this
/// decomposition and pass through as unnamed bits via `from_bits_truncate`.
pub fn event_mask(value: u32, settings: &Settings) -> String {
    let flags = EventMask::from_bits_truncate(value);
    let names: Vec<&'static str> = flags.iter_names().map(|(n, _)| display_name(n)).collect();
    if names.is_empty() {
        return scalar(value, None, settings);
    }
    let joined = names.join(",");
    if settings.verbose {
        format!("0x{:08x}({})", flags.bits(), joined)
    } else {
        joined
    }
}

/// `render_plain_u32`-shaped adapter for `format::ValueField::render`, so
/// `CreateWindow`/`ChangeWindowAttributes`'s `event-mask` VALUE entry can
/// decompose instead of rendering raw hex.
pub fn render_event_mask_u32(v: u32, _atoms: &AtomTable, settings: &Settings) -> String {
    event_mask(v, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(verbose: bool) -> Settings {
        let mut s = Settings::default();
        s.verbose = verbose;
        s
    }

    #[test]
    fn key_but_mask_ascending_order() {
        let v = (KeyButMask::SHIFT | KeyButMask::CONTROL).bits();
        assert_eq!(key_but_mask(v, &settings(false)), "Shift,Control");
    }

    #[test]
    fn event_mask_decomposes_with_hex_when_verbose() {
        let v = (EventMask::BUTTON_PRESS | EventMask::EXPOSURE).bits();
        let out = event_mask(v, &settings(true));
        assert!(out.starts_with("0x"));
        assert!(out.contains("ButtonPress,Exposure"));
    }

    #[test]
    fn empty_mask_falls_back_to_scalar() {
        assert_eq!(key_but_mask(0, &settings(false)), "0");
    }
}
