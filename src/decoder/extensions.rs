//! Extension activation (spec.md §3/§4.6). The core protocol's opcode space
//! is fixed; extensions claim a major request opcode (>= 128) and ranges of
//! event/error codes, both only known once the client's `QueryExtension`
//! round-trip completes. Until then, traffic referencing that extension
//! can't be dispatched to a named parser and is logged opaquely (spec.md §7).
//!
//! Grounded on the teacher's `server/extension_registry.rs`, which keeps the
//! same shape (name -> activation record) for the inverse purpose (a server
//! deciding what it supports); here the table instead mirrors what the
//! *upstream* server told the client it supports.

use std::collections::HashMap;

/// What the upstream server reported for one extension name.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionActivation {
    pub present: bool,
    pub major_opcode: u8,
    pub first_event: u8,
    pub first_error: u8,
}

/// Known event/error range widths for extensions this decoder can name
/// individual codes for. Extensions not listed here still get activation
/// tracking (so request dispatch by major opcode works) but their events and
/// errors are logged as opaque extension traffic rather than by name.
pub fn known_event_count(name: &str) -> u8 {
    match name {
        "BIG-REQUESTS" => 0,
        "SHAPE" => 1,
        "XFIXES" => 2,
        "DAMAGE" => 1,
        "RANDR" => 2,
        _ => 0,
    }
}

pub fn known_error_count(name: &str) -> u8 {
    match name {
        "BIG-REQUESTS" => 0,
        "SHAPE" => 0,
        "XFIXES" => 1,
        "DAMAGE" => 1,
        "RANDR" => 1,
        _ => 0,
    }
}

#[derive(Default)]
pub struct ExtensionTable {
    by_name: HashMap<String, ExtensionActivation>,
}

impl ExtensionTable {
    pub fn new() -> Self {
        ExtensionTable { by_name: HashMap::new() }
    }

    /// Record what the server told the client about `name` (spec.md §4.6:
    /// "the one sanctioned mutation" overwrites `present` to `false` when the
    /// policy layer denies the extension, before the reply is forwarded).
    pub fn activate(&mut self, name: String, activation: ExtensionActivation) {
        self.by_name.insert(name, activation);
    }

    pub fn by_name(&self, name: &str) -> Option<&ExtensionActivation> {
        self.by_name.get(name)
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut ExtensionActivation> {
        self.by_name.get_mut(name)
    }

    /// Find the activated extension whose major opcode matches `opcode`
    /// (request dispatch for opcode >= 128).
    pub fn by_major_opcode(&self, opcode: u8) -> Option<(&str, &ExtensionActivation)> {
        self.by_name
            .iter()
            .find(|(_, a)| a.present && a.major_opcode == opcode)
            .map(|(n, a)| (n.as_str(), a))
    }

    /// Find the activated extension owning event `code` (spec.md §9 open
    /// question: resolved as "owns the contiguous range
    /// [first_event, first_event + known_event_count)").
    pub fn by_event_code(&self, code: u8) -> Option<(&str, &ExtensionActivation)> {
        self.by_name.iter().find(|(name, a)| {
            a.present
                && code >= a.first_event
                && code < a.first_event.saturating_add(known_event_count(name))
        }).map(|(n, a)| (n.as_str(), a))
    }

    pub fn by_error_code(&self, code: u8) -> Option<(&str, &ExtensionActivation)> {
        self.by_name.iter().find(|(name, a)| {
            a.present
                && code >= a.first_error
                && code < a.first_error.saturating_add(known_error_count(name))
        }).map(|(n, a)| (n.as_str(), a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activates_and_finds_by_major_opcode() {
        let mut t = ExtensionTable::new();
        t.activate(
            "BIG-REQUESTS".into(),
            ExtensionActivation { present: true, major_opcode: 133, first_event: 0, first_error: 0 },
        );
        let (name, _) = t.by_major_opcode(133).expect("activated extension findable by opcode");
        assert_eq!(name, "BIG-REQUESTS");
    }

    #[test]
    fn denied_extension_not_found_by_opcode() {
        let mut t = ExtensionTable::new();
        t.activate(
            "SHAPE".into(),
            ExtensionActivation { present: false, major_opcode: 140, first_event: 64, first_error: 128 },
        );
        assert!(t.by_major_opcode(140).is_none());
    }

    #[test]
    fn event_code_range_resolves_to_owning_extension() {
        let mut t = ExtensionTable::new();
        t.activate(
            "XFIXES".into(),
            ExtensionActivation { present: true, major_opcode: 138, first_event: 85, first_error: 140 },
        );
        assert_eq!(t.by_event_code(85).unwrap().0, "XFIXES");
        assert_eq!(t.by_event_code(86).unwrap().0, "XFIXES");
        assert!(t.by_event_code(87).is_none());
    }
}
