//! Connection state (spec.md §3): byte-order flag, the open-request
//! sequence→opcode map, stashed strings, extension activation, and the
//! per-connection atom mirror. Created on accept, byte-order set on first
//! parse, torn down on EOF or fatal decode failure (spec.md §3's lifecycle).
//!
//! Kept entirely per-connection (no shared mutable state beyond the
//! immutable predefined-atom seed) so that a host driving many connections
//! on separate threads needs no cross-connection locking (spec.md §5).

use std::collections::HashMap;

use crate::decoder::atoms::AtomTable;
use crate::decoder::byteorder::ByteOrder;
use crate::decoder::extensions::ExtensionTable;

/// Direction a message travelled, for the fixed top-line log format
/// (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::ClientToServer => "C->S",
            Direction::ServerToClient => "S->C",
        }
    }
}

/// A request the client sent for which no reply or error has yet arrived
/// (spec.md glossary: "open request"). Tracked under its sequence number so
/// the corresponding reply, which carries no opcode, can be disambiguated.
#[derive(Debug, Clone, Copy)]
pub struct OpenRequest {
    pub major_opcode: u8,
    /// `ListFontsWithInfo` keeps its entry alive across a series of replies
    /// terminated by a sentinel; every other opcode evicts on first reply.
    pub multi_reply: bool,
}

#[derive(Debug, Clone)]
pub enum Stash {
    /// InternAtom request: the name to bind once the reply's atom id is known.
    InternAtomName(String),
    /// QueryExtension request: the name to register once the reply's
    /// `present` flag and base values are known.
    QueryExtensionName(String),
}

pub struct Connection {
    pub id: u32,
    order: Option<ByteOrder>,
    sequence: u16,
    open_requests: HashMap<u16, OpenRequest>,
    stash: HashMap<u16, Stash>,
    pub atoms: AtomTable,
    pub extensions: ExtensionTable,
    /// True only after BigReqEnable's *reply* has been observed (spec.md
    /// §4.6: activation is deferred past QueryExtension time for this one
    /// extension).
    pub big_requests_active: bool,
}

impl Connection {
    pub fn new(id: u32) -> Self {
        Connection {
            id,
            order: None,
            sequence: 0,
            open_requests: HashMap::new(),
            stash: HashMap::new(),
            atoms: AtomTable::new(),
            extensions: ExtensionTable::new(),
            big_requests_active: false,
        }
    }

    pub fn byte_order(&self) -> Option<ByteOrder> {
        self.order
    }

    /// Set once, from the first byte of the setup request. Immutable after
    /// (spec.md §3 invariant).
    pub fn set_byte_order(&mut self, order: ByteOrder) {
        debug_assert!(self.order.is_none(), "byte order must be set exactly once");
        self.order = Some(order);
    }

    /// Increment the sequence register and return the value assigned to the
    /// request about to be parsed (spec.md §3: "Incremented before each
    /// request parse to mirror the server's numbering").
    pub fn next_sequence(&mut self) -> u16 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    pub fn current_sequence(&self) -> u16 {
        self.sequence
    }

    pub fn open_request(&mut self, seq: u16, major_opcode: u8, multi_reply: bool) {
        self.open_requests.insert(seq, OpenRequest { major_opcode, multi_reply });
    }

    /// Look up the opcode for a reply's sequence number without evicting
    /// (used for `ListFontsWithInfo`'s non-terminal replies).
    pub fn peek_open_request(&self, seq: u16) -> Option<OpenRequest> {
        self.open_requests.get(&seq).copied()
    }

    /// Evict the entry for `seq`; returns it if present (spec.md §4.7:
    /// "evicted after dispatch, except for ListFontsWithInfo").
    pub fn close_request(&mut self, seq: u16) -> Option<OpenRequest> {
        self.open_requests.remove(&seq)
    }

    pub fn open_request_count(&self) -> usize {
        self.open_requests.len()
    }

    pub fn stash(&mut self, seq: u16, value: Stash) {
        self.stash.insert(seq, value);
    }

    pub fn take_stash(&mut self, seq: u16) -> Option<Stash> {
        self.stash.remove(&seq)
    }

    pub fn stash_len(&self) -> usize {
        self.stash.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_register_increments_before_assignment() {
        let mut c = Connection::new(1);
        assert_eq!(c.next_sequence(), 1);
        assert_eq!(c.next_sequence(), 2);
        assert_eq!(c.current_sequence(), 2);
    }

    #[test]
    fn sequence_wraps_at_u16_max() {
        let mut c = Connection::new(1);
        c.sequence = u16::MAX;
        assert_eq!(c.next_sequence(), 0);
    }

    #[test]
    fn open_request_roundtrip_s1() {
        let mut c = Connection::new(1);
        let seq = c.next_sequence();
        c.open_request(seq, 16, false); // InternAtom opcode
        c.stash(seq, Stash::InternAtomName("WM_PROTOCOLS".into()));

        assert_eq!(c.open_request_count(), 1);
        let req = c.close_request(seq).expect("open request existed prior to dispatch");
        assert_eq!(req.major_opcode, 16);
        assert_eq!(c.open_request_count(), 0);

        match c.take_stash(seq) {
            Some(Stash::InternAtomName(name)) => {
                c.atoms.insert(0x0123, name);
            }
            other => panic!("unexpected stash: {other:?}"),
        }
        assert_eq!(c.atoms.lookup(0x0123), Some("WM_PROTOCOLS"));
        assert_eq!(c.stash_len(), 0);
    }

    #[test]
    fn byte_order_immutable_after_set() {
        let mut c = Connection::new(1);
        c.set_byte_order(ByteOrder::Big);
        assert_eq!(c.byte_order(), Some(ByteOrder::Big));
    }
}
