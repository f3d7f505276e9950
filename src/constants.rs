//! Protocol and resource-limit constants.
//!
//! Values not pinned by the spec are resolved here (see `DESIGN.md`'s Open
//! Question ledger) rather than guessed ad hoc at each call site.

/// Fixed length of an onion-id handle, in bytes/chars (historically 16
/// base32 characters for a Tor v2 hidden service).
pub const ONION_ADDRLEN: usize = 16;

/// Maximum nickname length, in UTF-8 code units.
pub const MAX_NICKNAME: usize = 25;

/// Maximum PDU body size, in bytes.
pub const MAX_CONTENT: u32 = 65_536;

/// Default local listening port when `-l`/`--lport` is omitted.
pub const DEFAULT_PORT: u16 = 7070;

/// Loopback address the listening endpoint binds to; the anonymizing
/// transport is expected to forward inbound hidden-service traffic here.
pub const LISTEN_ADDR: &str = "127.0.0.1";

/// Minimum `listen(2)`-style backlog for the listening endpoint.
pub const LISTEN_BACKLOG: u32 = 5;

/// Bounded header budget: a strict line-oriented tokenizer rejects a frame
/// whose header block exceeds either limit, so an adversarial peer can't
/// exhaust memory with unbounded headers before a body is ever read.
pub const MAX_HEADER_LINES: usize = 16;
pub const MAX_HEADER_BYTES: usize = 4096;

/// Default contact list capacity.
pub const DEFAULT_CONTACT_LIST_SIZE: usize = 64;
