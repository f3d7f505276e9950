//! Node identity and the validators applied at the CLI boundary and on the
//! wire: onion-id, nickname, and port formats.

use crate::constants::{MAX_NICKNAME, ONION_ADDRLEN};

/// A node's identity on the overlay: its onion-id and the port it listens
/// on. Identity uniquely names a node and, once a contact is identified,
/// is frozen — only the nickname may change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub onion_id: String,
    pub listening_port: u16,
}

impl Identity {
    pub fn new(onion_id: impl Into<String>, listening_port: u16) -> Self {
        Self {
            onion_id: onion_id.into(),
            listening_port,
        }
    }
}

/// `onion_id` must be exactly `ONION_ADDRLEN` characters. The transport
/// determines the exact alphabet; we only enforce the pinned length,
/// rejecting `ONION_ADDRLEN ± 1` at both the CLI and on the wire.
pub fn is_valid_onion_id(onion_id: &str) -> bool {
    onion_id.chars().count() == ONION_ADDRLEN
}

/// Printable, no line-feeds, length in `[1, MAX_NICKNAME]`.
pub fn is_valid_nickname(nickname: &str) -> bool {
    let len = nickname.chars().count();
    len >= 1 && len <= MAX_NICKNAME && nickname.chars().all(|c| c != '\n' && !c.is_control())
}

/// Unsigned 16-bit, non-zero.
pub fn is_valid_port(port: u16) -> bool {
    port != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onion_id_length_boundaries() {
        assert!(is_valid_onion_id(&"a".repeat(ONION_ADDRLEN)));
        assert!(!is_valid_onion_id(&"a".repeat(ONION_ADDRLEN - 1)));
        assert!(!is_valid_onion_id(&"a".repeat(ONION_ADDRLEN + 1)));
    }

    #[test]
    fn nickname_bounds() {
        assert!(!is_valid_nickname(""));
        assert!(is_valid_nickname("a"));
        assert!(is_valid_nickname(&"a".repeat(MAX_NICKNAME)));
        assert!(!is_valid_nickname(&"a".repeat(MAX_NICKNAME + 1)));
        assert!(!is_valid_nickname("has\nnewline"));
    }

    #[test]
    fn port_nonzero() {
        assert!(!is_valid_port(0));
        assert!(is_valid_port(1));
        assert!(is_valid_port(65535));
    }
}
