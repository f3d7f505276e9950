//! Encoding and decoding of the `control/discover` PDU body.
//!
//! The body is a flat list of `<onion-id> <port>` lines, one per peer the
//! sender currently holds a contact for. A node merges an incoming list
//! into its own dial queue so contacts propagate transitively without a
//! rendezvous server — the whole point of the exercise.

use crate::identity::Identity;

/// Serializes a set of identities as a discovery body. Order follows the
/// input slice; callers pass a [`crate::contacts::ContactList`] snapshot.
pub fn encode(identities: &[Identity]) -> Vec<u8> {
    let mut body = String::new();
    for identity in identities {
        body.push_str(&identity.onion_id);
        body.push(' ');
        body.push_str(&identity.listening_port.to_string());
        body.push('\n');
    }
    body.into_bytes()
}

/// Parses a discovery body back into identities.
///
/// A malformed line (wrong field count, non-numeric port) is skipped
/// rather than failing the whole PDU — discovery is a best-effort hint,
/// not a protocol guarantee, and a single bad entry from a buggy peer
/// shouldn't cost the rest of the list.
pub fn decode(body: &[u8]) -> Vec<Identity> {
    let Ok(text) = std::str::from_utf8(body) else {
        return Vec::new();
    };
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let onion_id = parts.next()?;
            let port_str = parts.next()?;
            if parts.next().is_some() {
                return None;
            }
            let port: u16 = port_str.parse().ok()?;
            Some(Identity::new(onion_id, port))
        })
        .collect()
}
