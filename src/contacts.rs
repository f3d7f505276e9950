//! The contact list: the set of peers a node currently holds a live
//! connection to.
//!
//! Contacts are addressed by a [`ContactId`] that is never reused — a
//! generation counter, not an array index — so a deleted-and-reused slot
//! can never be silently attributed to the wrong peer by a handler that
//! is still holding a stale id across an await point.

use std::collections::HashMap;

use tokio::io::AsyncWrite;
use tokio::sync::Mutex;

use crate::identity::Identity;
use crate::wire::{self, Pdu};

/// A stable handle to one slot in a [`ContactList`]. Never reused across
/// the life of the process, unlike an array index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactId(u64);

/// One live peer connection and what the engine currently knows about it.
pub struct Contact<S> {
    pub stream: S,
    /// Identity claimed on the wire. `None` until the first PDU from this
    /// peer is processed.
    pub identity: Option<Identity>,
    pub nickname: Option<String>,
}

impl<S> Contact<S> {
    fn new(stream: S) -> Self {
        Self {
            stream,
            identity: None,
            nickname: None,
        }
    }

    /// `true` once the peer has sent at least one PDU and is in the
    /// `Identified` state.
    pub fn is_identified(&self) -> bool {
        self.identity.is_some()
    }
}

/// Bounded, mutex-guarded table of live contacts.
///
/// A single `Mutex` (rather than a lock per contact) keeps one owner for
/// the whole list, so add/remove/broadcast never race each other.
pub struct ContactList<S> {
    inner: Mutex<Inner<S>>,
    capacity: usize,
}

struct Inner<S> {
    next_id: u64,
    contacts: HashMap<ContactId, Contact<S>>,
}

/// Returned when an incoming connection is dropped because its identity
/// duplicates an existing contact. The tie-break keeps the lower-numbered
/// (older) [`ContactId`].
pub struct DuplicateOf(pub ContactId);

impl<S> ContactList<S>
where
    S: AsyncWrite + Unpin,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 0,
                contacts: HashMap::new(),
            }),
            capacity,
        }
    }

    /// Inserts a new, not-yet-identified contact. Fails with `None` if the
    /// list is already at capacity.
    pub async fn add(&self, stream: S) -> Option<ContactId> {
        let mut inner = self.inner.lock().await;
        if inner.contacts.len() >= self.capacity {
            return None;
        }
        let id = ContactId(inner.next_id);
        inner.next_id += 1;
        inner.contacts.insert(id, Contact::new(stream));
        Some(id)
    }

    /// Removes `id` and shuts down its stream's write half, so the peer
    /// observes EOF rather than relying on the socket closing only once
    /// every clone of the underlying handle happens to be dropped. The
    /// lock is released before the shutdown call so a slow peer can't
    /// stall other contact-list operations.
    pub async fn remove(&self, id: ContactId) -> Option<Contact<S>> {
        let mut contact = {
            let mut inner = self.inner.lock().await;
            inner.contacts.remove(&id)?
        };
        let _ = tokio::io::AsyncWriteExt::shutdown(&mut contact.stream).await;
        Some(contact)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.contacts.len()
    }

    /// The fixed capacity passed to [`ContactList::new`], for reporting in
    /// [`crate::error::EngineError::Capacity`] when `add` rejects a contact.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records the identity and nickname claimed by `id`'s first (or a
    /// later) PDU. The nickname is always overwritten on re-identification,
    /// since a peer may rename itself freely; the identity, once set, must
    /// never change underneath the same
    /// `ContactId` — callers are expected to have already checked that via
    /// [`Contact::is_identified`] before calling this a second time with a
    /// different identity.
    pub async fn identify(&self, id: ContactId, identity: Identity, nickname: String) {
        let mut inner = self.inner.lock().await;
        if let Some(contact) = inner.contacts.get_mut(&id) {
            contact.identity = Some(identity);
            contact.nickname = Some(nickname);
        }
    }

    /// The identity currently recorded for `id`, if any.
    pub async fn identity_of(&self, id: ContactId) -> Option<Identity> {
        self.inner.lock().await.contacts.get(&id)?.identity.clone()
    }

    /// Finds an already-identified contact other than `exclude` whose
    /// identity matches. Used both to detect a duplicate incoming
    /// connection and to dedupe identities surfaced via discovery.
    pub async fn find_by_identity(
        &self,
        identity: &Identity,
        exclude: ContactId,
    ) -> Option<ContactId> {
        let inner = self.inner.lock().await;
        inner
            .contacts
            .iter()
            .filter(|(id, _)| **id != exclude)
            .find(|(_, c)| c.identity.as_ref() == Some(identity))
            .map(|(id, _)| *id)
    }

    /// Given a freshly identified contact, decides whether an
    /// already-present contact duplicates it. The older (lower-numbered)
    /// id always survives; the caller is expected to remove whichever id
    /// this returns.
    pub async fn resolve_duplicate(&self, id: ContactId, identity: &Identity) -> Option<DuplicateOf> {
        let other = self.find_by_identity(identity, id).await?;
        Some(DuplicateOf(std::cmp::max(id, other)))
    }

    /// A point-in-time snapshot of every identified contact, for broadcast
    /// fan-out and for building a discovery PDU body. Index-free: pairs
    /// each stable id with the data a caller needs, nothing more.
    pub async fn snapshot_identified(&self) -> Vec<(ContactId, Identity, String)> {
        let inner = self.inner.lock().await;
        inner
            .contacts
            .iter()
            .filter_map(|(id, c)| {
                let identity = c.identity.clone()?;
                let nickname = c.nickname.clone()?;
                Some((*id, identity, nickname))
            })
            .collect()
    }

    /// Writes `pdu` to every identified contact except `exclude`.
    ///
    /// Held as one critical section under the list's single mutex — a
    /// slow peer delays other contacts' fan-out but never corrupts a
    /// frame, since each write is given the whole frame atomically via
    /// [`wire::write_pdu`]. Failures are collected rather than surfaced
    /// immediately so the caller can drop those contacts after releasing
    /// the lock.
    pub async fn broadcast(
        &self,
        pdu: &Pdu,
        exclude: Option<ContactId>,
    ) -> Vec<(ContactId, std::io::Error)> {
        let mut inner = self.inner.lock().await;
        let mut failures = Vec::new();
        for (id, contact) in inner.contacts.iter_mut() {
            if Some(*id) == exclude || !contact.is_identified() {
                continue;
            }
            if let Err(e) = wire::write_pdu(&mut contact.stream, pdu).await {
                failures.push((*id, e));
            }
        }
        failures
    }

    /// Writes `pdu` to exactly one contact.
    pub async fn send_to(&self, id: ContactId, pdu: &Pdu) -> std::io::Result<()> {
        let mut inner = self.inner.lock().await;
        let contact = inner
            .contacts
            .get_mut(&id)
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such contact"))?;
        wire::write_pdu(&mut contact.stream, pdu).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    fn pair() -> (DuplexStream, DuplexStream) {
        tokio::io::duplex(1024)
    }

    #[tokio::test]
    async fn add_respects_capacity() {
        let list: ContactList<DuplexStream> = ContactList::new(1);
        let (a, _keep_a) = pair();
        let (b, _keep_b) = pair();
        let first = list.add(a).await;
        assert!(first.is_some());
        let second = list.add(b).await;
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn ids_are_never_reused() {
        let list: ContactList<DuplexStream> = ContactList::new(4);
        let (a, _ka) = pair();
        let (b, _kb) = pair();
        let id_a = list.add(a).await.unwrap();
        list.remove(id_a).await;
        let id_b = list.add(b).await.unwrap();
        assert_ne!(id_a, id_b);
    }

    #[tokio::test]
    async fn duplicate_resolution_keeps_older_id() {
        let list: ContactList<DuplexStream> = ContactList::new(4);
        let (a, _ka) = pair();
        let (b, _kb) = pair();
        let id_a = list.add(a).await.unwrap();
        let id_b = list.add(b).await.unwrap();
        let identity = Identity::new("aaaaaaaaaaaaaaaa", 7070);
        list.identify(id_a, identity.clone(), "alice".to_string()).await;
        list.identify(id_b, identity.clone(), "alice-again".to_string()).await;

        let dup = list.resolve_duplicate(id_b, &identity).await.unwrap();
        assert_eq!(dup.0, id_b, "the newer connection should be the one dropped");
    }

    #[tokio::test]
    async fn snapshot_excludes_unidentified_contacts() {
        let list: ContactList<DuplexStream> = ContactList::new(4);
        let (a, _ka) = pair();
        let id_a = list.add(a).await.unwrap();
        assert!(list.snapshot_identified().await.is_empty());

        list.identify(id_a, Identity::new("aaaaaaaaaaaaaaaa", 7070), "alice".to_string())
            .await;
        let snap = list.snapshot_identified().await;
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].0, id_a);
    }
}
