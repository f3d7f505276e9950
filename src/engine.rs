//! The multiplexer: the engine's single `select!` loop, fed by a handful
//! of worker tasks instead of the original source's per-connection thread
//! pool.
//!
//! Three kinds of worker send into one event channel: an acceptor task
//! (inbound connections), a dialer task (outbound connections queued by
//! discovery or the initial peer), and one reader task per live contact.
//! The input shuttle ([`crate::input`]) feeds a second channel directly.
//! Everything that touches shared state — the contact list, the dial
//! dedupe set — runs on this loop's own task, so there is never more than
//! one writer to either at a time.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::io::WriteHalf;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::{Mutex, mpsc, watch};

use crate::cli::Config;
use crate::command::LocalInput;
use crate::constants::{DEFAULT_CONTACT_LIST_SIZE, LISTEN_ADDR, LISTEN_BACKLOG};
use crate::contacts::{ContactId, ContactList};
use crate::discovery;
use crate::error::EngineError;
use crate::identity::{Identity, is_valid_nickname, is_valid_onion_id, is_valid_port};
use crate::output::OutputSink;
use crate::transport::{PeerStream, Transport, TransportError};
use crate::wire::{self, ContentType, Pdu, ReadError};

type PeerWrite = WriteHalf<PeerStream>;

enum EngineEvent {
    Accepted(std::io::Result<PeerStream>),
    Dialed {
        onion_id: String,
        port: u16,
        result: Result<PeerStream, TransportError>,
    },
    PeerRead {
        id: ContactId,
        result: Result<Option<Pdu>, ReadError>,
    },
}

/// Binds the listening endpoint through `TcpSocket` rather than
/// `TcpListener::bind` so the `listen(2)` backlog is actually set to
/// [`LISTEN_BACKLOG`] instead of whatever default the platform picks.
async fn bind_listener(port: u16) -> std::io::Result<TcpListener> {
    let addr = format!("{LISTEN_ADDR}:{port}")
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

pub struct Engine {
    contacts: Arc<ContactList<PeerWrite>>,
    transport: Arc<dyn Transport>,
    identity: Identity,
    nickname: String,
    output: Arc<dyn OutputSink>,
    listener: Option<TcpListener>,
    events_tx: mpsc::Sender<EngineEvent>,
    events_rx: mpsc::Receiver<EngineEvent>,
    dial_tx: mpsc::Sender<(String, u16)>,
    dial_rx: Option<mpsc::Receiver<(String, u16)>>,
    shutdown_tx: watch::Sender<bool>,
    known: Mutex<HashSet<(String, u16)>>,
    initial_peer: Option<Identity>,
}

impl Engine {
    pub async fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        output: Arc<dyn OutputSink>,
    ) -> Result<Self, EngineError> {
        let listener = bind_listener(config.identity.listening_port)
            .await
            .map_err(EngineError::Transport)?;
        let (events_tx, events_rx) = mpsc::channel(256);
        let (dial_tx, dial_rx) = mpsc::channel(64);
        let (shutdown_tx, _) = watch::channel(false);

        let mut known = HashSet::new();
        known.insert((config.identity.onion_id.clone(), config.identity.listening_port));

        Ok(Self {
            contacts: Arc::new(ContactList::new(DEFAULT_CONTACT_LIST_SIZE)),
            transport,
            identity: config.identity,
            nickname: config.nickname,
            output,
            listener: Some(listener),
            events_tx,
            events_rx,
            dial_tx,
            dial_rx: Some(dial_rx),
            shutdown_tx,
            known: Mutex::new(known),
            initial_peer: config.initial_peer,
        })
    }

    /// A handle that, when `changed()` resolves, signals every worker to
    /// stop. Used by `main` to wire `SIGINT`/`SIGTERM` to a clean exit.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Runs the multiplexer until a shutdown signal fires or `input_rx`
    /// closes. `input_rx` is supplied rather than spawned internally so
    /// tests can drive local input through a plain channel instead of
    /// the real stdin shuttle.
    pub async fn run(mut self, mut input_rx: mpsc::Receiver<String>) -> Result<(), EngineError> {
        if let Some(peer) = self.initial_peer.clone() {
            self.queue_dial(peer).await;
        }

        let listener = self.listener.take().expect("listener taken exactly once");
        let acceptor_events = self.events_tx.clone();
        let mut acceptor_shutdown = self.shutdown_tx.subscribe();
        let acceptor = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = acceptor_shutdown.changed() => break,
                    accepted = listener.accept() => {
                        let event = match accepted {
                            Ok((stream, _addr)) => {
                                let boxed: PeerStream = Box::pin(stream);
                                EngineEvent::Accepted(Ok(boxed))
                            }
                            Err(e) => EngineEvent::Accepted(Err(e)),
                        };
                        if acceptor_events.send(event).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut dial_rx = self.dial_rx.take().expect("dial_rx taken exactly once");
        let dial_events = self.events_tx.clone();
        let transport = Arc::clone(&self.transport);
        let mut dial_shutdown = self.shutdown_tx.subscribe();
        let dialer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = dial_shutdown.changed() => break,
                    request = dial_rx.recv() => {
                        let Some((onion_id, port)) = request else { break };
                        let result = transport.dial(&onion_id, port).await;
                        if dial_events
                            .send(EngineEvent::Dialed { onion_id, port, result })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            }
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event).await;
                }
                line = input_rx.recv() => {
                    let keep_going = match line {
                        Some(line) => self.handle_local_input(line).await,
                        None => false,
                    };
                    if !keep_going {
                        break;
                    }
                }
            }
        }

        let _ = self.shutdown_tx.send(true);
        let _ = acceptor.await;
        let _ = dialer.await;
        Ok(())
    }

    async fn handle_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::Accepted(Ok(stream)) => self.handle_new_stream(stream).await,
            EngineEvent::Accepted(Err(e)) => {
                tracing::warn!(error = %e, "accept failed");
            }
            EngineEvent::Dialed { result: Ok(stream), .. } => self.handle_new_stream(stream).await,
            EngineEvent::Dialed { onion_id, port, result: Err(e) } => {
                tracing::warn!(onion_id, port, error = %e, "dial failed");
            }
            EngineEvent::PeerRead { id, result } => self.handle_peer_read(id, result).await,
        }
    }

    async fn handle_new_stream(&self, stream: PeerStream) {
        let (read_half, write_half) = tokio::io::split(stream);
        let Some(id) = self.contacts.add(write_half).await else {
            let err = EngineError::Capacity(self.contacts.capacity());
            tracing::warn!(error = %err, "dropping new connection");
            return;
        };

        let reader_events = self.events_tx.clone();
        tokio::spawn(async move {
            let mut reader = tokio::io::BufReader::new(read_half);
            loop {
                let result = wire::read_pdu(&mut reader).await;
                let is_terminal = !matches!(result, Ok(Some(_)));
                if reader_events
                    .send(EngineEvent::PeerRead { id, result })
                    .await
                    .is_err()
                {
                    break;
                }
                if is_terminal {
                    break;
                }
            }
        });

        let discover = self.build_discover_pdu().await;
        if let Err(e) = self.contacts.send_to(id, &discover).await {
            tracing::warn!(contact = ?id, error = %e, "failed to send initial discover PDU");
        }
    }

    async fn handle_peer_read(&self, id: ContactId, result: Result<Option<Pdu>, ReadError>) {
        match result {
            Ok(None) => {
                self.contacts.remove(id).await;
                tracing::info!(contact = ?id, "peer disconnected");
            }
            Ok(Some(pdu)) => self.dispatch_pdu(id, pdu).await,
            Err(ReadError::Protocol(e)) => {
                tracing::warn!(contact = ?id, error = %e, "protocol error, dropping contact");
                self.contacts.remove(id).await;
            }
            Err(ReadError::Io(e)) => {
                tracing::warn!(contact = ?id, error = %e, "transport error, dropping contact");
                self.contacts.remove(id).await;
            }
        }
    }

    async fn dispatch_pdu(&self, id: ContactId, pdu: Pdu) {
        let claimed = Identity::new(pdu.sender_onion_id.clone(), pdu.sender_listening_port);
        if !is_valid_onion_id(&claimed.onion_id)
            || !is_valid_port(claimed.listening_port)
            || !is_valid_nickname(&pdu.sender_nickname)
        {
            tracing::warn!(contact = ?id, "peer sent an invalid identity, dropping contact");
            self.contacts.remove(id).await;
            return;
        }

        if let Some(existing) = self.contacts.identity_of(id).await {
            if existing != claimed {
                let field = if existing.onion_id != claimed.onion_id {
                    "onion_id"
                } else {
                    "listening_port"
                };
                let err = EngineError::IdentityViolation { contact: id, field };
                tracing::error!(error = %err, "dropping contact");
                self.contacts.remove(id).await;
                return;
            }
            self.contacts
                .identify(id, claimed.clone(), pdu.sender_nickname.clone())
                .await;
        } else {
            if !matches!(pdu.content_type, ContentType::ControlDiscover) {
                tracing::warn!(contact = ?id, "first PDU from peer was not Control/Discover, dropping contact");
                self.contacts.remove(id).await;
                return;
            }
            if claimed == self.identity {
                tracing::warn!(contact = ?id, "peer claims our own identity, dropping contact");
                self.contacts.remove(id).await;
                return;
            }
            if let Some(duplicate) = self.contacts.resolve_duplicate(id, &claimed).await {
                self.contacts.remove(duplicate.0).await;
                if duplicate.0 == id {
                    return;
                }
            }
            self.contacts
                .identify(id, claimed.clone(), pdu.sender_nickname.clone())
                .await;
            self.mark_known(&claimed).await;
            self.announce_new_contact(id).await;
        }

        match pdu.content_type {
            ContentType::TextPlain => {
                // Remote text is rendered only, never relayed: §2's data flow
                // ends at "terminal output" for a contact socket, and with a
                // full mesh from transitive discovery a relay would echo
                // forever with no message-id or TTL to stop it.
                let text = String::from_utf8_lossy(&pdu.content).into_owned();
                self.output.chat_line(&pdu.sender_nickname, &text);
            }
            ContentType::ControlDiscover => {
                for identity in discovery::decode(&pdu.content) {
                    if identity == self.identity {
                        continue;
                    }
                    if self.contacts.find_by_identity(&identity, id).await.is_some() {
                        continue;
                    }
                    self.queue_dial(identity).await;
                }
            }
            ContentType::Other(kind) => {
                tracing::debug!(contact = ?id, content_type = kind, "ignoring unknown content type");
            }
        }
    }

    async fn handle_local_input(&self, line: String) -> bool {
        match LocalInput::classify(&line) {
            LocalInput::Blank => true,
            LocalInput::Exit => false,
            LocalInput::Message(body) => {
                let pdu = Pdu::new(
                    ContentType::TextPlain,
                    self.identity.onion_id.clone(),
                    self.identity.listening_port,
                    self.nickname.clone(),
                    body.into_bytes(),
                );
                let failures = self.contacts.broadcast(&pdu, None).await;
                for (id, e) in failures {
                    tracing::warn!(contact = ?id, error = %e, "send failed, dropping contact");
                    self.contacts.remove(id).await;
                }
                true
            }
        }
    }

    /// Floods an updated discovery list to every other already-identified
    /// contact whenever `id` newly identifies itself, so peers that
    /// connected earlier learn about it transitively instead of only on
    /// their own next dial.
    async fn announce_new_contact(&self, id: ContactId) {
        let discover = self.build_discover_pdu().await;
        let failures = self.contacts.broadcast(&discover, Some(id)).await;
        for (failed_id, e) in failures {
            tracing::warn!(contact = ?failed_id, error = %e, "announce write failed, dropping contact");
            self.contacts.remove(failed_id).await;
        }
    }

    async fn build_discover_pdu(&self) -> Pdu {
        let identities: Vec<Identity> = self
            .contacts
            .snapshot_identified()
            .await
            .into_iter()
            .map(|(_, identity, _)| identity)
            .collect();
        Pdu::new(
            ContentType::ControlDiscover,
            self.identity.onion_id.clone(),
            self.identity.listening_port,
            self.nickname.clone(),
            discovery::encode(&identities),
        )
    }

    async fn queue_dial(&self, identity: Identity) {
        let key = (identity.onion_id.clone(), identity.listening_port);
        {
            let mut known = self.known.lock().await;
            if !known.insert(key) {
                return;
            }
        }
        if self
            .dial_tx
            .send((identity.onion_id, identity.listening_port))
            .await
            .is_err()
        {
            tracing::warn!("dial queue closed, dropping discovery dial");
        }
    }

    async fn mark_known(&self, identity: &Identity) {
        self.known
            .lock()
            .await
            .insert((identity.onion_id.clone(), identity.listening_port));
    }
}
