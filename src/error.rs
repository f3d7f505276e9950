//! Typed errors for the wire codec, contact list and engine.
//!
//! One variant per error kind the engine distinguishes: `ProtocolError`,
//! `IdentityViolation`, `TransportError`, `Capacity`, `ConfigurationError`,
//! `Internal`. `thiserror` generates `Display` and
//! `std::error::Error` from the `#[error("...")]` attributes below instead
//! of hand-written `impl Display` blocks.

use crate::contacts::ContactId;

/// Malformed-frame errors raised by the wire codec (`wire::read_pdu`).
///
/// Kept separate from [`EngineError`] so codec unit tests can match on the
/// precise variant without pulling in the rest of the error enum.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("header line '{0}' is not 'Name: Value'")]
    MalformedHeader(String),
    #[error("missing required header '{0}'")]
    MissingHeader(&'static str),
    #[error("duplicate header '{0}'")]
    DuplicateHeader(&'static str),
    #[error("header '{name}' has invalid value '{value}'")]
    InvalidHeaderValue { name: &'static str, value: String },
    #[error("content-length {0} exceeds MAX_CONTENT ({max})", max = crate::constants::MAX_CONTENT)]
    ContentTooLarge(u32),
    #[error("header block exceeds budget ({lines} lines / {bytes} bytes)")]
    HeaderBudgetExceeded { lines: usize, bytes: usize },
    #[error("connection closed mid-frame (short read)")]
    ShortRead,
}

/// Top-level error type returned by engine-facing operations.
///
/// `Protocol` and `Transport` variants are contained per-peer by the
/// multiplexer and never unwind the loop; `IdentityViolation` and
/// `Capacity` are likewise per-peer; `Configuration` is fatal before the
/// engine starts; `Internal` is fatal after best-effort cleanup.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("peer {contact:?} changed {field} after identification")]
    IdentityViolation {
        contact: ContactId,
        field: &'static str,
    },

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("contact list full (capacity {0})")]
    Capacity(usize),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
