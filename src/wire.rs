//! The DChat wire codec: framing and parsing of the DChat PDU.
//!
//! A PDU on the wire is a header block — one `Name: Value` pair per line,
//! each terminated by a single line-feed — followed by a blank line and
//! then exactly `Content-Length` raw body bytes. Header order is not
//! significant and unknown headers are ignored. This module owns both
//! directions: [`read_pdu`] parses a frame off an `AsyncBufRead`,
//! [`write_pdu`] serializes one onto an `AsyncWrite`.

use std::collections::HashMap;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::{MAX_CONTENT, MAX_HEADER_BYTES, MAX_HEADER_LINES};
use crate::error::ProtocolError;

/// The content-type carried by a PDU.
///
/// `Other` preserves an unrecognized value rather than rejecting the frame
/// — the original source logs "Unknown Content-Type!" and otherwise
/// continues, so an unknown type is a dispatch no-op, not a parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    TextPlain,
    ControlDiscover,
    Other(String),
}

impl ContentType {
    fn as_wire_str(&self) -> &str {
        match self {
            ContentType::TextPlain => "text/plain",
            ContentType::ControlDiscover => "control/discover",
            ContentType::Other(s) => s,
        }
    }

    fn from_wire_str(s: &str) -> Self {
        match s {
            "text/plain" => ContentType::TextPlain,
            "control/discover" => ContentType::ControlDiscover,
            other => ContentType::Other(other.to_string()),
        }
    }
}

/// A framed DChat message: the sender's claimed identity at send time, a
/// content type, and an opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub content_type: ContentType,
    pub sender_onion_id: String,
    pub sender_listening_port: u16,
    pub sender_nickname: String,
    pub content: Vec<u8>,
}

impl Pdu {
    pub fn new(
        content_type: ContentType,
        sender_onion_id: impl Into<String>,
        sender_listening_port: u16,
        sender_nickname: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            content_type,
            sender_onion_id: sender_onion_id.into(),
            sender_listening_port,
            sender_nickname: sender_nickname.into(),
            content,
        }
    }
}

/// Error surface for [`read_pdu`]: a malformed frame is always a
/// [`ProtocolError`]; a genuine transport failure (connection reset,
/// etc.) is kept separate so the caller can apply distinct handling for
/// `ProtocolError` vs. `TransportError`.
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Rejects signs, whitespace, and trailing garbage — only a bare run of
/// ASCII digits parses.
fn parse_strict_decimal<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Reads one PDU from `reader`.
///
/// Returns `Ok(None)` only when zero bytes were read before any header
/// line — a clean EOF between frames. Any other incomplete read (a header
/// line with no terminator, a header block with no blank-line terminator,
/// or a body shorter than `Content-Length`) is `ProtocolError::ShortRead`.
pub async fn read_pdu<R>(reader: &mut R) -> Result<Option<Pdu>, ReadError>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut headers: HashMap<String, String> = HashMap::new();
    let mut total_bytes = 0usize;
    let mut line_count = 0usize;
    let mut first_line = true;

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;

        if n == 0 {
            if first_line {
                return Ok(None);
            }
            return Err(ProtocolError::ShortRead.into());
        }
        first_line = false;

        // Blank line (possibly with a trailing CR) ends the header block.
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }

        line_count += 1;
        total_bytes += line.len();
        if line_count > MAX_HEADER_LINES || total_bytes > MAX_HEADER_BYTES {
            return Err(ProtocolError::HeaderBudgetExceeded {
                lines: line_count,
                bytes: total_bytes,
            }
            .into());
        }

        let Some((name, value)) = trimmed.split_once(": ") else {
            return Err(ProtocolError::MalformedHeader(trimmed.to_string()).into());
        };

        if headers.insert(name.to_string(), value.to_string()).is_some() {
            // Duplicate headers are ignored by name lookup below (last one
            // wins via HashMap::insert); we only reject the well-known
            // required headers from repeating, which would otherwise be
            // silently ambiguous.
            if matches!(
                name,
                "Content-Type" | "Content-Length" | "Onion-ID" | "Listening-Port" | "Nickname"
            ) {
                return Err(ProtocolError::DuplicateHeader(static_header_name(name)).into());
            }
        }
    }

    let content_type_raw = require_header(&headers, "Content-Type")?;
    let content_length_raw = require_header(&headers, "Content-Length")?;
    let onion_id = require_header(&headers, "Onion-ID")?.to_string();
    let listening_port_raw = require_header(&headers, "Listening-Port")?;
    let nickname = require_header(&headers, "Nickname")?.to_string();

    let content_length: u32 = parse_strict_decimal(content_length_raw).ok_or_else(|| {
        ProtocolError::InvalidHeaderValue {
            name: "Content-Length",
            value: content_length_raw.to_string(),
        }
    })?;
    if content_length > MAX_CONTENT {
        return Err(ProtocolError::ContentTooLarge(content_length).into());
    }

    let listening_port: u16 = parse_strict_decimal(listening_port_raw).ok_or_else(|| {
        ProtocolError::InvalidHeaderValue {
            name: "Listening-Port",
            value: listening_port_raw.to_string(),
        }
    })?;

    let mut content = vec![0u8; content_length as usize];
    if let Err(e) = reader.read_exact(&mut content).await {
        return Err(if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::ShortRead.into()
        } else {
            e.into()
        });
    }

    Ok(Some(Pdu {
        content_type: ContentType::from_wire_str(content_type_raw),
        sender_onion_id: onion_id,
        sender_listening_port: listening_port,
        sender_nickname: nickname,
        content,
    }))
}

fn require_header<'a>(
    headers: &'a HashMap<String, String>,
    name: &'static str,
) -> Result<&'a str, ProtocolError> {
    headers
        .get(name)
        .map(String::as_str)
        .ok_or(ProtocolError::MissingHeader(name))
}

/// Maps a runtime header name back to the `&'static str` spelling used in
/// `ProtocolError::DuplicateHeader`, since the match above only reaches
/// this branch for the five well-known names.
fn static_header_name(name: &str) -> &'static str {
    match name {
        "Content-Type" => "Content-Type",
        "Content-Length" => "Content-Length",
        "Onion-ID" => "Onion-ID",
        "Listening-Port" => "Listening-Port",
        "Nickname" => "Nickname",
        _ => "unknown",
    }
}

/// Writes `pdu` to `writer` as a single logical frame: headers in
/// declaration order, a blank line, then the body bytes verbatim.
pub async fn write_pdu<W>(writer: &mut W, pdu: &Pdu) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = format!(
        "Content-Type: {}\nContent-Length: {}\nOnion-ID: {}\nListening-Port: {}\nNickname: {}\n\n",
        pdu.content_type.as_wire_str(),
        pdu.content.len(),
        pdu.sender_onion_id,
        pdu.sender_listening_port,
        pdu.sender_nickname,
    )
    .into_bytes();
    frame.extend_from_slice(&pdu.content);
    writer.write_all(&frame).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    fn sample_pdu(body: &[u8]) -> Pdu {
        Pdu::new(
            ContentType::TextPlain,
            "aaaaaaaaaaaaaaaa",
            7777,
            "alice",
            body.to_vec(),
        )
    }

    #[tokio::test]
    async fn round_trip() {
        let pdu = sample_pdu(b"hello");
        let mut buf = Vec::new();
        write_pdu(&mut buf, &pdu).await.unwrap();
        let mut reader = BufReader::new(Cursor::new(buf));
        let decoded = read_pdu(&mut reader).await.unwrap().unwrap();
        assert_eq!(decoded, pdu);
    }

    #[tokio::test]
    async fn empty_body_is_valid() {
        let pdu = sample_pdu(b"");
        let mut buf = Vec::new();
        write_pdu(&mut buf, &pdu).await.unwrap();
        let mut reader = BufReader::new(Cursor::new(buf));
        let decoded = read_pdu(&mut reader).await.unwrap().unwrap();
        assert!(decoded.content.is_empty());
    }

    #[tokio::test]
    async fn clean_eof_before_any_header_is_none() {
        let mut reader = BufReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(read_pdu(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn short_body_is_protocol_error() {
        let raw =
            b"Content-Type: text/plain\nContent-Length: 10\nOnion-ID: aaaaaaaaaaaaaaaa\nListening-Port: 7777\nNickname: alice\n\nshort";
        let mut reader = BufReader::new(Cursor::new(raw.to_vec()));
        let err = read_pdu(&mut reader).await.unwrap_err();
        assert!(matches!(err, ReadError::Protocol(ProtocolError::ShortRead)));
    }

    #[tokio::test]
    async fn missing_header_is_protocol_error() {
        let raw = b"Content-Type: text/plain\nContent-Length: 0\n\n";
        let mut reader = BufReader::new(Cursor::new(raw.to_vec()));
        let err = read_pdu(&mut reader).await.unwrap_err();
        assert!(matches!(
            err,
            ReadError::Protocol(ProtocolError::MissingHeader("Onion-ID"))
        ));
    }

    #[tokio::test]
    async fn content_length_at_max_succeeds() {
        let body = vec![b'x'; MAX_CONTENT as usize];
        let pdu = sample_pdu(&body);
        let mut buf = Vec::new();
        write_pdu(&mut buf, &pdu).await.unwrap();
        let mut reader = BufReader::new(Cursor::new(buf));
        let decoded = read_pdu(&mut reader).await.unwrap().unwrap();
        assert_eq!(decoded.content.len(), MAX_CONTENT as usize);
    }

    #[tokio::test]
    async fn content_length_over_max_is_rejected() {
        let raw = format!(
            "Content-Type: text/plain\nContent-Length: {}\nOnion-ID: aaaaaaaaaaaaaaaa\nListening-Port: 7777\nNickname: alice\n\n",
            MAX_CONTENT + 1
        );
        let mut reader = BufReader::new(Cursor::new(raw.into_bytes()));
        let err = read_pdu(&mut reader).await.unwrap_err();
        assert!(matches!(
            err,
            ReadError::Protocol(ProtocolError::ContentTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn signed_content_length_is_rejected() {
        let raw =
            b"Content-Type: text/plain\nContent-Length: +5\nOnion-ID: aaaaaaaaaaaaaaaa\nListening-Port: 7777\nNickname: alice\n\nhello";
        let mut reader = BufReader::new(Cursor::new(raw.to_vec()));
        let err = read_pdu(&mut reader).await.unwrap_err();
        assert!(matches!(
            err,
            ReadError::Protocol(ProtocolError::InvalidHeaderValue { name: "Content-Length", .. })
        ));
    }

    #[tokio::test]
    async fn unknown_content_type_decodes_as_other() {
        let raw =
            b"Content-Type: x/custom\nContent-Length: 0\nOnion-ID: aaaaaaaaaaaaaaaa\nListening-Port: 7777\nNickname: alice\n\n";
        let mut reader = BufReader::new(Cursor::new(raw.to_vec()));
        let decoded = read_pdu(&mut reader).await.unwrap().unwrap();
        assert_eq!(decoded.content_type, ContentType::Other("x/custom".to_string()));
    }

    #[tokio::test]
    async fn header_budget_exceeded_is_rejected() {
        let mut raw = String::new();
        for i in 0..(MAX_HEADER_LINES + 1) {
            raw.push_str(&format!("X-Filler-{i}: v\n"));
        }
        raw.push('\n');
        let mut reader = BufReader::new(Cursor::new(raw.into_bytes()));
        let err = read_pdu(&mut reader).await.unwrap_err();
        assert!(matches!(
            err,
            ReadError::Protocol(ProtocolError::HeaderBudgetExceeded { .. })
        ));
    }
}
