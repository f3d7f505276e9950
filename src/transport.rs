//! The dial-out abstraction.
//!
//! This engine never touches the anonymizing network itself (a Tor SOCKS
//! dial is out of scope here); it only names the shape every transport
//! must have: given a peer's onion-id and listening port, produce a
//! bidirectional byte stream. [`LoopbackTransport`]
//! is the reference implementation — it dials `127.0.0.1:port`, standing
//! in for a SOCKS proxy that would otherwise resolve `onion_id` to a
//! circuit. A production build swaps it for a real SOCKS-dialing
//! transport without touching anything above this trait.

use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::constants::LISTEN_ADDR;

/// A boxed, type-erased bidirectional stream, so callers above this
/// module never need to know which transport produced it.
pub type PeerStream = Pin<Box<dyn AsyncReadWrite + Send>>;

/// Convenience supertrait so `Pin<Box<dyn _>>` has one bound to name.
pub trait AsyncReadWrite: AsyncRead + AsyncWrite {}
impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("dial to {onion_id}:{port} failed: {source}")]
    Dial {
        onion_id: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// Dials a peer by identity and returns a connected stream.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dial(&self, onion_id: &str, port: u16) -> Result<PeerStream, TransportError>;
}

/// Dials the local loopback interface directly, ignoring `onion_id` apart
/// from using it in error messages. Exercises the full engine over a real
/// TCP socket without requiring an actual Tor hidden service in tests or
/// local development.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopbackTransport;

#[async_trait]
impl Transport for LoopbackTransport {
    async fn dial(&self, onion_id: &str, port: u16) -> Result<PeerStream, TransportError> {
        let stream = TcpStream::connect((LISTEN_ADDR, port))
            .await
            .map_err(|source| TransportError::Dial {
                onion_id: onion_id.to_string(),
                port,
                source,
            })?;
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn dials_local_listener() {
        let listener = TcpListener::bind((LISTEN_ADDR, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let accept = tokio::spawn(async move { listener.accept().await });

        let transport = LoopbackTransport;
        let stream = transport.dial("aaaaaaaaaaaaaaaa", port).await;
        assert!(stream.is_ok());
        accept.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn dial_to_closed_port_fails() {
        let listener = TcpListener::bind((LISTEN_ADDR, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = LoopbackTransport;
        let result = transport.dial("aaaaaaaaaaaaaaaa", port).await;
        assert!(result.is_err());
    }
}
