//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! In-memory transport implementation for testing.
//!
//! This module provides a [`Transport`] that uses Tokio channels instead of
//! sockets. Every successful [`open`](Transport::open) hands the server side
//! of the new connection to a [`MemoryAcceptor`] as a [`MemoryPeer`], which a
//! test drives to script the remote's behavior frame by frame.

use crate::transport::{CloseCode, CloseFrame, Endpoint, Frame, Opened, Transport, TransportError};
use futures_util::{sink, stream};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// In-memory transport implementation.
///
/// # Examples
///
/// ```rust
/// use patient_link::transport::{Frame, MemoryTransport, Transport};
/// use futures_util::{SinkExt, StreamExt};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (transport, mut acceptor) = MemoryTransport::new();
/// let endpoint = transport.resolve("memory://server")?;
/// let mut opened = transport.open(&endpoint).await?;
/// let mut peer = acceptor.accept().await.unwrap();
///
/// opened.sink.send(Frame::Text("hello".into())).await?;
/// assert_eq!(peer.recv_text().await.as_deref(), Some("hello"));
///
/// peer.send_text("world")?;
/// let frame = opened.stream.next().await.unwrap()?;
/// assert_eq!(frame, Frame::Text("world".into()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    acceptor: mpsc::UnboundedSender<MemoryPeer>,
    server: Option<String>,
}

/// Receives the server side of connections opened through a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemoryAcceptor {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

/// Server side of one in-memory connection.
#[derive(Debug)]
pub struct MemoryPeer {
    uri: String,
    from_client: mpsc::UnboundedReceiver<Frame>,
    to_client: mpsc::UnboundedSender<Frame>,
}

impl MemoryTransport {
    /// Creates a transport and the acceptor that receives its connections.
    ///
    /// Dropping the acceptor makes every later `open` fail as if the remote
    /// refused the connection.
    pub fn new() -> (Self, MemoryAcceptor) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                acceptor: tx,
                server: None,
            },
            MemoryAcceptor { peers: rx },
        )
    }

    /// Sets the banner reported for every connection opened by this transport.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    fn transport_type(&self) -> &'static str {
        "memory"
    }

    fn resolve(&self, uri: &str) -> Result<Endpoint, TransportError> {
        Endpoint::parse(uri)
    }

    async fn open(&self, endpoint: &Endpoint) -> Result<Opened, TransportError> {
        let (client_tx, from_client) = mpsc::unbounded_channel();
        let (to_client, client_rx) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            uri: endpoint.uri().to_string(),
            from_client,
            to_client,
        };
        self.acceptor
            .send(peer)
            .map_err(|_| TransportError::ConnectionFailed {
                address: endpoint.authority(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "acceptor dropped"),
            })?;

        debug!(uri = %endpoint, "Opened memory connection");

        // Mirrors a WebSocket peer: a close from the server is answered with
        // the same close frame unless the client closed first.
        let closing = Arc::new(AtomicBool::new(false));
        let replies = client_tx.clone();

        let sink = sink::unfold(
            (client_tx, Arc::clone(&closing)),
            |(tx, closing): (mpsc::UnboundedSender<Frame>, Arc<AtomicBool>), frame: Frame| async move {
                if matches!(frame, Frame::Close(_)) {
                    closing.store(true, Ordering::SeqCst);
                }
                tx.send(frame).map_err(|_| TransportError::Closed)?;
                Ok::<_, TransportError>((tx, closing))
            },
        );
        let stream = stream::unfold((client_rx, replies, closing), |(mut rx, replies, closing)| async move {
            let frame = rx.recv().await?;
            if let Frame::Close(close) = &frame {
                if !closing.swap(true, Ordering::SeqCst) {
                    let _ = replies.send(Frame::Close(close.clone()));
                }
            }
            Some((Ok::<_, TransportError>(frame), (rx, replies, closing)))
        });

        Ok(Opened {
            server: self.server.clone(),
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

impl MemoryAcceptor {
    /// Waits for the next connection to be opened.
    ///
    /// Returns `None` once every [`MemoryTransport`] clone has been dropped.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }
}

impl MemoryPeer {
    /// The URI the client opened.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Waits for the next frame sent by the client.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.from_client.recv().await
    }

    /// Waits for the next text frame sent by the client.
    ///
    /// Returns `None` when the client sends a close frame or goes away.
    pub async fn recv_text(&mut self) -> Option<String> {
        match self.recv().await? {
            Frame::Text(text) => Some(text),
            Frame::Close(_) => None,
        }
    }

    /// Sends a text frame to the client.
    #[allow(clippy::result_large_err)]
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.to_client
            .send(Frame::Text(text.into()))
            .map_err(|_| TransportError::Closed)
    }

    /// Sends a close frame to the client.
    #[allow(clippy::result_large_err)]
    pub fn close(&self, code: CloseCode, reason: &str) -> Result<(), TransportError> {
        self.to_client
            .send(Frame::Close(Some(CloseFrame::new(code, reason))))
            .map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (transport, mut acceptor) = MemoryTransport::new();
        let transport = transport.with_server("memory-test");
        let endpoint = transport.resolve("memory://server").unwrap();

        let mut opened = transport.open(&endpoint).await.unwrap();
        assert_eq!(opened.server.as_deref(), Some("memory-test"));

        let mut peer = acceptor.accept().await.unwrap();
        assert_eq!(peer.uri(), "memory://server");

        opened.sink.send(Frame::Text("ping".into())).await.unwrap();
        assert_eq!(peer.recv_text().await.as_deref(), Some("ping"));

        peer.close(CloseCode::Normal, "done").unwrap();
        let frame = opened.stream.next().await.unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Close(Some(CloseFrame::new(CloseCode::Normal, "done")))
        );
        assert_eq!(
            peer.recv().await,
            Some(Frame::Close(Some(CloseFrame::new(CloseCode::Normal, "done"))))
        );
    }

    #[tokio::test]
    async fn test_close_reply_is_not_echoed() {
        let (transport, mut acceptor) = MemoryTransport::new();
        let endpoint = transport.resolve("memory://server").unwrap();
        let mut opened = transport.open(&endpoint).await.unwrap();
        let mut peer = acceptor.accept().await.unwrap();

        let close = Frame::Close(Some(CloseFrame::new(CloseCode::GoingAway, "")));
        opened.sink.send(close.clone()).await.unwrap();
        assert_eq!(peer.recv().await, Some(close.clone()));

        peer.close(CloseCode::GoingAway, "").unwrap();
        assert_eq!(opened.stream.next().await.unwrap().unwrap(), close);

        drop(opened);
        assert_eq!(peer.recv().await, None);
    }

    #[tokio::test]
    async fn test_stream_ends_when_peer_dropped() {
        let (transport, mut acceptor) = MemoryTransport::new();
        let endpoint = transport.resolve("memory://server").unwrap();
        let mut opened = transport.open(&endpoint).await.unwrap();

        drop(acceptor.accept().await.unwrap());
        assert!(opened.stream.next().await.is_none());
        assert!(opened.sink.send(Frame::Text("late".into())).await.is_err());
    }

    #[tokio::test]
    async fn test_open_fails_without_acceptor() {
        let (transport, acceptor) = MemoryTransport::new();
        drop(acceptor);

        let endpoint = transport.resolve("memory://server").unwrap();
        let err = transport.open(&endpoint).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed { .. }));
    }
}
