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

use crate::transport::{Endpoint, Frame, TransportError};
use futures_util::{Sink, Stream};
use std::pin::Pin;

/// Outbound half of an open connection.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// Inbound half of an open connection, in wire order.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// A connection whose opening handshake completed.
pub struct Opened {
    /// Value of the remote's `Server` response header, if it sent one
    pub server: Option<String>,
    /// Frames to the remote
    pub sink: FrameSink,
    /// Frames from the remote
    pub stream: FrameStream,
}

impl std::fmt::Debug for Opened {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Opened")
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

/// Message-oriented socket provider.
///
/// A transport splits connecting into two steps so the connection manager can
/// tell construction failures apart from handshake failures:
///
/// 1. [`resolve`](Transport::resolve) runs synchronously on the caller's
///    thread and rejects URIs the provider cannot build a connection for.
/// 2. [`open`](Transport::open) runs on the manager's event loop and performs
///    the handshake, yielding a frame sink and stream.
///
/// # Examples
///
/// ```rust
/// use patient_link::transport::{MemoryTransport, Transport};
///
/// let (transport, _acceptor) = MemoryTransport::new();
/// assert!(transport.resolve("memory://server").is_ok());
/// assert!(transport.resolve("nope").is_err());
/// ```
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Short name used in logs (e.g. `"websocket"`, `"memory"`).
    fn transport_type(&self) -> &'static str;

    /// Builds a connection request for `uri` without touching the network.
    #[allow(clippy::result_large_err)]
    fn resolve(&self, uri: &str) -> Result<Endpoint, TransportError>;

    /// Performs the opening handshake with `endpoint`.
    async fn open(&self, endpoint: &Endpoint) -> Result<Opened, TransportError>;
}
