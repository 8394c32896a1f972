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

//! WebSocket transport implementation.
//!
//! This module provides the production [`Transport`] for the client, built on
//! `tokio-tungstenite`. It accepts `ws://` URIs (and `wss://` when the
//! underlying TLS features of `tokio-tungstenite` are enabled by the final
//! binary), moves text frames, and reports the remote's `Server` header as
//! the connection banner.
//!
//! # Example
//!
//! ```rust,no_run
//! use patient_link::transport::{Transport, WebSocketConfig, WebSocketTransport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = WebSocketTransport::new(WebSocketConfig::default());
//! let endpoint = transport.resolve("ws://127.0.0.1:4645")?;
//! let opened = transport.open(&endpoint).await?;
//! println!("connected to {:?}", opened.server);
//! # Ok(())
//! # }
//! ```

use crate::transport::{
    CloseCode, CloseFrame, Endpoint, Frame, Opened, Transport, TransportError,
};
use futures_util::{SinkExt, StreamExt, future};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::{
    CloseFrame as WsCloseFrame, WebSocketConfig as WsConfig,
};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

/// Configuration for WebSocket transport.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Maximum size of a single WebSocket frame (default: 16 MB)
    pub max_frame_size: usize,

    /// Maximum size of a complete message (default: 64 MB)
    pub max_message_size: usize,

    /// Disable Nagle's algorithm on the underlying TCP socket (default: true)
    pub nodelay: bool,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,   // 16 MB
            max_message_size: 64 * 1024 * 1024, // 64 MB
            nodelay: true,
        }
    }
}

impl WebSocketConfig {
    fn to_tungstenite(&self) -> WsConfig {
        let mut config = WsConfig::default();
        config.max_frame_size = Some(self.max_frame_size);
        config.max_message_size = Some(self.max_message_size);
        config
    }
}

/// WebSocket provider for the connection manager.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport {
    config: WebSocketConfig,
}

impl WebSocketTransport {
    /// Creates a WebSocket transport with the given configuration.
    pub fn new(config: WebSocketConfig) -> Self {
        Self { config }
    }

    /// Get the WebSocket configuration.
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    fn transport_type(&self) -> &'static str {
        "websocket"
    }

    fn resolve(&self, uri: &str) -> Result<Endpoint, TransportError> {
        let endpoint = Endpoint::parse(uri)?;
        match endpoint.scheme() {
            "ws" | "wss" => Ok(endpoint),
            other => Err(TransportError::InvalidUri {
                uri: uri.to_string(),
                reason: format!("unsupported scheme {other:?}, expected ws or wss"),
            }),
        }
    }

    async fn open(&self, endpoint: &Endpoint) -> Result<Opened, TransportError> {
        let (ws_stream, response) = tokio_tungstenite::connect_async_with_config(
            endpoint.uri(),
            Some(self.config.to_tungstenite()),
            self.config.nodelay,
        )
        .await
        .map_err(|e| handshake_error(endpoint, e))?;

        let server = response
            .headers()
            .get("server")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        debug!(uri = %endpoint, status = %response.status(), "WebSocket handshake completed");

        let (write, read) = ws_stream.split();
        let sink = write
            .sink_map_err(TransportError::from)
            .with(|frame: Frame| future::ready(Ok::<_, TransportError>(into_message(frame))));
        let stream = read.filter_map(|message| future::ready(from_message(message)));

        Ok(Opened {
            server,
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

fn handshake_error(endpoint: &Endpoint, error: WsError) -> TransportError {
    match error {
        WsError::Io(source) => TransportError::ConnectionFailed {
            address: endpoint.authority(),
            source,
        },
        WsError::Http(response) => TransportError::HandshakeFailed {
            address: endpoint.authority(),
            reason: format!("server answered HTTP {}", response.status()),
        },
        WsError::Url(e) => TransportError::InvalidUri {
            uri: endpoint.uri().to_string(),
            reason: e.to_string(),
        },
        other => TransportError::WebSocket(other),
    }
}

fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text),
        Frame::Close(close) => Message::Close(close.map(|c| WsCloseFrame {
            code: WsCloseCode::from(c.code.as_u16()),
            reason: c.reason.into(),
        })),
    }
}

/// Maps an inbound WebSocket message onto a frame.
///
/// Control frames are answered by tungstenite itself and never surface here.
/// Binary payloads are accepted when they hold UTF-8 text, so a server that
/// does not bother with text opcodes still works; anything else is an error.
fn from_message(message: Result<Message, WsError>) -> Option<Result<Frame, TransportError>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(Frame::Text(text))),
        Ok(Message::Binary(data)) => Some(String::from_utf8(data).map(Frame::Text).map_err(|e| {
            TransportError::InvalidPayload {
                reason: format!("binary message is not UTF-8: {e}"),
            }
        })),
        Ok(Message::Close(close)) => Some(Ok(Frame::Close(close.map(|c| {
            CloseFrame::new(CloseCode::from(u16::from(c.code)), c.reason.into_owned())
        })))),
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => None,
        Err(e) => Some(Err(TransportError::WebSocket(e))),
    }
}
