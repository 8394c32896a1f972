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

//! Transport layer abstractions.
//!
//! The connection manager never talks to sockets directly. It goes through a
//! [`Transport`], which builds a connection for a URI, performs the opening
//! handshake and hands back a frame sink and stream. This module includes two
//! implementations:
//!
//! - [`WebSocketTransport`]: `tokio-tungstenite` client (requires the
//!   `websocket` feature, on by default)
//! - [`MemoryTransport`]: in-process channels for tests and demos
//!
//! # Frames
//!
//! Connections move whole messages, not bytes. A [`Frame`] is either a text
//! message or a close frame carrying a [`CloseCode`] and reason.
//!
//! # Error Handling
//!
//! All transport operations return [`TransportError`]. Failures of
//! [`Transport::resolve`] are construction failures and surface to callers as
//! `CannotConnect`; failures of [`Transport::open`] are handshake failures and
//! surface as `RemoteConnectFailed`.

mod error;
mod memory;
mod traits;
mod types;
#[cfg(feature = "websocket")]
mod websocket;

pub use self::error::TransportError;
pub use self::memory::{MemoryAcceptor, MemoryPeer, MemoryTransport};
pub use self::traits::{FrameSink, FrameStream, Opened, Transport};
pub use self::types::{CloseCode, CloseFrame, Endpoint, Frame};
#[cfg(feature = "websocket")]
pub use self::websocket::{WebSocketConfig, WebSocketTransport};
