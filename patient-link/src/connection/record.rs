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

use crate::completion::Completer;
use crate::connection::{ConnectionContext, ConnectionId, MessageHandler};
use crate::transport::{CloseCode, CloseFrame, TransportError};
use parking_lot::RwLock;
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lifecycle status of a connection.
///
/// ```text
/// Connecting --open--> Opened --close--> Closed
///      |
///      +------fail---> Failed
/// ```
///
/// `Closed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Handshake in progress
    Connecting,
    /// Handshake completed, frames may flow
    Opened,
    /// Connection closed after being opened
    Closed,
    /// Handshake failed
    Failed,
}

impl ConnectionStatus {
    /// Returns `true` for `Closed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Opened => write!(f, "Opened"),
            Self::Closed => write!(f, "Closed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Work queued for a connection's I/O task.
#[derive(Debug)]
pub(crate) enum Command {
    Send(String),
    Close(CloseFrame),
}

/// Opaque reference to the socket behind a connection.
///
/// Sending and closing through a handle only queue work for the connection's
/// I/O task; they never block. Queued frames go out in order once the
/// connection is open. Once the I/O task has finished, both report
/// [`TransportError::Closed`].
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ConnectionHandle {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { commands: tx }, rx)
    }

    /// Queues a text message.
    #[allow(clippy::result_large_err)]
    pub fn send(&self, message: impl Into<String>) -> Result<(), TransportError> {
        self.commands
            .send(Command::Send(message.into()))
            .map_err(|_| TransportError::Closed)
    }

    /// Queues a close request.
    #[allow(clippy::result_large_err)]
    pub fn close(&self, code: CloseCode, reason: &str) -> Result<(), TransportError> {
        self.commands
            .send(Command::Close(CloseFrame::new(code, reason)))
            .map_err(|_| TransportError::Closed)
    }

    /// Returns `true` once the I/O task behind this handle has finished.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// The manager's tracked state for one connection.
///
/// Identity (`id`, `uri`, `handle`) is fixed at creation. The lifecycle part
/// (`status`, `last_error`, `server`) is written only by the manager's event
/// loop and can be read from any thread.
pub struct ConnectionRecord {
    id: ConnectionId,
    uri: String,
    handle: ConnectionHandle,
    state: RwLock<RecordState>,
}

#[derive(Debug)]
struct RecordState {
    status: ConnectionStatus,
    last_error: Option<String>,
    server: Option<String>,
}

impl ConnectionRecord {
    pub(crate) fn new(id: ConnectionId, uri: impl Into<String>, handle: ConnectionHandle) -> Self {
        Self {
            id,
            uri: uri.into(),
            handle,
            state: RwLock::new(RecordState {
                status: ConnectionStatus::Connecting,
                last_error: None,
                server: None,
            }),
        }
    }

    /// The ID assigned by the manager.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The remote URI this connection was created for.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The handle to the underlying socket.
    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ConnectionStatus {
        self.state.read().status
    }

    /// Diagnostic text recorded on fail or close.
    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    /// Banner the remote sent while opening, if any.
    pub fn server(&self) -> Option<String> {
        self.state.read().server.clone()
    }

    /// Handshake completed: record the banner and resolve the connect future.
    pub(crate) fn on_open(&self, server: Option<String>, completer: Completer<ConnectionId>) {
        let banner = server.clone().unwrap_or_else(|| "N/A".to_string());
        {
            let mut state = self.state.write();
            if state.status != ConnectionStatus::Connecting {
                warn!(connection_id = %self.id, status = %state.status, "Ignoring open event");
                return;
            }
            state.status = ConnectionStatus::Opened;
            state.server = server;
        }

        info!(
            connection_id = %self.id,
            server = %banner,
            "Connection to {} opened",
            self.uri
        );
        completer.complete(Ok(self.id));
    }

    /// Handshake failed: record the diagnostic and resolve the connect future
    /// with the failure.
    pub(crate) fn on_fail(&self, error: &TransportError, completer: Completer<ConnectionId>) {
        let reason = error.to_string();
        {
            let mut state = self.state.write();
            if state.status != ConnectionStatus::Connecting {
                warn!(connection_id = %self.id, status = %state.status, "Ignoring fail event");
                return;
            }
            state.status = ConnectionStatus::Failed;
            state.last_error = Some(reason.clone());
        }

        warn!(connection_id = %self.id, error = %reason, "Connection to {} failed", self.uri);
        completer.complete(Err(crate::ClientError::RemoteConnectFailed {
            uri: self.uri.clone(),
            reason,
        }));
    }

    /// Connection closed: record code and reason. Resolves nothing.
    ///
    /// A close without a close frame is recorded as an abnormal close.
    pub(crate) fn on_close(&self, close: Option<CloseFrame>) {
        let close = close.unwrap_or_else(|| CloseFrame::new(CloseCode::Abnormal, ""));
        {
            let mut state = self.state.write();
            if state.status != ConnectionStatus::Opened {
                debug!(connection_id = %self.id, status = %state.status, "Ignoring close event");
                return;
            }
            state.status = ConnectionStatus::Closed;
            state.last_error = Some(format!(
                "close code: {}, close reason: {}",
                close.code, close.reason
            ));
        }

        info!(connection_id = %self.id, code = %close.code, "Connection to {} closed", self.uri);
    }

    /// A text message arrived: hand it to the connection's behavior.
    pub(crate) fn on_message(
        &self,
        handler: &mut dyn MessageHandler,
        ctx: &mut dyn ConnectionContext,
        payload: &str,
    ) {
        debug!(connection_id = %self.id, bytes = payload.len(), "Message received");
        handler.on_message(ctx, payload);
    }
}

impl fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ConnectionRecord")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .field("status", &state.status)
            .field("last_error", &state.last_error)
            .field("server", &state.server)
            .finish()
    }
}
