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

//! Top-level error types.
//!
//! The client distinguishes two layers:
//!
//! 1. **Transport**: socket-level failures ([`TransportError`])
//! 2. **Client**: failures of a manager operation or a protocol exchange
//!    ([`ClientError`]), which wrap a transport error where one exists
//!
//! # Propagation
//!
//! Construction and registry-lookup failures are returned synchronously from
//! the call that caused them. Everything that happens after a connection
//! object exists (handshake outcome, protocol completion) is delivered only
//! through the [`Completion`](crate::Completion) of the operation.
//!
//! # Examples
//!
//! ```rust
//! use patient_link::{ClientError, ConnectionId, ErrorKind};
//!
//! let error = ClientError::ConnectionNotFound { id: ConnectionId::new(7) };
//! assert_eq!(error.kind(), ErrorKind::ConnectionNotFound);
//! assert_eq!(error.kind().status(), 2);
//! assert_eq!(error.to_string(), "no connection found with id: 7");
//! ```

use crate::connection::ConnectionId;
use crate::transport::TransportError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by the connection manager and the retrieval protocol.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport could not build a connection for the URI.
    ///
    /// Raised before any registry entry is created.
    #[error("cannot connect to {uri}: {source}")]
    CannotConnect {
        /// The URI that was rejected
        uri: String,
        /// The construction failure
        #[source]
        source: TransportError,
    },

    /// An operation referenced an ID the manager never assigned.
    #[error("no connection found with id: {id}")]
    ConnectionNotFound {
        /// The unknown ID
        id: ConnectionId,
    },

    /// The transport refused to initiate a close.
    #[error("error initiating close on connection {id}: {source}")]
    CannotCloseConnection {
        /// The connection being closed
        id: ConnectionId,
        /// The transport failure
        #[source]
        source: TransportError,
    },

    /// The transport refused to accept a message.
    #[error("error sending message on connection {id}: {source}")]
    CannotSendMessage {
        /// The connection being written to
        id: ConnectionId,
        /// The transport failure
        #[source]
        source: TransportError,
    },

    /// The opening handshake failed.
    #[error("connection to {uri} failed: {reason}")]
    RemoteConnectFailed {
        /// The URI that was being opened
        uri: String,
        /// Transport diagnostic text
        reason: String,
    },

    /// A payload did not have the expected shape.
    #[error("protocol error: {reason}")]
    ProtocolError {
        /// What was wrong with the payload
        reason: String,
    },

    /// The producer of a completion went away without fulfilling it.
    ///
    /// Happens when a connection drops before its session finished, or when
    /// the manager is torn down while a connect is still pending.
    #[error("operation abandoned before completion")]
    Abandoned,

    /// The operation did not finish within the configured bound.
    #[error("operation timed out after {duration:?}")]
    Timeout {
        /// The bound that was exceeded
        duration: Duration,
    },

    /// An operation was issued before [`init`](crate::ConnectionManager::init).
    #[error("connection manager is not initialized")]
    NotInitialized,

    /// [`init`](crate::ConnectionManager::init) was called a second time.
    #[error("connection manager is already initialized")]
    AlreadyInitialized,

    /// The background event loop could not be started.
    #[error("failed to start the event loop: {source}")]
    Runtime {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Creates a protocol error from anything printable.
    pub fn protocol(reason: impl Into<String>) -> Self {
        ClientError::ProtocolError {
            reason: reason.into(),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::CannotConnect { .. } => ErrorKind::CannotConnect,
            ClientError::ConnectionNotFound { .. } => ErrorKind::ConnectionNotFound,
            ClientError::CannotCloseConnection { .. } => ErrorKind::CannotCloseConnection,
            ClientError::CannotSendMessage { .. } => ErrorKind::CannotSendMessage,
            ClientError::RemoteConnectFailed { .. } => ErrorKind::RemoteConnectFailed,
            ClientError::ProtocolError { .. } => ErrorKind::ProtocolError,
            ClientError::Abandoned => ErrorKind::Abandoned,
            ClientError::Timeout { .. } => ErrorKind::Timeout,
            ClientError::NotInitialized
            | ClientError::AlreadyInitialized
            | ClientError::Runtime { .. } => ErrorKind::Lifecycle,
        }
    }

    /// Returns the underlying transport error, if any.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            ClientError::CannotConnect { source, .. }
            | ClientError::CannotCloseConnection { source, .. }
            | ClientError::CannotSendMessage { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Distinguishing kind of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Socket construction or resolution failed
    CannotConnect,
    /// Unknown connection ID
    ConnectionNotFound,
    /// Transport failed to initiate a close
    CannotCloseConnection,
    /// Transport failed to accept a message
    CannotSendMessage,
    /// Opening handshake failed
    RemoteConnectFailed,
    /// Payload did not match the expected shape
    ProtocolError,
    /// Completion dropped without a value
    Abandoned,
    /// Configured bound exceeded
    Timeout,
    /// Manager used out of order or failed to start
    Lifecycle,
}

impl ErrorKind {
    /// Numeric status for this kind, suitable as a process exit code.
    ///
    /// `0` is reserved for success.
    pub const fn status(self) -> i32 {
        match self {
            ErrorKind::CannotConnect => 1,
            ErrorKind::ConnectionNotFound => 2,
            ErrorKind::CannotCloseConnection => 3,
            ErrorKind::CannotSendMessage => 4,
            ErrorKind::RemoteConnectFailed => 5,
            ErrorKind::ProtocolError => 6,
            ErrorKind::Abandoned => 7,
            ErrorKind::Timeout => 8,
            ErrorKind::Lifecycle => 9,
        }
    }

    /// Returns the name of this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::CannotConnect => "CannotConnect",
            ErrorKind::ConnectionNotFound => "ConnectionNotFound",
            ErrorKind::CannotCloseConnection => "CannotCloseConnection",
            ErrorKind::CannotSendMessage => "CannotSendMessage",
            ErrorKind::RemoteConnectFailed => "RemoteConnectFailed",
            ErrorKind::ProtocolError => "ProtocolError",
            ErrorKind::Abandoned => "Abandoned",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Lifecycle => "Lifecycle",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
