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

//! Transport layer error types.
//!
//! Transport errors are the lowest level in the client's error hierarchy and
//! represent failures of the underlying socket: building a connection for a
//! URI, performing the opening handshake, or moving frames once open. The
//! connection manager wraps them into [`ClientError`](crate::ClientError)
//! values that carry the operation that failed.

use std::io;
use thiserror::Error;

/// Errors that can occur in the transport layer.
///
/// # Examples
///
/// ```rust
/// use patient_link::transport::TransportError;
///
/// let error = TransportError::InvalidUri {
///     uri: "not a uri".to_string(),
///     reason: "relative URL without a base".to_string(),
/// };
/// assert!(!error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum TransportError {
    /// The URI could not be turned into a connection request.
    ///
    /// This happens while constructing the connection, before any I/O, and
    /// is never recoverable.
    #[error("invalid URI {uri:?}: {reason}")]
    InvalidUri {
        /// The URI that was rejected
        uri: String,
        /// Why it was rejected
        reason: String,
    },

    /// Failed to establish a connection to the remote endpoint.
    #[error("failed to connect to {address}: {source}")]
    ConnectionFailed {
        /// The address that failed to connect
        address: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The opening handshake was rejected by the remote.
    #[error("handshake with {address} failed: {reason}")]
    HandshakeFailed {
        /// The address the handshake was attempted with
        address: String,
        /// Description of why the handshake failed
        reason: String,
    },

    /// The connection is no longer able to carry frames.
    ///
    /// Returned when sending or closing on a connection whose I/O task has
    /// already finished.
    #[error("connection is closed")]
    Closed,

    /// A message arrived that cannot be carried as text.
    #[error("invalid payload: {reason}")]
    InvalidPayload {
        /// Why the payload was rejected
        reason: String,
    },

    /// An unexpected I/O error occurred.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// WebSocket-specific error occurred.
    #[cfg(feature = "websocket")]
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl TransportError {
    /// Returns `true` if retrying the same operation later could succeed.
    ///
    /// Nothing in this crate retries; the predicate is surfaced for callers
    /// that want to decide for themselves.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransportError::ConnectionFailed { .. } => true,
            TransportError::Io { source } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),

            #[cfg(feature = "websocket")]
            TransportError::WebSocket(e) => {
                use tokio_tungstenite::tungstenite::Error as WsError;
                matches!(e, WsError::Io(_))
            }

            TransportError::InvalidUri { .. }
            | TransportError::HandshakeFailed { .. }
            | TransportError::InvalidPayload { .. }
            | TransportError::Closed => false,
        }
    }

    /// Returns `true` if this error means the connection is gone for good.
    pub fn is_closed(&self) -> bool {
        match self {
            TransportError::Closed => true,

            #[cfg(feature = "websocket")]
            TransportError::WebSocket(e) => {
                use tokio_tungstenite::tungstenite::Error as WsError;
                matches!(e, WsError::ConnectionClosed | WsError::AlreadyClosed)
            }

            _ => false,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        TransportError::Io { source: error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_uri_not_recoverable() {
        let error = TransportError::InvalidUri {
            uri: "::".to_string(),
            reason: "empty host".to_string(),
        };
        assert!(!error.is_recoverable());
        assert!(!error.is_closed());
        assert!(error.to_string().contains("\"::\""));
    }

    #[test]
    fn test_connection_failed_is_recoverable() {
        let error = TransportError::ConnectionFailed {
            address: "127.0.0.1:4645".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_closed_is_closed() {
        assert!(TransportError::Closed.is_closed());
        assert!(!TransportError::Closed.is_recoverable());
    }

    #[test]
    fn test_invalid_payload_is_final() {
        let error = TransportError::InvalidPayload {
            reason: "binary message is not UTF-8".to_string(),
        };
        assert!(!error.is_recoverable());
        assert!(!error.is_closed());
        assert_eq!(error.to_string(), "invalid payload: binary message is not UTF-8");
    }

    #[test]
    fn test_transient_io_error_is_recoverable() {
        let error: TransportError = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert!(error.is_recoverable());

        let error: TransportError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(!error.is_recoverable());
    }
}
