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

use crate::transport::TransportError;
use std::fmt;
use url::Url;

/// A remote endpoint that a connection can be built for.
///
/// Endpoints are produced by [`Transport::resolve`](crate::transport::Transport::resolve),
/// which is where malformed URIs are rejected. Holding an `Endpoint` means
/// construction succeeded; opening it may still fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    uri: String,
    url: Url,
}

impl Endpoint {
    /// Parses `uri`, requiring an absolute URL with a host.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use patient_link::transport::Endpoint;
    ///
    /// let endpoint = Endpoint::parse("ws://127.0.0.1:4645").unwrap();
    /// assert_eq!(endpoint.scheme(), "ws");
    /// assert_eq!(endpoint.host(), "127.0.0.1");
    /// assert!(Endpoint::parse("no scheme here").is_err());
    /// ```
    pub fn parse(uri: &str) -> Result<Self, TransportError> {
        let url = Url::parse(uri).map_err(|e| TransportError::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;

        match url.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => {
                return Err(TransportError::InvalidUri {
                    uri: uri.to_string(),
                    reason: "missing host".to_string(),
                });
            }
        }

        Ok(Self {
            uri: uri.to_string(),
            url,
        })
    }

    /// The URI exactly as it was given.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The URL scheme, lowercased.
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// The host component.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// The explicit or scheme-default port, if one is known.
    pub fn port(&self) -> Option<u16> {
        self.url.port_or_known_default()
    }

    /// `host:port` when the port is known, otherwise the bare host.
    pub fn authority(&self) -> String {
        match self.port() {
            Some(port) => format!("{}:{}", self.host(), port),
            None => self.host().to_string(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Status code carried by a close frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 1000: the purpose of the connection was fulfilled
    Normal,
    /// 1001: the endpoint is going away
    GoingAway,
    /// 1002: a protocol error was detected
    Protocol,
    /// 1006: the connection dropped without a close frame
    Abnormal,
    /// Any other code
    Other(u16),
}

impl CloseCode {
    /// Returns the numeric status code.
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::GoingAway => 1001,
            Self::Protocol => 1002,
            Self::Abnormal => 1006,
            Self::Other(code) => code,
        }
    }

    /// Human-readable name of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "Normal close",
            Self::GoingAway => "Going away",
            Self::Protocol => "Protocol error",
            Self::Abnormal => "Abnormal close",
            Self::Other(_) => "Unknown",
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::GoingAway,
            1002 => Self::Protocol,
            1006 => Self::Abnormal,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u16(), self.as_str())
    }
}

/// Code and reason of a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// Close status code
    pub code: CloseCode,
    /// Free-form reason text, possibly empty
    pub reason: String,
}

impl CloseFrame {
    /// Creates a close frame.
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// A message-level unit moved over a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete text message
    Text(String),
    /// A close request or acknowledgement
    Close(Option<CloseFrame>),
}
