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

//! Patient list client.

use crate::completion::AsyncResult;
use crate::connection::{ConnectionManager, ManagerConfig};
use crate::patient::Patient;
use crate::retrieval::protocol::PATIENTS_TOPIC;
use crate::retrieval::{fetch_list, fetch_list_blocking};
use crate::transport::Transport;
#[cfg(feature = "websocket")]
use crate::transport::{WebSocketConfig, WebSocketTransport};
use crate::ClientError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Server address used when none is configured.
pub const DEFAULT_ADDRESS: &str = "ws://apply.viewray.com:4645";

/// Configuration for [`PatientClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (default: [`DEFAULT_ADDRESS`])
    pub address: String,

    /// Bound on a whole fetch (default: none)
    ///
    /// When it expires the fetch fails with [`ClientError::Timeout`]. The
    /// connection it was using is left to the manager and closed on
    /// teardown.
    pub request_timeout: Option<Duration>,

    /// Connection manager configuration
    pub manager: ManagerConfig,

    /// WebSocket transport configuration
    #[cfg(feature = "websocket")]
    pub websocket: WebSocketConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            request_timeout: None,
            manager: ManagerConfig::default(),
            #[cfg(feature = "websocket")]
            websocket: WebSocketConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Bounds every fetch by `timeout`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the connection manager configuration.
    pub fn with_manager(mut self, manager: ManagerConfig) -> Self {
        self.manager = manager;
        self
    }

    /// Sets the WebSocket transport configuration.
    #[cfg(feature = "websocket")]
    pub fn with_websocket(mut self, websocket: WebSocketConfig) -> Self {
        self.websocket = websocket;
        self
    }
}

/// Client for the patient list service.
///
/// Every fetch opens its own connection, which the retrieval session closes
/// once the list is assembled.
///
/// # Example
///
/// ```rust,no_run
/// use patient_link::{ClientConfig, PatientClient};
///
/// # async fn example() -> Result<(), patient_link::ClientError> {
/// let mut client = PatientClient::new(ClientConfig::default().with_address("ws://127.0.0.1:4645"));
/// client.init()?;
///
/// for patient in client.fetch_patients().await?.values() {
///     println!("{patient}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PatientClient {
    address: String,
    request_timeout: Option<Duration>,
    manager: ConnectionManager,
}

impl PatientClient {
    /// Creates a client speaking WebSocket.
    #[cfg(feature = "websocket")]
    pub fn new(config: ClientConfig) -> Self {
        let transport = WebSocketTransport::new(config.websocket.clone());
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a client over the given transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            manager: ConnectionManager::with_config(transport, config.manager),
            address: config.address,
            request_timeout: config.request_timeout,
        }
    }

    /// Starts the client's event loop. Must be called once before fetching.
    pub fn init(&mut self) -> Result<(), ClientError> {
        self.manager.init()?;
        info!(address = %self.address, "Patient client ready");
        Ok(())
    }

    /// Fetches every patient, keyed by patient URI, diagnoses included.
    pub async fn fetch_patients(&self) -> AsyncResult<HashMap<String, Patient>> {
        let fetch = fetch_list::<Patient>(&self.manager, &self.address, PATIENTS_TOPIC);
        match self.request_timeout {
            Some(duration) => tokio::time::timeout(duration, fetch)
                .await
                .map_err(|_| ClientError::Timeout { duration })?,
            None => fetch.await,
        }
    }

    /// Blocking form of [`fetch_patients`](Self::fetch_patients).
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn fetch_patients_blocking(&self) -> AsyncResult<HashMap<String, Patient>> {
        match self.request_timeout {
            None => fetch_list_blocking::<Patient>(&self.manager, &self.address, PATIENTS_TOPIC),
            Some(_) => tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .map_err(|source| ClientError::Runtime { source })?
                .block_on(self.fetch_patients()),
        }
    }

    /// Server address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The underlying connection manager.
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::transport::MemoryTransport;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert!(config.request_timeout.is_none());

        let config = config
            .with_address("ws://localhost:1")
            .with_request_timeout(Duration::from_secs(3));
        assert_eq!(config.address, "ws://localhost:1");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_fetch_before_init() {
        let (transport, _acceptor) = MemoryTransport::new();
        let client = PatientClient::with_transport(ClientConfig::default(), Arc::new(transport));

        let err = client.fetch_patients().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lifecycle);
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let (transport, mut acceptor) = MemoryTransport::new();
        let config = ClientConfig::default()
            .with_address("memory://patients")
            .with_request_timeout(Duration::from_millis(50))
            .with_manager(ManagerConfig::default().with_shutdown_grace(Duration::from_millis(50)));
        let mut client = PatientClient::with_transport(config, Arc::new(transport));
        client.init().unwrap();

        // Accept and never answer.
        let silent = tokio::spawn(async move { acceptor.accept().await });

        let err = client.fetch_patients().await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { .. }));
        assert_eq!(err.kind().status(), 8);
        drop(silent.await.unwrap());
    }
}
