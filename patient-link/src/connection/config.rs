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

//! Configuration types for the connection manager.

use std::time::Duration;

/// Configuration for a [`ConnectionManager`](crate::ConnectionManager).
///
/// # Examples
///
/// ```rust
/// use patient_link::ManagerConfig;
/// use std::time::Duration;
///
/// let config = ManagerConfig::default()
///     .with_thread_name("feed-io")
///     .with_shutdown_grace(Duration::from_secs(1));
/// assert_eq!(config.thread_name, "feed-io");
/// ```
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Name of the background thread running the event loop.
    ///
    /// Default: `"patient-link-io"`
    pub thread_name: String,

    /// How long teardown waits for in-flight close handshakes.
    ///
    /// Connections still open when the manager is torn down are sent a
    /// going-away close; the event loop keeps running for at most this long
    /// so those closes can complete before it stops.
    ///
    /// Default: 5 seconds
    pub shutdown_grace: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            thread_name: "patient-link-io".to_string(),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl ManagerConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event loop thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Sets the teardown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::new();
        assert_eq!(config.thread_name, "patient-link-io");
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    }
}
