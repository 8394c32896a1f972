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

//! Connection management.
//!
//! A [`ConnectionManager`] creates connections, assigns each a
//! [`ConnectionId`], and keeps a [`ConnectionRecord`] per connection with its
//! lifecycle [`ConnectionStatus`] and diagnostics. What a connection does with
//! incoming messages is decided by the [`MessageHandler`] attached at connect
//! time; handlers talk back through a [`ConnectionContext`].

mod config;
mod handler;
mod id;
mod manager;
mod record;

pub use config::ManagerConfig;
pub use handler::{ConnectionContext, IgnoreMessages, MessageHandler};
pub use id::ConnectionId;
pub use manager::ConnectionManager;
pub use record::{ConnectionHandle, ConnectionRecord, ConnectionStatus};
