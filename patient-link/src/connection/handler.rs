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

use crate::ClientError;
use crate::connection::ConnectionId;
use crate::transport::CloseCode;

/// Per-connection behavior for inbound messages.
///
/// Every connection gets its own handler, built by the factory passed to
/// [`ConnectionManager::connect`](crate::ConnectionManager::connect). The
/// handler is owned by the connection's I/O task on the manager's event
/// loop, so `on_message` calls for one manager never overlap and the handler
/// needs no locking of its own.
///
/// # Examples
///
/// ```rust
/// use patient_link::{ConnectionContext, MessageHandler};
///
/// /// Answers every message with its length.
/// struct Lengths;
///
/// impl MessageHandler for Lengths {
///     fn on_message(&mut self, ctx: &mut dyn ConnectionContext, payload: &str) {
///         let _ = ctx.send(payload.len().to_string());
///     }
/// }
/// ```
pub trait MessageHandler: Send + 'static {
    /// Called for every text message, in arrival order.
    fn on_message(&mut self, ctx: &mut dyn ConnectionContext, payload: &str);
}

/// Operations a [`MessageHandler`] may perform on its own connection.
///
/// Both operations only queue work and return immediately, so calling them
/// from inside `on_message` cannot block the event loop.
pub trait ConnectionContext {
    /// ID of the connection the message arrived on.
    fn id(&self) -> ConnectionId;

    /// Sends a text message on this connection.
    #[allow(clippy::result_large_err)]
    fn send(&mut self, message: String) -> Result<(), ClientError>;

    /// Requests this connection be closed.
    #[allow(clippy::result_large_err)]
    fn close(&mut self, code: CloseCode, reason: &str) -> Result<(), ClientError>;
}

/// Handler that drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreMessages;

impl MessageHandler for IgnoreMessages {
    fn on_message(&mut self, _ctx: &mut dyn ConnectionContext, _payload: &str) {}
}
