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

//! List retrieval protocol session.
//!
//! The server returns full detail for only one subscribed item per request,
//! so a list is fetched in two phases over one connection:
//!
//! ```text
//! AwaitingList --list response--> FanningOut --last item--> Complete
//!      |                              |
//!      +------- protocol error -------+---------------------> Complete
//! ```
//!
//! 1. The first message is the list response. Each summary becomes a partial
//!    record keyed by its item URI, and one subscription request per item is
//!    sent, each as its own message.
//! 2. Every later message maps item URIs to detail. Known items are refined;
//!    once every item has been refined the mapping is delivered through the
//!    session's completer and the connection is closed normally.
//!
//! The session is driven by the connection's I/O task, one message at a time,
//! so its state needs no lock.

use crate::completion::Completer;
use crate::connection::{ConnectionContext, MessageHandler};
use crate::retrieval::protocol::{self, Update};
use crate::transport::CloseCode;
use crate::{ClientError, ErrorKind};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// A record type that can be fetched with the list protocol.
pub trait ListRecord: Sized + Send + 'static {
    /// Type tag of the list value.
    const LIST_TYPE: &'static str;

    /// Type tag of each per-item value.
    const ITEM_TYPE: &'static str;

    /// Builds a partial record from one entry of the list response.
    fn from_summary(summary: &Value) -> Result<Self, ClientError>;

    /// Merges the per-item detail into the record.
    ///
    /// May be called again for an item that was already refined; the new
    /// detail replaces the old one.
    fn refine(&mut self, detail: &Map<String, Value>) -> Result<(), ClientError>;
}

/// Phase of a [`ListRetrievalSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the list response.
    AwaitingList,
    /// Per-item requests sent, waiting for their responses.
    FanningOut,
    /// Result delivered; further messages are ignored.
    Complete,
}

/// Fetches one list and the detail of every item in it.
pub struct ListRetrievalSession<R: ListRecord> {
    topic: String,
    state: SessionState,
    pending: HashMap<String, R>,
    outstanding: HashSet<String>,
    completer: Option<Completer<HashMap<String, R>>>,
}

impl<R: ListRecord> ListRetrievalSession<R> {
    /// Creates a session that expects the list under `topic` and delivers the
    /// result to `completer`.
    pub fn new(topic: impl Into<String>, completer: Completer<HashMap<String, R>>) -> Self {
        Self {
            topic: topic.into(),
            state: SessionState::AwaitingList,
            pending: HashMap::new(),
            outstanding: HashSet::new(),
            completer: Some(completer),
        }
    }

    /// Current phase.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of items still waiting for detail.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    fn on_list(&mut self, ctx: &mut dyn ConnectionContext, payload: &str) -> Result<(), ClientError> {
        let update = Update::parse(payload)?;
        let list = update.get(&self.topic).ok_or_else(|| {
            ClientError::protocol(format!("list response has no {:?} entry", self.topic))
        })?;
        let list = protocol::typed(list, R::LIST_TYPE)?;

        // Validate every summary before sending anything.
        let mut order = Vec::new();
        for summary in protocol::items(list, "value")? {
            let uri = protocol::str_field(summary, "uri")?;
            if self.pending.contains_key(uri) {
                debug!(connection_id = %ctx.id(), uri = %uri, "Duplicate item in list");
                continue;
            }
            self.pending.insert(uri.to_string(), R::from_summary(summary)?);
            order.push(uri.to_string());
        }

        self.outstanding = order.iter().cloned().collect();
        self.state = SessionState::FanningOut;
        debug!(connection_id = %ctx.id(), items = order.len(), "List received");

        for uri in &order {
            ctx.send(protocol::subscribe(uri))?;
        }
        Ok(())
    }

    fn on_items(&mut self, ctx: &mut dyn ConnectionContext, payload: &str) -> Result<(), ClientError> {
        let update = Update::parse(payload)?;

        for (uri, detail) in update.entries() {
            let Some(record) = self.pending.get_mut(uri) else {
                debug!(connection_id = %ctx.id(), uri = %uri, "Ignoring update for unknown item");
                continue;
            };
            record.refine(protocol::typed(detail, R::ITEM_TYPE)?)?;

            if self.outstanding.remove(uri) {
                debug!(
                    connection_id = %ctx.id(),
                    uri = %uri,
                    outstanding = self.outstanding.len(),
                    "Item refined"
                );
            } else {
                debug!(connection_id = %ctx.id(), uri = %uri, "Item refined again");
            }
        }
        Ok(())
    }

    fn finish(&mut self, ctx: &mut dyn ConnectionContext) {
        self.state = SessionState::Complete;
        let items = std::mem::take(&mut self.pending);
        info!(connection_id = %ctx.id(), items = items.len(), "List retrieval complete");

        if let Some(completer) = self.completer.take() {
            completer.complete(Ok(items));
        }
        if let Err(e) = ctx.close(CloseCode::Normal, "") {
            warn!(connection_id = %ctx.id(), error = %e, "Failed to close after retrieval");
        }
    }

    fn fail(&mut self, ctx: &mut dyn ConnectionContext, error: ClientError) {
        warn!(connection_id = %ctx.id(), error = %error, "List retrieval failed");
        self.state = SessionState::Complete;
        self.pending.clear();
        self.outstanding.clear();

        let code = match error.kind() {
            ErrorKind::ProtocolError => CloseCode::Protocol,
            _ => CloseCode::Normal,
        };
        if let Some(completer) = self.completer.take() {
            completer.complete(Err(error));
        }
        if let Err(e) = ctx.close(code, "") {
            debug!(connection_id = %ctx.id(), error = %e, "Failed to close after error");
        }
    }
}

impl<R: ListRecord> MessageHandler for ListRetrievalSession<R> {
    fn on_message(&mut self, ctx: &mut dyn ConnectionContext, payload: &str) {
        let result = match self.state {
            SessionState::AwaitingList => self.on_list(ctx, payload),
            SessionState::FanningOut => self.on_items(ctx, payload),
            SessionState::Complete => {
                debug!(connection_id = %ctx.id(), "Ignoring message after completion");
                return;
            }
        };

        match result {
            Ok(()) if self.outstanding.is_empty() => self.finish(ctx),
            Ok(()) => {}
            Err(error) => self.fail(ctx, error),
        }
    }
}

impl<R: ListRecord> std::fmt::Debug for ListRetrievalSession<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListRetrievalSession")
            .field("topic", &self.topic)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .field("outstanding", &self.outstanding.len())
            .finish()
    }
}
