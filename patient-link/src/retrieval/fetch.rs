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

//! Caller-facing list retrieval.

use crate::completion::{AsyncResult, Completer, completion};
use crate::connection::{ConnectionId, ConnectionManager};
use crate::retrieval::protocol;
use crate::retrieval::session::{ListRecord, ListRetrievalSession};
use std::collections::HashMap;
use tracing::debug;

/// Fetches the list published under `topic` at `uri`, with the detail of
/// every item.
///
/// Opens a dedicated connection driven by a [`ListRetrievalSession`], waits
/// for it to open, subscribes to `topic`, then resolves with whatever the
/// session delivers. Connect failures are returned as they are; the
/// connection is closed by the session once the list is assembled.
///
/// There is no bound on how long this waits. Wrap it in
/// [`tokio::time::timeout`] to add one.
pub async fn fetch_list<R: ListRecord>(
    manager: &ConnectionManager,
    uri: &str,
    topic: &str,
) -> AsyncResult<HashMap<String, R>> {
    let (completer, result) = completion();
    let id = manager.connect(uri, session(topic, completer)).await?;
    request_list(manager, id, topic)?;
    result.await
}

/// Blocking form of [`fetch_list`] for callers outside an async runtime.
///
/// # Panics
///
/// Panics if called from within an asynchronous execution context.
pub fn fetch_list_blocking<R: ListRecord>(
    manager: &ConnectionManager,
    uri: &str,
    topic: &str,
) -> AsyncResult<HashMap<String, R>> {
    let (completer, result) = completion();
    let id = manager.connect(uri, session(topic, completer)).wait()?;
    request_list(manager, id, topic)?;
    result.wait()
}

fn session<R: ListRecord>(
    topic: &str,
    completer: Completer<HashMap<String, R>>,
) -> impl FnOnce(ConnectionId) -> ListRetrievalSession<R> {
    let topic = topic.to_string();
    move |_| ListRetrievalSession::new(topic, completer)
}

fn request_list(manager: &ConnectionManager, id: ConnectionId, topic: &str) -> AsyncResult<()> {
    debug!(connection_id = %id, topic = %topic, "Requesting list");
    manager.send(id, protocol::subscribe(topic))
}
