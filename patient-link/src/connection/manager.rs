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

//! Connection manager implementation.
//!
//! The manager owns one background thread running a single-threaded Tokio
//! runtime, the registry of every connection it ever created, and the
//! connect/send/close operations.
//!
//! # Threading
//!
//! Each connection is driven by one I/O task on the background runtime. The
//! runtime has exactly one worker thread, and every lifecycle callback and
//! every [`MessageHandler::on_message`] call is synchronous, so no two
//! callbacks of one manager ever run at the same time. Handlers rely on this
//! to keep protocol state without locks.
//!
//! The public operations may be called from any thread. They only read the
//! registry (guarded by a lock held for lookups and inserts, never across
//! I/O) and queue work for the I/O tasks.
//!
//! # Retention
//!
//! Every connection that got past construction stays in the registry until
//! the manager is dropped, including failed and closed ones. This keeps
//! diagnostics available for inspection at the cost of a small record per
//! attempt.

use crate::completion::{Completer, Completion, completion};
use crate::connection::record::Command;
use crate::connection::{
    ConnectionContext, ConnectionHandle, ConnectionId, ConnectionRecord, ConnectionStatus,
    ManagerConfig, MessageHandler,
};
use crate::transport::{CloseCode, CloseFrame, Endpoint, Frame, Opened, Transport};
use crate::ClientError;
use futures_util::{SinkExt, StreamExt, future};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle as ThreadHandle;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Manages the lifetime of connections to remote servers.
///
/// # Example
///
/// ```rust,no_run
/// use patient_link::transport::{WebSocketConfig, WebSocketTransport};
/// use patient_link::{ConnectionManager, IgnoreMessages};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut manager = ConnectionManager::new(WebSocketTransport::new(WebSocketConfig::default()));
/// manager.init()?;
///
/// let id = manager.connect("ws://127.0.0.1:4645", |_| IgnoreMessages).await?;
/// manager.send(id, r#"{"setSubscriptions":{"public:patients":"request"}}"#)?;
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
    worker: Option<Worker>,
}

struct ManagerInner {
    transport: Arc<dyn Transport>,
    config: ManagerConfig,

    /// Next connection ID to assign
    next_id: AtomicU64,

    /// Every connection that got past construction, never pruned
    records: RwLock<HashMap<ConnectionId, Arc<ConnectionRecord>>>,

    /// Handle to the background runtime while it is running
    runtime: RwLock<Option<Handle>>,

    /// I/O tasks, drained on teardown
    tasks: Mutex<Vec<(ConnectionId, JoinHandle<()>)>>,
}

/// The background thread and the signal that stops it.
struct Worker {
    thread: ThreadHandle<()>,
    stop: oneshot::Sender<()>,
}

impl ConnectionManager {
    /// Creates a manager over `transport` with default configuration.
    ///
    /// The manager is inert until [`init`](Self::init) is called.
    pub fn new<T: Transport>(transport: T) -> Self {
        Self::with_config(Arc::new(transport), ManagerConfig::default())
    }

    /// Creates a manager over a shared transport with the given configuration.
    pub fn with_config(transport: Arc<dyn Transport>, config: ManagerConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                transport,
                config,
                next_id: AtomicU64::new(0),
                records: RwLock::new(HashMap::new()),
                runtime: RwLock::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
            worker: None,
        }
    }

    /// Starts the background event loop.
    ///
    /// Must be called once before [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// - [`ClientError::AlreadyInitialized`] if the loop is already running
    /// - [`ClientError::Runtime`] if the runtime or thread cannot be created
    pub fn init(&mut self) -> Result<(), ClientError> {
        if self.worker.is_some() {
            return Err(ClientError::AlreadyInitialized);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| ClientError::Runtime { source })?;
        let handle = runtime.handle().clone();
        let (stop, stopped) = oneshot::channel::<()>();

        let inner = Arc::clone(&self.inner);
        let thread = std::thread::Builder::new()
            .name(self.inner.config.thread_name.clone())
            .spawn(move || {
                runtime.block_on(async move {
                    // Runs until the manager signals teardown; connection
                    // tasks are driven by this same thread meanwhile.
                    let _ = stopped.await;
                    inner.drain().await;
                });
            })
            .map_err(|source| ClientError::Runtime { source })?;

        *self.inner.runtime.write() = Some(handle);
        self.worker = Some(Worker { thread, stop });

        info!(
            thread = %self.inner.config.thread_name,
            transport = self.inner.transport.transport_type(),
            "Connection manager started"
        );
        Ok(())
    }

    /// Returns `true` between [`init`](Self::init) and teardown.
    pub fn is_running(&self) -> bool {
        self.inner.runtime.read().is_some()
    }

    /// Opens a connection to `uri`.
    ///
    /// Construction happens right away on the calling thread; if the
    /// transport rejects the URI, the returned completion is already resolved
    /// with [`ClientError::CannotConnect`] and no record is created.
    /// Otherwise a record in `Connecting` state is registered, its behavior is
    /// built by `factory`, and the handshake starts on the event loop. The
    /// completion resolves with the connection's ID when the connection opens,
    /// or with [`ClientError::RemoteConnectFailed`] when the handshake fails.
    pub fn connect<F, H>(&self, uri: &str, factory: F) -> Completion<ConnectionId>
    where
        F: FnOnce(ConnectionId) -> H,
        H: MessageHandler,
    {
        let Some(runtime) = self.inner.runtime.read().clone() else {
            return Completion::ready(Err(ClientError::NotInitialized));
        };

        let endpoint = match self.inner.transport.resolve(uri) {
            Ok(endpoint) => endpoint,
            Err(source) => {
                warn!(uri = %uri, error = %source, "Cannot build connection");
                return Completion::ready(Err(ClientError::CannotConnect {
                    uri: uri.to_string(),
                    source,
                }));
            }
        };

        let id = ConnectionId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (handle, commands) = ConnectionHandle::new();
        let record = Arc::new(ConnectionRecord::new(id, uri, handle));
        self.inner.records.write().insert(id, Arc::clone(&record));

        let (completer, completion) = completion();
        let handler: Box<dyn MessageHandler> = Box::new(factory(id));

        debug!(connection_id = %id, uri = %uri, "Connecting");
        let task = runtime.spawn(drive_connection(
            Arc::clone(&self.inner),
            record,
            endpoint,
            commands,
            handler,
            completer,
        ));
        let mut tasks = self.inner.tasks.lock();
        tasks.retain(|(_, task)| !task.is_finished());
        tasks.push((id, task));
        drop(tasks);

        completion
    }

    /// Sends a text message on connection `id`.
    ///
    /// The connection's status is not checked; a message sent while the
    /// connection is still opening goes out once it opens.
    ///
    /// # Errors
    ///
    /// - [`ClientError::ConnectionNotFound`] if `id` is unknown
    /// - [`ClientError::CannotSendMessage`] if the transport refuses the message
    pub fn send(&self, id: ConnectionId, message: impl Into<String>) -> Result<(), ClientError> {
        self.inner.send(id, message.into())
    }

    /// Requests that connection `id` be closed.
    ///
    /// The status changes to `Closed` later, when the close completes.
    ///
    /// # Errors
    ///
    /// - [`ClientError::ConnectionNotFound`] if `id` is unknown
    /// - [`ClientError::CannotCloseConnection`] if the transport refuses to close
    pub fn close(&self, id: ConnectionId, code: CloseCode, reason: &str) -> Result<(), ClientError> {
        self.inner.close(id, code, reason)
    }

    /// Returns the record of connection `id`.
    pub fn record(&self, id: ConnectionId) -> Option<Arc<ConnectionRecord>> {
        self.inner.record(id)
    }

    /// Returns every record, ordered by ID.
    pub fn records(&self) -> Vec<Arc<ConnectionRecord>> {
        let mut records: Vec<_> = self.inner.records.read().values().cloned().collect();
        records.sort_by_key(|record| record.id());
        records
    }

    /// Number of connections ever created by this manager.
    pub fn len(&self) -> usize {
        self.inner.records.read().len()
    }

    /// Returns `true` if no connection was ever created.
    pub fn is_empty(&self) -> bool {
        self.inner.records.read().is_empty()
    }

    /// Tears the manager down.
    ///
    /// Every open connection is sent a going-away close, then the event loop
    /// is told to stop. It waits up to
    /// [`shutdown_grace`](ManagerConfig::shutdown_grace) for those closes,
    /// aborts connections that never opened, and the thread is joined.
    /// Calling this more than once, or on a manager that was never
    /// initialized, does nothing. Dropping the manager does the same.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.inner.runtime.write().take();

        for record in self.inner.records.read().values() {
            if record.status() == ConnectionStatus::Opened {
                if let Err(e) = record.handle().close(CloseCode::GoingAway, "") {
                    debug!(connection_id = %record.id(), error = %e, "Going-away close not queued");
                }
            }
        }

        let _ = worker.stop.send(());
        if worker.thread.join().is_err() {
            error!("Connection manager thread panicked");
        }

        info!("Connection manager stopped");
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("transport", &self.inner.transport.transport_type())
            .field("config", &self.inner.config)
            .field("connections", &self.len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl ManagerInner {
    fn record(&self, id: ConnectionId) -> Option<Arc<ConnectionRecord>> {
        self.records.read().get(&id).cloned()
    }

    fn send(&self, id: ConnectionId, message: String) -> Result<(), ClientError> {
        let record = self.record(id).ok_or(ClientError::ConnectionNotFound { id })?;
        record
            .handle()
            .send(message)
            .map_err(|source| ClientError::CannotSendMessage { id, source })
    }

    fn close(&self, id: ConnectionId, code: CloseCode, reason: &str) -> Result<(), ClientError> {
        let record = self.record(id).ok_or(ClientError::ConnectionNotFound { id })?;
        record
            .handle()
            .close(code, reason)
            .map_err(|source| ClientError::CannotCloseConnection { id, source })
    }

    /// Waits for closing connections and aborts the rest. Runs on the event
    /// loop after the stop signal.
    async fn drain(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());

        let mut closing = Vec::new();
        for (id, task) in tasks {
            if task.is_finished() {
                continue;
            }
            match self.record(id).map(|record| record.status()) {
                Some(ConnectionStatus::Opened) => closing.push(task),
                _ => task.abort(),
            }
        }

        if closing.is_empty() {
            return;
        }

        debug!(count = closing.len(), "Waiting for connections to close");
        let grace = self.config.shutdown_grace;
        if tokio::time::timeout(grace, future::join_all(closing))
            .await
            .is_err()
        {
            warn!(grace = ?grace, "Connections still open after the shutdown grace period");
        }
    }
}

/// Context handed to handlers. Operations go back through the manager so
/// they see the same lookups and errors as external callers.
struct ManagedContext<'a> {
    inner: &'a ManagerInner,
    id: ConnectionId,
}

impl ConnectionContext for ManagedContext<'_> {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&mut self, message: String) -> Result<(), ClientError> {
        self.inner.send(self.id, message)
    }

    fn close(&mut self, code: CloseCode, reason: &str) -> Result<(), ClientError> {
        self.inner.close(self.id, code, reason)
    }
}

/// I/O task of one connection: handshake, then frames in both directions
/// until the connection closes.
async fn drive_connection(
    inner: Arc<ManagerInner>,
    record: Arc<ConnectionRecord>,
    endpoint: Endpoint,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut handler: Box<dyn MessageHandler>,
    completer: Completer<ConnectionId>,
) {
    let Opened {
        server,
        mut sink,
        mut stream,
    } = match inner.transport.open(&endpoint).await {
        Ok(opened) => opened,
        Err(error) => {
            record.on_fail(&error, completer);
            return;
        }
    };
    record.on_open(server, completer);

    let id = record.id();
    let mut ctx = ManagedContext { inner: &inner, id };
    let mut close_sent = false;
    let mut accepting = true;

    let close = loop {
        tokio::select! {
            command = commands.recv(), if accepting => match command {
                Some(Command::Send(text)) => {
                    if let Err(e) = sink.send(Frame::Text(text)).await {
                        warn!(connection_id = %id, error = %e, "Failed to send message");
                    }
                }
                Some(Command::Close(frame)) => {
                    if close_sent {
                        continue;
                    }
                    close_sent = true;
                    debug!(connection_id = %id, code = %frame.code, "Closing connection");
                    if let Err(e) = sink.send(Frame::Close(Some(frame))).await {
                        warn!(connection_id = %id, error = %e, "Failed to send close frame");
                    }
                }
                None => accepting = false,
            },
            frame = stream.next() => match frame {
                Some(Ok(Frame::Text(payload))) => {
                    record.on_message(handler.as_mut(), &mut ctx, &payload);
                }
                Some(Ok(Frame::Close(frame))) => {
                    // The transport queues the close reply itself; closing
                    // the sink flushes it out.
                    if let Err(e) = sink.close().await {
                        debug!(connection_id = %id, error = %e, "Close reply not flushed");
                    }
                    break frame;
                }
                Some(Err(e)) => {
                    warn!(connection_id = %id, error = %e, "Connection error");
                    if let Err(e) = sink.close().await {
                        debug!(connection_id = %id, error = %e, "Sink not closed after error");
                    }
                    break Some(CloseFrame::new(CloseCode::Abnormal, e.to_string()));
                }
                None => break None,
            },
        }
    };

    record.on_close(close);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::IgnoreMessages;
    use crate::transport::{MemoryAcceptor, MemoryPeer, MemoryTransport};
    use std::time::Duration;

    /// Forwards every payload to the test.
    struct Forward(mpsc::UnboundedSender<String>);

    impl MessageHandler for Forward {
        fn on_message(&mut self, _ctx: &mut dyn ConnectionContext, payload: &str) {
            let _ = self.0.send(payload.to_string());
        }
    }

    /// Answers every payload through the context.
    struct Echo;

    impl MessageHandler for Echo {
        fn on_message(&mut self, ctx: &mut dyn ConnectionContext, payload: &str) {
            ctx.send(format!("echo:{payload}")).unwrap();
        }
    }

    fn manager() -> (ConnectionManager, MemoryAcceptor) {
        let (transport, acceptor) = MemoryTransport::new();
        let config = ManagerConfig::default().with_shutdown_grace(Duration::from_millis(200));
        let mut manager =
            ConnectionManager::with_config(Arc::new(transport.with_server("memory/1.0")), config);
        manager.init().unwrap();
        (manager, acceptor)
    }

    async fn open(
        manager: &ConnectionManager,
        acceptor: &mut MemoryAcceptor,
        handler: impl MessageHandler,
    ) -> (ConnectionId, MemoryPeer) {
        let completion = manager.connect("memory://server", move |_| handler);
        let peer = acceptor.accept().await.unwrap();
        let id = completion.await.unwrap();
        (id, peer)
    }

    async fn wait_for_status(record: &ConnectionRecord, status: ConnectionStatus) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while record.status() != status {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("status not reached in time");
    }

    #[tokio::test]
    async fn test_connect_send_receive_close() {
        let (manager, mut acceptor) = manager();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (id, mut peer) = open(&manager, &mut acceptor, Forward(tx)).await;

        let record = manager.record(id).unwrap();
        assert_eq!(record.status(), ConnectionStatus::Opened);
        assert_eq!(record.server().as_deref(), Some("memory/1.0"));
        assert_eq!(record.uri(), "memory://server");

        manager.send(id, "hello").unwrap();
        assert_eq!(peer.recv_text().await.as_deref(), Some("hello"));

        peer.send_text("from server").unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("from server"));

        manager.close(id, CloseCode::Normal, "done").unwrap();
        assert_eq!(
            peer.recv().await,
            Some(Frame::Close(Some(CloseFrame::new(CloseCode::Normal, "done"))))
        );
        peer.close(CloseCode::Normal, "").unwrap();

        wait_for_status(&record, ConnectionStatus::Closed).await;
        assert_eq!(
            record.last_error().as_deref(),
            Some("close code: 1000 (Normal close), close reason: ")
        );
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let (manager, mut acceptor) = manager();
        let (first, _p1) = open(&manager, &mut acceptor, IgnoreMessages).await;
        let (second, _p2) = open(&manager, &mut acceptor, IgnoreMessages).await;

        assert_eq!(first, ConnectionId::new(0));
        assert_eq!(second, ConnectionId::new(1));
        let ids: Vec<_> = manager.records().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn test_bad_uri_is_cannot_connect_without_record() {
        let (manager, _acceptor) = manager();
        let result = manager.connect("not a uri", |_| IgnoreMessages).await;

        assert!(matches!(result, Err(ClientError::CannotConnect { .. })));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_handshake_failure_is_retained() {
        let (manager, acceptor) = manager();
        drop(acceptor);

        let result = manager.connect("memory://server", |_| IgnoreMessages).await;
        assert!(matches!(result, Err(ClientError::RemoteConnectFailed { .. })));

        let record = manager.record(ConnectionId::new(0)).unwrap();
        assert_eq!(record.status(), ConnectionStatus::Failed);
        assert!(record.last_error().unwrap().contains("acceptor dropped"));
    }

    #[tokio::test]
    async fn test_unknown_id_is_connection_not_found() {
        let (manager, _acceptor) = manager();
        let id = ConnectionId::new(99);

        assert!(matches!(
            manager.send(id, "x"),
            Err(ClientError::ConnectionNotFound { .. })
        ));
        assert!(matches!(
            manager.close(id, CloseCode::Normal, ""),
            Err(ClientError::ConnectionNotFound { .. })
        ));
        assert!(manager.record(id).is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_guards() {
        let (transport, _acceptor) = MemoryTransport::new();
        let mut manager = ConnectionManager::new(transport);

        let result = manager.connect("memory://server", |_| IgnoreMessages).await;
        assert!(matches!(result, Err(ClientError::NotInitialized)));

        manager.init().unwrap();
        assert!(manager.is_running());
        assert!(matches!(manager.init(), Err(ClientError::AlreadyInitialized)));
    }

    #[tokio::test]
    async fn test_handler_sends_through_context() {
        let (manager, mut acceptor) = manager();
        let (_id, mut peer) = open(&manager, &mut acceptor, Echo).await;

        peer.send_text("a").unwrap();
        peer.send_text("b").unwrap();
        assert_eq!(peer.recv_text().await.as_deref(), Some("echo:a"));
        assert_eq!(peer.recv_text().await.as_deref(), Some("echo:b"));
    }

    #[tokio::test]
    async fn test_remote_close_is_acknowledged() {
        let (manager, mut acceptor) = manager();
        let (id, mut peer) = open(&manager, &mut acceptor, IgnoreMessages).await;

        peer.close(CloseCode::Normal, "bye").unwrap();
        assert_eq!(
            peer.recv().await,
            Some(Frame::Close(Some(CloseFrame::new(CloseCode::Normal, "bye"))))
        );
        // Nothing else follows the reply; the connection task is gone.
        assert_eq!(peer.recv().await, None);

        let record = manager.record(id).unwrap();
        wait_for_status(&record, ConnectionStatus::Closed).await;
        assert_eq!(
            record.last_error().as_deref(),
            Some("close code: 1000 (Normal close), close reason: bye")
        );
    }

    #[tokio::test]
    async fn test_finished_tasks_are_released() {
        let (manager, mut acceptor) = manager();
        let (first, peer) = open(&manager, &mut acceptor, IgnoreMessages).await;
        drop(peer);
        wait_for_status(&manager.record(first).unwrap(), ConnectionStatus::Closed).await;
        // The task finishes a moment after the record is marked closed.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let (_second, _peer) = open(&manager, &mut acceptor, IgnoreMessages).await;
                let ids: Vec<_> = manager.inner.tasks.lock().iter().map(|(id, _)| *id).collect();
                if !ids.contains(&first) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("finished task handle retained");
        assert_eq!(manager.record(first).unwrap().status(), ConnectionStatus::Closed);
    }

    #[tokio::test]
    async fn test_remote_drop_closes_abnormally() {
        let (manager, mut acceptor) = manager();
        let (id, peer) = open(&manager, &mut acceptor, IgnoreMessages).await;
        drop(peer);

        let record = manager.record(id).unwrap();
        wait_for_status(&record, ConnectionStatus::Closed).await;
        assert!(record.last_error().unwrap().contains("1006"));
        tokio::time::timeout(Duration::from_secs(5), async {
            while !record.handle().is_closed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("connection task still running");
        assert!(matches!(
            manager.send(id, "late"),
            Err(ClientError::CannotSendMessage { .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_sends_going_away() {
        let (mut manager, mut acceptor) = manager();
        let (_id, mut peer) = open(&manager, &mut acceptor, IgnoreMessages).await;

        manager.shutdown();
        assert!(!manager.is_running());
        assert_eq!(
            peer.recv().await,
            Some(Frame::Close(Some(CloseFrame::new(CloseCode::GoingAway, ""))))
        );

        let result = manager.connect("memory://server", |_| IgnoreMessages).await;
        assert!(matches!(result, Err(ClientError::NotInitialized)));
    }
}
