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

//! One-shot completion channels.
//!
//! Asynchronous outcomes (a connection opening, a list retrieval finishing)
//! are handed from the event loop to whoever is waiting through a
//! [`Completer`]/[`Completion`] pair. There is exactly one producer and one
//! consumer, and at most one value ever crosses: [`Completer::complete`]
//! consumes the completer, so fulfilling twice does not type-check. Code that
//! may reach a completion point more than once keeps the completer in an
//! `Option` and `take()`s it.
//!
//! If the completer is dropped without completing, the waiting side observes
//! [`ClientError::Abandoned`] rather than hanging.
//!
//! # Example
//!
//! ```rust
//! use patient_link::completion;
//!
//! # async fn example() {
//! let (completer, completion) = completion::<u32>();
//! completer.complete(Ok(42));
//! assert_eq!(completion.await.unwrap(), 42);
//! # }
//! ```

use crate::ClientError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Either the value of an asynchronous operation or the error that ended it.
pub type AsyncResult<T> = Result<T, ClientError>;

/// Creates a linked completer and completion.
pub fn completion<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, Completion { rx })
}

/// Producing side of a completion channel.
#[derive(Debug)]
pub struct Completer<T> {
    tx: oneshot::Sender<AsyncResult<T>>,
}

impl<T> Completer<T> {
    /// Fulfills the completion.
    ///
    /// Returns `false` if the waiting side was already dropped, in which case
    /// the result is discarded.
    pub fn complete(self, result: AsyncResult<T>) -> bool {
        self.tx.send(result).is_ok()
    }

    /// Returns `true` if nobody is waiting any more.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consuming side of a completion channel.
///
/// `Completion` is a future; callers without an async runtime can use
/// [`wait`](Completion::wait) instead.
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<AsyncResult<T>>,
}

impl<T> Completion<T> {
    /// Returns a completion that is already fulfilled with `result`.
    pub fn ready(result: AsyncResult<T>) -> Self {
        let (completer, completion) = completion();
        completer.complete(result);
        completion
    }

    /// Blocks the current thread until the completion is fulfilled.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context; await
    /// the completion there instead.
    pub fn wait(self) -> AsyncResult<T> {
        self.rx.blocking_recv().unwrap_or(Err(ClientError::Abandoned))
    }
}

impl<T> Future for Completion<T> {
    type Output = AsyncResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ClientError::Abandoned)))
    }
}
