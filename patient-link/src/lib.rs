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

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! # patient-link
//!
//! Subscription client for a patient data service spoken over WebSocket.
//!
//! The service publishes a list topic whose value summarizes every patient,
//! and returns full detail for one subscribed patient per request. Fetching
//! the complete list therefore takes one list request followed by one request
//! per patient, fanned out and fanned back in over a single connection.
//!
//! ## Architecture
//!
//! - **[`transport`]**: builds connections and moves text frames
//!   (WebSocket, in-memory)
//! - **[`connection`]**: the [`ConnectionManager`], which owns the event loop
//!   thread and a registry of [`ConnectionRecord`]s
//! - **[`completion`]**: one-shot [`Completer`]/[`Completion`] pairs through
//!   which asynchronous outcomes are delivered
//! - **[`retrieval`]**: the list → per-item [`ListRetrievalSession`] and
//!   [`fetch_list`]
//! - **[`patient`]**: patient records and their console layout
//! - **[`client`]**: [`PatientClient`], the ready-made entry point
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use patient_link::{ClientConfig, PatientClient};
//!
//! # async fn example() -> Result<(), patient_link::ClientError> {
//! let mut client = PatientClient::new(ClientConfig::default());
//! client.init()?;
//!
//! let patients = client.fetch_patients().await?;
//! for patient in patients.values() {
//!     println!("{patient}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every failure is a [`ClientError`]. Errors found on the calling thread
//! (unknown connection IDs, URIs the transport rejects) are returned
//! directly; everything that happens later on the event loop arrives through
//! the operation's [`Completion`]. [`ClientError::kind`] gives a stable
//! [`ErrorKind`] with a numeric status.
//!
//! ## Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`
//! - `cli` (default): the `patient-link` binary (`clap`, `anyhow`,
//!   `tracing-subscriber`)

pub mod client;
pub mod completion;
pub mod connection;
pub mod error;
pub mod patient;
pub mod retrieval;
pub mod transport;

pub use client::{ClientConfig, PatientClient};
pub use completion::{AsyncResult, Completer, Completion, completion};
pub use connection::{
    ConnectionContext, ConnectionHandle, ConnectionId, ConnectionManager, ConnectionRecord,
    ConnectionStatus, IgnoreMessages, ManagerConfig, MessageHandler,
};
pub use error::{ClientError, ErrorKind};
pub use patient::{Diagnosis, Patient, Plan, Prescription, Sex};
pub use retrieval::{ListRecord, ListRetrievalSession, SessionState, fetch_list, fetch_list_blocking};
