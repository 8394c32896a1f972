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

//! List retrieval over subscription connections.
//!
//! - [`protocol`]: the subscription wire documents
//! - [`ListRetrievalSession`]: the list → per-item fan-out/fan-in state machine
//! - [`fetch_list`]: connect, request the list, and await the assembled result

pub mod protocol;
mod fetch;
mod session;

pub use fetch::{fetch_list, fetch_list_blocking};
pub use session::{ListRecord, ListRetrievalSession, SessionState};
