// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! retain: a spaced repetition review scheduler.
//!
//! This library provides:
//! - The SM-2 scheduling transition (pure, clock-injected)
//! - The card store contract, with in-memory and SQLite implementations
//! - A review session controller over a snapshot of due cards

pub mod cli;
pub mod db;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use db::Database;
pub use error::{Error, Fallible};
pub use scheduler::compute_next;
pub use session::{Phase, Session};
pub use store::{CardStore, DueSubscription, MemoryStore};
pub use types::card::{Card, CardId, NewCard};
pub use types::quality::Quality;
pub use types::timestamp::Timestamp;
