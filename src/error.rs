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

use std::fmt::Display;
use std::fmt::Formatter;

use crate::types::card::CardId;

/// Everything that can go wrong in this crate.
#[derive(Debug)]
pub enum Error {
    /// Input rejected at the boundary: an out-of-range quality rating, a
    /// blank prompt or answer, or an illegal session transition. Never
    /// silently clamped.
    Validation(String),
    /// An update or lookup referenced an id the store does not know. The
    /// identifier is wrong, not the I/O; retrying will not help.
    NotFound(CardId),
    /// Two updates raced on the same card. The caller should re-read the
    /// card and recompute rather than retry with its stale snapshot.
    Conflict(CardId),
    /// An I/O or persistence failure. Retryable at the caller's discretion.
    Store(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Validation(msg) => write!(f, "validation error: {msg}"),
            Error::NotFound(id) => write!(f, "no card with id {id}"),
            Error::Conflict(id) => write!(f, "conflicting update to card {id}"),
            Error::Store(msg) => write!(f, "store error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Error::Store(format!("SQLite error: {value}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Store(format!("I/O error: {value}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Store(format!("JSON error: {value}"))
    }
}

pub type Fallible<T> = Result<T, Error>;
