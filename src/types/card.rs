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

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Fallible;
use crate::types::timestamp::Timestamp;

/// The identifier of a card. Assigned by the store at insertion, never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(i64);

impl CardId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> i64 {
        self.0
    }
}

impl Display for CardId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A card in the collection, together with its scheduling state.
///
/// `id` and `created_at` are immutable once assigned. The scheduling fields
/// (`next_review_at`, `interval_days`, `ease_factor`) change only through
/// [`crate::scheduler::compute_next`] being written back through the store.
/// `revision` is maintained by the store: it is bumped on every committed
/// update, and updates carrying a stale revision are rejected.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    /// Front side, shown first.
    pub prompt: String,
    /// Back side, revealed on demand.
    pub answer: String,
    /// Optional free-form context.
    pub note: Option<String>,
    pub created_at: Timestamp,
    /// The instant after which the card is eligible for review.
    pub next_review_at: Timestamp,
    /// The gap in days used to compute `next_review_at` at the last
    /// scheduling event. Always non-negative.
    pub interval_days: i64,
    /// Retention difficulty in `[1.3, 2.5]`; higher means easier.
    pub ease_factor: f64,
    pub revision: i64,
}

impl Card {
    /// Whether `self` and `other` describe the same content and scheduling
    /// state, ignoring the store-maintained revision counter.
    pub fn same_content(&self, other: &Card) -> bool {
        self.id == other.id
            && self.prompt == other.prompt
            && self.answer == other.answer
            && self.note == other.note
            && self.created_at == other.created_at
            && self.next_review_at == other.next_review_at
            && self.interval_days == other.interval_days
            && self.ease_factor == other.ease_factor
    }
}

/// A card that has not been persisted yet. Construction validates that the
/// prompt and answer are non-blank; scheduling fields receive their initial
/// values at insertion.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct NewCard {
    pub prompt: String,
    pub answer: String,
    pub note: Option<String>,
}

impl NewCard {
    pub fn new(
        prompt: impl Into<String>,
        answer: impl Into<String>,
        note: Option<String>,
    ) -> Fallible<Self> {
        let prompt = prompt.into();
        let answer = answer.into();
        if prompt.trim().is_empty() {
            return Err(Error::Validation("prompt must not be blank".to_string()));
        }
        if answer.trim().is_empty() {
            return Err(Error::Validation("answer must not be blank".to_string()));
        }
        Ok(Self {
            prompt,
            answer,
            note,
        })
    }
}
