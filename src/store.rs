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

//! The card store contract, and an in-memory implementation of it.
//!
//! A store is durable keyed storage for cards: insert, conditional update,
//! lookup by id, and a time-ordered due query. The due set is observable:
//! subscribers are notified after every committed mutation and re-run the
//! due query to get a consistent snapshot.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tokio::sync::watch;

use crate::error::Error;
use crate::error::Fallible;
use crate::types::card::Card;
use crate::types::card::CardId;
use crate::types::card::NewCard;
use crate::types::timestamp::Timestamp;

/// Storage for cards.
///
/// Updates are conditional writes keyed on the card's revision: a stale
/// revision with diverged content fails with [`Error::Conflict`], so two
/// concurrently computed scheduling results cannot silently overwrite one
/// another. Replaying an already-committed write is a successful no-op.
pub trait CardStore {
    /// Persists a new card with its initial scheduling state
    /// (`interval_days = 0`, `ease_factor = 2.5`, due immediately) and
    /// returns the assigned id.
    fn insert(&self, new: NewCard, created_at: Timestamp) -> Fallible<CardId>;

    /// Overwrites the stored card matching `card.id`.
    fn update(&self, card: &Card) -> Fallible<()>;

    /// Returns the card, or `None` if the id is unknown. Absence is not an
    /// error.
    fn get_by_id(&self, id: CardId) -> Fallible<Option<Card>>;

    /// All cards with `next_review_at <= as_of`, ordered ascending by
    /// `next_review_at`, ties broken by ascending id.
    fn due_cards(&self, as_of: Timestamp) -> Fallible<Vec<Card>>;

    /// Subscribes to due-set changes. The handle is cancelled by dropping it.
    fn subscribe(&self) -> DueSubscription;
}

/// Publisher side of the due-set change feed. Owned by a store; bumped
/// after every committed insert or update.
pub struct DueNotifier {
    tx: watch::Sender<u64>,
}

impl DueNotifier {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }

    pub fn notify(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }

    pub fn subscribe(&self) -> DueSubscription {
        DueSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for DueNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// A cancellable handle on the due-set change feed. Each emission carries a
/// generation number; subscribers re-run [`CardStore::due_cards`] after an
/// emission to get a consistent snapshot.
pub struct DueSubscription {
    rx: watch::Receiver<u64>,
}

impl DueSubscription {
    /// The generation of the most recently observed emission.
    pub fn generation(&self) -> u64 {
        *self.rx.borrow()
    }

    /// Waits until the due set has changed since the last observation.
    pub async fn changed(&mut self) -> Fallible<()> {
        self.rx
            .changed()
            .await
            .map_err(|_| Error::Store("store was dropped".to_string()))
    }
}

/// An in-memory card store. Suitable for tests and embedding; the
/// SQLite-backed [`crate::db::Database`] is the durable implementation.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    notifier: DueNotifier,
}

struct Inner {
    cards: BTreeMap<CardId, Card>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                cards: BTreeMap::new(),
                next_id: 1,
            }),
            notifier: DueNotifier::new(),
        }
    }

    fn lock(&self) -> Fallible<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Store("store mutex poisoned".to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CardStore for MemoryStore {
    fn insert(&self, new: NewCard, created_at: Timestamp) -> Fallible<CardId> {
        let mut inner = self.lock()?;
        let id = CardId::new(inner.next_id);
        inner.next_id += 1;
        inner.cards.insert(
            id,
            Card {
                id,
                prompt: new.prompt,
                answer: new.answer,
                note: new.note,
                created_at,
                next_review_at: created_at,
                interval_days: 0,
                ease_factor: 2.5,
                revision: 0,
            },
        );
        drop(inner);
        self.notifier.notify();
        Ok(id)
    }

    fn update(&self, card: &Card) -> Fallible<()> {
        let mut inner = self.lock()?;
        let stored = inner.cards.get_mut(&card.id).ok_or(Error::NotFound(card.id))?;
        if stored.revision == card.revision {
            *stored = Card {
                revision: card.revision + 1,
                ..card.clone()
            };
            drop(inner);
            self.notifier.notify();
            Ok(())
        } else if stored.same_content(card) {
            // Replay of a write that already committed.
            Ok(())
        } else {
            Err(Error::Conflict(card.id))
        }
    }

    fn get_by_id(&self, id: CardId) -> Fallible<Option<Card>> {
        let inner = self.lock()?;
        Ok(inner.cards.get(&id).cloned())
    }

    fn due_cards(&self, as_of: Timestamp) -> Fallible<Vec<Card>> {
        let inner = self.lock()?;
        let mut due: Vec<Card> = inner
            .cards
            .values()
            .filter(|card| card.next_review_at <= as_of)
            .cloned()
            .collect();
        due.sort_by_key(|card| (card.next_review_at, card.id));
        Ok(due)
    }

    fn subscribe(&self) -> DueSubscription {
        self.notifier.subscribe()
    }
}
