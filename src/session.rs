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

//! One bounded pass over the cards due at a point in time.
//!
//! A session snapshots the due set at start; cards that become due while the
//! session runs are not spliced in. Each card is shown front-first, revealed
//! on demand, then scored. A review is persisted before the cursor advances,
//! so abandoning the session at any point loses nothing that was committed.

use crate::error::Error;
use crate::error::Fallible;
use crate::scheduler::compute_next;
use crate::store::CardStore;
use crate::types::card::Card;
use crate::types::quality::Quality;
use crate::types::timestamp::Timestamp;

/// Where the session stands with respect to the current card.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    /// Showing the front of the current card.
    Prompt,
    /// The back of the current card has been revealed; awaiting a rating.
    Revealed,
    /// Every card in the snapshot has been reviewed and persisted.
    Exhausted,
}

pub struct Session<'a, S: CardStore> {
    store: &'a S,
    cards: Vec<Card>,
    cursor: usize,
    revealed: bool,
}

impl<'a, S: CardStore> Session<'a, S> {
    /// Starts a session over a snapshot of the cards due as of `as_of`,
    /// oldest-due first.
    pub fn start(store: &'a S, as_of: Timestamp) -> Fallible<Self> {
        let cards = store.due_cards(as_of)?;
        log::debug!("Session started with {} due cards", cards.len());
        Ok(Self {
            store,
            cards,
            cursor: 0,
            revealed: false,
        })
    }

    pub fn phase(&self) -> Phase {
        if self.cursor >= self.cards.len() {
            Phase::Exhausted
        } else if self.revealed {
            Phase::Revealed
        } else {
            Phase::Prompt
        }
    }

    /// The card being presented, or `None` once the session is exhausted.
    pub fn current(&self) -> Option<&Card> {
        self.cards.get(self.cursor)
    }

    /// The number of cards in the session snapshot.
    pub fn total(&self) -> usize {
        self.cards.len()
    }

    /// How many cards have been reviewed and persisted so far.
    pub fn reviewed(&self) -> usize {
        self.cursor
    }

    /// Reveals the back side of the current card. Does not touch the card's
    /// stored state.
    pub fn reveal(&mut self) -> Fallible<&Card> {
        if self.cursor >= self.cards.len() {
            return Err(Error::Validation(
                "cannot reveal: session is exhausted".to_string(),
            ));
        }
        self.revealed = true;
        Ok(&self.cards[self.cursor])
    }

    /// Scores the current card and persists the scheduling result.
    ///
    /// The cursor advances only once the store confirms the write. On
    /// [`Error::Conflict`] the session refreshes its snapshot of the card
    /// from the store before surfacing the error, so a retry recomputes from
    /// the latest committed state instead of the stale one.
    pub fn respond(&mut self, quality: Quality, now: Timestamp) -> Fallible<()> {
        if self.cursor >= self.cards.len() {
            return Err(Error::Validation(
                "cannot respond: session is exhausted".to_string(),
            ));
        }
        if !self.revealed {
            return Err(Error::Validation(
                "cannot respond: the answer has not been revealed".to_string(),
            ));
        }
        let current = &self.cards[self.cursor];
        let reviewed = compute_next(current, quality, now);
        match self.store.update(&reviewed) {
            Ok(()) => {
                self.cursor += 1;
                self.revealed = false;
                Ok(())
            }
            Err(Error::Conflict(id)) => {
                if let Some(latest) = self.store.get_by_id(id)? {
                    self.cards[self.cursor] = latest;
                }
                Err(Error::Conflict(id))
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::store::DueSubscription;
    use crate::store::MemoryStore;
    use crate::types::card::CardId;
    use crate::types::card::NewCard;

    fn store_with_cards(prompts: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        for (i, prompt) in prompts.iter().enumerate() {
            let new = NewCard::new(*prompt, "answer", None).unwrap();
            store.insert(new, Timestamp::from_millis(i as i64)).unwrap();
        }
        store
    }

    #[test]
    fn test_empty_session_is_exhausted() -> Fallible<()> {
        let store = MemoryStore::new();
        let session = Session::start(&store, Timestamp::from_millis(0))?;
        assert_eq!(session.phase(), Phase::Exhausted);
        assert!(session.current().is_none());
        Ok(())
    }

    #[test]
    fn test_full_pass_presents_each_card_once() -> Fallible<()> {
        let store = store_with_cards(&["a", "b", "c"]);
        let now = Timestamp::from_millis(1_000);
        let mut session = Session::start(&store, now)?;
        assert_eq!(session.total(), 3);

        let mut seen = Vec::new();
        while session.phase() != Phase::Exhausted {
            assert_eq!(session.phase(), Phase::Prompt);
            seen.push(session.current().unwrap().prompt.clone());
            session.reveal()?;
            assert_eq!(session.phase(), Phase::Revealed);
            session.respond(Quality::Good, now)?;
        }
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(session.reviewed(), 3);
        // Every card was pushed out of the due set.
        assert!(store.due_cards(now)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_respond_requires_reveal() -> Fallible<()> {
        let store = store_with_cards(&["a"]);
        let mut session = Session::start(&store, Timestamp::from_millis(100))?;
        assert!(matches!(
            session.respond(Quality::Good, Timestamp::from_millis(100)),
            Err(Error::Validation(_))
        ));
        Ok(())
    }

    #[test]
    fn test_cards_due_mid_session_are_not_spliced_in() -> Fallible<()> {
        let store = store_with_cards(&["a"]);
        let now = Timestamp::from_millis(100);
        let mut session = Session::start(&store, now)?;
        // Another card arrives while the session is running.
        let new = NewCard::new("late", "answer", None).unwrap();
        store.insert(new, now)?;
        session.reveal()?;
        session.respond(Quality::Good, now)?;
        assert_eq!(session.phase(), Phase::Exhausted);
        assert_eq!(session.total(), 1);
        Ok(())
    }

    /// A store wrapper whose next update can be made to fail, for testing
    /// that persistence failure never advances the cursor.
    struct FlakyStore {
        inner: MemoryStore,
        fail_next_update: Cell<bool>,
    }

    impl FlakyStore {
        fn new(inner: MemoryStore) -> Self {
            Self {
                inner,
                fail_next_update: Cell::new(false),
            }
        }
    }

    impl CardStore for FlakyStore {
        fn insert(&self, new: NewCard, created_at: Timestamp) -> Fallible<CardId> {
            self.inner.insert(new, created_at)
        }

        fn update(&self, card: &Card) -> Fallible<()> {
            if self.fail_next_update.replace(false) {
                return Err(Error::Store("disk on fire".to_string()));
            }
            self.inner.update(card)
        }

        fn get_by_id(&self, id: CardId) -> Fallible<Option<Card>> {
            self.inner.get_by_id(id)
        }

        fn due_cards(&self, as_of: Timestamp) -> Fallible<Vec<Card>> {
            self.inner.due_cards(as_of)
        }

        fn subscribe(&self) -> DueSubscription {
            self.inner.subscribe()
        }
    }

    #[test]
    fn test_persistence_failure_does_not_advance() -> Fallible<()> {
        let store = FlakyStore::new(store_with_cards(&["a", "b", "c"]));
        let now = Timestamp::from_millis(1_000);
        let mut session = Session::start(&store, now)?;

        session.reveal()?;
        session.respond(Quality::Good, now)?;
        assert_eq!(session.current().unwrap().prompt, "b");

        // Persisting b's review fails: the cursor stays on b.
        session.reveal()?;
        store.fail_next_update.set(true);
        assert!(matches!(
            session.respond(Quality::Perfect, now),
            Err(Error::Store(_))
        ));
        assert_eq!(session.current().unwrap().prompt, "b");
        assert_eq!(session.phase(), Phase::Revealed);

        // Once the store recovers, the same response goes through.
        session.respond(Quality::Perfect, now)?;
        assert_eq!(session.current().unwrap().prompt, "c");

        session.reveal()?;
        session.respond(Quality::Good, now)?;
        assert_eq!(session.phase(), Phase::Exhausted);
        Ok(())
    }

    #[test]
    fn test_conflict_refreshes_and_retry_succeeds() -> Fallible<()> {
        let store = store_with_cards(&["a"]);
        let now = Timestamp::from_millis(1_000);
        let mut session = Session::start(&store, now)?;
        session.reveal()?;

        // Someone else commits a review for the same card behind the
        // session's back.
        let id = session.current().unwrap().id;
        let latest = store.get_by_id(id)?.unwrap();
        let external = compute_next(&latest, Quality::Forgot, Timestamp::from_millis(900));
        store.update(&external)?;

        assert!(matches!(
            session.respond(Quality::Good, now),
            Err(Error::Conflict(_))
        ));
        assert_eq!(session.phase(), Phase::Revealed);

        // The session refreshed its snapshot: the retry recomputes from the
        // externally committed state and succeeds.
        session.respond(Quality::Good, now)?;
        assert_eq!(session.phase(), Phase::Exhausted);
        let stored = store.get_by_id(id)?.unwrap();
        // Good on an interval-1 card graduates it to six days.
        assert_eq!(stored.interval_days, 6);
        Ok(())
    }
}
