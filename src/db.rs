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

//! SQLite-backed card store.
//!
//! One table, timestamps as epoch milliseconds so the due query orders
//! correctly in SQL. All access goes through a single mutex-guarded
//! connection, which serializes writes; racing updates on one card are
//! caught by the revision-conditional `UPDATE`.

use std::path::Path;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;

use crate::error::Error;
use crate::error::Fallible;
use crate::store::CardStore;
use crate::store::DueNotifier;
use crate::store::DueSubscription;
use crate::types::card::Card;
use crate::types::card::CardId;
use crate::types::card::NewCard;
use crate::types::timestamp::Timestamp;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS card (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    prompt TEXT NOT NULL,
    answer TEXT NOT NULL,
    note TEXT,
    created_at INTEGER NOT NULL,
    next_review_at INTEGER NOT NULL,
    interval_days INTEGER NOT NULL DEFAULT 0,
    ease_factor REAL NOT NULL DEFAULT 2.5,
    revision INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_card_next_review_at ON card (next_review_at);
";

pub struct Database {
    conn: Mutex<Connection>,
    notifier: DueNotifier,
}

impl Database {
    /// Opens (creating if necessary) the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Fallible<Self> {
        log::debug!("Opening database at {}", path.as_ref().display());
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// An in-memory database, for tests and throwaway sessions.
    pub fn open_in_memory() -> Fallible<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Fallible<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            notifier: DueNotifier::new(),
        })
    }

    fn lock(&self) -> Fallible<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Store("connection mutex poisoned".to_string()))
    }
}

fn card_from_row(row: &Row) -> rusqlite::Result<Card> {
    Ok(Card {
        id: CardId::new(row.get(0)?),
        prompt: row.get(1)?,
        answer: row.get(2)?,
        note: row.get(3)?,
        created_at: Timestamp::from_millis(row.get(4)?),
        next_review_at: Timestamp::from_millis(row.get(5)?),
        interval_days: row.get(6)?,
        ease_factor: row.get(7)?,
        revision: row.get(8)?,
    })
}

const CARD_COLUMNS: &str =
    "id, prompt, answer, note, created_at, next_review_at, interval_days, ease_factor, revision";

impl CardStore for Database {
    fn insert(&self, new: NewCard, created_at: Timestamp) -> Fallible<CardId> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO card (prompt, answer, note, created_at, next_review_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![new.prompt, new.answer, new.note, created_at.as_millis()],
        )?;
        let id = CardId::new(conn.last_insert_rowid());
        drop(conn);
        log::debug!("Inserted card {id}");
        self.notifier.notify();
        Ok(id)
    }

    fn update(&self, card: &Card) -> Fallible<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE card
             SET prompt = ?1, answer = ?2, note = ?3, next_review_at = ?4,
                 interval_days = ?5, ease_factor = ?6, revision = revision + 1
             WHERE id = ?7 AND revision = ?8",
            params![
                card.prompt,
                card.answer,
                card.note,
                card.next_review_at.as_millis(),
                card.interval_days,
                card.ease_factor,
                card.id.into_inner(),
                card.revision,
            ],
        )?;
        if changed == 1 {
            drop(conn);
            self.notifier.notify();
            return Ok(());
        }
        // The conditional write missed: either the id is unknown, or the
        // revision moved underneath the caller.
        let query = format!("SELECT {CARD_COLUMNS} FROM card WHERE id = ?1");
        let stored: Option<Card> = conn
            .query_row(&query, params![card.id.into_inner()], card_from_row)
            .optional()?;
        match stored {
            None => Err(Error::NotFound(card.id)),
            // Replay of a write that already committed.
            Some(stored) if stored.same_content(card) => Ok(()),
            Some(_) => {
                log::warn!("Conflicting update to card {}", card.id);
                Err(Error::Conflict(card.id))
            }
        }
    }

    fn get_by_id(&self, id: CardId) -> Fallible<Option<Card>> {
        let conn = self.lock()?;
        let query = format!("SELECT {CARD_COLUMNS} FROM card WHERE id = ?1");
        let card = conn
            .query_row(&query, params![id.into_inner()], card_from_row)
            .optional()?;
        Ok(card)
    }

    fn due_cards(&self, as_of: Timestamp) -> Fallible<Vec<Card>> {
        let conn = self.lock()?;
        let query = format!(
            "SELECT {CARD_COLUMNS} FROM card
             WHERE next_review_at <= ?1
             ORDER BY next_review_at ASC, id ASC"
        );
        let mut stmt = conn.prepare(&query)?;
        let cards = stmt
            .query_map(params![as_of.as_millis()], card_from_row)?
            .collect::<rusqlite::Result<Vec<Card>>>()?;
        Ok(cards)
    }

    fn subscribe(&self) -> DueSubscription {
        self.notifier.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::scheduler::compute_next;
    use crate::types::quality::Quality;

    fn new_card(prompt: &str) -> NewCard {
        NewCard::new(prompt, "answer", Some("note".to_string())).unwrap()
    }

    #[test]
    fn test_insert_and_get() -> Fallible<()> {
        let db = Database::open_in_memory()?;
        let created_at = Timestamp::from_millis(1_000);
        let id = db.insert(new_card("prompt"), created_at)?;
        let card = db.get_by_id(id)?.unwrap();
        assert_eq!(card.prompt, "prompt");
        assert_eq!(card.answer, "answer");
        assert_eq!(card.note.as_deref(), Some("note"));
        assert_eq!(card.created_at, created_at);
        assert_eq!(card.next_review_at, created_at);
        assert_eq!(card.interval_days, 0);
        assert_eq!(card.ease_factor, 2.5);
        assert_eq!(card.revision, 0);
        Ok(())
    }

    #[test]
    fn test_get_unknown_id_is_none() -> Fallible<()> {
        let db = Database::open_in_memory()?;
        assert!(db.get_by_id(CardId::new(7))?.is_none());
        Ok(())
    }

    #[test]
    fn test_update_persists_scheduling_state() -> Fallible<()> {
        let db = Database::open_in_memory()?;
        let id = db.insert(new_card("prompt"), Timestamp::from_millis(0))?;
        let card = db.get_by_id(id)?.unwrap();
        let reviewed = compute_next(&card, Quality::Good, Timestamp::from_millis(500));
        db.update(&reviewed)?;
        let stored = db.get_by_id(id)?.unwrap();
        assert!(stored.same_content(&reviewed));
        assert_eq!(stored.revision, 1);
        // The creation timestamp never changes.
        assert_eq!(stored.created_at, card.created_at);
        Ok(())
    }

    #[test]
    fn test_update_unknown_id_is_not_found() -> Fallible<()> {
        let db = Database::open_in_memory()?;
        let id = db.insert(new_card("prompt"), Timestamp::from_millis(0))?;
        let mut card = db.get_by_id(id)?.unwrap();
        card.id = CardId::new(99);
        assert!(matches!(db.update(&card), Err(Error::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_update_replay_is_idempotent() -> Fallible<()> {
        let db = Database::open_in_memory()?;
        let id = db.insert(new_card("prompt"), Timestamp::from_millis(0))?;
        let card = db.get_by_id(id)?.unwrap();
        let reviewed = compute_next(&card, Quality::Forgot, Timestamp::from_millis(500));
        db.update(&reviewed)?;
        let after_first = db.get_by_id(id)?.unwrap();
        db.update(&reviewed)?;
        let after_second = db.get_by_id(id)?.unwrap();
        assert_eq!(after_first, after_second);
        Ok(())
    }

    #[test]
    fn test_racing_updates_conflict() -> Fallible<()> {
        let db = Database::open_in_memory()?;
        let id = db.insert(new_card("prompt"), Timestamp::from_millis(0))?;
        let snapshot = db.get_by_id(id)?.unwrap();
        let result_a = compute_next(&snapshot, Quality::Perfect, Timestamp::from_millis(100));
        let result_b = compute_next(&snapshot, Quality::Forgot, Timestamp::from_millis(200));
        db.update(&result_a)?;
        assert!(matches!(db.update(&result_b), Err(Error::Conflict(_))));
        let stored = db.get_by_id(id)?.unwrap();
        assert!(stored.same_content(&result_a));
        Ok(())
    }

    #[test]
    fn test_due_ordering_with_tiebreak() -> Fallible<()> {
        let db = Database::open_in_memory()?;
        let c = db.insert(new_card("c"), Timestamp::from_millis(300))?;
        let a = db.insert(new_card("a"), Timestamp::from_millis(100))?;
        let b = db.insert(new_card("b"), Timestamp::from_millis(100))?;
        let due = db.due_cards(Timestamp::from_millis(1_000))?;
        let ids: Vec<CardId> = due.iter().map(|card| card.id).collect();
        assert_eq!(ids, vec![a, b, c]);
        Ok(())
    }

    #[test]
    fn test_due_boundary_is_inclusive() -> Fallible<()> {
        let db = Database::open_in_memory()?;
        db.insert(new_card("prompt"), Timestamp::from_millis(100))?;
        assert!(db.due_cards(Timestamp::from_millis(99))?.is_empty());
        assert_eq!(db.due_cards(Timestamp::from_millis(100))?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_cards_survive_reopen() -> Fallible<()> {
        let dir = tempdir()?;
        let path = dir.path().join("retain.db");
        let id = {
            let db = Database::open(&path)?;
            db.insert(new_card("prompt"), Timestamp::from_millis(42))?
        };
        let db = Database::open(&path)?;
        let card = db.get_by_id(id)?.unwrap();
        assert_eq!(card.prompt, "prompt");
        assert_eq!(card.created_at, Timestamp::from_millis(42));
        Ok(())
    }

    #[tokio::test]
    async fn test_subscription_sees_mutations() -> Fallible<()> {
        let db = Database::open_in_memory()?;
        let mut subscription = db.subscribe();
        let before = subscription.generation();
        db.insert(new_card("prompt"), Timestamp::from_millis(0))?;
        subscription.changed().await?;
        assert!(subscription.generation() > before);
        Ok(())
    }
}
