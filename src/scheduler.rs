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

//! The SM-2 scheduling transition.
//!
//! Given a card's current scheduling state and a recall-quality rating, this
//! computes the card's next state: a new ease factor, a new interval, and the
//! instant the card next becomes due. The function is pure; the review
//! instant is an explicit argument, never read from the system clock.

use crate::types::card::Card;
use crate::types::quality::Quality;
use crate::types::timestamp::Timestamp;

/// The lowest an ease factor can go.
pub const MIN_EASE: f64 = 1.3;

/// The highest an ease factor can go.
pub const MAX_EASE: f64 = 2.5;

/// The rating below which a review counts as failure.
const PASS_THRESHOLD: i64 = 3;

/// The fixed interval after the second consecutive successful review.
const GRADUATION_INTERVAL: i64 = 6;

/// Computes a card's next scheduling state after a review at `now`.
///
/// Failure (`quality` below `Good`) lowers the ease by 0.2 and restarts the
/// one-day cycle regardless of history. Success keeps or raises the ease
/// (`Perfect` adds 0.1) and grows the interval: 0 → 1 → 6 → geometric growth
/// by the updated ease factor. The ease is clamped to `[MIN_EASE, MAX_EASE]`
/// after every update.
pub fn compute_next(card: &Card, quality: Quality, now: Timestamp) -> Card {
    let rating = quality.rating();

    let ease_factor = match rating {
        r if r < PASS_THRESHOLD => card.ease_factor - 0.2,
        r if r > PASS_THRESHOLD => card.ease_factor + 0.1,
        _ => card.ease_factor,
    }
    .clamp(MIN_EASE, MAX_EASE);

    // Interval growth uses the updated ease factor, not the one the card
    // entered the review with.
    let interval_days = if rating < PASS_THRESHOLD {
        1
    } else {
        match card.interval_days {
            0 => 1,
            1 => GRADUATION_INTERVAL,
            prev => (prev as f64 * ease_factor).floor() as i64,
        }
    };

    Card {
        next_review_at: now.plus_days(interval_days),
        interval_days,
        ease_factor,
        ..card.clone()
    }
}
