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

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;

/// A recall-quality rating on the four-point scale used by the review UI.
///
/// Ratings below `Good` count as failure: they reset the review interval and
/// lower the ease factor.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Quality {
    /// Could not recall the answer at all (1).
    Forgot,
    /// Recalled with serious difficulty (2).
    Hard,
    /// Recalled with some effort (3).
    Good,
    /// Recalled instantly (4).
    Perfect,
}

impl Quality {
    /// The integer rating, 1 through 4.
    pub fn rating(self) -> i64 {
        match self {
            Quality::Forgot => 1,
            Quality::Hard => 2,
            Quality::Good => 3,
            Quality::Perfect => 4,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Quality::Forgot => "forgot",
            Quality::Hard => "hard",
            Quality::Good => "good",
            Quality::Perfect => "perfect",
        }
    }
}

impl TryFrom<i64> for Quality {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Quality::Forgot),
            2 => Ok(Quality::Hard),
            3 => Ok(Quality::Good),
            4 => Ok(Quality::Perfect),
            _ => Err(Error::Validation(format!(
                "quality rating out of range: {value} (expected 1-4)"
            ))),
        }
    }
}

impl TryFrom<String> for Quality {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "forgot" => Ok(Quality::Forgot),
            "hard" => Ok(Quality::Hard),
            "good" => Ok(Quality::Good),
            "perfect" => Ok(Quality::Perfect),
            _ => Err(Error::Validation(format!("invalid quality: '{value}'"))),
        }
    }
}
