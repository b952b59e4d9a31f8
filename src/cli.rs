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
use std::io::BufRead;
use std::io::Write;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use tokio::select;
use tokio::signal;

use crate::db::Database;
use crate::error::Fallible;
use crate::session::Phase;
use crate::session::Session;
use crate::store::CardStore;
use crate::types::card::NewCard;
use crate::types::quality::Quality;
use crate::types::timestamp::Timestamp;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the card database. Created if it does not exist.
    #[arg(long, default_value = "retain.db")]
    db: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a card to the collection.
    Add {
        /// Front side, shown first during review.
        prompt: String,
        /// Back side, revealed on demand.
        answer: String,
        /// Optional free-form context.
        #[arg(long)]
        note: Option<String>,
    },
    /// List the cards currently due for review.
    Due {
        /// Which output format to use.
        #[arg(long, default_value_t = DueFormat::Text)]
        format: DueFormat,
    },
    /// Review the cards currently due, one at a time.
    Review,
    /// Reprint the due list whenever it changes, until Ctrl+C.
    Watch,
}

#[derive(ValueEnum, Clone, Copy, PartialEq)]
pub enum DueFormat {
    Text,
    Json,
}

impl Display for DueFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DueFormat::Text => write!(f, "text"),
            DueFormat::Json => write!(f, "json"),
        }
    }
}

pub async fn entrypoint() -> Fallible<()> {
    let cli: Cli = Cli::parse();
    let db = Database::open(&cli.db)?;
    match cli.command {
        Command::Add {
            prompt,
            answer,
            note,
        } => {
            let new = NewCard::new(prompt, answer, note)?;
            let id = db.insert(new, Timestamp::now())?;
            println!("Created card {id}.");
            Ok(())
        }
        Command::Due { format } => print_due(&db, Timestamp::now(), format),
        Command::Review => run_review(&db),
        Command::Watch => run_watch(&db).await,
    }
}

fn print_due(store: &impl CardStore, as_of: Timestamp, format: DueFormat) -> Fallible<()> {
    let due = store.due_cards(as_of)?;
    match format {
        DueFormat::Text => {
            if due.is_empty() {
                println!("No cards due.");
            }
            for card in &due {
                println!(
                    "{}\t{}\t(due since {})",
                    card.id, card.prompt, card.next_review_at
                );
            }
        }
        DueFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&due)?);
        }
    }
    Ok(())
}

fn run_review(db: &Database) -> Fallible<()> {
    let mut session = Session::start(db, Timestamp::now())?;
    if session.phase() == Phase::Exhausted {
        println!("No cards due.");
        return Ok(());
    }
    let total = session.total();
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let Some(card) = session.current() else { break };
        println!();
        println!("Card {}/{}: {}", session.reviewed() + 1, total, card.prompt);
        prompt_user("[Enter] to reveal, [q] to quit: ")?;
        match lines.next() {
            Some(line) => {
                if line?.trim() == "q" {
                    break;
                }
            }
            None => break,
        }
        let card = session.reveal()?;
        println!("Answer: {}", card.answer);
        if let Some(note) = &card.note {
            println!("Note: {note}");
        }
        loop {
            prompt_user("Rate recall [1=forgot, 2=hard, 3=good, 4=perfect, q=quit]: ")?;
            let line = match lines.next() {
                Some(line) => line?,
                None => return finish(&session),
            };
            let input = line.trim();
            if input == "q" {
                return finish(&session);
            }
            let quality = match parse_quality(input) {
                Ok(quality) => quality,
                Err(err) => {
                    println!("{err}");
                    continue;
                }
            };
            // The review instant is taken per response, not at session start.
            match session.respond(quality, Timestamp::now()) {
                Ok(()) => break,
                Err(err) => {
                    // On a conflict the session has already refreshed the
                    // card; asking again retries against the latest state.
                    println!("{err}");
                }
            }
        }
    }
    finish(&session)
}

fn finish(session: &Session<'_, Database>) -> Fallible<()> {
    println!();
    if session.phase() == Phase::Exhausted {
        println!("Session complete: {} cards reviewed.", session.reviewed());
    } else {
        println!(
            "Session abandoned: {} of {} cards reviewed.",
            session.reviewed(),
            session.total()
        );
    }
    Ok(())
}

fn parse_quality(input: &str) -> Fallible<Quality> {
    match input.parse::<i64>() {
        Ok(rating) => Quality::try_from(rating),
        Err(_) => Quality::try_from(input.to_string()),
    }
}

async fn run_watch(db: &Database) -> Fallible<()> {
    let mut subscription = db.subscribe();
    print_due(db, Timestamp::now(), DueFormat::Text)?;
    loop {
        select! {
            result = signal::ctrl_c() => {
                result?;
                log::debug!("Received Ctrl+C, shutting down");
                return Ok(());
            },
            result = subscription.changed() => {
                result?;
                println!();
                print_due(db, Timestamp::now(), DueFormat::Text)?;
            },
        }
    }
}

fn prompt_user(message: &str) -> Fallible<()> {
    print!("{message}");
    std::io::stdout().flush()?;
    Ok(())
}
