//! Daily top-10 leaderboard
//!
//! Scores are bucketed by Korean calendar day (UTC+9). A player keeps at most
//! one entry per day, replaced only by a strictly higher score. Persisted
//! through a [`KeyValueStore`] when one is attached, one key per table.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::services::identity::{Flavor, KeyValueStore};

/// Maximum number of scores shown per day
pub const MAX_HIGH_SCORES: usize = 10;

/// Celeb players get their own board
pub fn table_for_flavor(flavor: &Flavor) -> &'static str {
    match flavor {
        Flavor::Celeb => "scoreboard_celeb",
        _ => "scoreboard",
    }
}

/// Day window offset (UTC+9)
const DAY_OFFSET_MS: f64 = 9.0 * 3600.0 * 1000.0;
const DAY_MS: f64 = 24.0 * 3600.0 * 1000.0;

/// Day index of a timestamp in the leaderboard's time zone
pub fn day_key(timestamp_ms: f64) -> i64 {
    ((timestamp_ms + DAY_OFFSET_MS) / DAY_MS).floor() as i64
}

/// Player names are compared trimmed and uppercased
pub fn normalize_player(name: &str) -> String {
    name.trim().to_uppercase()
}

/// A single score entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub player_name: String,
    pub score: u32,
    /// Unix timestamp (ms) when submitted
    pub timestamp: f64,
}

impl ScoreEntry {
    pub fn day(&self) -> i64 {
        day_key(self.timestamp)
    }
}

/// Result of a submission the backend did not reject outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    /// Stored; rank is 1-indexed within today's board
    Accepted { rank: usize },
    /// The player already has an equal or higher score today
    NotHigherThanExisting { existing: u32 },
}

/// Leaderboard collaborator used by the game-over flow
pub trait Leaderboard {
    /// True if fewer than ten scores exist today or `score` beats the tenth
    fn qualifies_for_top10(&mut self, score: u32) -> Result<bool>;

    /// Store `score` for `player_name`
    fn submit_score(&mut self, player_name: &str, score: u32) -> Result<SubmitStatus>;
}

impl<T: Leaderboard + ?Sized> Leaderboard for Rc<RefCell<T>> {
    fn qualifies_for_top10(&mut self, score: u32) -> Result<bool> {
        self.borrow_mut().qualifies_for_top10(score)
    }

    fn submit_score(&mut self, player_name: &str, score: u32) -> Result<SubmitStatus> {
        self.borrow_mut().submit_score(player_name, score)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredBoard {
    entries: Vec<ScoreEntry>,
}

/// Leaderboard kept in memory, optionally backed by a store
pub struct DailyLeaderboard {
    table: String,
    entries: Vec<ScoreEntry>,
    clock: Box<dyn Fn() -> f64>,
    store: Option<Box<dyn KeyValueStore>>,
}

impl DailyLeaderboard {
    /// Empty board on the wall clock
    pub fn new(table: &str) -> Self {
        Self::with_clock(table, crate::now_ms)
    }

    /// Empty board with an injected clock (ms since epoch)
    pub fn with_clock(table: &str, clock: impl Fn() -> f64 + 'static) -> Self {
        Self {
            table: table.to_string(),
            entries: Vec::new(),
            clock: Box::new(clock),
            store: None,
        }
    }

    /// Back the board with `store`, loading whatever it already holds
    pub fn with_store(mut self, store: impl KeyValueStore + 'static) -> Self {
        match store.get(&self.storage_key()).map(|json| serde_json::from_str::<StoredBoard>(&json)) {
            Some(Ok(stored)) => {
                log::info!("Loaded {} leaderboard entries", stored.entries.len());
                self.entries = stored.entries;
                self.prune();
            }
            Some(Err(e)) => log::warn!("Discarding unreadable {} leaderboard: {}", self.table, e),
            None => log::info!("No leaderboard found for {}, starting fresh", self.table),
        }
        self.store = Some(Box::new(store));
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn storage_key(&self) -> String {
        format!("pocket_arcade_{}", self.table)
    }

    /// Today's day key
    pub fn today(&self) -> i64 {
        day_key((self.clock)())
    }

    /// Top scores for a day, highest first
    pub fn top_scores(&self, day: i64) -> Vec<&ScoreEntry> {
        let mut day_entries: Vec<&ScoreEntry> =
            self.entries.iter().filter(|e| e.day() == day).collect();
        day_entries.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.timestamp.partial_cmp(&b.timestamp).unwrap_or(std::cmp::Ordering::Equal))
        });
        day_entries.truncate(MAX_HIGH_SCORES);
        day_entries
    }

    pub fn today_top(&self) -> Vec<&ScoreEntry> {
        self.top_scores(self.today())
    }

    /// A player's best score today
    pub fn existing_score(&self, player_name: &str) -> Option<u32> {
        let name = normalize_player(player_name);
        let today = self.today();
        self.entries
            .iter()
            .filter(|e| e.day() == today && e.player_name == name)
            .map(|e| e.score)
            .max()
    }

    /// Check if a score qualifies for today's board
    pub fn qualifies(&self, score: u32) -> bool {
        let top = self.today_top();
        if top.len() < MAX_HIGH_SCORES {
            return true;
        }
        top.last().map(|e| score > e.score).unwrap_or(true)
    }

    /// Record a score in memory, replacing the player's lower entry for today
    pub fn submit(&mut self, player_name: &str, score: u32) -> SubmitStatus {
        let name = normalize_player(player_name);
        if let Some(existing) = self.existing_score(&name) {
            if score <= existing {
                log::info!(
                    "Score not submitted: existing score ({}) is higher or equal to new score ({})",
                    existing,
                    score
                );
                return SubmitStatus::NotHigherThanExisting { existing };
            }
        }

        let now = (self.clock)();
        let today = day_key(now);
        self.entries
            .retain(|e| !(e.day() == today && e.player_name == name));
        self.entries.push(ScoreEntry {
            player_name: name.clone(),
            score,
            timestamp: now,
        });

        let rank = self
            .today_top()
            .iter()
            .position(|e| e.player_name == name)
            .map(|i| i + 1)
            .unwrap_or(MAX_HIGH_SCORES + 1);

        log::info!("Score {} submitted for {} (rank {})", score, name, rank);
        SubmitStatus::Accepted { rank }
    }

    /// Drop entries older than today (keeps storage small)
    pub fn prune(&mut self) {
        let today = self.today();
        self.entries.retain(|e| e.day() >= today);
    }

    /// Write the entries to the attached store
    pub fn save(&mut self) -> Result<()> {
        let key = self.storage_key();
        let Some(store) = self.store.as_mut() else {
            log::debug!("{} entries held in memory ({})", self.entries.len(), key);
            return Ok(());
        };
        let json = serde_json::to_string(&StoredBoard {
            entries: self.entries.clone(),
        })?;
        store.set(&key, &json)
    }
}

impl Leaderboard for DailyLeaderboard {
    fn qualifies_for_top10(&mut self, score: u32) -> Result<bool> {
        Ok(self.qualifies(score))
    }

    fn submit_score(&mut self, player_name: &str, score: u32) -> Result<SubmitStatus> {
        let status = self.submit(player_name, score);
        if matches!(status, SubmitStatus::Accepted { .. }) {
            self.save()?;
        }
        Ok(status)
    }
}
