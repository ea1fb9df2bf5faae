//! Falling-item game configuration
//!
//! A [`FallingConfig`] is plain data: every variant is just a different
//! instance of it plus an item factory and a scoring rule.

use serde::{Deserialize, Serialize};

use crate::error::{ArcadeError, Result};

/// Inclusive count range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRange {
    pub min: u32,
    pub max: u32,
}

impl CountRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }
}

/// Descent speed range, in percent of viewport height per nominal frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedRange {
    pub min: f32,
    pub max: f32,
}

impl SpeedRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn midpoint(&self) -> f32 {
        (self.min + self.max) / 2.0
    }
}

/// Minimum distances between freshly spawned items (percent units)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnSpacing {
    pub min_horizontal_gap: f32,
    pub min_vertical_gap: f32,
    /// Random x resamples before falling back to a vertical shift
    pub max_attempts: u32,
    /// Furthest the fallback may push an item above the viewport
    pub max_vertical_shift: f32,
}

impl Default for SpawnSpacing {
    fn default() -> Self {
        Self {
            min_horizontal_gap: 12.0,
            min_vertical_gap: 10.0,
            max_attempts: 10,
            max_vertical_shift: 60.0,
        }
    }
}

/// One content entry: a category name and its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sub_items: Vec<String>,
}

impl DataEntry {
    pub fn new(id: &str, name: &str, sub_items: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            sub_items: sub_items.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// How new items enter the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnMode {
    /// One item at a time: the next one is queued once the previous is fully visible
    #[default]
    Sequential,
    /// An initial burst, then a staggered batch every `item_spawn_interval`
    Batched,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallingConfig {
    pub title: String,
    /// Round length in seconds
    pub time_limit: u32,
    pub correct_points: i32,
    pub incorrect_points: i32,
    pub correct_probability: f32,
    /// Batch period (ms)
    pub item_spawn_interval: f64,
    pub item_spawn_count: CountRange,
    /// Stagger between items (ms in batched mode, x0.01 in sequential mode)
    pub item_spawn_delay: f64,
    pub initial_item_count: CountRange,
    pub speed_range: SpeedRange,
    /// Overrides per-item speeds when set
    #[serde(default)]
    pub uniform_speed: Option<f32>,
    #[serde(default)]
    pub spawn_spacing: Option<SpawnSpacing>,
    #[serde(default)]
    pub spawn_mode: SpawnMode,
    pub data: Vec<DataEntry>,
    pub colors: Vec<String>,
}

impl FallingConfig {
    /// Spacing with defaults filled in
    pub fn spacing(&self) -> SpawnSpacing {
        self.spawn_spacing.unwrap_or_default()
    }

    /// Delay before the next sequential spawn (ms)
    pub fn reveal_delay_ms(&self) -> f64 {
        (self.item_spawn_delay * 0.01).max(0.0)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> {
            Err(ArcadeError::InvalidConfig(format!("{}: {}", self.title, msg)))
        };

        if self.data.is_empty() {
            return invalid("data set is empty");
        }
        if self.colors.is_empty() {
            return invalid("color palette is empty");
        }
        if self.time_limit == 0 {
            return invalid("time limit must be positive");
        }
        if !(0.0..=1.0).contains(&self.correct_probability) {
            return invalid("correct probability outside [0, 1]");
        }
        if self.speed_range.min > self.speed_range.max || self.speed_range.min < 0.0 {
            return invalid("speed range inverted or negative");
        }
        if self.item_spawn_count.min > self.item_spawn_count.max
            || self.initial_item_count.min > self.initial_item_count.max
        {
            return invalid("count range inverted");
        }
        if self.item_spawn_interval <= 0.0 || self.item_spawn_delay < 0.0 {
            return invalid("spawn cadence must be positive");
        }
        let spacing = self.spacing();
        if spacing.min_horizontal_gap <= 0.0 || spacing.min_vertical_gap <= 0.0 {
            return invalid("spawn gaps must be positive");
        }
        if spacing.max_vertical_shift < 0.0 {
            return invalid("vertical shift must not be negative");
        }
        Ok(())
    }
}
