//! Per-variant hooks: how items are made and how taps are scored

use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::config::FallingConfig;
use crate::{apply_points, rand_range};

/// Leftmost/rightmost item center (percent of width)
pub const MIN_X: f32 = 10.0;
pub const MAX_X: f32 = 90.0;
/// Spawn height just above the viewport (percent of height)
pub const SPAWN_Y: f32 = -10.0;

/// Variant-specific payload carried by an item
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ItemDetail {
    #[default]
    Plain,
    Symbol(String),
    /// Category/member pairing such as group-member or team-player
    Pair { category: String, member: String },
}

/// A live item on the field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallingItem {
    pub id: u64,
    pub text: String,
    pub is_correct: bool,
    pub color: String,
    /// Center, percent of width
    pub x: f32,
    /// Top, percent of height; negative is above the viewport
    pub y: f32,
    /// Percent of height per nominal frame
    pub speed: f32,
    pub detail: ItemDetail,
}

/// Factory output before placement. Missing fields are filled by the engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemDraft {
    pub text: String,
    pub is_correct: bool,
    pub color: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub speed: Option<f32>,
    pub detail: ItemDetail,
}

/// Score after a tap and the change shown to the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreChange {
    pub new_score: u32,
    pub delta: i32,
}

pub trait ItemFactory {
    fn make_item(&mut self, config: &FallingConfig, rng: &mut Pcg32) -> ItemDraft;
}

pub trait ScoringRule {
    fn score(&self, item: &FallingItem, current: u32, config: &FallingConfig) -> ScoreChange;
}

/// Random x across the usable width
pub fn random_x(rng: &mut Pcg32) -> f32 {
    rand_range(rng, MIN_X, MAX_X).clamp(MIN_X, MAX_X)
}

pub fn random_speed(config: &FallingConfig, rng: &mut Pcg32) -> f32 {
    rand_range(rng, config.speed_range.min, config.speed_range.max)
}

/// Pick a palette color; the palette is validated non-empty
pub fn random_color(config: &FallingConfig, rng: &mut Pcg32) -> String {
    if config.colors.is_empty() {
        return String::new();
    }
    config.colors[rng.random_range(0..config.colors.len())].clone()
}

pub fn roll_correct(config: &FallingConfig, rng: &mut Pcg32) -> bool {
    rng.random::<f32>() < config.correct_probability
}

/// Random data entry name, random palette color
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFactory;

impl ItemFactory for DefaultFactory {
    fn make_item(&mut self, config: &FallingConfig, rng: &mut Pcg32) -> ItemDraft {
        let text = if config.data.is_empty() {
            String::new()
        } else {
            config.data[rng.random_range(0..config.data.len())].name.clone()
        };
        let is_correct = roll_correct(config, rng);
        ItemDraft {
            text,
            is_correct,
            color: random_color(config, rng),
            x: Some(random_x(rng)),
            y: Some(SPAWN_Y),
            speed: Some(random_speed(config, rng)),
            detail: ItemDetail::Plain,
        }
    }
}

/// Configured correct/incorrect points, floored at zero
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultScoring;

impl ScoringRule for DefaultScoring {
    fn score(&self, item: &FallingItem, current: u32, config: &FallingConfig) -> ScoreChange {
        let delta = if item.is_correct {
            config.correct_points
        } else {
            config.incorrect_points
        };
        ScoreChange {
            new_score: apply_points(current, delta),
            delta,
        }
    }
}

/// Fixed points regardless of the config
#[derive(Debug, Clone, Copy)]
pub struct FixedPoints {
    pub correct: i32,
    pub incorrect: i32,
}

impl ScoringRule for FixedPoints {
    fn score(&self, item: &FallingItem, current: u32, _config: &FallingConfig) -> ScoreChange {
        let delta = if item.is_correct { self.correct } else { self.incorrect };
        ScoreChange {
            new_score: apply_points(current, delta),
            delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::falling::variants;
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn item(is_correct: bool) -> FallingItem {
        FallingItem {
            id: 1,
            text: "O".into(),
            is_correct,
            color: "#22C55E".into(),
            x: 50.0,
            y: 0.0,
            speed: 0.4,
            detail: ItemDetail::Plain,
        }
    }

    #[test]
    fn test_default_scoring_floors_at_zero() {
        let config = variants::symbol_match();
        let correct = DefaultScoring.score(&item(true), 0, &config);
        assert_eq!(correct, ScoreChange { new_score: 5, delta: 5 });

        let wrong = DefaultScoring.score(&item(false), 2, &config);
        assert_eq!(wrong, ScoreChange { new_score: 0, delta: -3 });
    }

    #[test]
    fn test_fixed_points_ignore_config() {
        let config = variants::symbol_match();
        let rule = FixedPoints { correct: 3, incorrect: -2 };
        assert_eq!(rule.score(&item(true), 10, &config).new_score, 13);
        assert_eq!(rule.score(&item(false), 1, &config).new_score, 0);
    }

    #[test]
    fn test_default_factory_fills_every_field() {
        let config = variants::soccer_match();
        let mut rng = Pcg32::seed_from_u64(3);
        for _ in 0..100 {
            let draft = DefaultFactory.make_item(&config, &mut rng);
            assert!(config.data.iter().any(|d| d.name == draft.text));
            assert!(config.colors.contains(&draft.color));
            let x = draft.x.unwrap();
            assert!((MIN_X..=MAX_X).contains(&x));
            assert_eq!(draft.y, Some(SPAWN_Y));
            let speed = draft.speed.unwrap();
            assert!(speed >= config.speed_range.min && speed <= config.speed_range.max);
        }
    }

    proptest! {
        #[test]
        fn score_follows_floored_sum(start in 0u32..50, taps in prop::collection::vec(any::<bool>(), 0..60)) {
            let config = variants::symbol_match();
            let mut score = start;
            let mut expected = i64::from(start);
            for correct in taps {
                let change = DefaultScoring.score(&item(correct), score, &config);
                score = change.new_score;
                expected = (expected + i64::from(change.delta)).max(0);
                prop_assert_eq!(i64::from(score), expected);
            }
        }

        #[test]
        fn penalty_clamps_to_zero(score in 0u32..3) {
            let config = variants::symbol_match();
            prop_assert_eq!(DefaultScoring.score(&item(false), score, &config).new_score, 0);
        }
    }
}
