//! Built-in falling-item games
//!
//! Each variant is a [`FallingConfig`] plus the factory and scoring rule it
//! plays with. [`Variant::build`] wires them into a [`FallingGame`].

use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::config::{CountRange, DataEntry, FallingConfig, SpawnMode, SpawnSpacing, SpeedRange};
use super::engine::FallingGame;
use super::strategy::{
    DefaultScoring, FixedPoints, ItemDetail, ItemDraft, ItemFactory, SPAWN_Y, ScoringRule, random_color,
    random_speed, roll_correct,
};
use crate::error::Result;
use crate::rand_range;
use crate::services::Services;

const CORRECT_COLOR: &str = "#22C55E";
const WRONG_COLOR: &str = "#EF4444";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Symbol,
    Idol,
    Soccer,
}

impl Variant {
    /// Parse a `?game=` value
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "symbol" | "simple" => Some(Variant::Symbol),
            "idol" => Some(Variant::Idol),
            "soccer" => Some(Variant::Soccer),
            _ => None,
        }
    }

    pub fn config(&self) -> FallingConfig {
        match self {
            Variant::Symbol => symbol_match(),
            Variant::Idol => idol_match(),
            Variant::Soccer => soccer_match(),
        }
    }

    pub fn factory(&self) -> Box<dyn ItemFactory> {
        match self {
            Variant::Symbol => Box::new(SymbolFactory),
            Variant::Idol => Box::new(PairingFactory::new(PairPick::AnyMember)),
            Variant::Soccer => Box::new(PairingFactory::new(PairPick::AnyCategory)),
        }
    }

    pub fn scoring(&self) -> Box<dyn ScoringRule> {
        match self {
            Variant::Soccer => Box::new(FixedPoints {
                correct: 3,
                incorrect: -2,
            }),
            _ => Box::new(DefaultScoring),
        }
    }

    pub fn build(&self, seed: u64, services: Services) -> Result<FallingGame> {
        FallingGame::new(self.config(), self.factory(), self.scoring(), seed, services)
    }
}

/// O/X items colored by correctness
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolFactory;

impl ItemFactory for SymbolFactory {
    fn make_item(&mut self, config: &FallingConfig, rng: &mut Pcg32) -> ItemDraft {
        let is_correct = roll_correct(config, rng);
        let symbol = if is_correct { "O" } else { "X" };
        ItemDraft {
            text: symbol.to_string(),
            is_correct,
            color: if is_correct { CORRECT_COLOR } else { WRONG_COLOR }.to_string(),
            x: Some(rand_range(rng, 15.0, 85.0)),
            y: Some(SPAWN_Y),
            speed: Some(random_speed(config, rng)),
            detail: ItemDetail::Symbol(symbol.to_string()),
        }
    }
}

/// How the base pair is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairPick {
    /// Uniform over all members, so larger groups show up more often
    AnyMember,
    /// Uniform over categories, then a member
    AnyCategory,
}

/// "Category-member" items; wrong ones borrow a member from another category
#[derive(Debug, Clone, Copy)]
pub struct PairingFactory {
    pick: PairPick,
}

impl PairingFactory {
    pub fn new(pick: PairPick) -> Self {
        Self { pick }
    }

    fn pick_pair<'a>(&self, data: &'a [DataEntry], rng: &mut Pcg32) -> Option<(usize, &'a str)> {
        match self.pick {
            PairPick::AnyMember => {
                let total: usize = data.iter().map(|d| d.sub_items.len()).sum();
                if total == 0 {
                    return None;
                }
                let mut n = rng.random_range(0..total);
                for (i, entry) in data.iter().enumerate() {
                    if n < entry.sub_items.len() {
                        return Some((i, entry.sub_items[n].as_str()));
                    }
                    n -= entry.sub_items.len();
                }
                None
            }
            PairPick::AnyCategory => {
                let filled: Vec<usize> = (0..data.len()).filter(|i| !data[*i].sub_items.is_empty()).collect();
                if filled.is_empty() {
                    return None;
                }
                let i = filled[rng.random_range(0..filled.len())];
                let members = &data[i].sub_items;
                Some((i, members[rng.random_range(0..members.len())].as_str()))
            }
        }
    }
}

impl ItemFactory for PairingFactory {
    fn make_item(&mut self, config: &FallingConfig, rng: &mut Pcg32) -> ItemDraft {
        let is_correct = roll_correct(config, rng);
        let (category, member) = match self.pick_pair(&config.data, rng) {
            Some((i, member)) => {
                let category = config.data[i].name.clone();
                let member = if is_correct {
                    member.to_string()
                } else {
                    let others: Vec<&str> = config
                        .data
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .flat_map(|(_, d)| d.sub_items.iter().map(String::as_str))
                        .collect();
                    if others.is_empty() {
                        member.to_string()
                    } else {
                        others[rng.random_range(0..others.len())].to_string()
                    }
                };
                (category, member)
            }
            None => ("IDOL".to_string(), "Unknown".to_string()),
        };

        ItemDraft {
            text: format!("{}-{}", category, member),
            is_correct,
            color: random_color(config, rng),
            x: Some(rand_range(rng, 10.0, 90.0)),
            y: Some(SPAWN_Y),
            speed: Some(random_speed(config, rng)),
            detail: ItemDetail::Pair { category, member },
        }
    }
}

pub fn symbol_match() -> FallingConfig {
    FallingConfig {
        title: "Simple Game".to_string(),
        time_limit: 30,
        correct_points: 5,
        incorrect_points: -3,
        correct_probability: 0.6,
        item_spawn_interval: 2000.0,
        item_spawn_count: CountRange::new(2, 3),
        item_spawn_delay: 300.0,
        initial_item_count: CountRange::new(3, 5),
        speed_range: SpeedRange::new(0.3, 0.5),
        uniform_speed: Some(0.4),
        spawn_spacing: None,
        spawn_mode: SpawnMode::Sequential,
        data: vec![
            DataEntry::new("correct", "O", &["O"]),
            DataEntry::new("wrong", "X", &["X"]),
        ],
        colors: vec![CORRECT_COLOR.to_string(), WRONG_COLOR.to_string()],
    }
}

pub fn idol_match() -> FallingConfig {
    FallingConfig {
        title: "Idol Match Game".to_string(),
        time_limit: 60,
        correct_points: 2,
        incorrect_points: -2,
        correct_probability: 0.6,
        item_spawn_interval: 1500.0,
        item_spawn_count: CountRange::new(2, 3),
        item_spawn_delay: 150.0,
        initial_item_count: CountRange::new(4, 6),
        speed_range: SpeedRange::new(0.21, 0.525),
        uniform_speed: Some(0.36),
        spawn_spacing: Some(SpawnSpacing {
            min_horizontal_gap: 12.0,
            min_vertical_gap: 12.0,
            max_attempts: 14,
            max_vertical_shift: 50.0,
        }),
        spawn_mode: SpawnMode::Sequential,
        data: vec![
            DataEntry::new("bts", "BTS", &["RM", "Jin", "Suga", "J-Hope", "Jimin", "V", "Jungkook"]),
            DataEntry::new("blackpink", "BLACKPINK", &["Jisoo", "Jennie", "Rosé", "Lisa"]),
            DataEntry::new(
                "twice",
                "TWICE",
                &["Nayeon", "Jeongyeon", "Momo", "Sana", "Jihyo", "Mina", "Dahyun", "Chaeyoung", "Tzuyu"],
            ),
            DataEntry::new(
                "seventeen",
                "SEVENTEEN",
                &[
                    "S.Coups", "Jeonghan", "Joshua", "Jun", "Hoshi", "Wonwoo", "Woozi", "DK", "Mingyu", "The8",
                    "Seungkwan", "Vernon", "Dino",
                ],
            ),
            DataEntry::new("newjeans", "NewJeans", &["Minji", "Hanni", "Danielle", "Haerin", "Hyein"]),
            DataEntry::new("aespa", "aespa", &["Karina", "Giselle", "Winter", "Ningning"]),
            DataEntry::new("txt", "TXT", &["Yeonjun", "Soobin", "Beomgyu", "Taehyun", "Hueningkai"]),
            DataEntry::new("itzy", "ITZY", &["Yeji", "Lia", "Ryujin", "Chaeryeong", "Yuna"]),
        ],
        colors: [
            "#D84A8C", "#7B4A9E", "#2A7AB8", "#4ABCBE", "#D85A6A", "#C9A200", "#5CBD00", "#CC7000", "#C41075",
            "#00A5A8",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect(),
    }
}

pub fn soccer_match() -> FallingConfig {
    FallingConfig {
        title: "Soccer Team Match".to_string(),
        time_limit: 20,
        correct_points: 3,
        incorrect_points: -2,
        correct_probability: 0.65,
        item_spawn_interval: 2500.0,
        item_spawn_count: CountRange::new(2, 3),
        item_spawn_delay: 400.0,
        initial_item_count: CountRange::new(4, 6),
        speed_range: SpeedRange::new(0.25, 0.55),
        uniform_speed: None,
        spawn_spacing: None,
        spawn_mode: SpawnMode::Sequential,
        data: vec![
            DataEntry::new("mancity", "Manchester City", &["Haaland", "De Bruyne", "Foden", "Rodri", "Grealish"]),
            DataEntry::new("arsenal", "Arsenal", &["Saka", "Odegaard", "Rice", "Saliba", "Martinelli"]),
            DataEntry::new(
                "liverpool",
                "Liverpool",
                &["Salah", "Van Dijk", "Alexander-Arnold", "Mac Allister", "Diaz"],
            ),
            DataEntry::new("realmadrid", "Real Madrid", &["Bellingham", "Vinicius", "Modric", "Courtois", "Rudiger"]),
            DataEntry::new("barcelona", "Barcelona", &["Lewandowski", "Gundogan", "Pedri", "Ter Stegen", "Gavi"]),
        ],
        colors: ["#6CABDD", "#EF0107", "#C8102E", "#FEBE10", "#A50044", "#004170"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn belongs(config: &FallingConfig, category: &str, member: &str) -> bool {
        config
            .data
            .iter()
            .any(|d| d.name == category && d.sub_items.iter().any(|m| m == member))
    }

    #[test]
    fn test_pairs_match_correctness() {
        for variant in [Variant::Idol, Variant::Soccer] {
            let config = variant.config();
            let mut factory = variant.factory();
            let mut rng = Pcg32::seed_from_u64(11);
            for _ in 0..300 {
                let draft = factory.make_item(&config, &mut rng);
                let ItemDetail::Pair { category, member } = &draft.detail else {
                    panic!("expected a pair");
                };
                assert_eq!(draft.text, format!("{}-{}", category, member));
                assert_eq!(belongs(&config, category, member), draft.is_correct);
            }
        }
    }

    #[test]
    fn test_symbol_items() {
        let config = symbol_match();
        let mut rng = Pcg32::seed_from_u64(2);
        let mut seen_correct = false;
        let mut seen_wrong = false;
        for _ in 0..200 {
            let draft = SymbolFactory.make_item(&config, &mut rng);
            let x = draft.x.unwrap();
            assert!((15.0..=85.0).contains(&x));
            if draft.is_correct {
                seen_correct = true;
                assert_eq!((draft.text.as_str(), draft.color.as_str()), ("O", CORRECT_COLOR));
            } else {
                seen_wrong = true;
                assert_eq!((draft.text.as_str(), draft.color.as_str()), ("X", WRONG_COLOR));
            }
        }
        assert!(seen_correct && seen_wrong);
    }

    #[test]
    fn test_variant_parse() {
        assert_eq!(Variant::parse("Soccer"), Some(Variant::Soccer));
        assert_eq!(Variant::parse("simple"), Some(Variant::Symbol));
        assert_eq!(Variant::parse("runner"), None);
    }

    #[test]
    fn test_every_variant_builds() {
        for variant in [Variant::Symbol, Variant::Idol, Variant::Soccer] {
            let mut services = Services::offline(1);
            services.telemetry = crate::services::TelemetryClient::disabled();
            let game = variant.build(1, services).unwrap();
            assert_eq!(game.config().title, variant.config().title);
        }
    }
}
