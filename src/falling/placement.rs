//! Spawn placement for falling items
//!
//! A candidate position is tested against every live item. On overlap the x
//! is resampled a bounded number of times; if that fails the item is pushed
//! further above the viewport one vertical gap at a time. When the shift
//! bound is reached the item is placed anyway.

use rand_pcg::Pcg32;

use super::config::{FallingConfig, SpawnSpacing};
use super::strategy::{FallingItem, MAX_X, MIN_X, SPAWN_Y, random_x};

/// Resolved spawn position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    /// False when every fallback still overlapped
    pub clear: bool,
}

/// Same-row items always collide; otherwise only close ones do
pub fn overlaps(x: f32, y: f32, live: &[FallingItem], spacing: &SpawnSpacing) -> bool {
    live.iter().any(|item| {
        let dx = (item.x - x).abs();
        let dy = (item.y - y).abs();
        if dy < spacing.min_vertical_gap {
            return true;
        }
        dx < spacing.min_horizontal_gap && dy < spacing.min_vertical_gap * 1.5
    })
}

pub fn place(
    draft_x: Option<f32>,
    draft_y: Option<f32>,
    live: &[FallingItem],
    spacing: &SpawnSpacing,
    rng: &mut Pcg32,
) -> Placement {
    let mut x = match draft_x {
        Some(x) => x.clamp(MIN_X, MAX_X),
        None => random_x(rng),
    };
    let mut y = draft_y.unwrap_or(SPAWN_Y);

    let mut attempt = 0;
    while attempt < spacing.max_attempts && overlaps(x, y, live, spacing) {
        x = random_x(rng);
        attempt += 1;
    }

    if overlaps(x, y, live, spacing) {
        let floor = -spacing.max_vertical_shift;
        let mut shift = spacing.min_vertical_gap;
        while shift <= spacing.max_vertical_shift {
            let shifted = (y - shift).max(floor);
            if !overlaps(x, shifted, live, spacing) {
                y = shifted;
                break;
            }
            shift += spacing.min_vertical_gap;
        }
    }

    Placement {
        x,
        y,
        clear: !overlaps(x, y, live, spacing),
    }
}

/// Uniform speed wins, then the factory's, then the range midpoint
pub fn resolve_speed(config: &FallingConfig, draft_speed: Option<f32>) -> f32 {
    config
        .uniform_speed
        .or(draft_speed)
        .unwrap_or_else(|| config.speed_range.midpoint())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::falling::strategy::ItemDetail;
    use crate::falling::variants;
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn at(x: f32, y: f32) -> FallingItem {
        FallingItem {
            id: 0,
            text: String::new(),
            is_correct: true,
            color: String::new(),
            x,
            y,
            speed: 0.4,
            detail: ItemDetail::Plain,
        }
    }

    #[test]
    fn test_same_row_collides_regardless_of_x() {
        let spacing = SpawnSpacing::default();
        assert!(overlaps(85.0, -10.0, &[at(15.0, -5.0)], &spacing));
        // Far apart horizontally, 12 below: only the near-column rule applies
        assert!(!overlaps(85.0, -10.0, &[at(15.0, 2.0)], &spacing));
        assert!(overlaps(20.0, -10.0, &[at(15.0, 2.0)], &spacing));
        assert!(!overlaps(20.0, -10.0, &[at(15.0, 6.0)], &spacing));
    }

    #[test]
    fn test_empty_field_keeps_candidate() {
        let mut rng = Pcg32::seed_from_u64(1);
        let p = place(Some(95.0), Some(-10.0), &[], &SpawnSpacing::default(), &mut rng);
        assert_eq!(p, Placement { x: 90.0, y: -10.0, clear: true });
    }

    #[test]
    fn test_crowded_row_shifts_up_by_gap() {
        let mut rng = Pcg32::seed_from_u64(1);
        let live = [at(50.0, -10.0)];
        let p = place(Some(50.0), Some(-10.0), &live, &SpawnSpacing::default(), &mut rng);
        // Any x collides on the same row, so y moves up in whole gaps
        assert!(p.clear);
        assert!(p.y == -20.0 || p.y == -30.0);
    }

    #[test]
    fn test_shift_gives_up_at_bound() {
        let mut rng = Pcg32::seed_from_u64(1);
        let spacing = SpawnSpacing {
            max_vertical_shift: 20.0,
            ..SpawnSpacing::default()
        };
        let live = [at(50.0, -10.0), at(50.0, -20.0), at(50.0, -30.0)];
        let p = place(None, None, &live, &spacing, &mut rng);
        assert!(!p.clear);
        assert_eq!(p.y, -10.0);
    }

    #[test]
    fn test_speed_priority() {
        let mut config = variants::soccer_match();
        assert_eq!(resolve_speed(&config, Some(0.3)), 0.3);
        assert!((resolve_speed(&config, None) - 0.4).abs() < 1e-6);
        config.uniform_speed = Some(0.36);
        assert_eq!(resolve_speed(&config, Some(0.3)), 0.36);
    }

    proptest! {
        #[test]
        fn clear_placement_never_overlaps(
            seed in any::<u64>(),
            live in prop::collection::vec((10.0f32..90.0, -60.0f32..100.0), 0..8),
        ) {
            let spacing = SpawnSpacing::default();
            let live: Vec<_> = live.into_iter().map(|(x, y)| at(x, y)).collect();
            let mut rng = Pcg32::seed_from_u64(seed);
            let p = place(None, None, &live, &spacing, &mut rng);
            prop_assert!((MIN_X..=MAX_X).contains(&p.x));
            prop_assert!(p.y >= -spacing.max_vertical_shift);
            if p.clear {
                for item in &live {
                    let dy = (item.y - p.y).abs();
                    let dx = (item.x - p.x).abs();
                    prop_assert!(dy >= spacing.min_vertical_gap);
                    prop_assert!(dx >= spacing.min_horizontal_gap || dy >= spacing.min_vertical_gap * 1.5);
                }
            }
        }
    }
}
