//! Stage, speed and heart value as functions of score

/// Highest stage
pub const MAX_STAGE: u32 = 20;
/// Score at which stage 1 begins
pub const FIRST_STAGE_SCORE: u32 = 20;
/// Points per stage after the first
pub const POINTS_PER_STAGE: u32 = 5;
/// From this stage hearts are smaller and worth double
pub const SMALL_HEART_STAGE: u32 = 10;

pub fn stage_for_score(score: u32) -> u32 {
    if score < FIRST_STAGE_SCORE {
        return 0;
    }
    MAX_STAGE.min((score - FIRST_STAGE_SCORE) / POINTS_PER_STAGE + 1)
}

/// Scroll and spawn multiplier
pub fn speed_for_stage(stage: u32) -> f32 {
    if stage == 0 {
        return 1.0;
    }
    1.0 + stage as f32 * 0.075
}

pub fn heart_scale_for_stage(stage: u32) -> f32 {
    if stage >= SMALL_HEART_STAGE { 0.5 } else { 1.0 }
}

pub fn heart_value_for_stage(stage: u32) -> u32 {
    if stage >= SMALL_HEART_STAGE { 2 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_stage_thresholds() {
        assert_eq!(stage_for_score(0), 0);
        assert_eq!(speed_for_stage(0), 1.0);
        assert_eq!(stage_for_score(19), 0);
        assert_eq!(stage_for_score(20), 1);
        assert!((speed_for_stage(1) - 1.075).abs() < 1e-6);
        assert_eq!(stage_for_score(24), 1);
        assert_eq!(stage_for_score(25), 2);
        assert!((speed_for_stage(2) - 1.15).abs() < 1e-6);
    }

    #[test]
    fn test_stage_caps() {
        // (115 - 20) / 5 + 1 = 20
        assert_eq!(stage_for_score(115), 20);
        assert_eq!(stage_for_score(10_000), 20);
    }

    #[test]
    fn test_heart_at_stage_ten() {
        assert_eq!(heart_value_for_stage(10), 2);
        assert_eq!(heart_scale_for_stage(10), 0.5);
        assert_eq!(heart_value_for_stage(9), 1);
        assert_eq!(heart_scale_for_stage(9), 1.0);
    }

    proptest! {
        #[test]
        fn stage_is_monotonic_and_bounded(a in 0u32..100_000, b in 0u32..100_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(stage_for_score(lo) <= stage_for_score(hi));
            prop_assert!(stage_for_score(hi) <= MAX_STAGE);
        }

        #[test]
        fn speed_is_non_decreasing(s in 0u32..MAX_STAGE) {
            prop_assert!(speed_for_stage(s) <= speed_for_stage(s + 1));
        }
    }
}
