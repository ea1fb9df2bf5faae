//! Per-frame runner update
//!
//! Order within a step: stage, player physics, spawning, scrolling and
//! pickups, obstacle collision, then visual-only effects. A collision ends the
//! step on the spot.

use glam::Vec2;
use rand::Rng;

use super::progression::{
    heart_scale_for_stage, heart_value_for_stage, speed_for_stage, stage_for_score,
};
use super::state::{Heart, Obstacle, RunnerEvent, RunnerState, SpeedBanner};
use crate::consts::*;
use crate::geometry::{Rect, circle_rect_intersect, ellipse_rect_intersect};
use crate::phase::{PhaseEvent, transition};
use crate::{pick_weighted, rand_range};

/// Input gathered since the previous step
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Jump presses, applied in order before physics
    pub jumps: u8,
}

/// How a step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Not running; nothing was simulated
    Skipped,
    Continue,
    Crashed,
}

/// Advance the runner by `dt` seconds (clamped to [`MAX_FRAME_DT`])
pub fn tick(state: &mut RunnerState, input: &TickInput, dt: f32) -> StepOutcome {
    if !state.phase.is_running() {
        return StepOutcome::Skipped;
    }
    let dt = dt.clamp(0.0, MAX_FRAME_DT);

    for _ in 0..input.jumps {
        jump(state);
    }

    // Stage and speed
    let stage = stage_for_score(state.score);
    if stage > state.stage {
        state.stage = stage;
        state.banner = Some(SpeedBanner::new(&state.viewport));
        state.events.push(RunnerEvent::StageUp { stage });
        log::info!("Stage {} (score {})", stage, state.score);
    }
    state.speed_mult = speed_for_stage(state.stage);
    let scroll = BASE_SCROLL * state.speed_mult;

    update_player(state, dt);

    // Spawning
    state.spawn_timer -= dt * (0.95 + state.speed_mult * 0.10);
    if state.spawn_timer <= 0.0 {
        spawn_obstacle_and_hearts(state);
        let base = rand_range(&mut state.rng, 1.05, 1.55);
        let factor = if state.stage >= HIGH_SPEED_STAGE { 0.92 } else { 1.0 };
        state.spawn_timer = base * factor;
    }

    // Obstacles
    for o in state.obstacles.iter_mut() {
        o.rect.x -= scroll * dt;
        o.grow(dt);
    }
    state.obstacles.retain(|o| o.rect.right() >= CULL_X);

    collect_hearts(state, scroll, dt);

    if check_collision(state) {
        match transition(state.phase, PhaseEvent::Finish) {
            Ok(next) => state.phase = next,
            Err(e) => log::warn!("{}", e),
        }
        state.events.push(RunnerEvent::Crashed { score: state.score });
        log::info!("Crashed at score {}", state.score);
        return StepOutcome::Crashed;
    }

    // Particles
    for p in state.particles.iter_mut() {
        p.update(dt);
    }
    state.particles.retain(|p| !p.is_dead());

    // Banner
    if let Some(banner) = state.banner.as_mut() {
        if !banner.update(dt) {
            state.banner = None;
        }
    }

    state.parallax.advance(scroll, dt, state.background_width);

    StepOutcome::Continue
}

/// Jump if allowed; a jump from the ground kicks up dust
pub fn jump(state: &mut RunnerState) -> bool {
    if !state.player.try_jump() {
        return false;
    }
    let g = state.ground_y();
    let p = state.player;
    if p.bottom() >= g - 3.0 {
        state.emit_dust(p.pos.x + p.size.x * 0.45, g + 2.0, 12, 1.0);
    }
    true
}

fn update_player(state: &mut RunnerState, dt: f32) {
    let g = state.ground_y();
    let player = &mut state.player;
    player.vy += GRAVITY * dt;
    player.pos.y += player.vy * dt;

    let on_ground = player.bottom() >= g;
    let landed = on_ground && !player.was_on_ground;
    if on_ground {
        player.pos.y = g - player.size.y;
        player.vy = 0.0;
        player.jump_count = 0;
    }
    player.was_on_ground = on_ground;

    if landed {
        let p = state.player;
        state.emit_dust(p.pos.x + p.size.x * 0.35, g + 2.0, 14, 1.0);
        state.emit_dust(p.pos.x + p.size.x * 0.65, g + 2.0, 10, 1.0);
        state.events.push(RunnerEvent::Landed);
    }
}

/// Newest obstacle has moved far enough from the right edge
fn can_spawn_obstacle(state: &RunnerState) -> bool {
    state
        .obstacles
        .last()
        .is_none_or(|o| o.rect.x < state.viewport.width - OBSTACLE_MIN_GAP)
}

fn spawn_obstacle_and_hearts(state: &mut RunnerState) {
    let high_speed = state.stage >= HIGH_SPEED_STAGE;
    if high_speed && state.consecutive_spawns >= 2 {
        state.consecutive_spawns = 0;
        return;
    }
    if !can_spawn_obstacle(state) {
        return;
    }

    let g = state.ground_y();
    let ox = state.viewport.width + OBSTACLE_SPAWN_OFFSET;
    let obstacle = Obstacle::spawn(ox, g);
    state.obstacles.push(obstacle);
    state.consecutive_spawns += 1;

    let rng = &mut state.rng;
    // Second draw only runs when the first misses: 55% two, ~11% three, rest one
    let count = if rng.random::<f32>() < 0.55 {
        2
    } else if rng.random::<f32>() < 0.25 {
        3
    } else {
        1
    };
    let base_x = ox + rand_range(rng, 180.0, 260.0);
    let keep_out = obstacle.rect.padded(100.0, 140.0);

    for i in 0..count {
        let hx = base_x + i as f32 * HEART_SPACING;
        let hy = g - HEART_LANES[pick_weighted(&mut state.rng, &HEART_LANE_WEIGHTS)];
        state.hearts.push(Heart { pos: clear_of(&keep_out, Vec2::new(hx, hy)) });
    }
}

/// Push a heart right by [`HEART_NUDGE`] if it touches the keep-out box
fn clear_of(keep_out: &Rect, pos: Vec2) -> Vec2 {
    if circle_rect_intersect(pos, HEART_HIT_RADIUS, keep_out) {
        Vec2::new(pos.x + HEART_NUDGE, pos.y)
    } else {
        pos
    }
}

fn collect_hearts(state: &mut RunnerState, scroll: f32, dt: f32) {
    let radius = HEART_HIT_RADIUS * heart_scale_for_stage(state.stage);
    let value = heart_value_for_stage(state.stage);
    let pickup = state.player.pickup_rect();

    let mut collected: Vec<Vec2> = Vec::new();
    state.hearts.retain_mut(|h| {
        h.pos.x -= scroll * dt;
        if h.pos.x + HEART_CULL_MARGIN < CULL_X {
            return false;
        }
        if circle_rect_intersect(h.pos, radius, &pickup) {
            collected.push(h.pos);
            return false;
        }
        true
    });

    for pos in collected {
        state.score += value;
        state.emit_dust(pos.x, pos.y, 10, 1.0);
        state.events.push(RunnerEvent::HeartCollected { value });
    }
}

/// Any fully materialized obstacle touching the player's hit box
fn check_collision(state: &RunnerState) -> bool {
    let hit = state.player.hit_rect();
    state
        .obstacles
        .iter()
        .filter(|o| o.is_solid())
        .any(|o| ellipse_rect_intersect(&o.collision_ellipse(), &hit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::GamePhase;
    use crate::runner::state::Viewport;
    use proptest::prelude::*;

    fn running(seed: u64) -> RunnerState {
        let mut s = RunnerState::new(seed, Viewport::new(400.0, 800.0));
        s.phase = GamePhase::Running;
        s
    }

    #[test]
    fn test_idle_does_nothing() {
        let mut s = RunnerState::new(1, Viewport::default());
        assert_eq!(tick(&mut s, &TickInput::default(), 0.016), StepOutcome::Skipped);
        assert_eq!(s.spawn_timer, INITIAL_SPAWN_TIMER);
    }

    #[test]
    fn test_player_rests_on_ground() {
        let mut s = running(1);
        for _ in 0..30 {
            tick(&mut s, &TickInput::default(), 0.016);
        }
        assert_eq!(s.player.bottom(), s.ground_y());
        assert_eq!(s.player.vy, 0.0);
    }

    #[test]
    fn test_jump_and_land() {
        let mut s = running(2);
        tick(&mut s, &TickInput { jumps: 1 }, 0.016);
        assert!(s.player.bottom() < s.ground_y());
        assert_eq!(s.player.jump_count, 1);
        // Take-off dust
        assert!(!s.particles.is_empty());

        // 2 * 820 / 2200 ≈ 0.75 s of air time
        for _ in 0..60 {
            s.obstacles.clear();
            tick(&mut s, &TickInput::default(), 0.016);
        }
        assert_eq!(s.player.jump_count, 0);
        assert!(s.events.contains(&RunnerEvent::Landed));
    }

    #[test]
    fn test_large_frame_is_clamped() {
        let mut s = running(3);
        tick(&mut s, &TickInput { jumps: 1 }, 5.0);
        // One clamped step: vy = -820 + 2200 * 0.033
        assert!((s.player.vy - (-820.0 + 2200.0 * 0.033)).abs() < 1e-3);
    }

    #[test]
    fn test_first_spawn_after_initial_timer() {
        let mut s = running(4);
        let mut steps = 0;
        while s.obstacles.is_empty() && steps < 200 {
            tick(&mut s, &TickInput::default(), 0.016);
            steps += 1;
        }
        // 0.9 s at a rate of 1.05 per second
        assert!((50..=56).contains(&steps), "spawned after {} steps", steps);
        assert!(!s.hearts.is_empty() && s.hearts.len() <= 3);
        assert!(s.spawn_timer >= 1.0 && s.spawn_timer <= 1.55);
        let o = s.obstacles[0];
        assert_eq!(o.rect.bottom(), s.ground_y());
    }

    #[test]
    fn test_hearts_spawn_in_lanes_ahead_of_obstacle() {
        let mut s = running(5);
        s.spawn_timer = 0.0;
        tick(&mut s, &TickInput::default(), 0.001);
        let g = s.ground_y();
        let ox = s.obstacles[0].rect.x;
        for h in &s.hearts {
            let lane = g - h.pos.y;
            assert!(HEART_LANES.iter().any(|l| (lane - l).abs() < 1e-3));
            assert!(h.pos.x > ox + 170.0);
        }
    }

    #[test]
    fn test_spawn_gap_respected() {
        let mut s = running(6);
        s.obstacles.push(Obstacle::spawn(s.viewport.width - 100.0, s.ground_y()));
        s.spawn_timer = 0.0;
        tick(&mut s, &TickInput::default(), 0.001);
        assert_eq!(s.obstacles.len(), 1);
        // The timer is reseeded anyway
        assert!(s.spawn_timer > 1.0);
    }

    #[test]
    fn test_high_speed_breather() {
        let mut s = running(7);
        s.score = 100;
        s.stage = stage_for_score(100);
        s.consecutive_spawns = 2;
        s.spawn_timer = 0.0;
        tick(&mut s, &TickInput::default(), 0.001);
        assert!(s.obstacles.is_empty());
        assert_eq!(s.consecutive_spawns, 0);
        assert!(s.spawn_timer <= 1.55 * 0.92 + 1e-4);
    }

    #[test]
    fn test_heart_pickup_scores_by_stage() {
        let mut s = running(8);
        s.score = 70;
        s.stage = stage_for_score(70);
        assert!(s.stage >= 10);
        let c = s.player.pickup_rect().center();
        s.hearts.push(Heart { pos: c });
        tick(&mut s, &TickInput::default(), 0.0);
        assert_eq!(s.score, 72);
        assert!(s.hearts.is_empty());
        assert!(s.events.contains(&RunnerEvent::HeartCollected { value: 2 }));
    }

    #[test]
    fn test_stage_up_shows_banner() {
        let mut s = running(9);
        s.score = 20;
        tick(&mut s, &TickInput::default(), 0.016);
        assert_eq!(s.stage, 1);
        assert!(s.banner.is_some());
        assert!((s.speed_mult - 1.075).abs() < 1e-6);
        assert!(s.events.contains(&RunnerEvent::StageUp { stage: 1 }));
    }

    #[test]
    fn test_materializing_obstacle_is_harmless() {
        let mut s = running(10);
        let g = s.ground_y();
        let mut o = Obstacle::spawn(s.player.pos.x, g);
        o.scale = 0.5;
        s.obstacles.push(o);
        s.spawn_timer = 100.0;
        assert_eq!(tick(&mut s, &TickInput::default(), 0.001), StepOutcome::Continue);
    }

    #[test]
    fn test_collision_ends_game_once() {
        let mut s = running(11);
        let g = s.ground_y();
        let mut o = Obstacle::spawn(s.player.pos.x - 4.0, g);
        o.scale = 1.0;
        s.obstacles.push(o);
        s.spawn_timer = 100.0;
        s.hearts.push(Heart {
            pos: s.player.pickup_rect().center(),
        });

        assert_eq!(tick(&mut s, &TickInput::default(), 0.0), StepOutcome::Crashed);
        assert_eq!(s.phase, GamePhase::GameOver);
        let score = s.score;
        let particles = s.particles.len();

        // Nothing else moves once it's over
        assert_eq!(tick(&mut s, &TickInput { jumps: 1 }, 0.016), StepOutcome::Skipped);
        assert_eq!(s.score, score);
        assert_eq!(s.particles.len(), particles);
    }

    #[test]
    fn test_cull_offscreen() {
        let mut s = running(12);
        let g = s.ground_y();
        s.obstacles.push(Obstacle::spawn(CULL_X - OBSTACLE_SIZE - 1.0, g));
        s.hearts.push(Heart {
            pos: Vec2::new(CULL_X - HEART_CULL_MARGIN - 1.0, g - 130.0),
        });
        s.spawn_timer = 100.0;
        tick(&mut s, &TickInput::default(), 0.016);
        assert!(s.obstacles.is_empty());
        assert!(s.hearts.is_empty());
    }

    #[test]
    fn test_deterministic_with_seed() {
        let mut a = running(42);
        let mut b = running(42);
        for i in 0..400 {
            let input = TickInput {
                jumps: u8::from(i % 37 == 0),
            };
            tick(&mut a, &input, 0.016);
            tick(&mut b, &input, 0.016);
        }
        assert_eq!(a.obstacles, b.obstacles);
        assert_eq!(a.hearts, b.hearts);
        assert_eq!(a.score, b.score);
    }

    #[test]
    fn test_heart_near_obstacle_is_nudged() {
        let s = running(1);
        let g = s.ground_y();
        let obstacle = Obstacle::spawn(480.0, g);
        let keep_out = obstacle.rect.padded(100.0, 140.0);

        // 17 px right of the padded edge: inside the hit radius
        let close = Vec2::new(obstacle.rect.x + 181.0, g - 100.0);
        let moved = clear_of(&keep_out, close);
        assert_eq!(moved, Vec2::new(close.x + 110.0, close.y));
        assert!(!circle_rect_intersect(moved, HEART_HIT_RADIUS, &keep_out));

        let far = Vec2::new(obstacle.rect.x + 200.0, g - 100.0);
        assert_eq!(clear_of(&keep_out, far), far);
    }

    proptest! {
        #[test]
        fn spawned_hearts_keep_clear_of_obstacle(seed in any::<u64>()) {
            let mut s = running(seed);
            spawn_obstacle_and_hearts(&mut s);
            prop_assert_eq!(s.obstacles.len(), 1);
            prop_assert!((1..=3).contains(&s.hearts.len()));

            let keep_out = s.obstacles[0].rect.padded(100.0, 140.0);
            for heart in &s.hearts {
                prop_assert!(!circle_rect_intersect(heart.pos, HEART_HIT_RADIUS, &keep_out));
            }
        }

        #[test]
        fn jump_count_never_exceeds_cap(jumps in proptest::collection::vec(0u8..5, 1..60)) {
            let mut s = running(13);
            s.spawn_timer = 1000.0;
            for j in jumps {
                tick(&mut s, &TickInput { jumps: j }, 0.016);
                prop_assert!(s.player.jump_count <= MAX_JUMPS);
            }
        }
    }
}
