//! Pocket Arcade - webview minigames
//!
//! Core modules:
//! - `runner`: Side-scrolling runner simulation (physics, spawning, collisions)
//! - `falling`: Data-driven falling-item tap engine shared by the match games
//! - `phase`: Explicit game phase state machine used by both engines
//! - `services`: Leaderboard, native bridge, telemetry, analytics, identity
//! - `render`: Display lists for the canvas host

pub mod error;
pub mod falling;
pub mod game_over;
pub mod geometry;
pub mod host;
pub mod phase;
pub mod render;
pub mod runner;
pub mod services;
pub mod settings;
pub mod timers;

pub use error::{ArcadeError, Result};
pub use host::{HostAction, Minigame, Notice};
pub use settings::ArcadeSettings;

use rand::Rng;

/// Game configuration constants
pub mod consts {
    /// Longest runner step (seconds); longer frames are clamped to avoid tunneling
    pub const MAX_FRAME_DT: f32 = 0.033;
    /// Nominal frame length the falling-item speeds are expressed against (ms)
    pub const TARGET_FRAME_MS: f64 = 1000.0 / 60.0;

    /// Ground line as a fraction of viewport height
    pub const GROUND_RATIO: f32 = 0.82;
    /// Player gravity (px/s²)
    pub const GRAVITY: f32 = 2200.0;
    /// Upward velocity applied per jump (px/s)
    pub const JUMP_VELOCITY: f32 = 820.0;
    /// Jumps allowed between ground contacts
    pub const MAX_JUMPS: u8 = 3;
    /// Base scroll speed before the stage multiplier (px/s)
    pub const BASE_SCROLL: f32 = 270.0;

    /// Player box
    pub const PLAYER_X: f32 = 90.0;
    pub const PLAYER_W: f32 = 56.0;
    pub const PLAYER_H: f32 = 62.0;

    /// Obstacle box
    pub const OBSTACLE_SIZE: f32 = 64.0;
    /// Obstacles spawn this far past the right edge
    pub const OBSTACLE_SPAWN_OFFSET: f32 = 80.0;
    /// Newest obstacle must be this far left of the right edge before another spawns
    pub const OBSTACLE_MIN_GAP: f32 = 260.0;
    /// Obstacles are dropped once their right edge passes this x
    pub const CULL_X: f32 = -220.0;
    /// Hearts are dropped once x + this margin passes `CULL_X`
    pub const HEART_CULL_MARGIN: f32 = 120.0;
    /// Initial obstacle scale; collision starts at 1.0
    pub const OBSTACLE_START_SCALE: f32 = 0.01;
    /// Scale gained per second while materializing
    pub const OBSTACLE_GROW_RATE: f32 = 3.0;

    /// Spawn timer after reset (s)
    pub const INITIAL_SPAWN_TIMER: f32 = 0.9;
    /// Stage from which spawning tightens and forces breathing room
    pub const HIGH_SPEED_STAGE: u32 = 16;

    /// Heart pickup radius and glyph size before stage scaling
    pub const HEART_HIT_RADIUS: f32 = 26.0 * 0.70;
    pub const HEART_FONT_BASE: f32 = 52.0 * 0.70;
    /// Horizontal spacing between hearts in one batch
    pub const HEART_SPACING: f32 = 54.0;
    /// Shift applied to a heart that lands inside the padded obstacle box
    pub const HEART_NUDGE: f32 = 110.0;
    /// Heart lanes, measured upward from the ground line
    pub const HEART_LANES: [f32; 3] = [130.0, 170.0, 210.0];
    pub const HEART_LANE_WEIGHTS: [f32; 3] = [0.60, 0.32, 0.08];

    /// Particle pool cap (oldest evicted)
    pub const MAX_PARTICLES: usize = 240;
    /// Downward pull on particles (px/s²)
    pub const PARTICLE_GRAVITY: f32 = 650.0;
    /// Particles are removed below this radius
    pub const PARTICLE_MIN_RADIUS: f32 = 0.6;

    /// "Speed up" banner
    pub const BANNER_LIFE: f32 = 1.3;
    pub const BANNER_DRIFT: f32 = 900.0;

    /// Parallax stripe speeds as fractions of the scroll speed (far to near)
    pub const PARALLAX_FACTORS: [f32; 3] = [0.18, 0.35, 0.55];

    /// Falling-item countdown start
    pub const COUNTDOWN_START: u8 = 3;
    /// Countdown step and game clock period (ms)
    pub const SECOND_MS: f64 = 1000.0;
    /// Clock decrements above this in one go are reported as unexpected
    pub const MAX_CLOCK_STEP: u32 = 2;
    /// Items are dropped once their top passes this (percent of height)
    pub const ITEM_CULL_Y: f32 = 100.0;
    /// Tap target of a falling item, centered on its x (px)
    pub const ITEM_BOX_W: f32 = 132.0;
    pub const ITEM_BOX_H: f32 = 44.0;
    /// Floating score lifetime (ms)
    pub const FLOATING_SCORE_MS: f64 = 1000.0;
    /// Delay before jumping to the leaderboard after a successful submission (ms)
    pub const NAVIGATE_DELAY_MS: f64 = 1500.0;
    /// Leaderboard route
    pub const SCOREBOARD_PATH: &str = "/scoreboard";
}

/// Apply a signed point change to a score, flooring at zero
#[inline]
pub fn apply_points(score: u32, delta: i32) -> u32 {
    (i64::from(score) + i64::from(delta)).clamp(0, i64::from(u32::MAX)) as u32
}

/// Uniform sample in [a, b)
#[inline]
pub fn rand_range<R: Rng>(rng: &mut R, a: f32, b: f32) -> f32 {
    rng.random::<f32>() * (b - a) + a
}

/// Pick an index by cumulative weights, falling back to the first slot
pub fn pick_weighted<R: Rng>(rng: &mut R, weights: &[f32]) -> usize {
    let r: f32 = rng.random();
    let mut acc = 0.0_f32;
    for (i, w) in weights.iter().enumerate() {
        acc += *w;
        if r <= acc {
            return i;
        }
    }
    0
}

/// Wall clock in milliseconds since the Unix epoch
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

/// Wall clock in milliseconds since the Unix epoch
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}
