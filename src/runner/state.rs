//! Runner entities and simulation state

use std::collections::VecDeque;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::*;
pub use crate::geometry::Viewport;
use crate::geometry::{Ellipse, Rect};
use crate::phase::GamePhase;
use crate::rand_range;

/// The running character
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Top-left corner
    pub pos: Vec2,
    pub size: Vec2,
    pub vy: f32,
    pub jump_count: u8,
    pub was_on_ground: bool,
}

impl Player {
    /// Standing on the ground line
    pub fn grounded(ground_y: f32) -> Self {
        Self {
            pos: Vec2::new(PLAYER_X, ground_y - PLAYER_H),
            size: Vec2::new(PLAYER_W, PLAYER_H),
            vy: 0.0,
            jump_count: 0,
            was_on_ground: true,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.pos.x, self.pos.y, self.size.x, self.size.y)
    }

    /// Box used for heart pickups
    pub fn pickup_rect(&self) -> Rect {
        self.rect().shrunk(8.0, 6.0, 16.0, 10.0)
    }

    /// Box used for obstacle hits
    pub fn hit_rect(&self) -> Rect {
        self.rect().shrunk(10.0, 8.0, 20.0, 12.0)
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.pos.y + self.size.y
    }

    /// Apply a jump if any are left. Returns true if it took effect.
    pub fn try_jump(&mut self) -> bool {
        if self.jump_count >= MAX_JUMPS {
            return false;
        }
        self.vy = -JUMP_VELOCITY;
        self.jump_count += 1;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub rect: Rect,
    /// Materialize factor, 0.01 at spawn; collides only at 1.0
    pub scale: f32,
}

impl Obstacle {
    pub fn spawn(x: f32, ground_y: f32) -> Self {
        Self {
            rect: Rect::new(x, ground_y - OBSTACLE_SIZE, OBSTACLE_SIZE, OBSTACLE_SIZE),
            scale: OBSTACLE_START_SCALE,
        }
    }

    #[inline]
    pub fn is_solid(&self) -> bool {
        self.scale >= 1.0
    }

    pub fn grow(&mut self, dt: f32) {
        if self.scale < 1.0 {
            self.scale += dt * OBSTACLE_GROW_RATE;
            // Snap float drift so a full 1/3 s always lands on 1.0
            if self.scale > 1.0 - 1e-4 {
                self.scale = 1.0;
            }
        }
    }

    /// The sprite's body, narrower than its box
    pub fn collision_ellipse(&self) -> Ellipse {
        let r = &self.rect;
        Ellipse::new(
            Vec2::new(r.x + r.w * 0.52, r.y + r.h * 0.55),
            Vec2::new(r.w * 0.30, r.h * 0.33),
        )
    }
}

/// Collectible heart (removed on pickup)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heart {
    pub pos: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub life: f32,
    pub radius: f32,
    pub alpha: f32,
}

impl Particle {
    /// Longest life a dust particle is born with
    pub const MAX_LIFE: f32 = 0.55;

    pub fn update(&mut self, dt: f32) {
        self.life -= dt;
        self.vel.y += PARTICLE_GRAVITY * dt;
        self.pos += self.vel * dt;
        self.radius *= 1.0 - dt * 1.3;
    }

    pub fn is_dead(&self) -> bool {
        self.life <= 0.0 || self.radius <= PARTICLE_MIN_RADIUS
    }

    /// Opacity after fading with remaining life
    pub fn fade(&self) -> f32 {
        (self.life / Self::MAX_LIFE).clamp(0.0, 1.0) * self.alpha
    }
}

/// "SPEED UP" banner sweeping right to left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedBanner {
    pub pos: Vec2,
    pub life: f32,
}

impl SpeedBanner {
    pub fn new(viewport: &Viewport) -> Self {
        Self {
            pos: Vec2::new(viewport.width + 240.0, viewport.height * 0.26),
            life: BANNER_LIFE,
        }
    }

    /// Returns false once expired
    pub fn update(&mut self, dt: f32) -> bool {
        self.life -= dt;
        self.pos.x -= BANNER_DRIFT * dt;
        self.life > 0.0
    }

    pub fn alpha(&self) -> f32 {
        (self.life / BANNER_LIFE).clamp(0.0, 1.0)
    }
}

/// Background stripe offsets, far to near
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Parallax {
    pub offsets: [f32; 3],
}

impl Parallax {
    /// Scroll each stripe; wrap once it has moved a full tile width
    pub fn advance(&mut self, scroll: f32, dt: f32, tile_width: Option<f32>) {
        for (offset, factor) in self.offsets.iter_mut().zip(PARALLAX_FACTORS) {
            *offset -= scroll * factor * dt;
            if let Some(w) = tile_width.filter(|w| *w > 0.0) {
                if *offset <= -w {
                    *offset += w;
                }
            }
        }
    }
}

/// Things that happened during a step, drained by the game wrapper
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RunnerEvent {
    StageUp { stage: u32 },
    HeartCollected { value: u32 },
    Landed,
    Crashed { score: u32 },
}

/// Complete runner simulation state
#[derive(Debug, Clone)]
pub struct RunnerState {
    pub viewport: Viewport,
    pub player: Player,
    /// Spawn order
    pub obstacles: Vec<Obstacle>,
    pub hearts: Vec<Heart>,
    pub particles: VecDeque<Particle>,
    pub banner: Option<SpeedBanner>,
    pub parallax: Parallax,
    /// Background tile width once the image is decoded (scaled to viewport height)
    pub background_width: Option<f32>,
    pub spawn_timer: f32,
    pub consecutive_spawns: u32,
    pub score: u32,
    pub stage: u32,
    pub speed_mult: f32,
    pub phase: GamePhase,
    pub particles_enabled: bool,
    pub events: Vec<RunnerEvent>,
    pub rng: Pcg32,
}

impl RunnerState {
    pub fn new(seed: u64, viewport: Viewport) -> Self {
        Self {
            viewport,
            player: Player::grounded(viewport.ground_y()),
            obstacles: Vec::new(),
            hearts: Vec::new(),
            particles: VecDeque::with_capacity(MAX_PARTICLES),
            banner: None,
            parallax: Parallax::default(),
            background_width: None,
            spawn_timer: INITIAL_SPAWN_TIMER,
            consecutive_spawns: 0,
            score: 0,
            stage: 0,
            speed_mult: 1.0,
            phase: GamePhase::Idle,
            particles_enabled: true,
            events: Vec::new(),
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Back to a fresh field; keeps viewport, rng and the decoded background
    pub fn reset(&mut self) {
        self.player = Player::grounded(self.viewport.ground_y());
        self.obstacles.clear();
        self.hearts.clear();
        self.particles.clear();
        self.banner = None;
        self.parallax = Parallax::default();
        self.spawn_timer = INITIAL_SPAWN_TIMER;
        self.consecutive_spawns = 0;
        self.score = 0;
        self.stage = 0;
        self.speed_mult = 1.0;
        self.events.clear();
    }

    pub fn ground_y(&self) -> f32 {
        self.viewport.ground_y()
    }

    /// Resize; a grounded player follows the ground line
    pub fn set_viewport(&mut self, viewport: Viewport) {
        let was_grounded = self.player.bottom() >= self.ground_y() - 0.5;
        self.viewport = viewport;
        if was_grounded || self.player.bottom() > self.ground_y() {
            self.player.pos.y = self.ground_y() - self.player.size.y;
        }
    }

    /// Spray `amount` dust particles from (x, y); `dir` biases them backward
    pub fn emit_dust(&mut self, x: f32, y: f32, amount: usize, dir: f32) {
        if !self.particles_enabled {
            return;
        }
        for _ in 0..amount {
            if self.particles.len() >= MAX_PARTICLES {
                self.particles.pop_front();
            }
            let rng = &mut self.rng;
            let a = rand_range(rng, 0.0, std::f32::consts::TAU);
            let sp = rand_range(rng, 60.0, 220.0);
            let pos = Vec2::new(x + rand_range(rng, -6.0, 6.0), y + rand_range(rng, -4.0, 4.0));
            let vel = Vec2::new(
                a.cos() * sp - dir * rand_range(rng, 80.0, 160.0),
                a.sin() * sp - rand_range(rng, 30.0, 120.0),
            );
            self.particles.push_back(Particle {
                pos,
                vel,
                life: rand_range(rng, 0.25, Particle::MAX_LIFE),
                radius: rand_range(rng, 2.0, 5.0),
                alpha: rand_range(rng, 0.35, 0.75),
            });
        }
    }
}
