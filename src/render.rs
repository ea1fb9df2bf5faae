//! Display lists for the canvas host
//!
//! Scenes are built from snapshots as a flat list of [`DrawCmd`]s in paint
//! order. The host only has to replay them on a 2D context, which keeps all
//! layout decisions testable off the browser.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::ITEM_BOX_H;
use crate::falling::{FallingSnapshot, item_rect};
use crate::geometry::Rect;
use crate::phase::GamePhase;
use crate::runner::RunnerSnapshot;

/// RGBA, 0..1
pub type Color = [f32; 4];

pub const SKY: Color = [0.529, 0.784, 1.0, 1.0];
pub const GROUND_TINT: Color = [0.0, 0.0, 0.0, 0.05];
pub const OBSTACLE_FALLBACK: Color = [0.0, 0.0, 0.0, 0.22];
pub const WHITE: Color = [1.0, 1.0, 1.0, 1.0];
const PARTICLE: Color = [1.0, 1.0, 1.0, 0.85];
const BANNER: Color = [1.0, 1.0, 1.0, 0.98];
const BANNER_GLOW: Color = [1.0, 0.235, 0.47, 0.75];
const FIELD: Color = [1.0, 0.97, 0.93, 1.0];
const GAIN: Color = [0.133, 0.773, 0.369, 1.0];
const LOSS: Color = [0.937, 0.267, 0.267, 1.0];

/// Stripe opacities, far to near
const STRIPE_ALPHA: [f32; 3] = [0.85, 0.92, 0.95];
const HEART_GLYPH: &str = "\u{2764}\u{fe0f}";
const BANNER_TILT: f32 = -0.06;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sprite {
    Player,
    Obstacle,
    Background,
}

/// Which images have finished decoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetState {
    pub player: bool,
    pub obstacle: bool,
    pub background: bool,
}

impl AssetState {
    pub fn is_ready(&self, sprite: Sprite) -> bool {
        match sprite {
            Sprite::Player => self.player,
            Sprite::Obstacle => self.obstacle,
            Sprite::Background => self.background,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCmd {
    FillRect {
        rect: Rect,
        color: Color,
    },
    RoundRect {
        rect: Rect,
        radius: f32,
        color: Color,
    },
    Image {
        sprite: Sprite,
        rect: Rect,
        alpha: f32,
    },
    Circle {
        center: Vec2,
        radius: f32,
        color: Color,
    },
    /// Centered text; `rotation` in radians around `pos`
    Text {
        text: String,
        pos: Vec2,
        size_px: f32,
        color: Color,
        rotation: f32,
        glow: Option<Color>,
    },
}

/// `#rrggbb` to a color; anything else is opaque black
pub fn parse_hex(hex: &str) -> Color {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return [0.0, 0.0, 0.0, 1.0];
    }
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map(|v| f32::from(v) / 255.0)
            .unwrap_or(0.0)
    };
    [channel(0), channel(2), channel(4), 1.0]
}

/// CSS `rgba()` string for a color
pub fn css(color: Color) -> String {
    let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!("rgba({},{},{},{})", c(color[0]), c(color[1]), c(color[2]), color[3].clamp(0.0, 1.0))
}

fn with_alpha(mut color: Color, alpha: f32) -> Color {
    color[3] *= alpha;
    color
}

fn text(text: &str, pos: Vec2, size_px: f32, color: Color) -> DrawCmd {
    DrawCmd::Text {
        text: text.to_string(),
        pos,
        size_px,
        color,
        rotation: 0.0,
        glow: None,
    }
}

fn background(s: &RunnerSnapshot, assets: &AssetState, out: &mut Vec<DrawCmd>) {
    let (w, h) = (s.viewport.width, s.viewport.height);
    let tile = s.background_width.filter(|bw| *bw > 0.0);
    let Some(bw) = tile.filter(|_| assets.is_ready(Sprite::Background)) else {
        out.push(DrawCmd::FillRect {
            rect: Rect::new(0.0, 0.0, w, h),
            color: SKY,
        });
        return;
    };

    for (i, (offset, alpha)) in s.parallax.iter().zip(STRIPE_ALPHA).enumerate() {
        for x in [*offset, offset + bw] {
            out.push(DrawCmd::Image {
                sprite: Sprite::Background,
                rect: Rect::new(x, 0.0, bw, h),
                alpha,
            });
        }
        // Haze over the far stripe only
        if i == 0 {
            out.push(DrawCmd::FillRect {
                rect: Rect::new(0.0, 0.0, w, h),
                color: [1.0, 1.0, 1.0, 0.10],
            });
        }
    }
}

/// Runner frame: stripes, ground, obstacles, hearts, player, particles, banner
pub fn runner_scene(s: &RunnerSnapshot, assets: &AssetState) -> Vec<DrawCmd> {
    let mut out = Vec::with_capacity(16 + s.obstacles.len() + s.hearts.len() + s.particles.len());
    let (w, h) = (s.viewport.width, s.viewport.height);

    background(s, assets, &mut out);
    out.push(DrawCmd::FillRect {
        rect: Rect::new(0.0, s.ground_y, w, h - s.ground_y),
        color: GROUND_TINT,
    });

    for o in &s.obstacles {
        let rect = o.rect.scaled(o.scale);
        out.push(if assets.is_ready(Sprite::Obstacle) {
            DrawCmd::Image {
                sprite: Sprite::Obstacle,
                rect,
                alpha: 1.0,
            }
        } else {
            DrawCmd::FillRect {
                rect,
                color: OBSTACLE_FALLBACK,
            }
        });
    }

    for pos in &s.hearts {
        out.push(text(HEART_GLYPH, *pos, s.heart_font_px, WHITE));
    }

    let p = s.player;
    out.push(if assets.is_ready(Sprite::Player) {
        DrawCmd::Image {
            sprite: Sprite::Player,
            rect: Rect::new(p.x - 18.0, p.y - 22.0, p.w + 36.0, p.h + 44.0),
            alpha: 1.0,
        }
    } else {
        DrawCmd::FillRect { rect: p, color: WHITE }
    });

    for (center, radius, alpha) in &s.particles {
        out.push(DrawCmd::Circle {
            center: *center,
            radius: *radius,
            color: with_alpha(PARTICLE, *alpha),
        });
    }

    if let Some((pos, alpha)) = s.banner {
        out.push(DrawCmd::Text {
            text: "SPEED UP".to_string(),
            pos,
            size_px: (p.h * 1.55).floor().max(78.0),
            color: with_alpha(BANNER, alpha),
            rotation: BANNER_TILT,
            glow: Some(BANNER_GLOW),
        });
    }

    out
}

/// Falling-item frame: field, items, floating score, countdown
pub fn falling_scene(s: &FallingSnapshot) -> Vec<DrawCmd> {
    let (w, h) = (s.viewport.width, s.viewport.height);
    let mut out = Vec::with_capacity(4 + s.items.len() * 2);
    out.push(DrawCmd::FillRect {
        rect: Rect::new(0.0, 0.0, w, h),
        color: FIELD,
    });

    for item in &s.items {
        let rect = item_rect(item, &s.viewport);
        out.push(DrawCmd::RoundRect {
            rect,
            radius: 12.0,
            color: parse_hex(&item.color),
        });
        out.push(text(&item.text, rect.center(), ITEM_BOX_H * 0.4, WHITE));
    }

    if let Some(f) = s.floating {
        let label = format!("{:+}", f.points);
        let color = if f.is_correct { GAIN } else { LOSS };
        out.push(text(&label, Vec2::new(w * 0.5, h * 0.35), 64.0, color));
    }

    if let GamePhase::Countdown(n) = s.phase {
        out.push(text(&n.to_string(), Vec2::new(w * 0.5, h * 0.5), 128.0, LOSS));
    }

    out
}
