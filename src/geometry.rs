//! Screen-space shapes and intersection tests
//!
//! Everything here is pure and works in screen space (y grows downward).

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::GROUND_RATIO;

/// Canvas size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 390.0,
            height: 600.0,
        }
    }
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Runner ground line
    #[inline]
    pub fn ground_y(&self) -> f32 {
        self.height * GROUND_RATIO
    }

    /// Percent-of-viewport coordinates to pixels
    #[inline]
    pub fn from_percent(&self, x_pct: f32, y_pct: f32) -> Vec2 {
        Vec2::new(self.width * x_pct / 100.0, self.height * y_pct / 100.0)
    }
}

/// Axis-aligned rectangle (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Grow by `px` on the left and right and by `py` on the top and bottom
    pub fn padded(&self, px: f32, py: f32) -> Self {
        Self::new(self.x - px, self.y - py, self.w + px * 2.0, self.h + py * 2.0)
    }

    /// Move the top-left corner by (dx, dy) and shrink the size by (dw, dh)
    pub fn shrunk(&self, dx: f32, dy: f32, dw: f32, dh: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.w - dw, self.h - dh)
    }

    /// Scale around the center
    pub fn scaled(&self, s: f32) -> Self {
        let c = self.center();
        let (w, h) = (self.w * s, self.h * s);
        Self::new(c.x - w * 0.5, c.y - h * 0.5, w, h)
    }

    /// Corners and edge midpoints, the sample set for ellipse tests
    pub fn sample_points(&self) -> [Vec2; 8] {
        let (x, y, r, b) = (self.x, self.y, self.right(), self.bottom());
        let mx = self.x + self.w * 0.5;
        let my = self.y + self.h * 0.5;
        [
            Vec2::new(x, y),
            Vec2::new(r, y),
            Vec2::new(x, b),
            Vec2::new(r, b),
            Vec2::new(mx, y),
            Vec2::new(mx, b),
            Vec2::new(x, my),
            Vec2::new(r, my),
        ]
    }
}

/// Axis-aligned ellipse
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Vec2,
    pub radii: Vec2,
}

impl Ellipse {
    pub const fn new(center: Vec2, radii: Vec2) -> Self {
        Self { center, radii }
    }

    /// Point inside or on the ellipse (tested in the ellipse's unit space)
    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        let n = (p - self.center) / self.radii;
        n.length_squared() <= 1.0
    }
}

/// Circle vs axis-aligned rect: clamp the center into the rect and compare
/// squared distance against r².
pub fn circle_rect_intersect(center: Vec2, radius: f32, rect: &Rect) -> bool {
    let nearest = Vec2::new(
        center.x.clamp(rect.x, rect.right()),
        center.y.clamp(rect.y, rect.bottom()),
    );
    (center - nearest).length_squared() <= radius * radius
}

/// Ellipse vs axis-aligned rect.
///
/// Samples the rect's corners and edge midpoints against the ellipse, then
/// falls back to checking the ellipse center inside the rect. This is an
/// approximation: a thin rect that crosses the ellipse without a sampled point
/// inside it and without covering the center is reported as a miss.
pub fn ellipse_rect_intersect(ellipse: &Ellipse, rect: &Rect) -> bool {
    rect.sample_points().iter().any(|&p| ellipse.contains(p)) || rect.contains(ellipse.center)
}
