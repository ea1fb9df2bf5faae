//! Falling-item tap games
//!
//! One engine, [`FallingGame`], driven by a [`FallingConfig`] and two hooks:
//! an [`ItemFactory`] that makes items and a [`ScoringRule`] that scores taps.
//! The built-in games live in [`variants`].

pub mod config;
pub mod engine;
pub mod placement;
pub mod strategy;
pub mod variants;

pub use config::{CountRange, DataEntry, FallingConfig, SpawnMode, SpawnSpacing, SpeedRange};
pub use engine::{FallingGame, FallingSnapshot, FloatingScore, item_rect};
pub use placement::{Placement, overlaps, place, resolve_speed};
pub use strategy::{
    DefaultFactory, DefaultScoring, FallingItem, FixedPoints, ItemDetail, ItemDraft, ItemFactory, ScoreChange,
    ScoringRule,
};
pub use variants::{PairPick, PairingFactory, SymbolFactory, Variant};
