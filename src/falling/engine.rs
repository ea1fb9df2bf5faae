//! Falling-item game loop
//!
//! Items drop from above the viewport and the player taps the correct ones
//! before the clock runs out. Countdown, game clock, spawn delays and the
//! floating score all run on the engine's [`TimerQueue`], so a reset drops
//! every one of them at once.

use std::collections::HashSet;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::config::{FallingConfig, SpawnMode};
use super::placement::{place, resolve_speed};
use super::strategy::{DefaultFactory, DefaultScoring, FallingItem, ItemFactory, ScoreChange, ScoringRule};
use crate::consts::*;
use crate::error::Result;
use crate::game_over::{GameOverEffect, GameOverFlow};
use crate::geometry::{Rect, Viewport};
use crate::host::{HostAction, Minigame};
use crate::phase::{GamePhase, PhaseEvent, transition};
use crate::services::{AnalyticsEvent, MessageKind, NativeAppInfo, Services, StateSnapshot, parse_inbound};
use crate::timers::{TimerId, TimerQueue};

#[derive(Debug, Clone, PartialEq)]
enum FallingTimer {
    Countdown,
    Clock,
    Reveal,
    Batch,
    BatchItem,
    ClearFloating,
    Navigate(String),
}

/// Transient "+5" / "-3" shown after a tap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatingScore {
    pub id: u64,
    pub is_correct: bool,
    pub points: i32,
}

/// Read-only view for rendering and the HUD
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallingSnapshot {
    pub title: String,
    pub phase: GamePhase,
    pub viewport: Viewport,
    pub score: u32,
    pub time_left: u32,
    pub items: Vec<FallingItem>,
    pub floating: Option<FloatingScore>,
}

/// Tap target of an item in pixels
pub fn item_rect(item: &FallingItem, viewport: &Viewport) -> Rect {
    let anchor = viewport.from_percent(item.x, item.y);
    Rect::new(anchor.x - ITEM_BOX_W / 2.0, anchor.y, ITEM_BOX_W, ITEM_BOX_H)
}

pub struct FallingGame {
    config: FallingConfig,
    factory: Box<dyn ItemFactory>,
    scoring: Box<dyn ScoringRule>,
    phase: GamePhase,
    items: Vec<FallingItem>,
    score: u32,
    time_left: u32,
    floating: Option<FloatingScore>,
    /// Items that already queued their follow-up spawn
    revealed: HashSet<u64>,
    reveal_timer: Option<TimerId>,
    floating_timer: Option<TimerId>,
    /// Countdown ticker, then the game clock
    clock_timer: Option<TimerId>,
    batch_timer: Option<TimerId>,
    next_id: u64,
    viewport: Viewport,
    rng: Pcg32,
    services: Services,
    native: NativeAppInfo,
    flow: GameOverFlow,
    timers: TimerQueue<FallingTimer>,
    actions: Vec<HostAction>,
}

impl FallingGame {
    pub fn new(
        config: FallingConfig,
        factory: Box<dyn ItemFactory>,
        scoring: Box<dyn ScoringRule>,
        seed: u64,
        services: Services,
    ) -> Result<Self> {
        config.validate()?;
        let native = services.native_info();
        Ok(Self {
            time_left: config.time_limit,
            config,
            factory,
            scoring,
            phase: GamePhase::Idle,
            items: Vec::new(),
            score: 0,
            floating: None,
            revealed: HashSet::new(),
            reveal_timer: None,
            floating_timer: None,
            clock_timer: None,
            batch_timer: None,
            next_id: 0,
            viewport: Viewport::default(),
            rng: Pcg32::seed_from_u64(seed),
            services,
            native,
            flow: GameOverFlow::new(),
            timers: TimerQueue::new(),
            actions: Vec::new(),
        })
    }

    /// Default item factory and scoring
    pub fn with_defaults(config: FallingConfig, seed: u64, services: Services) -> Result<Self> {
        Self::new(config, Box::new(DefaultFactory), Box::new(DefaultScoring), seed, services)
    }

    pub fn config(&self) -> &FallingConfig {
        &self.config
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn items(&self) -> &[FallingItem] {
        &self.items
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn floating(&self) -> Option<FloatingScore> {
        self.floating
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    pub fn game_over_handled(&self) -> bool {
        self.flow.is_handled()
    }

    fn telemetry_state(&self) -> StateSnapshot {
        StateSnapshot {
            game_started: self.phase.is_started(),
            game_over: self.phase.is_over(),
            countdown: self.phase.countdown().map(i32::from),
            time_left: self.time_left as i32,
            score: self.score,
        }
    }

    fn apply(&mut self, event: PhaseEvent) -> bool {
        match transition(self.phase, event) {
            Ok(next) => {
                self.phase = next;
                true
            }
            Err(e) => {
                let snapshot = self.telemetry_state();
                self.services.telemetry.log_state_anomaly(&e.to_string(), Some(snapshot));
                false
            }
        }
    }

    fn cancel(&mut self, slot: Option<TimerId>) {
        if let Some(id) = slot {
            self.timers.cancel(id);
        }
    }

    fn begin_countdown(&mut self) {
        if !self.apply(PhaseEvent::Begin { countdown: COUNTDOWN_START }) {
            return;
        }
        let previous = self.clock_timer.take();
        self.cancel(previous);
        self.clock_timer = Some(self.timers.schedule_repeating(SECOND_MS, FallingTimer::Countdown));
        self.services.analytics.track(AnalyticsEvent::GameStart);
        log::info!("{}: countdown started", self.config.title);
    }

    fn countdown_tick(&mut self) {
        if !self.apply(PhaseEvent::CountdownTick) {
            let stale = self.clock_timer.take();
            self.cancel(stale);
            return;
        }
        if self.phase.is_running() {
            self.on_running();
        }
    }

    /// Countdown reached zero
    fn on_running(&mut self) {
        let countdown = self.clock_timer.take();
        self.cancel(countdown);
        self.clock_timer = Some(self.timers.schedule_repeating(SECOND_MS, FallingTimer::Clock));
        log::info!("{}: running for {} s", self.config.title, self.time_left);

        if self.config.spawn_mode == SpawnMode::Batched {
            let count = self.roll_count(self.config.initial_item_count.min, self.config.initial_item_count.max);
            for _ in 0..count {
                self.spawn_item();
            }
            self.batch_timer = Some(
                self.timers
                    .schedule_repeating(self.config.item_spawn_interval, FallingTimer::Batch),
            );
        }
    }

    fn roll_count(&mut self, min: u32, max: u32) -> u32 {
        if max <= min { min } else { self.rng.random_range(min..=max) }
    }

    /// Queue a staggered batch of spawns
    fn spawn_batch(&mut self) {
        let count = self.roll_count(self.config.item_spawn_count.min, self.config.item_spawn_count.max);
        for i in 0..count {
            self.timers
                .schedule(f64::from(i) * self.config.item_spawn_delay, FallingTimer::BatchItem);
        }
    }

    /// Make one item and place it clear of the live ones
    pub fn spawn_item(&mut self) {
        let draft = self.factory.make_item(&self.config, &mut self.rng);
        let spacing = self.config.spacing();
        let placement = place(draft.x, draft.y, &self.items, &spacing, &mut self.rng);
        if !placement.clear {
            log::debug!("Placed item at ({:.1}, {:.1}) despite overlap", placement.x, placement.y);
        }

        self.next_id += 1;
        self.items.push(FallingItem {
            id: self.next_id,
            text: draft.text,
            is_correct: draft.is_correct,
            color: draft.color,
            x: placement.x,
            y: placement.y,
            speed: resolve_speed(&self.config, draft.speed),
            detail: draft.detail,
        });
    }

    /// Returns how many clock seconds elapsed
    fn run_timers(&mut self, elapsed_ms: f64) -> u32 {
        let until = self.timers.now_ms() + elapsed_ms;
        let mut clock_steps = 0;
        while let Some((id, timer)) = self.timers.pop_due(until) {
            match timer {
                FallingTimer::Countdown => self.countdown_tick(),
                FallingTimer::Clock => clock_steps += 1,
                FallingTimer::Reveal => {
                    if self.reveal_timer == Some(id) {
                        self.reveal_timer = None;
                    }
                    if self.phase.is_running() {
                        self.spawn_item();
                    }
                }
                FallingTimer::Batch => {
                    if self.phase.is_running() {
                        self.spawn_batch();
                    }
                }
                FallingTimer::BatchItem => {
                    if self.phase.is_running() {
                        self.spawn_item();
                    }
                }
                FallingTimer::ClearFloating => {
                    self.floating = None;
                    self.floating_timer = None;
                }
                FallingTimer::Navigate(path) => {
                    if path == SCOREBOARD_PATH {
                        self.services.analytics.track(AnalyticsEvent::LeaderboardView);
                    }
                    self.actions.push(HostAction::Navigate(path));
                }
            }
        }
        self.timers.settle(until);
        clock_steps
    }

    fn advance_clock(&mut self, steps: u32) {
        if steps == 0 || !self.phase.is_running() {
            return;
        }
        let before = self.time_left;
        let after = before.saturating_sub(steps);
        if after == 0 {
            self.time_left = 0;
            self.finish();
            return;
        }
        self.time_left = after;
        if before - after > MAX_CLOCK_STEP {
            let snapshot = self.telemetry_state();
            self.services.telemetry.log_unexpected_game_over(
                &format!("Time jumped from {} to {}", before, after),
                Some(snapshot),
            );
        }
        let snapshot = self.telemetry_state();
        self.services.telemetry.check_and_log_anomalies(&snapshot);
    }

    fn finish(&mut self) {
        if !self.apply(PhaseEvent::Finish) {
            return;
        }
        for slot in [self.clock_timer.take(), self.batch_timer.take(), self.reveal_timer.take()] {
            self.cancel(slot);
        }
        self.revealed.clear();

        match self.flow.handle(self.score, &mut self.services) {
            Some(GameOverEffect::ScheduleNavigation { delay_ms, path }) => {
                self.timers.schedule(delay_ms, FallingTimer::Navigate(path));
            }
            Some(GameOverEffect::Notify(notice)) => self.actions.push(HostAction::Notify(notice)),
            None => {}
        }
    }

    fn move_items(&mut self, elapsed_ms: f64) {
        let frames = (elapsed_ms / TARGET_FRAME_MS) as f32;
        for item in &mut self.items {
            item.y += item.speed * frames;
        }
        self.items.retain(|item| item.y < ITEM_CULL_Y);
    }

    /// Queue the next spawn once an item is fully on screen
    fn schedule_reveal(&mut self) {
        let items = &self.items;
        self.revealed.retain(|id| items.iter().any(|item| item.id == *id));

        if self.reveal_timer.is_some() {
            return;
        }
        let trigger = self
            .items
            .iter()
            .find(|item| item.y >= 0.0 && !self.revealed.contains(&item.id))
            .map(|item| item.id);
        if let Some(id) = trigger {
            self.revealed.insert(id);
            self.reveal_timer = Some(
                self.timers
                    .schedule(self.config.reveal_delay_ms(), FallingTimer::Reveal),
            );
        }
    }

    /// Tap an item by id; returns the score change if it was live
    pub fn tap(&mut self, id: u64) -> Option<ScoreChange> {
        if !self.phase.is_running() {
            return None;
        }
        let idx = self.items.iter().position(|item| item.id == id)?;
        let item = self.items.remove(idx);
        let change = self.scoring.score(&item, self.score, &self.config);
        self.score = change.new_score;

        self.next_id += 1;
        self.floating = Some(FloatingScore {
            id: self.next_id,
            is_correct: item.is_correct,
            points: change.delta,
        });
        let previous = self.floating_timer.take();
        self.cancel(previous);
        self.floating_timer = Some(self.timers.schedule(FLOATING_SCORE_MS, FallingTimer::ClearFloating));

        log::debug!("Tapped '{}' ({:+}) -> {}", item.text, change.delta, change.new_score);
        Some(change)
    }

    /// Topmost item under a canvas point
    pub fn item_at(&self, x: f32, y: f32) -> Option<u64> {
        let point = glam::Vec2::new(x, y);
        self.items
            .iter()
            .rev()
            .find(|item| item_rect(item, &self.viewport).contains(point))
            .map(|item| item.id)
    }

    pub fn snapshot(&self) -> FallingSnapshot {
        FallingSnapshot {
            title: self.config.title.clone(),
            phase: self.phase,
            viewport: self.viewport,
            score: self.score,
            time_left: self.time_left,
            items: self.items.clone(),
            floating: self.floating,
        }
    }
}

impl Minigame for FallingGame {
    fn start(&mut self) {
        if !self.phase.start_button_enabled() {
            return;
        }
        self.services.telemetry.start_session();
        if self.native.local_host || !self.services.settings.require_native_app {
            self.begin_countdown();
        } else if self.native.is_native {
            if self.apply(PhaseEvent::RequestApproval) {
                if let Err(e) = self.services.bridge.request_game_start(crate::now_ms()) {
                    log::error!("GAME_START_REQUEST failed: {}", e);
                }
            }
        } else {
            self.apply(PhaseEvent::NativeUnavailable);
        }
    }

    fn reset(&mut self) {
        self.timers.clear();
        self.items.clear();
        self.score = 0;
        self.time_left = self.config.time_limit;
        self.floating = None;
        self.revealed.clear();
        self.reveal_timer = None;
        self.floating_timer = None;
        self.clock_timer = None;
        self.batch_timer = None;
        self.apply(PhaseEvent::Reset);
        self.flow.reset();
        self.actions.clear();
        self.services.telemetry.end_session();
    }

    fn frame(&mut self, elapsed_ms: f64) {
        let clock_steps = self.run_timers(elapsed_ms);
        self.advance_clock(clock_steps);
        self.services.telemetry.tick(elapsed_ms);

        if !self.phase.is_running() {
            return;
        }
        self.move_items(elapsed_ms);
        if self.config.spawn_mode == SpawnMode::Sequential {
            self.schedule_reveal();
        }
        // Never leave the field empty
        if self.items.is_empty() && self.reveal_timer.is_none() {
            self.spawn_item();
        }
    }

    fn pointer(&mut self, x: f32, y: f32) {
        if let Some(id) = self.item_at(x, y) {
            self.tap(id);
        }
    }

    fn on_native_message(&mut self, payload: &Value) {
        let Some(message) = parse_inbound(payload) else {
            return;
        };
        match message.kind {
            MessageKind::GameStartApproved => self.begin_countdown(),
            MessageKind::ActivateStartButton => {
                if self.phase.countdown().is_none() && !self.phase.is_started() {
                    self.apply(PhaseEvent::ActivateStartButton);
                }
            }
            MessageKind::GamePause | MessageKind::GameResume | MessageKind::GameEnd => {
                log::info!("Native message {:?} acknowledged", message.kind);
            }
            other => log::debug!("Ignoring outbound-only message {:?}", other),
        }
    }

    fn back_button(&mut self) {
        if let Err(e) = self.services.bridge.back_button_pressed() {
            log::error!("BACK_BUTTON_PRESSED failed: {}", e);
        }
    }

    fn take_actions(&mut self) -> Vec<HostAction> {
        std::mem::take(&mut self.actions)
    }

    fn resize(&mut self, width: f32, height: f32) {
        self.viewport = Viewport::new(width, height);
    }

    fn score(&self) -> u32 {
        self.score
    }
}
