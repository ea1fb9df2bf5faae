//! Side-scrolling runner
//!
//! [`RunnerGame`] owns a [`RunnerState`] plus the start gate, the game-over
//! flow and its timers. The host feeds it frames and input and reads back a
//! [`RunnerSnapshot`].

pub mod progression;
pub mod state;
pub mod tick;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use progression::{heart_scale_for_stage, heart_value_for_stage, speed_for_stage, stage_for_score};
pub use state::{Heart, Obstacle, Particle, Player, RunnerEvent, RunnerState, SpeedBanner, Viewport};
pub use tick::{StepOutcome, TickInput, tick};

use crate::consts::*;
use crate::game_over::{GameOverEffect, GameOverFlow};
use crate::geometry::Rect;
use crate::host::{HostAction, Minigame};
use crate::phase::{GamePhase, PhaseEvent, transition};
use crate::services::{AnalyticsEvent, MessageKind, NativeAppInfo, Services, StateSnapshot, parse_inbound};
use crate::timers::TimerQueue;

#[derive(Debug, Clone, PartialEq)]
enum RunnerTimer {
    Navigate(String),
}

/// Read-only view for rendering and the HUD
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSnapshot {
    pub phase: GamePhase,
    pub viewport: Viewport,
    pub ground_y: f32,
    pub score: u32,
    pub stage: u32,
    pub speed_mult: f32,
    pub player: Rect,
    pub obstacles: Vec<Obstacle>,
    pub hearts: Vec<Vec2>,
    /// Heart glyph size for the current stage
    pub heart_font_px: f32,
    /// (position, radius, opacity)
    pub particles: Vec<(Vec2, f32, f32)>,
    pub banner: Option<(Vec2, f32)>,
    pub parallax: [f32; 3],
    pub background_width: Option<f32>,
}

pub struct RunnerGame {
    state: RunnerState,
    input: TickInput,
    services: Services,
    native: NativeAppInfo,
    flow: GameOverFlow,
    timers: TimerQueue<RunnerTimer>,
    actions: Vec<HostAction>,
    events: Vec<RunnerEvent>,
}

impl RunnerGame {
    pub fn new(seed: u64, viewport: Viewport, services: Services) -> Self {
        let mut state = RunnerState::new(seed, viewport);
        state.particles_enabled = services.settings.particles;
        let native = services.native_info();
        Self {
            state,
            input: TickInput::default(),
            services,
            native,
            flow: GameOverFlow::new(),
            timers: TimerQueue::new(),
            actions: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> &RunnerState {
        &self.state
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    /// Game-over latch already fired for this game
    pub fn game_over_handled(&self) -> bool {
        self.flow.is_handled()
    }

    /// Drain simulation events since the last call
    pub fn take_events(&mut self) -> Vec<RunnerEvent> {
        std::mem::take(&mut self.events)
    }

    fn telemetry_state(&self) -> StateSnapshot {
        StateSnapshot {
            game_started: self.state.phase.is_started(),
            game_over: self.state.phase.is_over(),
            countdown: None,
            time_left: 0,
            score: self.state.score,
        }
    }

    /// Apply a phase event; illegal ones are reported and ignored
    fn apply(&mut self, event: PhaseEvent) -> bool {
        match transition(self.state.phase, event) {
            Ok(next) => {
                self.state.phase = next;
                true
            }
            Err(e) => {
                let snapshot = self.telemetry_state();
                self.services.telemetry.log_state_anomaly(&e.to_string(), Some(snapshot));
                false
            }
        }
    }

    /// Start immediately (no countdown in the runner)
    fn begin(&mut self) {
        if !self.apply(PhaseEvent::Begin { countdown: 0 }) {
            return;
        }
        self.services.analytics.track(AnalyticsEvent::GameStart);
        log::info!("Runner started");
    }

    /// Register a jump press; ignored unless running
    pub fn jump(&mut self) {
        if self.state.phase.is_running() {
            self.input.jumps = self.input.jumps.saturating_add(1);
        }
    }

    /// Background image decoded; tiles are scaled to the viewport height
    pub fn set_background_size(&mut self, natural_w: f32, natural_h: f32) {
        if natural_w > 0.0 && natural_h > 0.0 {
            self.state.background_width =
                Some(natural_w * self.state.viewport.height / natural_h);
        }
    }

    fn handle_game_over(&mut self) {
        let score = self.state.score;
        match self.flow.handle(score, &mut self.services) {
            Some(GameOverEffect::ScheduleNavigation { delay_ms, path }) => {
                self.timers.schedule(delay_ms, RunnerTimer::Navigate(path));
            }
            Some(GameOverEffect::Notify(notice)) => self.actions.push(HostAction::Notify(notice)),
            None => {}
        }
    }

    fn run_timers(&mut self, elapsed_ms: f64) {
        let until = self.timers.now_ms() + elapsed_ms;
        while let Some((_, timer)) = self.timers.pop_due(until) {
            match timer {
                RunnerTimer::Navigate(path) => {
                    if path == SCOREBOARD_PATH {
                        self.services.analytics.track(AnalyticsEvent::LeaderboardView);
                    }
                    self.actions.push(HostAction::Navigate(path));
                }
            }
        }
        self.timers.settle(until);
    }

    pub fn snapshot(&self) -> RunnerSnapshot {
        let s = &self.state;
        let heart_scale = heart_scale_for_stage(s.stage);
        RunnerSnapshot {
            phase: s.phase,
            viewport: s.viewport,
            ground_y: s.ground_y(),
            score: s.score,
            stage: s.stage,
            speed_mult: s.speed_mult,
            player: s.player.rect(),
            obstacles: s.obstacles.clone(),
            hearts: s.hearts.iter().map(|h| h.pos).collect(),
            heart_font_px: (HEART_FONT_BASE * heart_scale).floor().max(18.0),
            particles: s.particles.iter().map(|p| (p.pos, p.radius, p.fade())).collect(),
            banner: s.banner.map(|b| (b.pos, b.alpha())),
            parallax: s.parallax.offsets,
            background_width: s.background_width,
        }
    }
}

impl Minigame for RunnerGame {
    fn start(&mut self) {
        if !self.state.phase.start_button_enabled() {
            return;
        }
        self.services.telemetry.start_session();
        if self.native.is_native {
            if self.apply(PhaseEvent::RequestApproval) {
                if let Err(e) = self.services.bridge.request_game_start(crate::now_ms()) {
                    log::error!("GAME_START_REQUEST failed: {}", e);
                }
            }
        } else if self.native.local_host || !self.services.settings.require_native_app {
            self.begin();
        } else {
            self.apply(PhaseEvent::NativeUnavailable);
        }
    }

    fn reset(&mut self) {
        self.timers.clear();
        self.input = TickInput::default();
        self.state.reset();
        self.apply(PhaseEvent::Reset);
        self.flow.reset();
        self.actions.clear();
        self.events.clear();
        if let Some(id) = self.services.telemetry.active_session() {
            log::debug!("Closing telemetry session {}", id);
        }
        self.services.telemetry.end_session();
    }

    fn frame(&mut self, elapsed_ms: f64) {
        self.run_timers(elapsed_ms);
        self.services.telemetry.tick(elapsed_ms);

        let input = std::mem::take(&mut self.input);
        let outcome = tick(&mut self.state, &input, (elapsed_ms / 1000.0) as f32);
        self.events.append(&mut self.state.events);

        if outcome == StepOutcome::Crashed {
            self.handle_game_over();
        }
    }

    fn pointer(&mut self, _x: f32, _y: f32) {
        self.jump();
    }

    fn on_native_message(&mut self, payload: &Value) {
        let Some(message) = parse_inbound(payload) else {
            return;
        };
        match message.kind {
            MessageKind::GameStartApproved => self.begin(),
            MessageKind::ActivateStartButton => {
                if !self.state.phase.is_started() {
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
        let old_height = self.state.viewport.height;
        self.state.set_viewport(Viewport::new(width, height));
        if let Some(w) = self.state.background_width {
            if old_height > 0.0 {
                self.state.background_width = Some(w * height / old_height);
            }
        }
    }

    fn score(&self) -> u32 {
        self.state.score
    }
}
