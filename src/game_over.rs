//! End-of-game handling shared by both engines
//!
//! Runs at most once per game: analytics, native notification, then the
//! leaderboard qualify/submit round trip. Leaderboard failures are folded into
//! a [`SubmitOutcome`] and never escape.

use crate::consts::{NAVIGATE_DELAY_MS, SCOREBOARD_PATH};
use crate::host::Notice;
use crate::services::{AnalyticsEvent, Services, SubmitStatus};

/// Result of a submission attempt as the UI needs it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmitOutcome {
    pub success: bool,
    pub should_show_error: bool,
}

/// Follow-up the engine has to carry out
#[derive(Debug, Clone, PartialEq)]
pub enum GameOverEffect {
    /// Go to `path` after `delay_ms`
    ScheduleNavigation { delay_ms: f64, path: String },
    Notify(Notice),
}

/// One-shot latches for game-over and submission
#[derive(Debug, Clone, Default)]
pub struct GameOverFlow {
    handled: bool,
    submitted: bool,
}

impl GameOverFlow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-arm both latches for a fresh game
    pub fn reset(&mut self) {
        self.handled = false;
        self.submitted = false;
    }

    pub fn is_handled(&self) -> bool {
        self.handled
    }

    pub fn has_submitted(&self) -> bool {
        self.submitted
    }

    /// Handle the end of a game. Later calls for the same game do nothing.
    pub fn handle(&mut self, final_score: u32, services: &mut Services) -> Option<GameOverEffect> {
        if self.handled {
            return None;
        }
        self.handled = true;
        log::info!("Game over with score {}", final_score);

        services.analytics.track(AnalyticsEvent::GameEnd { score: final_score });

        if final_score == 0 {
            return None;
        }

        let log_heart_id = services.identity.log_heart_id.clone();
        if let Err(e) = services
            .bridge
            .notify_game_end(final_score, log_heart_id.as_deref(), crate::now_ms())
        {
            log::warn!("Failed to notify native app: {}", e);
        }

        if self.submitted {
            return None;
        }

        let qualifies = match services.leaderboard.qualifies_for_top10(final_score) {
            Ok(q) => q,
            Err(e) => {
                log::error!("Error checking top 10: {}", e);
                false
            }
        };
        if !qualifies {
            log::info!("Score {} does not make today's top 10", final_score);
            return None;
        }

        self.submitted = true;
        let outcome = submit(final_score, services);
        if outcome.success {
            services.analytics.track(AnalyticsEvent::ScoreSubmit {
                score: final_score,
                player_name: services.identity.nickname.clone(),
            });
            Some(GameOverEffect::ScheduleNavigation {
                delay_ms: NAVIGATE_DELAY_MS,
                path: SCOREBOARD_PATH.to_string(),
            })
        } else if outcome.should_show_error {
            Some(GameOverEffect::Notify(Notice::submission_failed()))
        } else {
            None
        }
    }
}

fn submit(score: u32, services: &mut Services) -> SubmitOutcome {
    let player = services.identity.nickname.clone();
    match services.leaderboard.submit_score(&player, score) {
        Ok(SubmitStatus::Accepted { rank }) => {
            log::info!("Submitted {} for {} at rank {}", score, player, rank);
            SubmitOutcome {
                success: true,
                should_show_error: false,
            }
        }
        Ok(SubmitStatus::NotHigherThanExisting { .. }) => SubmitOutcome::default(),
        Err(e) => {
            log::error!("Score submission error: {}", e);
            SubmitOutcome {
                success: false,
                should_show_error: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ArcadeError, Result};
    use crate::services::{
        Leaderboard, MessageKind, RecordingAnalytics, RecordingBridge, TelemetryClient,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Scripted leaderboard
    #[derive(Default)]
    struct FakeBoard {
        qualifies: bool,
        fail_submit: bool,
        submits: Vec<u32>,
    }

    impl Leaderboard for FakeBoard {
        fn qualifies_for_top10(&mut self, _score: u32) -> Result<bool> {
            Ok(self.qualifies)
        }

        fn submit_score(&mut self, _player: &str, score: u32) -> Result<SubmitStatus> {
            self.submits.push(score);
            if self.fail_submit {
                return Err(ArcadeError::Leaderboard("network down".into()));
            }
            Ok(SubmitStatus::Accepted { rank: 1 })
        }
    }

    struct Fixture {
        services: Services,
        board: Rc<RefCell<FakeBoard>>,
        bridge: Rc<RefCell<RecordingBridge>>,
        analytics: Rc<RefCell<RecordingAnalytics>>,
    }

    fn fixture(qualifies: bool, fail_submit: bool) -> Fixture {
        let board = Rc::new(RefCell::new(FakeBoard {
            qualifies,
            fail_submit,
            ..Default::default()
        }));
        let bridge = Rc::new(RefCell::new(RecordingBridge::android()));
        let analytics = Rc::new(RefCell::new(RecordingAnalytics::default()));
        let mut services = Services::offline(1);
        services.leaderboard = Box::new(board.clone());
        services.bridge = Box::new(bridge.clone());
        services.analytics = Box::new(analytics.clone());
        services.telemetry = TelemetryClient::disabled();
        Fixture {
            services,
            board,
            bridge,
            analytics,
        }
    }

    #[test]
    fn test_qualifying_score_submits_and_navigates() {
        let mut f = fixture(true, false);
        let mut flow = GameOverFlow::new();

        let effect = flow.handle(30, &mut f.services);
        assert_eq!(
            effect,
            Some(GameOverEffect::ScheduleNavigation {
                delay_ms: 1500.0,
                path: "/scoreboard".into()
            })
        );
        assert_eq!(f.board.borrow().submits, vec![30]);
        assert_eq!(f.bridge.borrow().kinds(), vec![MessageKind::GameEnd]);
        assert!(matches!(
            f.analytics.borrow().events.last(),
            Some(AnalyticsEvent::ScoreSubmit { score: 30, .. })
        ));
    }

    #[test]
    fn test_handled_once() {
        let mut f = fixture(true, false);
        let mut flow = GameOverFlow::new();
        flow.handle(30, &mut f.services);
        assert_eq!(flow.handle(30, &mut f.services), None);
        assert_eq!(f.board.borrow().submits.len(), 1);
        assert_eq!(f.bridge.borrow().sent.len(), 1);
    }

    #[test]
    fn test_zero_score_only_tracks() {
        let mut f = fixture(true, false);
        let mut flow = GameOverFlow::new();
        assert_eq!(flow.handle(0, &mut f.services), None);
        assert!(f.bridge.borrow().sent.is_empty());
        assert!(f.board.borrow().submits.is_empty());
        assert_eq!(
            f.analytics.borrow().events,
            vec![AnalyticsEvent::GameEnd { score: 0 }]
        );
    }

    #[test]
    fn test_non_qualifying_notifies_without_submit() {
        let mut f = fixture(false, false);
        let mut flow = GameOverFlow::new();
        assert_eq!(flow.handle(3, &mut f.services), None);
        assert!(!flow.has_submitted());
        assert_eq!(f.bridge.borrow().kinds(), vec![MessageKind::GameEnd]);
    }

    #[test]
    fn test_failed_submit_shows_notice() {
        let mut f = fixture(true, true);
        let mut flow = GameOverFlow::new();
        assert_eq!(
            flow.handle(9, &mut f.services),
            Some(GameOverEffect::Notify(Notice::submission_failed()))
        );
        assert!(flow.has_submitted());
    }

    #[test]
    fn test_reset_rearms() {
        let mut f = fixture(true, false);
        let mut flow = GameOverFlow::new();
        flow.handle(5, &mut f.services);
        flow.reset();
        flow.handle(6, &mut f.services);
        assert_eq!(f.board.borrow().submits, vec![5, 6]);
    }
}
