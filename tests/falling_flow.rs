//! Whole falling-item rounds driven through the public API

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use pocket_arcade::consts::{NAVIGATE_DELAY_MS, SCOREBOARD_PATH};
use pocket_arcade::falling::{FallingGame, Variant};
use pocket_arcade::phase::GamePhase;
use pocket_arcade::services::{
    AnalyticsEvent, DailyLeaderboard, KeyValueStore, MessageKind, RecordingAnalytics,
    RecordingBridge, Services, TelemetryClient,
};
use pocket_arcade::{ArcadeError, HostAction, Minigame, Notice};

const FRAME_MS: f64 = 1000.0 / 60.0;
/// 2024-03-01 12:00 KST
const NOON: f64 = 1_709_262_000_000.0;

struct Fakes {
    board: Rc<RefCell<DailyLeaderboard>>,
    bridge: Rc<RefCell<RecordingBridge>>,
    analytics: Rc<RefCell<RecordingAnalytics>>,
}

fn services(bridge: RecordingBridge) -> (Services, Fakes) {
    let fakes = Fakes {
        board: Rc::new(RefCell::new(DailyLeaderboard::with_clock("scoreboard", || NOON))),
        bridge: Rc::new(RefCell::new(bridge)),
        analytics: Rc::new(RefCell::new(RecordingAnalytics::default())),
    };
    let mut services = Services::offline(3);
    services.leaderboard = Box::new(fakes.board.clone());
    services.bridge = Box::new(fakes.bridge.clone());
    services.analytics = Box::new(fakes.analytics.clone());
    services.telemetry = TelemetryClient::disabled();
    (services, fakes)
}

/// Tap every correct item once it is on screen, until the round ends
fn play_round(game: &mut FallingGame) -> Vec<HostAction> {
    let mut actions = Vec::new();
    let mut frames = 0;
    while !game.phase().is_over() {
        let target = game
            .items()
            .iter()
            .find(|item| item.is_correct && item.y >= 0.0)
            .map(|item| item.id);
        if let Some(id) = target {
            game.tap(id);
        }
        game.frame(FRAME_MS);
        actions.extend(game.take_actions());
        frames += 1;
        assert!(frames < 60 * 120, "round never ended");
    }
    actions
}

#[test]
fn test_symbol_round_submits_and_navigates() {
    let (services, fakes) = services(RecordingBridge::browser());
    let mut game = Variant::Symbol.build(11, services).unwrap();
    game.resize(390.0, 600.0);

    game.start();
    assert_eq!(game.phase(), GamePhase::Countdown(3));

    let actions = play_round(&mut game);
    assert!(actions.is_empty());
    assert_eq!(game.time_left(), 0);
    let score = game.score();
    assert!(score > 0);
    assert_eq!(score % 5, 0, "only correct symbols were tapped");

    // Navigation waits for the delay
    game.frame(NAVIGATE_DELAY_MS - 100.0);
    assert!(game.take_actions().is_empty());
    game.frame(200.0);
    assert_eq!(
        game.take_actions(),
        vec![HostAction::Navigate(SCOREBOARD_PATH.to_string())]
    );

    let board = fakes.board.borrow();
    let top = board.today_top();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].player_name, "NONAME");
    assert_eq!(top[0].score, score);

    let events = &fakes.analytics.borrow().events;
    assert_eq!(events.first(), Some(&AnalyticsEvent::GameStart));
    assert!(events.contains(&AnalyticsEvent::GameEnd { score }));
    assert!(events.contains(&AnalyticsEvent::ScoreSubmit {
        score,
        player_name: "NONAME".to_string(),
    }));
    assert_eq!(events.last(), Some(&AnalyticsEvent::LeaderboardView));

    // Browser has no app to notify
    assert!(fakes.bridge.borrow().sent.is_empty());
}

/// Storage that is out of room
struct FullStore;

impl KeyValueStore for FullStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&mut self, _key: &str, _value: &str) -> pocket_arcade::Result<()> {
        Err(ArcadeError::Storage("quota exceeded".to_string()))
    }
}

#[test]
fn test_storage_failure_shows_notice_instead_of_navigating() {
    let (mut services, fakes) = services(RecordingBridge::browser());
    services.leaderboard =
        Box::new(DailyLeaderboard::with_clock("scoreboard", || NOON).with_store(FullStore));
    let mut game = Variant::Symbol.build(11, services).unwrap();
    game.resize(390.0, 600.0);
    game.start();

    let actions = play_round(&mut game);
    assert!(game.score() > 0);
    assert_eq!(actions, vec![HostAction::Notify(Notice::submission_failed())]);

    game.frame(NAVIGATE_DELAY_MS + 100.0);
    assert!(game.take_actions().is_empty());
    let events = &fakes.analytics.borrow().events;
    assert!(!events.iter().any(|e| matches!(e, AnalyticsEvent::ScoreSubmit { .. })));
    assert!(!events.contains(&AnalyticsEvent::LeaderboardView));
}

#[test]
fn test_game_over_is_frozen() {
    let (services, _fakes) = services(RecordingBridge::browser());
    let mut game = Variant::Soccer.build(2, services).unwrap();
    game.start();
    play_round(&mut game);

    let score = game.score();
    let items: Vec<u64> = game.items().iter().map(|i| i.id).collect();
    for _ in 0..120 {
        game.frame(FRAME_MS);
    }
    assert_eq!(game.phase(), GamePhase::GameOver);
    assert_eq!(game.score(), score);
    assert_eq!(game.items().iter().map(|i| i.id).collect::<Vec<_>>(), items);
    if let Some(id) = items.first() {
        assert!(game.tap(*id).is_none());
    }
}

#[test]
fn test_second_round_does_not_resubmit_lower_score() {
    let (services, fakes) = services(RecordingBridge::browser());
    let mut game = Variant::Symbol.build(4, services).unwrap();
    game.start();
    play_round(&mut game);
    let first = game.score();

    // Second round without tapping anything scores zero
    game.reset();
    assert_eq!(game.phase(), GamePhase::Idle);
    assert_eq!(game.score(), 0);
    game.start();
    while !game.phase().is_over() {
        game.frame(FRAME_MS);
    }
    game.frame(NAVIGATE_DELAY_MS + 100.0);
    assert!(game.take_actions().is_empty());

    let board = fakes.board.borrow();
    assert_eq!(board.today_top()[0].score, first);
    let submits = fakes
        .analytics
        .borrow()
        .events
        .iter()
        .filter(|e| matches!(e, AnalyticsEvent::ScoreSubmit { .. }))
        .count();
    assert_eq!(submits, 1);
}

#[test]
fn test_native_round_trip() {
    let (mut services, fakes) = services(RecordingBridge::android());
    services.settings.require_native_app = true;
    services.identity.log_heart_id = Some("77".to_string());
    let mut game = Variant::Idol.build(8, services).unwrap();

    game.start();
    assert_eq!(game.phase(), GamePhase::AwaitingNativeApproval);
    assert_eq!(fakes.bridge.borrow().kinds(), vec![MessageKind::GameStartRequest]);

    // Payload arrives as a JSON string
    game.on_native_message(&json!("{\"type\":\"GAME_START_APPROVED\"}"));
    assert_eq!(game.phase(), GamePhase::Countdown(3));

    // Pause is acknowledged only
    game.on_native_message(&json!({ "type": "GAME_PAUSE" }));
    assert_eq!(game.phase(), GamePhase::Countdown(3));

    play_round(&mut game);
    let score = game.score();
    assert!(score > 0);

    let bridge = fakes.bridge.borrow();
    assert_eq!(
        bridge.kinds(),
        vec![MessageKind::GameStartRequest, MessageKind::GameEnd]
    );
    let data = bridge.sent[1].data.as_ref().unwrap();
    assert_eq!(data["score"], score);
    assert_eq!(data["log_heart_id"], "77");
    drop(bridge);

    game.back_button();
    assert_eq!(
        fakes.bridge.borrow().kinds().last(),
        Some(&MessageKind::BackButtonPressed)
    );
}

#[test]
fn test_reset_mid_round_cancels_everything() {
    let (services, _fakes) = services(RecordingBridge::browser());
    let mut game = Variant::Idol.build(5, services).unwrap();
    game.start();
    for _ in 0..400 {
        game.frame(FRAME_MS);
    }
    assert_eq!(game.phase(), GamePhase::Running);
    assert!(!game.items().is_empty());

    game.reset();
    game.reset();
    assert_eq!(game.phase(), GamePhase::Idle);
    assert!(game.items().is_empty());
    assert_eq!(game.time_left(), game.config().time_limit);

    // Nothing left over fires later
    for _ in 0..300 {
        game.frame(FRAME_MS);
    }
    assert_eq!(game.phase(), GamePhase::Idle);
    assert!(game.items().is_empty());
    assert!(game.take_actions().is_empty());
}
