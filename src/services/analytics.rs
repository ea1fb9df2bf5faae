//! Analytics events (fire and forget)

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    GameStart,
    GameEnd { score: u32 },
    ScoreSubmit { score: u32, player_name: String },
    LeaderboardView,
}

impl AnalyticsEvent {
    /// gtag event name
    pub fn name(&self) -> &'static str {
        match self {
            AnalyticsEvent::GameStart => "game_start",
            AnalyticsEvent::GameEnd { .. } => "game_end",
            AnalyticsEvent::ScoreSubmit { .. } => "score_submit",
            AnalyticsEvent::LeaderboardView => "page_view",
        }
    }

    /// gtag event parameters
    pub fn params(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            AnalyticsEvent::GameStart => json!({
                "event_category": "game",
                "event_label": "Game Started",
            }),
            AnalyticsEvent::GameEnd { score } => json!({
                "event_category": "game",
                "event_label": "Game Ended",
                "value": score,
            }),
            AnalyticsEvent::ScoreSubmit { score, player_name } => json!({
                "event_category": "leaderboard",
                "event_label": "Score Submitted",
                "value": score,
                "player_name": player_name,
            }),
            AnalyticsEvent::LeaderboardView => json!({
                "page_title": "Leaderboard",
                "page_path": crate::consts::SCOREBOARD_PATH,
            }),
        }
    }
}

pub trait Analytics {
    fn track(&mut self, event: AnalyticsEvent);
}

impl<T: Analytics + ?Sized> Analytics for Rc<RefCell<T>> {
    fn track(&mut self, event: AnalyticsEvent) {
        self.borrow_mut().track(event)
    }
}

/// Debug-logs events and drops them
#[derive(Debug, Default)]
pub struct LogAnalytics;

impl Analytics for LogAnalytics {
    fn track(&mut self, event: AnalyticsEvent) {
        log::debug!("analytics: {} {}", event.name(), event.params());
    }
}

#[derive(Debug, Default)]
pub struct RecordingAnalytics {
    pub events: Vec<AnalyticsEvent>,
}

impl Analytics for RecordingAnalytics {
    fn track(&mut self, event: AnalyticsEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gtag_params() {
        let e = AnalyticsEvent::ScoreSubmit {
            score: 12,
            player_name: "ANN".into(),
        };
        assert_eq!(e.name(), "score_submit");
        assert_eq!(e.params()["value"], 12);
        assert_eq!(e.params()["player_name"], "ANN");
        assert_eq!(AnalyticsEvent::LeaderboardView.params()["page_path"], "/scoreboard");
    }
}
