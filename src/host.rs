//! What the page host sees of a game

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transient toast shown by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn submission_failed() -> Self {
        Self {
            title: "Submission Failed".to_string(),
            description: "Please try again later".to_string(),
        }
    }
}

/// Side effects a game asks the host to perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostAction {
    Navigate(String),
    Notify(Notice),
}

/// Common surface of the runner and the falling-item games
pub trait Minigame {
    /// Start button pressed
    fn start(&mut self);
    /// Back to the start screen; cancels every pending timer
    fn reset(&mut self);
    /// Advance by `elapsed_ms` of wall time
    fn frame(&mut self, elapsed_ms: f64);
    /// Tap/click at canvas coordinates
    fn pointer(&mut self, x: f32, y: f32);
    /// Raw `message` event payload from the native app
    fn on_native_message(&mut self, payload: &Value);
    /// Close button pressed
    fn back_button(&mut self);
    /// Drain host actions produced since the last call
    fn take_actions(&mut self) -> Vec<HostAction>;
    /// Canvas size changed
    fn resize(&mut self, width: f32, height: f32);
    fn score(&self) -> u32;
}
