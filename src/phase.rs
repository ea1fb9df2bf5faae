//! Game phase state machine
//!
//! Both engines move through the same phases. Every change goes through
//! [`transition`], which rejects anything that is not a legal edge, so the
//! engines never end up holding a contradictory flag combination.

use serde::{Deserialize, Serialize};

use crate::error::{ArcadeError, Result};

/// Current phase of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GamePhase {
    /// Start screen, start button enabled
    #[default]
    Idle,
    /// Start requested from the native app, waiting for approval
    AwaitingNativeApproval,
    /// Game is gated to the native app and none was detected
    NativeRequired,
    /// Pre-game countdown (3, 2, 1)
    Countdown(u8),
    /// Active gameplay
    Running,
    /// Run ended
    GameOver,
}

/// Inputs that drive phase changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseEvent {
    /// Start pressed and the native app must approve first
    RequestApproval,
    /// Start pressed but the native app is mandatory and missing
    NativeUnavailable,
    /// Start approved (directly or by the native app); a zero countdown
    /// goes straight to `Running`
    Begin { countdown: u8 },
    /// One countdown second elapsed
    CountdownTick,
    /// Native app re-enabled the start button
    ActivateStartButton,
    /// Collision, timer expiry or any other terminal condition
    Finish,
    /// Back to the start screen
    Reset,
}

impl GamePhase {
    /// Start button is clickable
    pub fn start_button_enabled(&self) -> bool {
        matches!(self, GamePhase::Idle)
    }

    /// Start was pressed and is still being processed
    pub fn is_processing_start(&self) -> bool {
        matches!(self, GamePhase::AwaitingNativeApproval)
    }

    /// Show the "open this in the app" message
    pub fn show_native_message(&self) -> bool {
        matches!(self, GamePhase::NativeRequired)
    }

    /// Gameplay has started (and maybe already ended)
    pub fn is_started(&self) -> bool {
        matches!(self, GamePhase::Running | GamePhase::GameOver)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, GamePhase::Running)
    }

    pub fn is_over(&self) -> bool {
        matches!(self, GamePhase::GameOver)
    }

    /// Remaining countdown seconds, if counting down
    pub fn countdown(&self) -> Option<u8> {
        match self {
            GamePhase::Countdown(n) => Some(*n),
            _ => None,
        }
    }
}

/// Compute the phase that follows `from` on `event`
pub fn transition(from: GamePhase, event: PhaseEvent) -> Result<GamePhase> {
    use GamePhase::*;

    let next = match (from, event) {
        (_, PhaseEvent::Reset) => Some(Idle),

        (Idle, PhaseEvent::RequestApproval) => Some(AwaitingNativeApproval),
        (Idle, PhaseEvent::NativeUnavailable) => Some(NativeRequired),

        (Idle | AwaitingNativeApproval, PhaseEvent::Begin { countdown }) => Some(if countdown == 0 {
            Running
        } else {
            Countdown(countdown)
        }),

        (Idle | AwaitingNativeApproval | NativeRequired, PhaseEvent::ActivateStartButton) => Some(Idle),

        (Countdown(n), PhaseEvent::CountdownTick) => Some(if n <= 1 { Running } else { Countdown(n - 1) }),

        (Running, PhaseEvent::Finish) => Some(GameOver),

        _ => None,
    };

    next.ok_or(ArcadeError::IllegalTransition { from, event })
}
