//! Collaborators the engines talk to
//!
//! Each concern is a trait with a reference implementation. Engines receive a
//! [`Services`] bundle at construction instead of reaching for globals.

pub mod analytics;
pub mod bridge;
pub mod identity;
pub mod leaderboard;
pub mod telemetry;

pub use analytics::{Analytics, AnalyticsEvent, LogAnalytics, RecordingAnalytics};
pub use bridge::{
    MessageKind, NativeAppInfo, NativeBridge, NativeMessage, Platform, RecordingBridge,
    detect_native_app, parse_inbound,
};
pub use identity::{Flavor, Identity, KeyValueStore, MemoryStore, QueryParams};
pub use leaderboard::{DailyLeaderboard, Leaderboard, SubmitStatus};
pub use telemetry::{StateSnapshot, TelemetryClient, TelemetryKind, TelemetrySink};

use crate::settings::ArcadeSettings;

/// Everything an engine needs from the outside world
pub struct Services {
    pub leaderboard: Box<dyn Leaderboard>,
    pub bridge: Box<dyn NativeBridge>,
    pub analytics: Box<dyn Analytics>,
    pub telemetry: TelemetryClient,
    pub identity: Identity,
    pub settings: ArcadeSettings,
}

impl Services {
    /// Offline bundle: in-memory board, no native app, log-only telemetry
    pub fn offline(seed: u64) -> Self {
        let settings = ArcadeSettings::default();
        Self {
            leaderboard: Box::new(DailyLeaderboard::new("scoreboard")),
            bridge: Box::new(RecordingBridge::browser()),
            analytics: Box::new(LogAnalytics),
            telemetry: TelemetryClient::new(
                telemetry::LogSink,
                settings.enable_error_logging,
                seed,
            ),
            identity: Identity::default(),
            settings,
        }
    }

    pub fn native_info(&self) -> NativeAppInfo {
        self.bridge.info()
    }
}
