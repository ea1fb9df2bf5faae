//! Anomaly telemetry
//!
//! Only errors and anomalies are recorded. Events are buffered and flushed to a
//! [`TelemetrySink`] in debounced batches; delivery never blocks gameplay and a
//! failed batch is put back for the next flush.

use std::cell::RefCell;
use std::rc::Rc;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::error::{ArcadeError, Result};

/// Quiet period before buffered events are delivered (ms)
pub const FLUSH_DELAY_MS: f64 = 2000.0;
/// Failed batches are only re-queued while the buffer is smaller than this
pub const REQUEUE_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKind {
    CountdownAnomaly,
    GameOverUnexpected,
    StateAnomaly,
    Error,
}

/// Minimal game state attached to each event
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub game_started: bool,
    pub game_over: bool,
    pub countdown: Option<i32>,
    pub time_left: i32,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub kind: TelemetryKind,
    pub message: String,
    pub state: Option<StateSnapshot>,
    pub timestamp_ms: f64,
    pub session_id: String,
}

/// Destination for flushed batches
pub trait TelemetrySink {
    fn deliver(&mut self, batch: &[TelemetryEvent]) -> Result<()>;
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Rc<RefCell<T>> {
    fn deliver(&mut self, batch: &[TelemetryEvent]) -> Result<()> {
        self.borrow_mut().deliver(batch)
    }
}

/// Writes batches to the log as JSON
#[derive(Debug, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn deliver(&mut self, batch: &[TelemetryEvent]) -> Result<()> {
        let json = serde_json::to_string(batch)?;
        log::info!("[telemetry] {} events: {}", batch.len(), json);
        Ok(())
    }
}

/// Keeps delivered batches in memory; can be told to fail
#[derive(Debug, Default)]
pub struct MemorySink {
    pub batches: Vec<Vec<TelemetryEvent>>,
    pub fail_next: usize,
}

impl MemorySink {
    pub fn delivered(&self) -> impl Iterator<Item = &TelemetryEvent> {
        self.batches.iter().flatten()
    }
}

impl TelemetrySink for MemorySink {
    fn deliver(&mut self, batch: &[TelemetryEvent]) -> Result<()> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(ArcadeError::Telemetry("sink unavailable".into()));
        }
        self.batches.push(batch.to_vec());
        Ok(())
    }
}

/// Lowercase base-36 rendering of an integer
pub fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Buffered telemetry for one game session
pub struct TelemetryClient {
    enabled: bool,
    session_id: Option<String>,
    buffer: Vec<TelemetryEvent>,
    clock_ms: f64,
    flush_due_ms: Option<f64>,
    sink: Box<dyn TelemetrySink>,
    rng: Pcg32,
}

impl TelemetryClient {
    pub fn new(sink: impl TelemetrySink + 'static, enabled: bool, seed: u64) -> Self {
        Self {
            enabled,
            session_id: None,
            buffer: Vec::new(),
            clock_ms: 0.0,
            flush_due_ms: None,
            sink: Box::new(sink),
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Client that logs nothing
    pub fn disabled() -> Self {
        Self::new(LogSink, false, 0)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Begin a new session and return its id (`base36(ms)-xxxx`)
    pub fn start_session(&mut self) -> &str {
        const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let ts = to_base36(crate::now_ms().max(0.0) as u64);
        let suffix: String = (0..4)
            .map(|_| DIGITS[self.rng.random_range(0..36)] as char)
            .collect();
        self.session_id.insert(format!("{}-{}", ts, suffix))
    }

    /// Current session id, starting one if needed
    pub fn session_id(&mut self) -> String {
        match &self.session_id {
            Some(id) => id.clone(),
            None => self.start_session().to_string(),
        }
    }

    /// Session id if one is open
    pub fn active_session(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Flush what is buffered and forget the session id
    pub fn end_session(&mut self) {
        self.flush();
        self.session_id = None;
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Buffer an event and push the flush deadline back
    pub fn log(&mut self, kind: TelemetryKind, message: &str, state: Option<StateSnapshot>) {
        if !self.enabled {
            return;
        }
        log::warn!("[GameLog:{:?}] {} {:?}", kind, message, state);

        let event = TelemetryEvent {
            kind,
            message: message.to_string(),
            state,
            timestamp_ms: crate::now_ms(),
            session_id: self.session_id(),
        };
        self.buffer.push(event);
        self.flush_due_ms = Some(self.clock_ms + FLUSH_DELAY_MS);
    }

    pub fn log_error(&mut self, message: &str, state: Option<StateSnapshot>) {
        self.log(TelemetryKind::Error, message, state);
    }

    pub fn log_countdown_anomaly(&mut self, countdown: i32, state: Option<StateSnapshot>) {
        self.log(
            TelemetryKind::CountdownAnomaly,
            &format!("Countdown anomaly: {}", countdown),
            state,
        );
    }

    pub fn log_unexpected_game_over(&mut self, reason: &str, state: Option<StateSnapshot>) {
        self.log(
            TelemetryKind::GameOverUnexpected,
            &format!("Unexpected game over: {}", reason),
            state,
        );
    }

    pub fn log_state_anomaly(&mut self, anomaly: &str, state: Option<StateSnapshot>) {
        self.log(TelemetryKind::StateAnomaly, anomaly, state);
    }

    /// Record any of the known inconsistent state combinations
    pub fn check_and_log_anomalies(&mut self, state: &StateSnapshot) {
        if !self.enabled {
            return;
        }
        if let Some(n) = state.countdown {
            if n < 0 {
                self.log_countdown_anomaly(n, Some(*state));
            }
        }
        if state.game_over && !state.game_started {
            self.log_state_anomaly("Game over without game started", Some(*state));
        }
        if state.game_started && state.time_left == 0 && !state.game_over {
            self.log_state_anomaly("TimeLeft=0 but gameOver not set", Some(*state));
        }
    }

    /// Advance the debounce clock; flushes once the quiet period has passed
    pub fn tick(&mut self, elapsed_ms: f64) {
        self.clock_ms += elapsed_ms;
        if let Some(due) = self.flush_due_ms {
            if self.clock_ms >= due {
                self.flush_due_ms = None;
                self.flush();
            }
        }
    }

    /// Deliver the buffer now
    pub fn flush(&mut self) {
        self.flush_due_ms = None;
        if self.buffer.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.buffer);
        if let Err(e) = self.sink.deliver(&batch) {
            log::error!("[telemetry] Failed to flush logs: {}", e);
            if self.buffer.len() < REQUEUE_LIMIT {
                let newer = std::mem::replace(&mut self.buffer, batch);
                self.buffer.extend(newer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> (TelemetryClient, Rc<RefCell<MemorySink>>) {
        let sink = Rc::new(RefCell::new(MemorySink::default()));
        (TelemetryClient::new(sink.clone(), true, 3), sink)
    }

    #[test]
    fn test_session_id_shape() {
        let (mut t, _) = client();
        let id = t.start_session().to_string();
        let (ts, suffix) = id.split_once('-').unwrap();
        assert!(!ts.is_empty());
        assert_eq!(suffix.len(), 4);
        assert!(id.chars().all(|c| c == '-' || c.is_ascii_alphanumeric()));
        assert_eq!(t.session_id(), id);
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_flush_is_debounced() {
        let (mut t, sink) = client();
        t.log_error("first", None);
        t.tick(1500.0);
        t.log_error("second", None);
        t.tick(1500.0);
        assert!(sink.borrow().batches.is_empty());

        t.tick(600.0);
        assert_eq!(sink.borrow().batches.len(), 1);
        assert_eq!(sink.borrow().batches[0].len(), 2);
        assert_eq!(t.pending(), 0);
    }

    #[test]
    fn test_failed_flush_requeues() {
        let (mut t, sink) = client();
        sink.borrow_mut().fail_next = 1;
        t.log_error("lost?", None);
        t.flush();
        assert_eq!(t.pending(), 1);

        t.flush();
        assert_eq!(t.pending(), 0);
        assert_eq!(sink.borrow().delivered().count(), 1);
    }

    #[test]
    fn test_disabled_client_is_silent() {
        let sink = Rc::new(RefCell::new(MemorySink::default()));
        let mut t = TelemetryClient::new(sink.clone(), false, 0);
        t.check_and_log_anomalies(&StateSnapshot {
            game_over: true,
            ..Default::default()
        });
        t.flush();
        assert_eq!(t.pending(), 0);
        assert!(sink.borrow().batches.is_empty());
    }

    #[test]
    fn test_anomaly_rules() {
        let (mut t, sink) = client();
        t.check_and_log_anomalies(&StateSnapshot {
            countdown: Some(-1),
            ..Default::default()
        });
        t.check_and_log_anomalies(&StateSnapshot {
            game_over: true,
            game_started: false,
            time_left: 10,
            ..Default::default()
        });
        t.check_and_log_anomalies(&StateSnapshot {
            game_started: true,
            time_left: 0,
            ..Default::default()
        });
        // Healthy running state logs nothing
        t.check_and_log_anomalies(&StateSnapshot {
            game_started: true,
            time_left: 12,
            ..Default::default()
        });
        t.end_session();

        let kinds: Vec<TelemetryKind> = sink.borrow().delivered().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TelemetryKind::CountdownAnomaly,
                TelemetryKind::StateAnomaly,
                TelemetryKind::StateAnomaly
            ]
        );
    }

    #[test]
    fn test_events_share_session() {
        let (mut t, sink) = client();
        t.log_error("a", None);
        t.log_error("b", None);
        t.end_session();
        let ids: Vec<String> = sink.borrow().delivered().map(|e| e.session_id.clone()).collect();
        assert_eq!(ids[0], ids[1]);
    }
}
