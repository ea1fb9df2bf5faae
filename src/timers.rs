//! Engine-owned scheduled callbacks
//!
//! Countdown ticks, the game clock, spawn delays and navigation delays all live
//! in a [`TimerQueue`] driven by the frame loop. Clearing the queue cancels
//! every pending callback, so a reset can never be followed by an orphaned
//! timer from the previous game.

use serde::{Deserialize, Serialize};

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Timer<K> {
    id: TimerId,
    due_ms: f64,
    interval_ms: Option<f64>,
    kind: K,
}

/// Pending timers in simulated milliseconds
#[derive(Debug, Clone)]
pub struct TimerQueue<K> {
    now_ms: f64,
    next_id: u64,
    pending: Vec<Timer<K>>,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> TimerQueue<K> {
    pub fn new() -> Self {
        Self {
            now_ms: 0.0,
            next_id: 1,
            pending: Vec::new(),
        }
    }

    /// Simulated time consumed so far
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    fn push(&mut self, delay_ms: f64, interval_ms: Option<f64>, kind: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push(Timer {
            id,
            due_ms: self.now_ms + delay_ms.max(0.0),
            interval_ms,
            kind,
        });
        id
    }

    /// Fire `kind` once after `delay_ms`
    pub fn schedule(&mut self, delay_ms: f64, kind: K) -> TimerId {
        self.push(delay_ms, None, kind)
    }

    /// Fire `kind` every `interval_ms` until cancelled
    pub fn schedule_repeating(&mut self, interval_ms: f64, kind: K) -> TimerId {
        let interval = interval_ms.max(1.0);
        self.push(interval, Some(interval), kind)
    }

    /// Cancel a timer; returns false if it already fired or was cancelled
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|t| t.id != id);
        self.pending.len() != before
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.iter().any(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending timer
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Pop the earliest timer due at or before `until_ms`.
    ///
    /// The clock jumps to that timer's due time so that anything scheduled
    /// from its handler is measured from when it fired, not from the end of
    /// the frame. Repeating timers are re-armed. Call [`Self::settle`] once no
    /// timer is left due.
    pub fn pop_due(&mut self, until_ms: f64) -> Option<(TimerId, K)>
    where
        K: Clone,
    {
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_ms <= until_ms)
            .min_by(|(_, a), (_, b)| {
                a.due_ms
                    .partial_cmp(&b.due_ms)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.id.0.cmp(&b.id.0))
            })
            .map(|(i, _)| i)?;

        let due = self.pending[idx].due_ms;
        self.now_ms = self.now_ms.max(due);

        let fired = (self.pending[idx].id, self.pending[idx].kind.clone());
        match self.pending[idx].interval_ms {
            Some(interval) => self.pending[idx].due_ms += interval,
            None => {
                self.pending.swap_remove(idx);
            }
        }
        Some(fired)
    }

    /// Move the clock forward to `until_ms` after all due timers were popped
    pub fn settle(&mut self, until_ms: f64) {
        self.now_ms = self.now_ms.max(until_ms);
    }
}
