//! # Client-Side Prediction
//!
//! Local input is applied immediately and buffered. When the server
//! acknowledges a sequence together with fresh authoritative values, the
//! predicted state is measured against them:
//!
//! ```text
//! divergence = Σ |server − predicted|   over every shared field
//!
//! ≤ epsilon            nothing
//! ≤ threshold          lerp toward the server by alpha
//! > threshold          restore the server state, replay inputs after the ack
//! ```
//!
//! Replay goes through the same input mutation the server applies. An
//! input stays in force until the next one replaces it, so each replayed
//! input is integrated once per tick of its span:
//!
//! ```text
//! seq 6 @ 100ms ──────► seq 7 @ 180ms ──────► now 260ms
//!   5 steps of 16ms       5 steps of 16ms
//! ```

use std::collections::VecDeque;

use meridian_core::{Actions, EntityId, Event, InputState, Snapshot, Store, TickClock};

use crate::config::PredictionConfig;
use crate::simulation::replay_input;

/// One locally applied input.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    /// Input sequence.
    pub sequence: u32,
    /// Tick-clock time it was applied.
    pub timestamp: f64,
    /// Sampled input.
    pub input: InputState,
    /// Predicted state right after applying it.
    pub snapshot: Snapshot,
}

/// Outcome of one reconciliation check.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReconciliationResult {
    /// No authoritative state pending, prediction off, or no entity.
    Skipped,
    /// Within epsilon.
    NoCorrection {
        /// Measured divergence.
        divergence: f64,
    },
    /// Smoothed toward the server.
    SoftCorrection {
        /// Measured divergence.
        divergence: f64,
    },
    /// Rolled back and replayed.
    HardCorrection {
        /// Measured divergence.
        divergence: f64,
        /// Inputs replayed.
        replayed: usize,
    },
}

/// Sum of absolute field differences over the kinds both snapshots hold.
#[must_use]
pub fn divergence(server: &Snapshot, predicted: &Snapshot) -> f64 {
    server
        .iter()
        .filter_map(|(kind, values)| predicted.get(kind).map(|other| (values, other)))
        .flat_map(|(values, other)| values.iter().zip(other))
        .map(|(a, b)| (a - b).abs())
        .sum()
}

/// `true` if `a` comes after `b` in wrapping sequence order.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn sequence_after(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

/// Whole ticks of `delta_ms` between `from` and `until`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn replay_steps(from: f64, until: f64, delta_ms: f64) -> u32 {
    if delta_ms <= 0.0 || until <= from {
        return 0;
    }
    ((until - from) / delta_ms).round() as u32
}

/// Prediction state for the local entity.
#[derive(Debug)]
pub struct Prediction {
    config: PredictionConfig,
    history: VecDeque<HistoryEntry>,
    pending: Option<(Snapshot, u32)>,
    last_server_sequence: u32,
}

impl Prediction {
    /// Creates an empty prediction buffer.
    #[must_use]
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_size),
            config,
            pending: None,
            last_server_sequence: 0,
        }
    }

    /// Whether local prediction runs at all.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Buffered inputs, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    /// Last sequence the server acknowledged.
    #[must_use]
    pub const fn last_server_sequence(&self) -> u32 {
        self.last_server_sequence
    }

    /// Returns `true` if an authoritative snapshot awaits checking.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Buffers an applied input, dropping the oldest past `history_size`.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.history.push_back(entry);
        while self.history.len() > self.config.history_size {
            self.history.pop_front();
        }
    }

    /// Notes an acknowledged sequence without new authoritative values.
    pub fn acknowledge(&mut self, sequence: u32) {
        self.last_server_sequence = sequence;
    }

    /// Queues authoritative values tagged with the acknowledged sequence.
    pub fn receive(&mut self, snapshot: Snapshot, sequence: u32) {
        self.last_server_sequence = sequence;
        self.pending = Some((snapshot, sequence));
    }

    /// Checks the pending snapshot against `entity` and corrects it.
    ///
    /// The pending snapshot is consumed. Buffered inputs at or before the
    /// acknowledged sequence are dropped afterwards.
    pub fn reconcile(
        &mut self,
        store: &mut Store,
        actions: &mut Actions,
        clock: &TickClock,
        entity: EntityId,
        delta_ms: f64,
    ) -> ReconciliationResult {
        if !self.config.enabled || !store.exists(entity) {
            return ReconciliationResult::Skipped;
        }
        let Some((server, ack)) = self.pending.take() else {
            return ReconciliationResult::Skipped;
        };
        let Some(current) = store.snapshot(entity) else {
            return ReconciliationResult::Skipped;
        };

        let divergence = divergence(&server, &current);
        let result = if divergence > self.config.divergence_threshold {
            store.restore(entity, &server);
            let mut replayed = 0;
            let mut unacked = self.history.iter().filter(|e| sequence_after(e.sequence, ack)).peekable();
            while let Some(entry) = unacked.next() {
                let until = unacked.peek().map_or(clock.now(), |next| next.timestamp);
                let steps = replay_steps(entry.timestamp, until, delta_ms);
                replay_input(store, actions, clock, entity, entry.input, delta_ms, steps);
                replayed += 1;
            }
            store.events_mut().emit(&Event::Reconciled {
                entity,
                server_sequence: ack,
                divergence,
            });
            tracing::warn!(%entity, ack, divergence, replayed, "large divergence, rolled back");
            ReconciliationResult::HardCorrection { divergence, replayed }
        } else if divergence > self.config.epsilon {
            self.interpolate(store, entity, &server, &current);
            ReconciliationResult::SoftCorrection { divergence }
        } else {
            ReconciliationResult::NoCorrection { divergence }
        };

        self.history.retain(|e| sequence_after(e.sequence, ack));
        result
    }

    fn interpolate(&self, store: &mut Store, entity: EntityId, server: &Snapshot, current: &Snapshot) {
        let alpha = self.config.interpolation_alpha;
        for (kind, target) in server.iter() {
            let Some(predicted) = current.get(kind) else {
                continue;
            };
            let blended: Vec<f64> = predicted
                .iter()
                .zip(target)
                .map(|(p, t)| p + (t - p) * alpha)
                .collect();
            store.set(entity, kind, &blended);
        }
    }
}
