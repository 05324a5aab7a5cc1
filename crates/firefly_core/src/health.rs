//! crates/firefly_core/src/health.rs
//!
//! Rolling health statistics for the polling loop.
//!
//! A small state machine per error kind: `Healthy` while the consecutive
//! counter is zero, `Degrading` below the kind's threshold, `Alerting` at or
//! above it. Transitions into and out of `Alerting` are emitted exactly once
//! per edge crossing so the issue notifier never spams. The tracker is pure
//! (no clock, no I/O); the orchestrator feeds it outcomes and timestamps.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::ports::ErrorKind;

/// Consecutive failures of a kind tolerated before an issue is raised.
///
/// Connection and rate-limit problems are usually transient; data errors get
/// more slack because the last good snapshot keeps serving; credentials do
/// not self-heal, so authentication alerts immediately.
fn threshold_for(kind: ErrorKind) -> u32 {
    match kind {
        ErrorKind::Authentication => 1,
        ErrorKind::Connection => 3,
        ErrorKind::RateLimit => 3,
        ErrorKind::DataFormat => 5,
    }
}

/// An observable edge crossing, consumed by the issue notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    EnteredAlerting(ErrorKind),
    ClearedAlerting(ErrorKind),
}

/// Rolling state for a single error kind.
#[derive(Debug, Clone, Serialize)]
pub struct KindHealth {
    pub consecutive: u32,
    pub threshold: u32,
    pub alerting: bool,
}

/// Read-only view of the tracker for the diagnostics surface.
#[derive(Debug, Clone, Serialize)]
pub struct HealthState {
    pub total_cycles: u64,
    pub successful_cycles: u64,
    pub failed_cycles: u64,
    pub last_update_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub last_failure_time: Option<DateTime<Utc>>,
    /// Lifetime failure counts by kind. Never reset.
    pub error_counts: HashMap<ErrorKind, u64>,
    pub kinds: HashMap<ErrorKind, KindHealth>,
}

/// Tracks cycle outcomes and decides when sustained-failure thresholds are
/// crossed or cleared.
#[derive(Debug)]
pub struct HealthTracker {
    kinds: HashMap<ErrorKind, KindHealth>,
    total_cycles: u64,
    successful_cycles: u64,
    failed_cycles: u64,
    error_counts: HashMap<ErrorKind, u64>,
    last_update_time: Option<DateTime<Utc>>,
    last_success_time: Option<DateTime<Utc>>,
    last_failure_time: Option<DateTime<Utc>>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        let kinds = ErrorKind::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind,
                    KindHealth {
                        consecutive: 0,
                        threshold: threshold_for(kind),
                        alerting: false,
                    },
                )
            })
            .collect();
        Self {
            kinds,
            total_cycles: 0,
            successful_cycles: 0,
            failed_cycles: 0,
            error_counts: HashMap::new(),
            last_update_time: None,
            last_success_time: None,
            last_failure_time: None,
        }
    }

    /// Record a failed cycle of the given kind.
    ///
    /// Increments that kind's consecutive counter (other kinds are
    /// untouched) and emits `EnteredAlerting` exactly when the counter
    /// first reaches the threshold.
    pub fn record_failure(&mut self, kind: ErrorKind, now: DateTime<Utc>) -> Vec<HealthTransition> {
        self.total_cycles += 1;
        self.failed_cycles += 1;
        self.last_update_time = Some(now);
        self.last_failure_time = Some(now);
        *self.error_counts.entry(kind).or_insert(0) += 1;

        let entry = self
            .kinds
            .get_mut(&kind)
            .expect("all kinds present in table");
        entry.consecutive += 1;

        if !entry.alerting && entry.consecutive >= entry.threshold {
            entry.alerting = true;
            return vec![HealthTransition::EnteredAlerting(kind)];
        }
        Vec::new()
    }

    /// Record a successful cycle.
    ///
    /// Zeroes every kind's consecutive counter and emits `ClearedAlerting`
    /// for each kind that was alerting. Lifetime counters are additive and
    /// are never reset.
    pub fn record_success(&mut self, now: DateTime<Utc>) -> Vec<HealthTransition> {
        self.total_cycles += 1;
        self.successful_cycles += 1;
        self.last_update_time = Some(now);
        self.last_success_time = Some(now);

        let mut transitions = Vec::new();
        for (kind, entry) in self.kinds.iter_mut() {
            entry.consecutive = 0;
            if entry.alerting {
                entry.alerting = false;
                transitions.push(HealthTransition::ClearedAlerting(*kind));
            }
        }
        transitions
    }

    pub fn last_success_time(&self) -> Option<DateTime<Utc>> {
        self.last_success_time
    }

    /// Read-only snapshot for diagnostics reporting.
    pub fn state(&self) -> HealthState {
        HealthState {
            total_cycles: self.total_cycles,
            successful_cycles: self.successful_cycles,
            failed_cycles: self.failed_cycles,
            last_update_time: self.last_update_time,
            last_success_time: self.last_success_time,
            last_failure_time: self.last_failure_time,
            error_counts: self.error_counts.clone(),
            kinds: self.kinds.clone(),
        }
    }
}
