//! crates/firefly_core/src/coordinator.rs
//!
//! The update coordinator: owns the current snapshot, runs the polling
//! loop, and composes the fetch orchestrator, health tracker, issue
//! registry and view projector.
//!
//! One cycle fetches events and tasks for every tracked child. A single
//! child's failure aborts the whole cycle so no partial snapshot is ever
//! published; all entities go stale together instead of silently mixing
//! fresh and old per-child data. On failure the previous snapshot keeps
//! serving reads.

use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{Child, ChildData, Snapshot};
use crate::health::{HealthState, HealthTracker};
use crate::issues::{Issue, IssueRegistry};
use crate::ports::{FireflyApi, FireflyResult};
use crate::views::{self, DerivedView, ViewKind, ViewOptions};

/// Events are fetched this many days ahead to cover month-ahead calendar
/// consumers.
const CALENDAR_WINDOW_DAYS: i64 = 30;

/// Errors answering a view read.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ViewError {
    /// No snapshot has been published yet (startup, or every cycle so far
    /// has failed).
    #[error("no data has been fetched yet")]
    NoDataYet,
    /// The snapshot exists but does not contain this child.
    #[error("unknown child: {0}")]
    UnknownChild(String),
}

/// Static configuration for the coordinator, consumed at construction.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub view: ViewOptions,
    /// Fixed polling cadence (15-60 minutes; validated by the caller).
    pub scan_interval: std::time::Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            view: ViewOptions::default(),
            scan_interval: std::time::Duration::from_secs(15 * 60),
        }
    }
}

/// Manages fetching Firefly data and exposes the latest snapshot plus
/// derived views to downstream consumers.
pub struct UpdateCoordinator {
    api: Arc<dyn FireflyApi>,
    children: Vec<Child>,
    options: CoordinatorOptions,
    /// Replaced atomically on success, never mutated in place.
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    health: Mutex<HealthTracker>,
    issues: IssueRegistry,
    /// One-cycle-at-a-time gate: timer ticks and manual refreshes serialize
    /// here.
    cycle_gate: tokio::sync::Mutex<()>,
    refresh: Notify,
    last_update_success: AtomicBool,
}

impl UpdateCoordinator {
    pub fn new(api: Arc<dyn FireflyApi>, children: Vec<Child>, options: CoordinatorOptions) -> Self {
        Self {
            api,
            children,
            options,
            snapshot: RwLock::new(None),
            health: Mutex::new(HealthTracker::new()),
            issues: IssueRegistry::new(),
            cycle_gate: tokio::sync::Mutex::new(()),
            refresh: Notify::new(),
            last_update_success: AtomicBool::new(false),
        }
    }

    //=====================================================================================
    // Fetch Orchestration
    //=====================================================================================

    /// Execute one polling cycle.
    ///
    /// On success the new snapshot is published atomically. On failure the
    /// classified error is fed to the health tracker, issues are raised on
    /// threshold edges, and the previous snapshot is retained.
    pub async fn run_cycle(&self) -> FireflyResult<()> {
        let _gate = self.cycle_gate.lock().await;

        let started = Utc::now();
        let today_start = views::start_of_local_day(started, self.options.view.timezone);
        let calendar_end = today_start + Duration::days(CALENDAR_WINDOW_DAYS);

        let fetches = self
            .children
            .iter()
            .map(|child| self.fetch_child_data(child, today_start, calendar_end));

        match try_join_all(fetches).await {
            Ok(children_data) => {
                let produced_at = Utc::now();
                let snapshot = Arc::new(Snapshot {
                    produced_at,
                    children: children_data.into_iter().collect(),
                });
                self.log_cycle(&snapshot);

                *self.snapshot.write().expect("snapshot lock poisoned") = Some(snapshot);
                self.last_update_success.store(true, Ordering::SeqCst);

                let transitions = self
                    .health
                    .lock()
                    .expect("health lock poisoned")
                    .record_success(produced_at);
                self.issues.apply(&transitions, produced_at);
                Ok(())
            }
            Err(err) => {
                let kind = err.kind();
                let failed_at = Utc::now();
                warn!(kind = %kind, error = %err, "update cycle failed");

                self.last_update_success.store(false, Ordering::SeqCst);
                let transitions = self
                    .health
                    .lock()
                    .expect("health lock poisoned")
                    .record_failure(kind, failed_at);
                self.issues.apply(&transitions, failed_at);
                Err(err)
            }
        }
    }

    /// Fetch one child's events and tasks. Children are independent, so the
    /// orchestrator runs these concurrently.
    async fn fetch_child_data(
        &self,
        child: &Child,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> FireflyResult<(String, ChildData)> {
        let mut events = self
            .api
            .fetch_events(&child.guid, window_start, window_end)
            .await?;
        let tasks = self.api.fetch_tasks(&child.guid).await?;
        events.sort_by_key(|e| e.start);

        Ok((
            child.guid.clone(),
            ChildData {
                child: child.clone(),
                events,
                tasks,
            },
        ))
    }

    fn log_cycle(&self, snapshot: &Snapshot) {
        let total_events: usize = snapshot.children.values().map(|c| c.events.len()).sum();
        let total_tasks: usize = snapshot.children.values().map(|c| c.tasks.len()).sum();
        debug!(
            children = snapshot.children.len(),
            events = total_events,
            tasks = total_tasks,
            "updated Firefly data"
        );
    }

    //=====================================================================================
    // Polling Loop
    //=====================================================================================

    /// Run the polling loop until cancelled.
    ///
    /// Fires on the fixed interval and additionally whenever
    /// [`trigger_manual_refresh`](Self::trigger_manual_refresh) is called;
    /// the cycle gate keeps at most one orchestrator run in flight.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let period = self.options.scan_interval;
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(interval_secs = period.as_secs(), "polling loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("polling loop stopped");
                    return;
                }
                _ = interval.tick() => {}
                _ = self.refresh.notified() => {
                    debug!("manual refresh requested");
                }
            }

            // Failures are already tracked and logged inside the cycle; the
            // loop just keeps going.
            let _ = self.run_cycle().await;
        }
    }

    /// Request an extra cycle outside the fixed cadence.
    pub fn trigger_manual_refresh(&self) {
        self.refresh.notify_one();
    }

    //=====================================================================================
    // Read API
    //=====================================================================================

    /// The latest published snapshot, possibly stale if cycles are failing.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot
            .read()
            .expect("snapshot lock poisoned")
            .clone()
    }

    /// Compute one derived view for a child from the current snapshot.
    pub fn view(
        &self,
        child_guid: &str,
        kind: ViewKind,
        now: DateTime<Utc>,
    ) -> Result<DerivedView, ViewError> {
        let snapshot = self.snapshot().ok_or(ViewError::NoDataYet)?;
        let data = snapshot
            .child(child_guid)
            .ok_or_else(|| ViewError::UnknownChild(child_guid.to_string()))?;
        Ok(views::project(data, kind, now, &self.options.view))
    }

    pub fn last_update_succeeded(&self) -> bool {
        self.last_update_success.load(Ordering::SeqCst)
    }

    /// Rolling and lifetime health statistics for the diagnostics surface.
    pub fn statistics(&self) -> HealthState {
        self.health.lock().expect("health lock poisoned").state()
    }

    pub fn open_issues(&self) -> Vec<Issue> {
        self.issues.open_issues()
    }

    /// Whether an authentication failure has armed the external re-auth flow.
    pub fn reauth_required(&self) -> bool {
        self.issues.reauth_required()
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn view_options(&self) -> &ViewOptions {
        &self.options.view
    }
}
