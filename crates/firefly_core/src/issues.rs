//! crates/firefly_core/src/issues.rs
//!
//! Standing user-visible issues, keyed by error kind.
//!
//! The registry is driven purely by health-tracker transitions: entering
//! `Alerting` raises an issue, leaving it dismisses one. Both operations are
//! idempotent. Authentication issues additionally arm the external
//! re-authentication flow.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::health::HealthTransition;
use crate::ports::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Warning,
    Error,
}

/// A standing problem record shown to the user until its kind recovers.
#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub kind: ErrorKind,
    pub severity: IssueSeverity,
    pub description: String,
    pub raised_at: DateTime<Utc>,
}

fn severity_for(kind: ErrorKind) -> IssueSeverity {
    match kind {
        ErrorKind::Authentication => IssueSeverity::Error,
        ErrorKind::Connection | ErrorKind::RateLimit | ErrorKind::DataFormat => {
            IssueSeverity::Warning
        }
    }
}

fn description_for(kind: ErrorKind) -> String {
    match kind {
        ErrorKind::Authentication => {
            "Firefly credentials were rejected. Re-authentication is required.".to_string()
        }
        ErrorKind::Connection => {
            "Repeated failures connecting to Firefly. Last known data is still being served."
                .to_string()
        }
        ErrorKind::RateLimit => {
            "Firefly is rate limiting requests. Consider increasing the polling interval."
                .to_string()
        }
        ErrorKind::DataFormat => {
            "Firefly returned malformed data repeatedly. Last known data is still being served."
                .to_string()
        }
    }
}

/// In-memory issue registry.
#[derive(Debug, Default)]
pub struct IssueRegistry {
    issues: Mutex<HashMap<ErrorKind, Issue>>,
    reauth_required: AtomicBool,
}

impl IssueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch of health transitions.
    pub fn apply(&self, transitions: &[HealthTransition], now: DateTime<Utc>) {
        for transition in transitions {
            match *transition {
                HealthTransition::EnteredAlerting(kind) => self.raise(kind, now),
                HealthTransition::ClearedAlerting(kind) => self.dismiss(kind),
            }
        }
    }

    /// Raise (or refresh) the standing issue for a kind. Idempotent.
    pub fn raise(&self, kind: ErrorKind, now: DateTime<Utc>) {
        let issue = Issue {
            kind,
            severity: severity_for(kind),
            description: description_for(kind),
            raised_at: now,
        };
        let mut issues = self.issues.lock().expect("issue registry poisoned");
        if issues.insert(kind, issue).is_none() {
            tracing::warn!(kind = %kind, "raised standing issue");
        }
        if kind == ErrorKind::Authentication {
            self.reauth_required.store(true, Ordering::SeqCst);
        }
    }

    /// Dismiss the standing issue for a kind. Removing an absent record is a
    /// no-op.
    pub fn dismiss(&self, kind: ErrorKind) {
        let mut issues = self.issues.lock().expect("issue registry poisoned");
        if issues.remove(&kind).is_some() {
            tracing::info!(kind = %kind, "dismissed standing issue");
        }
    }

    /// Currently open issues, most severe first.
    pub fn open_issues(&self) -> Vec<Issue> {
        let issues = self.issues.lock().expect("issue registry poisoned");
        let mut open: Vec<Issue> = issues.values().cloned().collect();
        open.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.kind.cmp(&b.kind)));
        open
    }

    /// Whether the re-authentication flow has been armed.
    pub fn reauth_required(&self) -> bool {
        self.reauth_required.load(Ordering::SeqCst)
    }

    /// Consume the re-authentication request, returning whether one was
    /// pending. Called by the external credential-exchange flow.
    pub fn take_reauth_request(&self) -> bool {
        self.reauth_required.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2024-03-04T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn raise_and_dismiss_are_idempotent() {
        let registry = IssueRegistry::new();
        registry.raise(ErrorKind::Connection, now());
        registry.raise(ErrorKind::Connection, now());
        assert_eq!(registry.open_issues().len(), 1);

        registry.dismiss(ErrorKind::Connection);
        registry.dismiss(ErrorKind::Connection);
        assert!(registry.open_issues().is_empty());
    }

    #[test]
    fn authentication_issue_arms_reauth() {
        let registry = IssueRegistry::new();
        assert!(!registry.reauth_required());

        registry.raise(ErrorKind::Authentication, now());
        assert!(registry.reauth_required());

        // Taking the request clears the flag.
        assert!(registry.take_reauth_request());
        assert!(!registry.take_reauth_request());
    }

    #[test]
    fn transitions_drive_the_registry() {
        let registry = IssueRegistry::new();
        registry.apply(
            &[HealthTransition::EnteredAlerting(ErrorKind::RateLimit)],
            now(),
        );
        assert_eq!(registry.open_issues()[0].kind, ErrorKind::RateLimit);

        registry.apply(
            &[HealthTransition::ClearedAlerting(ErrorKind::RateLimit)],
            now(),
        );
        assert!(registry.open_issues().is_empty());
    }

    #[test]
    fn severity_orders_errors_before_warnings() {
        let registry = IssueRegistry::new();
        registry.raise(ErrorKind::Connection, now());
        registry.raise(ErrorKind::Authentication, now());

        let open = registry.open_issues();
        assert_eq!(open[0].severity, IssueSeverity::Error);
        assert_eq!(open[1].severity, IssueSeverity::Warning);
    }
}
