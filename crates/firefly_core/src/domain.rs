//! crates/firefly_core/src/domain.rs
//!
//! Defines the pure, core data structures for the engine.
//! These structs are independent of the Firefly wire format; the transport
//! adapter is responsible for converting raw payloads into them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// A tracked child (or the account holder themselves, for student accounts).
///
/// The set of children is discovered once at setup and is immutable for the
/// lifetime of the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct Child {
    /// Opaque guid assigned by Firefly.
    pub guid: String,
    pub name: String,
}

/// A single timetabled lesson/period.
///
/// Invariant: `start < end`. The transport adapter drops records that
/// violate this rather than letting them reach the projector.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub subject: String,
    pub location: Option<String>,
    pub description: Option<String>,
    /// Guid of the child this event belongs to.
    pub child_guid: String,
}

/// A set task/assignment.
///
/// `due` is optional: Firefly allows tasks with no due date. `set <= due` is
/// expected but not enforced; upstream data sometimes violates it and the
/// engine must tolerate that.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    /// Stable identifier across polls.
    pub id: String,
    pub title: String,
    pub description: String,
    pub due: Option<DateTime<Utc>>,
    pub set: Option<DateTime<Utc>>,
    pub subject: String,
    pub task_type: Option<String>,
    pub setter: String,
    pub child_guid: String,
    pub completed: bool,
}

/// Everything fetched for one child in one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ChildData {
    pub child: Child,
    /// Sorted ascending by start instant.
    pub events: Vec<Event>,
    pub tasks: Vec<Task>,
}

/// Immutable point-in-time aggregate of all children's data.
///
/// Only one snapshot is current at a time; a successful cycle atomically
/// replaces it. Readers always see either the old snapshot or the fully new
/// one, never a partial mix.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Instant the fetch cycle completed.
    pub produced_at: DateTime<Utc>,
    /// Keyed by child guid.
    pub children: HashMap<String, ChildData>,
}

impl Snapshot {
    pub fn child(&self, guid: &str) -> Option<&ChildData> {
        self.children.get(guid)
    }
}
