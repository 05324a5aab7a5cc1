//! crates/firefly_core/src/views.rs
//!
//! The view projector: pure functions that turn the current snapshot plus
//! "now" into the derived views the display entities consume. Nothing here
//! is stored; every read recomputes from scratch.
//!
//! Day-boundary decisions (what counts as "today") are made in the
//! configured local timezone through the single [`local_day`] helper, while
//! ordering and containment comparisons always use absolute instants. This
//! keeps "today" meaningful to the user without introducing off-by-one
//! errors at timezone edges.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashSet;

use crate::domain::{ChildData, Event, Task};

/// Maximum characters of task description carried in view attributes.
const DESCRIPTION_LIMIT: usize = 100;

/// Options consumed (not owned) by the projector.
#[derive(Debug, Clone)]
pub struct ViewOptions {
    /// Local timezone used for all day-boundary decisions.
    pub timezone: Tz,
    /// Upcoming-task window in days (1-30).
    pub lookahead_days: u32,
    /// Prefix class states with "H.MM-H.MM: " in local time.
    pub show_class_times: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            lookahead_days: 7,
            show_class_times: false,
        }
    }
}

/// The view kinds exposed per child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    UpcomingTasks,
    TasksDueToday,
    OverdueTasks,
    CurrentClass,
    NextClass,
    Todo,
}

impl std::str::FromStr for ViewKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming_tasks" => Ok(ViewKind::UpcomingTasks),
            "tasks_due_today" => Ok(ViewKind::TasksDueToday),
            "overdue_tasks" => Ok(ViewKind::OverdueTasks),
            "current_class" => Ok(ViewKind::CurrentClass),
            "next_class" => Ok(ViewKind::NextClass),
            "todo" => Ok(ViewKind::Todo),
            _ => Err(()),
        }
    }
}

//=========================================================================================
// View Payload Types
//=========================================================================================

#[derive(Debug, Clone, Serialize)]
pub struct UpcomingTaskEntry {
    pub title: String,
    pub subject: String,
    pub due: DateTime<Utc>,
    pub days_until_due: i64,
    pub setter: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DueTodayTaskEntry {
    pub title: String,
    pub subject: String,
    pub task_type: Option<String>,
    pub setter: String,
    /// Truncated to 100 characters.
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverdueTaskEntry {
    pub title: String,
    pub subject: String,
    pub due: DateTime<Utc>,
    /// Whole days past the start of today, always >= 1.
    pub days_overdue: i64,
    pub setter: String,
    pub description: String,
}

/// Attributes shared by the current- and next-class views when an event is
/// present.
#[derive(Debug, Clone, Serialize)]
pub struct ClassInfo {
    pub class_name: String,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextClassContext {
    NextClassToday,
    LastClassOfDay,
    NextClassFutureDay,
}

#[derive(Debug, Clone, Serialize)]
pub struct TodoItem {
    pub id: String,
    pub title: String,
    pub due: Option<DateTime<Utc>>,
    pub completed: bool,
}

/// A computed, non-persisted projection for one display concept.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DerivedView {
    UpcomingTasks {
        count: usize,
        tasks: Vec<UpcomingTaskEntry>,
    },
    TasksDueToday {
        count: usize,
        tasks: Vec<DueTodayTaskEntry>,
    },
    OverdueTasks {
        count: usize,
        tasks: Vec<OverdueTaskEntry>,
    },
    CurrentClass {
        /// Subject (optionally time-prefixed), or "None".
        state: String,
        status: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        class: Option<ClassInfo>,
        #[serde(skip_serializing_if = "Option::is_none")]
        minutes_remaining: Option<i64>,
    },
    NextClass {
        state: String,
        status: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<NextClassContext>,
        #[serde(skip_serializing_if = "Option::is_none")]
        class: Option<ClassInfo>,
        #[serde(skip_serializing_if = "Option::is_none")]
        minutes_until: Option<i64>,
    },
    Todo {
        count: usize,
        items: Vec<TodoItem>,
    },
}

//=========================================================================================
// Time Helpers
//=========================================================================================

/// The local calendar day an instant falls on.
///
/// Every day-boundary decision in this module goes through here.
pub fn local_day(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Midnight at the start of `instant`'s local day, as a UTC instant.
///
/// On a DST gap where local midnight does not exist, the earliest valid
/// interpretation is used.
pub fn start_of_local_day(instant: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let day = local_day(instant, tz);
    let midnight = day.and_hms_opt(0, 0, 0).expect("midnight is valid");
    match tz.from_local_datetime(&midnight) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        chrono::LocalResult::None => {
            let later = midnight + Duration::hours(1);
            tz.from_local_datetime(&later)
                .earliest()
                .expect("hour after midnight is valid")
                .with_timezone(&Utc)
        }
    }
}

/// Ceiling of a positive duration in whole days.
fn ceil_days(delta: Duration) -> i64 {
    let secs = delta.num_seconds();
    (secs + 86_399).div_euclid(86_400)
}

/// Ceiling of a positive duration in whole minutes.
fn ceil_minutes(delta: Duration) -> i64 {
    let secs = delta.num_seconds();
    (secs + 59).div_euclid(60)
}

fn truncate_description(description: &str) -> String {
    if description.chars().count() > DESCRIPTION_LIMIT {
        let mut truncated: String = description.chars().take(DESCRIPTION_LIMIT).collect();
        truncated.push_str("...");
        truncated
    } else {
        description.to_string()
    }
}

/// Class state with an optional "H.MM-H.MM: " local-time prefix.
///
/// Hours carry no leading zero, matching the upstream display convention.
fn class_state(event: &Event, opts: &ViewOptions) -> String {
    if !opts.show_class_times {
        return event.subject.clone();
    }
    let start = event.start.with_timezone(&opts.timezone);
    let end = event.end.with_timezone(&opts.timezone);
    format!(
        "{}-{}: {}",
        start.format("%-H.%M"),
        end.format("%-H.%M"),
        event.subject
    )
}

fn class_info(event: &Event) -> ClassInfo {
    ClassInfo {
        class_name: event.subject.clone(),
        location: event.location.clone(),
        start: event.start,
        end: event.end,
        description: event.description.clone(),
    }
}

//=========================================================================================
// Task Buckets
//=========================================================================================

/// Tasks with a due instant in `(now, now + lookahead_days]`.
fn upcoming<'a>(data: &'a ChildData, now: DateTime<Utc>, opts: &ViewOptions) -> Vec<&'a Task> {
    let window_end = now + Duration::days(i64::from(opts.lookahead_days));
    let mut tasks: Vec<&Task> = data
        .tasks
        .iter()
        .filter(|t| t.due.is_some_and(|due| due > now && due <= window_end))
        .collect();
    tasks.sort_by_key(|t| t.due);
    tasks
}

/// Tasks whose due instant falls on today's local calendar day.
fn due_today<'a>(data: &'a ChildData, now: DateTime<Utc>, opts: &ViewOptions) -> Vec<&'a Task> {
    let today = local_day(now, opts.timezone);
    data.tasks
        .iter()
        .filter(|t| {
            t.due
                .is_some_and(|due| local_day(due, opts.timezone) == today)
        })
        .collect()
}

/// Incomplete tasks due strictly before the start of today (local).
fn overdue<'a>(data: &'a ChildData, now: DateTime<Utc>, opts: &ViewOptions) -> Vec<&'a Task> {
    let today_start = start_of_local_day(now, opts.timezone);
    let mut tasks: Vec<&Task> = data
        .tasks
        .iter()
        .filter(|t| !t.completed && t.due.is_some_and(|due| due < today_start))
        .collect();
    tasks.sort_by_key(|t| t.due);
    tasks
}

//=========================================================================================
// Class Selection
//=========================================================================================

/// The event currently in progress: `start <= now < end`.
///
/// When events overlap, the most recently started one wins.
fn current_event<'a>(data: &'a ChildData, now: DateTime<Utc>) -> Option<&'a Event> {
    data.events
        .iter()
        .filter(|e| e.start <= now && now < e.end)
        .max_by_key(|e| e.start)
}

/// The event with the earliest start strictly after `now`.
fn next_event<'a>(data: &'a ChildData, now: DateTime<Utc>) -> Option<&'a Event> {
    data.events
        .iter()
        .filter(|e| e.start > now)
        .min_by_key(|e| e.start)
}

//=========================================================================================
// Projection
//=========================================================================================

/// Compute one derived view for a child.
pub fn project(
    data: &ChildData,
    kind: ViewKind,
    now: DateTime<Utc>,
    opts: &ViewOptions,
) -> DerivedView {
    match kind {
        ViewKind::UpcomingTasks => project_upcoming(data, now, opts),
        ViewKind::TasksDueToday => project_due_today(data, now, opts),
        ViewKind::OverdueTasks => project_overdue(data, now, opts),
        ViewKind::CurrentClass => project_current_class(data, now, opts),
        ViewKind::NextClass => project_next_class(data, now, opts),
        ViewKind::Todo => project_todo(data, now, opts),
    }
}

fn project_upcoming(data: &ChildData, now: DateTime<Utc>, opts: &ViewOptions) -> DerivedView {
    let tasks: Vec<UpcomingTaskEntry> = upcoming(data, now, opts)
        .into_iter()
        .filter_map(|t| {
            t.due.map(|due| UpcomingTaskEntry {
                title: t.title.clone(),
                subject: t.subject.clone(),
                due,
                days_until_due: ceil_days(due - now),
                setter: t.setter.clone(),
            })
        })
        .collect();
    DerivedView::UpcomingTasks {
        count: tasks.len(),
        tasks,
    }
}

fn project_due_today(data: &ChildData, now: DateTime<Utc>, opts: &ViewOptions) -> DerivedView {
    let tasks: Vec<DueTodayTaskEntry> = due_today(data, now, opts)
        .into_iter()
        .map(|t| DueTodayTaskEntry {
            title: t.title.clone(),
            subject: t.subject.clone(),
            task_type: t.task_type.clone(),
            setter: t.setter.clone(),
            description: truncate_description(&t.description),
        })
        .collect();
    DerivedView::TasksDueToday {
        count: tasks.len(),
        tasks,
    }
}

fn project_overdue(data: &ChildData, now: DateTime<Utc>, opts: &ViewOptions) -> DerivedView {
    let today_start = start_of_local_day(now, opts.timezone);
    let tasks: Vec<OverdueTaskEntry> = overdue(data, now, opts)
        .into_iter()
        .filter_map(|t| {
            t.due.map(|due| {
                let days = (today_start - due).num_seconds().div_euclid(86_400);
                OverdueTaskEntry {
                    title: t.title.clone(),
                    subject: t.subject.clone(),
                    due,
                    days_overdue: days.max(1),
                    setter: t.setter.clone(),
                    description: truncate_description(&t.description),
                }
            })
        })
        .collect();
    DerivedView::OverdueTasks {
        count: tasks.len(),
        tasks,
    }
}

fn project_current_class(data: &ChildData, now: DateTime<Utc>, opts: &ViewOptions) -> DerivedView {
    match current_event(data, now) {
        Some(event) => DerivedView::CurrentClass {
            state: class_state(event, opts),
            status: "in_class",
            class: Some(class_info(event)),
            minutes_remaining: Some(ceil_minutes(event.end - now)),
        },
        None => DerivedView::CurrentClass {
            state: "None".to_string(),
            status: "no_current_class",
            class: None,
            minutes_remaining: None,
        },
    }
}

fn project_next_class(data: &ChildData, now: DateTime<Utc>, opts: &ViewOptions) -> DerivedView {
    let Some(event) = next_event(data, now) else {
        return DerivedView::NextClass {
            state: "None".to_string(),
            status: "no_upcoming_class",
            context: None,
            class: None,
            minutes_until: None,
        };
    };

    let today = local_day(now, opts.timezone);
    let context = if local_day(event.start, opts.timezone) == today {
        NextClassContext::NextClassToday
    } else if had_class_today(data, now, opts) {
        // Today's schedule is exhausted; the reported event is on a later day.
        NextClassContext::LastClassOfDay
    } else {
        NextClassContext::NextClassFutureDay
    };

    DerivedView::NextClass {
        state: class_state(event, opts),
        status: "class_scheduled",
        context: Some(context),
        class: Some(class_info(event)),
        minutes_until: Some(ceil_minutes(event.start - now)),
    }
}

/// Whether at least one event started on today's local day, at or before now.
///
/// This pins the "last class of day" boundary: a day with zero events does
/// not count as a day that had classes.
fn had_class_today(data: &ChildData, now: DateTime<Utc>, opts: &ViewOptions) -> bool {
    let today = local_day(now, opts.timezone);
    data.events
        .iter()
        .any(|e| e.start <= now && local_day(e.start, opts.timezone) == today)
}

fn project_todo(data: &ChildData, now: DateTime<Utc>, opts: &ViewOptions) -> DerivedView {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut items = Vec::new();

    // Bucket order mirrors the upstream todo entity; a task qualifying for
    // several buckets appears once.
    let buckets = [
        upcoming(data, now, opts),
        overdue(data, now, opts),
        due_today(data, now, opts),
    ];
    for bucket in &buckets {
        for task in bucket {
            if seen.insert(task.id.as_str()) {
                items.push(TodoItem {
                    id: task.id.clone(),
                    title: task.title.clone(),
                    due: task.due,
                    completed: task.completed,
                });
            }
        }
    }

    DerivedView::Todo {
        count: items.len(),
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Child;
    use chrono_tz::Europe::London;

    fn opts() -> ViewOptions {
        ViewOptions {
            timezone: London,
            lookahead_days: 7,
            show_class_times: false,
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn event(start: &str, end: &str, subject: &str) -> Event {
        Event {
            start: at(start),
            end: at(end),
            subject: subject.to_string(),
            location: Some("Room 12".to_string()),
            description: None,
            child_guid: "child-1".to_string(),
        }
    }

    fn task(id: &str, due: Option<&str>, completed: bool) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {id}"),
            description: "Read chapter 4".to_string(),
            due: due.map(at),
            set: Some(at("2024-02-01T08:00:00Z")),
            subject: "Maths".to_string(),
            task_type: None,
            setter: "Mr Jones".to_string(),
            child_guid: "child-1".to_string(),
            completed,
        }
    }

    fn child_data(events: Vec<Event>, tasks: Vec<Task>) -> ChildData {
        let mut events = events;
        events.sort_by_key(|e| e.start);
        ChildData {
            child: Child {
                guid: "child-1".to_string(),
                name: "Alex".to_string(),
            },
            events,
            tasks,
        }
    }

    // Winter date, so London == UTC and fixture times read naturally.
    const NOW: &str = "2024-03-04T09:30:00Z";

    #[test]
    fn current_class_mid_lesson() {
        // One event 09:00-10:00 local, now 09:30.
        let data = child_data(
            vec![event("2024-03-04T09:00:00Z", "2024-03-04T10:00:00Z", "Maths")],
            vec![],
        );

        let view = project(&data, ViewKind::CurrentClass, at(NOW), &opts());
        match view {
            DerivedView::CurrentClass {
                state,
                status,
                minutes_remaining,
                ..
            } => {
                assert_eq!(state, "Maths");
                assert_eq!(status, "in_class");
                assert_eq!(minutes_remaining, Some(30));
            }
            other => panic!("wrong view: {other:?}"),
        }
    }

    #[test]
    fn current_class_time_prefix() {
        let data = child_data(
            vec![event("2024-03-04T09:00:00Z", "2024-03-04T10:05:00Z", "Maths")],
            vec![],
        );
        let mut opts = opts();
        opts.show_class_times = true;

        let view = project(&data, ViewKind::CurrentClass, at(NOW), &opts);
        match view {
            DerivedView::CurrentClass { state, .. } => assert_eq!(state, "9.00-10.05: Maths"),
            other => panic!("wrong view: {other:?}"),
        }
    }

    #[test]
    fn overlapping_events_latest_start_wins() {
        let data = child_data(
            vec![
                event("2024-03-04T09:00:00Z", "2024-03-04T10:00:00Z", "Maths"),
                event("2024-03-04T09:15:00Z", "2024-03-04T10:00:00Z", "Revision"),
            ],
            vec![],
        );

        let view = project(&data, ViewKind::CurrentClass, at(NOW), &opts());
        match view {
            DerivedView::CurrentClass { state, .. } => assert_eq!(state, "Revision"),
            other => panic!("wrong view: {other:?}"),
        }
    }

    #[test]
    fn current_and_next_never_point_at_the_same_event() {
        let data = child_data(
            vec![
                event("2024-03-04T09:00:00Z", "2024-03-04T10:00:00Z", "Maths"),
                event("2024-03-04T10:00:00Z", "2024-03-04T11:00:00Z", "English"),
            ],
            vec![],
        );

        let current = project(&data, ViewKind::CurrentClass, at(NOW), &opts());
        let next = project(&data, ViewKind::NextClass, at(NOW), &opts());
        let current_name = match current {
            DerivedView::CurrentClass { class, .. } => class.unwrap().class_name,
            _ => unreachable!(),
        };
        let next_name = match next {
            DerivedView::NextClass { class, .. } => class.unwrap().class_name,
            _ => unreachable!(),
        };
        assert_ne!(current_name, next_name);
    }

    #[test]
    fn next_class_today_context() {
        let data = child_data(
            vec![event("2024-03-04T11:00:00Z", "2024-03-04T12:00:00Z", "English")],
            vec![],
        );

        let view = project(&data, ViewKind::NextClass, at(NOW), &opts());
        match view {
            DerivedView::NextClass {
                context,
                minutes_until,
                ..
            } => {
                assert_eq!(context, Some(NextClassContext::NextClassToday));
                assert_eq!(minutes_until, Some(90));
            }
            other => panic!("wrong view: {other:?}"),
        }
    }

    #[test]
    fn last_class_of_day_after_schedule_ends() {
        // An event earlier today already ended; the next one is tomorrow.
        let data = child_data(
            vec![
                event("2024-03-04T08:00:00Z", "2024-03-04T09:00:00Z", "Maths"),
                event("2024-03-05T09:00:00Z", "2024-03-05T10:00:00Z", "English"),
            ],
            vec![],
        );

        let view = project(&data, ViewKind::NextClass, at(NOW), &opts());
        match view {
            DerivedView::NextClass { context, state, .. } => {
                assert_eq!(context, Some(NextClassContext::LastClassOfDay));
                // The future event is still reported as the state.
                assert_eq!(state, "English");
            }
            other => panic!("wrong view: {other:?}"),
        }
    }

    #[test]
    fn empty_day_is_future_day_not_last_class() {
        // Today has no events at all; tomorrow at 09:00 does.
        let data = child_data(
            vec![event("2024-03-05T09:00:00Z", "2024-03-05T10:00:00Z", "English")],
            vec![],
        );

        let view = project(&data, ViewKind::NextClass, at(NOW), &opts());
        match view {
            DerivedView::NextClass { context, .. } => {
                assert_eq!(context, Some(NextClassContext::NextClassFutureDay));
            }
            other => panic!("wrong view: {other:?}"),
        }
    }

    #[test]
    fn no_upcoming_class_at_all() {
        let data = child_data(
            vec![event("2024-03-04T08:00:00Z", "2024-03-04T09:00:00Z", "Maths")],
            vec![],
        );

        let view = project(&data, ViewKind::NextClass, at(NOW), &opts());
        match view {
            DerivedView::NextClass { state, status, .. } => {
                assert_eq!(state, "None");
                assert_eq!(status, "no_upcoming_class");
            }
            other => panic!("wrong view: {other:?}"),
        }
    }

    #[test]
    fn task_due_exactly_now_is_due_today_only() {
        let data = child_data(vec![], vec![task("t1", Some(NOW), false)]);

        let due_today = project(&data, ViewKind::TasksDueToday, at(NOW), &opts());
        let upcoming = project(&data, ViewKind::UpcomingTasks, at(NOW), &opts());
        let overdue = project(&data, ViewKind::OverdueTasks, at(NOW), &opts());

        assert!(matches!(due_today, DerivedView::TasksDueToday { count: 1, .. }));
        assert!(matches!(upcoming, DerivedView::UpcomingTasks { count: 0, .. }));
        assert!(matches!(overdue, DerivedView::OverdueTasks { count: 0, .. }));
    }

    #[test]
    fn task_due_yesterday_is_overdue_by_one_day() {
        let data = child_data(vec![], vec![task("t1", Some("2024-03-03T14:00:00Z"), false)]);

        let view = project(&data, ViewKind::OverdueTasks, at(NOW), &opts());
        match view {
            DerivedView::OverdueTasks { count, tasks } => {
                assert_eq!(count, 1);
                assert_eq!(tasks[0].days_overdue, 1);
            }
            other => panic!("wrong view: {other:?}"),
        }

        let upcoming = project(&data, ViewKind::UpcomingTasks, at(NOW), &opts());
        let due_today = project(&data, ViewKind::TasksDueToday, at(NOW), &opts());
        assert!(matches!(upcoming, DerivedView::UpcomingTasks { count: 0, .. }));
        assert!(matches!(due_today, DerivedView::TasksDueToday { count: 0, .. }));
    }

    #[test]
    fn days_overdue_never_below_one() {
        // Due 23:00 yesterday local: less than a whole day ago, still >= 1.
        let data = child_data(vec![], vec![task("t1", Some("2024-03-03T23:00:00Z"), false)]);

        let view = project(&data, ViewKind::OverdueTasks, at(NOW), &opts());
        match view {
            DerivedView::OverdueTasks { tasks, .. } => assert_eq!(tasks[0].days_overdue, 1),
            other => panic!("wrong view: {other:?}"),
        }
    }

    #[test]
    fn completed_tasks_are_not_overdue() {
        let data = child_data(vec![], vec![task("t1", Some("2024-03-01T09:00:00Z"), true)]);

        let view = project(&data, ViewKind::OverdueTasks, at(NOW), &opts());
        assert!(matches!(view, DerivedView::OverdueTasks { count: 0, .. }));
    }

    #[test]
    fn upcoming_sorted_and_windowed() {
        let data = child_data(
            vec![],
            vec![
                task("far", Some("2024-03-20T09:00:00Z"), false), // beyond lookahead
                task("b", Some("2024-03-08T09:00:00Z"), false),
                task("a", Some("2024-03-05T09:00:00Z"), false),
                task("no-due", None, false),
            ],
        );

        let view = project(&data, ViewKind::UpcomingTasks, at(NOW), &opts());
        match view {
            DerivedView::UpcomingTasks { count, tasks } => {
                assert_eq!(count, 2);
                assert_eq!(tasks[0].title, "Task a");
                assert_eq!(tasks[1].title, "Task b");
                assert_eq!(tasks[0].days_until_due, 1);
            }
            other => panic!("wrong view: {other:?}"),
        }
    }

    #[test]
    fn due_today_description_truncated() {
        let mut long_task = task("t1", Some("2024-03-04T15:00:00Z"), false);
        long_task.description = "x".repeat(150);
        let data = child_data(vec![], vec![long_task]);

        let view = project(&data, ViewKind::TasksDueToday, at(NOW), &opts());
        match view {
            DerivedView::TasksDueToday { tasks, .. } => {
                assert_eq!(tasks[0].description.chars().count(), 103);
                assert!(tasks[0].description.ends_with("..."));
            }
            other => panic!("wrong view: {other:?}"),
        }
    }

    #[test]
    fn todo_deduplicates_across_buckets() {
        // Due later today: qualifies as both due-today and upcoming.
        let data = child_data(
            vec![],
            vec![
                task("both", Some("2024-03-04T15:00:00Z"), false),
                task("late", Some("2024-03-01T09:00:00Z"), false),
                task("done-today", Some("2024-03-04T16:00:00Z"), true),
            ],
        );

        let view = project(&data, ViewKind::Todo, at(NOW), &opts());
        match view {
            DerivedView::Todo { count, items } => {
                assert_eq!(count, 3);
                let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
                assert_eq!(ids.len(), ids.iter().collect::<HashSet<_>>().len());
                let done = items.iter().find(|i| i.id == "done-today").unwrap();
                assert!(done.completed);
            }
            other => panic!("wrong view: {other:?}"),
        }
    }

    #[test]
    fn day_boundary_uses_local_timezone() {
        // 2024-06-10T23:30Z is already June 11th in London (BST, UTC+1).
        let summer_now = at("2024-06-10T23:30:00Z");
        let data = child_data(vec![], vec![task("t1", Some("2024-06-10T23:45:00Z"), false)]);

        let view = project(&data, ViewKind::TasksDueToday, summer_now, &opts());
        // Due instant is also on June 11th local, so it counts as today.
        assert!(matches!(view, DerivedView::TasksDueToday { count: 1, .. }));

        assert_eq!(
            local_day(summer_now, London),
            NaiveDate::from_ymd_opt(2024, 6, 11).unwrap()
        );
    }
}
