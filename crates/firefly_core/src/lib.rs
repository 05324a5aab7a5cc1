pub mod coordinator;
pub mod domain;
pub mod health;
pub mod issues;
pub mod ports;
pub mod views;

pub use coordinator::{CoordinatorOptions, UpdateCoordinator, ViewError};
pub use domain::{Child, ChildData, Event, Snapshot, Task};
pub use health::{HealthState, HealthTracker, HealthTransition};
pub use issues::{Issue, IssueRegistry, IssueSeverity};
pub use ports::{ErrorKind, FireflyApi, FireflyError, FireflyResult};
pub use views::{DerivedView, ViewKind, ViewOptions};
