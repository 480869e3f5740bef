//! Notification and background-work fabric for PlayerTrack.
//!
//! Two pieces of plumbing that the domain services share:
//!
//! - [`NotificationHub`] fans typed [`Notification`]s out to subscribers over
//!   `tokio::sync::broadcast` channels, each with an optional kind filter.
//! - [`TaskQueue`] is a bounded queue of blocking jobs executed by a fixed
//!   number of workers. Submission never blocks; a full queue is reported
//!   and logged instead.

pub mod error;
pub mod event;
pub mod hub;
pub mod queue;

pub use error::{FabricError, FabricResult};
pub use event::{Notification, NotificationKind};
pub use hub::{NotificationFilter, NotificationHub, NotificationStream};
pub use queue::{QueueConfig, TaskQueue};
