//! Usage trackers, limit enforcement and reporting snapshots.

pub mod dao;
pub mod error;
pub mod events;
pub mod group_tracker;
pub mod queue_tracker;
pub mod registry;
pub mod resource;
pub mod user_tracker;

pub use dao::{GroupResourceUsageDaoInfo, ResourceUsageDaoInfo, UserResourceUsageDaoInfo};
pub use error::{AppResult, TrackerError};
pub use events::{
    ChannelEventSystem, EventAction, EventDetail, EventRecord, EventSystem, InMemoryEventSystem,
    UgmEvents,
};
pub use group_tracker::GroupTracker;
pub use queue_tracker::{DecreaseOutcome, QueueLimit, QueueTracker};
pub use registry::{UsageRegistry, UserGroup};
pub use resource::{Quantity, Resource};
pub use user_tracker::UserTracker;
