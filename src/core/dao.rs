//! Point-in-time usage snapshots for the reporting surface.
//!
//! Snapshots are deep copies taken under the owning tracker's read lock; they
//! never alias live tracker state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::Resource;

/// Usage of one queue path and its descendants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsageDaoInfo {
    /// Full queue path.
    pub queue_path: String,
    /// Aggregate usage at and below this path.
    pub resource_usage: Resource,
    /// Applications running at or below this path, sorted.
    pub running_applications: Vec<String>,
    /// Configured resource cap, absent when unbounded.
    pub max_resources: Option<Resource>,
    /// Configured application cap, zero when unbounded.
    pub max_applications: u64,
    /// Child queue snapshots, sorted by queue path.
    pub children: Vec<ResourceUsageDaoInfo>,
}

impl ResourceUsageDaoInfo {
    /// Find the snapshot of `queue_path` in this subtree.
    #[must_use]
    pub fn find(&self, queue_path: &str) -> Option<&Self> {
        if self.queue_path == queue_path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(queue_path))
    }
}

/// Snapshot of one user's tracked usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResourceUsageDaoInfo {
    /// User name.
    pub user_name: String,
    /// Application id to bound group name.
    pub groups: BTreeMap<String, String>,
    /// Usage tree rooted at `root`.
    pub queues: ResourceUsageDaoInfo,
}

/// Snapshot of one group's tracked usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResourceUsageDaoInfo {
    /// Group name.
    pub group_name: String,
    /// Application id to the user running it.
    pub applications: BTreeMap<String, String>,
    /// Usage tree rooted at `root`.
    pub queues: ResourceUsageDaoInfo,
}
