//! Queue usage tree.
//!
//! A [`QueueTracker`] mirrors one segment of the queue hierarchy. The root
//! tracker represents `root`; children are created lazily the first time an
//! increase (or a limit) reaches a segment, and are only ever removed through
//! an explicit [`QueueTracker::unlink_qt`].
//!
//! Every node on an increased path aggregates the usage and records the
//! application, so resource caps and application caps apply at any level.
//! An application is assumed to run in a single leaf queue.
//!
//! The tree has no interior locking: the owning user or group tracker guards
//! the whole tree with one read/write lock.

use std::collections::{HashMap, HashSet};

use crate::core::{Resource, ResourceUsageDaoInfo, TrackerError};
use crate::util::path::{join_queue_path, parent_queue_path, split_queue_path, ROOT_QUEUE};

/// Result of a decrease.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[must_use]
pub struct DecreaseOutcome {
    /// The leaf became childless, with no running applications and no
    /// configured limits, and may be unlinked.
    pub removed: bool,
    /// The path and application were tracked and the usage was subtracted.
    pub decreased: bool,
}

/// Limits configured for one queue path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueLimit {
    /// Root-anchored queue path.
    pub queue_path: String,
    /// Resource cap, `None` when unbounded.
    pub max_resources: Option<Resource>,
    /// Application cap, zero when unbounded.
    pub max_applications: u64,
}

/// Usage, limits and children of one queue path segment.
#[derive(Debug)]
pub struct QueueTracker {
    queue_name: String,
    queue_path: String,
    resource_usage: Resource,
    running_applications: HashSet<String>,
    max_resources: Option<Resource>,
    max_running_apps: u64,
    child_queue_trackers: HashMap<String, QueueTracker>,
}

impl Default for QueueTracker {
    fn default() -> Self {
        Self::new_root()
    }
}

impl QueueTracker {
    /// Create an empty tracker for `root`.
    #[must_use]
    pub fn new_root() -> Self {
        Self::new("", ROOT_QUEUE)
    }

    fn new(parent_path: &str, queue_name: &str) -> Self {
        Self {
            queue_name: queue_name.to_string(),
            queue_path: join_queue_path(parent_path, queue_name),
            resource_usage: Resource::new(),
            running_applications: HashSet::new(),
            max_resources: None,
            max_running_apps: 0,
            child_queue_trackers: HashMap::new(),
        }
    }

    /// Segment name this node represents.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Full path of this node.
    #[must_use]
    pub fn queue_path(&self) -> &str {
        &self.queue_path
    }

    /// Aggregate usage at and below this node.
    #[must_use]
    pub const fn resource_usage(&self) -> &Resource {
        &self.resource_usage
    }

    /// Configured resource cap, `None` when unbounded.
    #[must_use]
    pub const fn max_resources(&self) -> Option<&Resource> {
        self.max_resources.as_ref()
    }

    /// Configured application cap, zero when unbounded.
    #[must_use]
    pub const fn max_running_apps(&self) -> u64 {
        self.max_running_apps
    }

    /// Number of applications running at or below this node.
    #[must_use]
    pub fn running_application_count(&self) -> usize {
        self.running_applications.len()
    }

    /// Is `application_id` running at or below this node?
    #[must_use]
    pub fn has_running_application(&self, application_id: &str) -> bool {
        self.running_applications.contains(application_id)
    }

    /// Number of direct children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.child_queue_trackers.len()
    }

    /// Direct child by segment name.
    #[must_use]
    pub fn child(&self, queue_name: &str) -> Option<&Self> {
        self.child_queue_trackers.get(queue_name)
    }

    /// Node for a full queue path, if the whole path is tracked.
    #[must_use]
    pub fn node(&self, queue_path: &str) -> Option<&Self> {
        let segments = split_queue_path(queue_path).ok()?;
        self.descend(&segments)
    }

    /// Childless with no running applications.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.child_queue_trackers.is_empty() && self.running_applications.is_empty()
    }

    /// Empty and without configured limits, so unlinking loses nothing.
    fn is_prunable(&self) -> bool {
        self.is_empty() && self.max_resources.is_none() && self.max_running_apps == 0
    }

    /// Add `usage` for `application_id` along `queue_path`.
    ///
    /// Limits are checked root to leaf before anything is touched; the first
    /// node that would exceed its resource cap or application cap rejects the
    /// whole increase and the tree is left as it was.
    pub fn increase_tracked_resource(
        &mut self,
        queue_path: &str,
        application_id: &str,
        usage: &Resource,
    ) -> bool {
        let segments = match split_queue_path(queue_path) {
            Ok(segments) => segments,
            Err(err) => {
                tracing::warn!(application = application_id, "increase rejected: {err}");
                return false;
            }
        };
        if !self.can_increase(&segments, application_id, usage) {
            return false;
        }
        self.commit_increase(&segments, application_id, usage);
        true
    }

    fn allows(&self, application_id: &str, usage: &Resource) -> bool {
        if let Some(max) = &self.max_resources {
            if !self.resource_usage.fits_in_with(usage, max) {
                tracing::debug!(
                    queue_path = %self.queue_path,
                    application = application_id,
                    "resource limit {} would be exceeded: current {}, requested {}",
                    max,
                    self.resource_usage,
                    usage
                );
                return false;
            }
        }
        if self.max_running_apps != 0
            && !self.running_applications.contains(application_id)
            && self.running_applications.len() as u64 >= self.max_running_apps
        {
            tracing::debug!(
                queue_path = %self.queue_path,
                application = application_id,
                "application limit {} reached",
                self.max_running_apps
            );
            return false;
        }
        true
    }

    fn can_increase(&self, segments: &[&str], application_id: &str, usage: &Resource) -> bool {
        if !self.allows(application_id, usage) {
            return false;
        }
        // Missing children carry no limits yet.
        match segments.split_first() {
            Some((head, rest)) => self
                .child_queue_trackers
                .get(*head)
                .is_none_or(|child| child.can_increase(rest, application_id, usage)),
            None => true,
        }
    }

    fn commit_increase(&mut self, segments: &[&str], application_id: &str, usage: &Resource) {
        self.resource_usage.add_to(usage);
        if !self.running_applications.contains(application_id) {
            self.running_applications.insert(application_id.to_string());
        }
        if let Some((head, rest)) = segments.split_first() {
            let parent_path = &self.queue_path;
            let child = self
                .child_queue_trackers
                .entry((*head).to_string())
                .or_insert_with(|| {
                    tracing::debug!(parent = %parent_path, queue = head, "creating queue tracker");
                    Self::new(parent_path, head)
                });
            child.commit_increase(rest, application_id, usage);
        }
    }

    /// Subtract `usage` for `application_id` along `queue_path`.
    ///
    /// Nothing is mutated when the path or the application is not tracked;
    /// the outcome then reports `decreased == false`. Usage is clamped at zero.
    /// Empty nodes are never removed here, see [`Self::unlink_qt`].
    pub fn decrease_tracked_resource(
        &mut self,
        queue_path: &str,
        application_id: &str,
        usage: &Resource,
        remove_app: bool,
    ) -> DecreaseOutcome {
        let segments = match split_queue_path(queue_path) {
            Ok(segments) => segments,
            Err(err) => {
                tracing::warn!(application = application_id, "decrease rejected: {err}");
                return DecreaseOutcome::default();
            }
        };
        let tracked = self
            .descend(&segments)
            .is_some_and(|leaf| leaf.running_applications.contains(application_id));
        if !tracked {
            tracing::warn!(
                queue_path,
                application = application_id,
                "decrease of untracked usage {usage}"
            );
            return DecreaseOutcome::default();
        }
        let removed = self.commit_decrease(&segments, application_id, usage, remove_app);
        DecreaseOutcome {
            removed,
            decreased: true,
        }
    }

    fn commit_decrease(
        &mut self,
        segments: &[&str],
        application_id: &str,
        usage: &Resource,
        remove_app: bool,
    ) -> bool {
        if self.resource_usage.sub_from_clamped(usage) {
            tracing::warn!(
                queue_path = %self.queue_path,
                application = application_id,
                "usage would go negative, clamped to zero after removing {usage}"
            );
        }
        if remove_app {
            self.running_applications.remove(application_id);
        }
        match segments.split_first() {
            Some((head, rest)) => self
                .child_queue_trackers
                .get_mut(*head)
                .is_some_and(|child| {
                    child.commit_decrease(rest, application_id, usage, remove_app)
                }),
            None => self.is_prunable(),
        }
    }

    /// Is `application_id` tracked at the leaf of `queue_path`?
    #[must_use]
    pub fn is_app_tracked(&self, queue_path: &str, application_id: &str) -> bool {
        self.node(queue_path)
            .is_some_and(|leaf| leaf.running_applications.contains(application_id))
    }

    /// Overwrite the limits of `queue_path`, creating the path if needed.
    ///
    /// Usage already above the new limit is kept; only later increases are
    /// constrained.
    pub fn set_limit(
        &mut self,
        queue_path: &str,
        max_resources: Option<Resource>,
        max_running_apps: u64,
    ) -> Result<(), TrackerError> {
        let segments = split_queue_path(queue_path)?;
        let node = self.descend_or_create(&segments);
        node.max_resources = max_resources;
        node.max_running_apps = max_running_apps;
        Ok(())
    }

    /// Drop every configured limit in this subtree.
    pub fn clear_limits(&mut self) {
        self.max_resources = None;
        self.max_running_apps = 0;
        for child in self.child_queue_trackers.values_mut() {
            child.clear_limits();
        }
    }

    /// Replace every configured limit with `limits`, dropping nodes that only
    /// existed to hold a removed limit.
    ///
    /// Every path is validated first; on error the tree keeps its old limits.
    pub fn replace_limits(&mut self, limits: &[QueueLimit]) -> Result<(), TrackerError> {
        for limit in limits {
            split_queue_path(&limit.queue_path)?;
        }
        self.clear_limits();
        for limit in limits {
            self.set_limit(
                &limit.queue_path,
                limit.max_resources.clone(),
                limit.max_applications,
            )?;
        }
        self.prune_unused();
        Ok(())
    }

    /// Unlink every empty, limit-free node below this one.
    pub fn prune_unused(&mut self) {
        for child in self.child_queue_trackers.values_mut() {
            child.prune_unused();
        }
        self.child_queue_trackers.retain(|_, child| !child.is_prunable());
    }

    /// Remaining capacity at `queue_path`: the component-wise minimum of
    /// `limit - usage` over the root and every tracked node down to the path.
    ///
    /// `None` means no node on the path carries a resource limit.
    pub fn headroom(&self, queue_path: &str) -> Result<Option<Resource>, TrackerError> {
        let segments = split_queue_path(queue_path)?;
        let mut headroom = self.own_headroom();
        let mut node = self;
        for segment in segments {
            let Some(child) = node.child_queue_trackers.get(segment) else {
                break;
            };
            headroom = Resource::component_wise_min_permissive(
                headroom.as_ref(),
                child.own_headroom().as_ref(),
            );
            node = child;
        }
        Ok(headroom)
    }

    fn own_headroom(&self) -> Option<Resource> {
        self.max_resources
            .as_ref()
            .map(|max| Resource::headroom(max, &self.resource_usage))
    }

    /// Does every segment of `queue_path` have a tracker node?
    #[must_use]
    pub fn is_queue_path_tracked_completely(&self, queue_path: &str) -> bool {
        self.node(queue_path).is_some()
    }

    /// Is the leaf of `queue_path` present, below `root`, empty and free of
    /// configured limits?
    #[must_use]
    pub fn is_unlink_required(&self, queue_path: &str) -> bool {
        match split_queue_path(queue_path) {
            Ok(segments) if !segments.is_empty() => {
                self.descend(&segments).is_some_and(Self::is_prunable)
            }
            _ => false,
        }
    }

    /// Remove the leaf of `queue_path` from its parent if it is empty.
    ///
    /// Returns false, leaving the tree untouched, when the leaf is missing,
    /// is `root`, still has children or running applications, or carries a
    /// configured limit.
    pub fn unlink_qt(&mut self, queue_path: &str) -> bool {
        let Ok(segments) = split_queue_path(queue_path) else {
            return false;
        };
        let Some((leaf, parent_segments)) = segments.split_last() else {
            return false;
        };
        let Some(parent) = self.descend_mut(parent_segments) else {
            return false;
        };
        if !parent.child_queue_trackers.get(*leaf).is_some_and(Self::is_prunable) {
            return false;
        }
        parent.child_queue_trackers.remove(*leaf);
        tracing::debug!(queue_path, "unlinked queue tracker");
        true
    }

    /// Unlink the leaf of `queue_path` and then each ancestor that becomes
    /// empty, stopping below `root`. Returns the number of nodes removed.
    pub fn prune_empty_path(&mut self, queue_path: &str) -> usize {
        let mut unlinked = 0;
        let mut path = queue_path;
        while self.is_unlink_required(path) && self.unlink_qt(path) {
            unlinked += 1;
            match parent_queue_path(path) {
                Some(parent) => path = parent,
                None => break,
            }
        }
        unlinked
    }

    /// Deep copy of this subtree for reporting.
    #[must_use]
    pub fn resource_usage_dao_info(&self) -> ResourceUsageDaoInfo {
        let mut running_applications: Vec<String> =
            self.running_applications.iter().cloned().collect();
        running_applications.sort();
        let mut children: Vec<ResourceUsageDaoInfo> = self
            .child_queue_trackers
            .values()
            .map(Self::resource_usage_dao_info)
            .collect();
        children.sort_by(|a, b| a.queue_path.cmp(&b.queue_path));
        ResourceUsageDaoInfo {
            queue_path: self.queue_path.clone(),
            resource_usage: self.resource_usage.clone(),
            running_applications,
            max_resources: self.max_resources.clone(),
            max_applications: self.max_running_apps,
            children,
        }
    }

    fn descend(&self, segments: &[&str]) -> Option<&Self> {
        let mut node = self;
        for segment in segments {
            node = node.child_queue_trackers.get(*segment)?;
        }
        Some(node)
    }

    fn descend_mut(&mut self, segments: &[&str]) -> Option<&mut Self> {
        match segments.split_first() {
            Some((head, rest)) => self.child_queue_trackers.get_mut(*head)?.descend_mut(rest),
            None => Some(self),
        }
    }

    fn descend_or_create(&mut self, segments: &[&str]) -> &mut Self {
        match segments.split_first() {
            Some((head, rest)) => {
                let parent_path = &self.queue_path;
                self.child_queue_trackers
                    .entry((*head).to_string())
                    .or_insert_with(|| Self::new(parent_path, head))
                    .descend_or_create(rest)
            }
            None => self,
        }
    }
}
