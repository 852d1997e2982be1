//! Group-level usage ledger.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use crate::core::events::{EventDetail, UgmEvents};
use crate::core::{
    DecreaseOutcome, GroupResourceUsageDaoInfo, QueueLimit, QueueTracker, Resource, TrackerError,
};

struct GroupState {
    queue_tracker: QueueTracker,
    /// Application id to the user running it.
    applications: HashMap<String, String>,
}

/// Cross-user usage of one group, shared by every user tracker that has an
/// application bound to the group.
///
/// Callers that hold a user tracker lock may take this tracker's lock; this
/// tracker never calls back into a user tracker.
pub struct GroupTracker {
    group_name: String,
    state: RwLock<GroupState>,
    events: UgmEvents,
}

impl GroupTracker {
    /// Create an empty tracker for `group_name`.
    #[must_use]
    pub fn new(group_name: impl Into<String>, events: UgmEvents) -> Self {
        Self {
            group_name: group_name.into(),
            state: RwLock::new(GroupState {
                queue_tracker: QueueTracker::new_root(),
                applications: HashMap::new(),
            }),
            events,
        }
    }

    /// Group name.
    #[must_use]
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Add `usage` for `application_id`, run by `user`, along `queue_path`.
    ///
    /// Same all-or-nothing semantics as [`QueueTracker::increase_tracked_resource`].
    pub fn increase_tracked_resource(
        &self,
        queue_path: &str,
        application_id: &str,
        usage: &Resource,
        user: &str,
    ) -> bool {
        let mut state = self.state.write();
        if !state
            .queue_tracker
            .increase_tracked_resource(queue_path, application_id, usage)
        {
            return false;
        }
        if !state.applications.contains_key(application_id) {
            state
                .applications
                .insert(application_id.to_string(), user.to_string());
        }
        self.events
            .send_increase_resource_usage_for_group(&self.group_name, application_id, usage);
        true
    }

    /// Subtract `usage` for `application_id` along `queue_path`, forgetting the
    /// application when `remove_app` is set.
    pub fn decrease_tracked_resource(
        &self,
        queue_path: &str,
        application_id: &str,
        usage: &Resource,
        remove_app: bool,
    ) -> DecreaseOutcome {
        let mut state = self.state.write();
        let outcome = state
            .queue_tracker
            .decrease_tracked_resource(queue_path, application_id, usage, remove_app);
        if outcome.decreased {
            if remove_app {
                state.applications.remove(application_id);
            }
            self.events
                .send_decrease_resource_usage_for_group(&self.group_name, application_id, usage);
        }
        outcome
    }

    /// Application id to user for every tracked application.
    pub fn tracked_applications(&self) -> BTreeMap<String, String> {
        self.state
            .read()
            .applications
            .iter()
            .map(|(app, user)| (app.clone(), user.clone()))
            .collect()
    }

    /// Overwrite the limits of `queue_path`.
    pub fn set_limits(
        &self,
        queue_path: &str,
        max_resources: Option<Resource>,
        max_applications: u64,
    ) -> Result<(), TrackerError> {
        let mut state = self.state.write();
        state
            .queue_tracker
            .set_limit(queue_path, max_resources.clone(), max_applications)?;
        self.events.send_limit_set(
            EventDetail::GroupLimit,
            &self.group_name,
            queue_path,
            max_resources.as_ref(),
        );
        Ok(())
    }

    /// Replace every configured limit with `limits` under one lock, dropping
    /// nodes that only existed to hold a removed limit.
    pub fn replace_limits(&self, limits: &[QueueLimit]) -> Result<(), TrackerError> {
        self.state.write().queue_tracker.replace_limits(limits)?;
        for limit in limits {
            self.events.send_limit_set(
                EventDetail::GroupLimit,
                &self.group_name,
                &limit.queue_path,
                limit.max_resources.as_ref(),
            );
        }
        Ok(())
    }

    /// Group headroom at `queue_path`, `None` when unbounded.
    pub fn headroom(&self, queue_path: &str) -> Result<Option<Resource>, TrackerError> {
        self.state.read().queue_tracker.headroom(queue_path)
    }

    /// Deep snapshot for reporting.
    pub fn group_resource_usage_dao_info(&self) -> GroupResourceUsageDaoInfo {
        let state = self.state.read();
        GroupResourceUsageDaoInfo {
            group_name: self.group_name.clone(),
            applications: state
                .applications
                .iter()
                .map(|(app, user)| (app.clone(), user.clone()))
                .collect(),
            queues: state.queue_tracker.resource_usage_dao_info(),
        }
    }

    /// Does every segment of `queue_path` have a tracker node?
    pub fn is_queue_path_tracked_completely(&self, queue_path: &str) -> bool {
        self.state
            .read()
            .queue_tracker
            .is_queue_path_tracked_completely(queue_path)
    }

    /// Is the leaf of `queue_path` empty and removable?
    pub fn is_unlink_required(&self, queue_path: &str) -> bool {
        self.state.read().queue_tracker.is_unlink_required(queue_path)
    }

    /// Remove the leaf of `queue_path` if it is empty.
    pub fn unlink_qt(&self, queue_path: &str) -> bool {
        self.state.write().queue_tracker.unlink_qt(queue_path)
    }

    /// Remove the empty tail of `queue_path`, returning the nodes removed.
    pub fn prune_empty_path(&self, queue_path: &str) -> usize {
        self.state.write().queue_tracker.prune_empty_path(queue_path)
    }

    /// No child queues and no running applications at `root`.
    pub fn can_be_removed(&self) -> bool {
        self.state.read().queue_tracker.is_empty()
    }
}
