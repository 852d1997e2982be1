//! Per-user usage ledger and the two-tree update protocol.
//!
//! An increase is accepted only when both the user's own tree and the tree of
//! the group bound to the application accept it. The user tree is updated
//! first; when the group rejects the increase the user update is compensated
//! with a decrease of the same amount, all under the user's write lock so no
//! reader can observe the intermediate state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::events::{EventDetail, UgmEvents};
use crate::core::{
    DecreaseOutcome, GroupTracker, QueueLimit, QueueTracker, Resource, TrackerError,
    UserResourceUsageDaoInfo,
};

struct UserState {
    queue_tracker: QueueTracker,
    /// Group chosen for each application; fixed for the application's lifetime.
    app_group_trackers: HashMap<String, Arc<GroupTracker>>,
}

/// Usage of one user plus the application to group bindings.
pub struct UserTracker {
    user_name: String,
    state: RwLock<UserState>,
    events: UgmEvents,
}

impl UserTracker {
    /// Create an empty tracker for `user_name`.
    #[must_use]
    pub fn new(user_name: impl Into<String>, events: UgmEvents) -> Self {
        Self {
            user_name: user_name.into(),
            state: RwLock::new(UserState {
                queue_tracker: QueueTracker::new_root(),
                app_group_trackers: HashMap::new(),
            }),
            events,
        }
    }

    /// User name.
    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Add `usage` for `application_id` along `queue_path` in the user tree
    /// and in the bound group's tree.
    ///
    /// Returns true only when both ledgers accepted the increase. Without a
    /// bound group the user ledger alone decides.
    pub fn increase_tracked_resource(
        &self,
        queue_path: &str,
        application_id: &str,
        usage: &Resource,
    ) -> bool {
        let mut state = self.state.write();
        self.increase_locked(&mut state, queue_path, application_id, usage)
    }

    /// Bind `application_id` to `group` unless it is already bound, then
    /// increase as [`Self::increase_tracked_resource`].
    ///
    /// Binding, increase and dropping a binding made for a rejected increase
    /// happen under one write lock, so a concurrent increase of the same
    /// application never loses the binding its usage depends on.
    pub fn increase_tracked_resource_with_group(
        &self,
        queue_path: &str,
        application_id: &str,
        usage: &Resource,
        group: Option<Arc<GroupTracker>>,
    ) -> bool {
        let mut state = self.state.write();
        let newly_bound = match group {
            Some(group) => self.bind_locked(&mut state, application_id, group),
            None => false,
        };
        if self.increase_locked(&mut state, queue_path, application_id, usage) {
            return true;
        }
        if newly_bound {
            if let Some(group) = state.app_group_trackers.remove(application_id) {
                self.events
                    .send_app_group_unlinked(&self.user_name, group.group_name(), application_id);
            }
        }
        false
    }

    fn increase_locked(
        &self,
        state: &mut UserState,
        queue_path: &str,
        application_id: &str,
        usage: &Resource,
    ) -> bool {
        let newly_running = !state
            .queue_tracker
            .is_app_tracked(queue_path, application_id);
        if !state
            .queue_tracker
            .increase_tracked_resource(queue_path, application_id, usage)
        {
            tracing::debug!(
                user = %self.user_name,
                queue_path,
                application = application_id,
                "user limit rejected increase of {usage}"
            );
            return false;
        }
        let Some(group) = state.app_group_trackers.get(application_id).cloned() else {
            self.events
                .send_increase_resource_usage_for_user(&self.user_name, application_id, usage);
            return true;
        };
        tracing::debug!(
            group = group.group_name(),
            queue_path,
            application = application_id,
            "increasing resource usage for group by {usage}"
        );
        if group.increase_tracked_resource(queue_path, application_id, usage, &self.user_name) {
            self.events
                .send_increase_resource_usage_for_user(&self.user_name, application_id, usage);
            return true;
        }
        // The application only leaves the user tree if this call put it there.
        let rollback = state.queue_tracker.decrease_tracked_resource(
            queue_path,
            application_id,
            usage,
            newly_running,
        );
        if !rollback.decreased {
            let err = TrackerError::InconsistentRollback {
                user: self.user_name.clone(),
                group: group.group_name().to_string(),
                queue_path: queue_path.to_string(),
                application_id: application_id.to_string(),
                usage: usage.to_string(),
            };
            tracing::error!(
                user = %self.user_name,
                group = group.group_name(),
                queue_path,
                application = application_id,
                usage = %usage,
                "{err}"
            );
        }
        false
    }

    /// Subtract `usage` from the user tree only; the bound group is decreased
    /// by a separate call. With `remove_app` the group binding is dropped too.
    pub fn decrease_tracked_resource(
        &self,
        queue_path: &str,
        application_id: &str,
        usage: &Resource,
        remove_app: bool,
    ) -> DecreaseOutcome {
        let mut state = self.state.write();
        if remove_app {
            if let Some(group) = state.app_group_trackers.remove(application_id) {
                self.events
                    .send_app_group_unlinked(&self.user_name, group.group_name(), application_id);
            }
        }
        let outcome = state
            .queue_tracker
            .decrease_tracked_resource(queue_path, application_id, usage, remove_app);
        if outcome.decreased {
            self.events
                .send_decrease_resource_usage_for_user(&self.user_name, application_id, usage);
        }
        outcome
    }

    /// Is a group bound to `application_id`?
    pub fn has_group_for_app(&self, application_id: &str) -> bool {
        self.state
            .read()
            .app_group_trackers
            .contains_key(application_id)
    }

    /// Bind `application_id` to `group`. An existing binding is kept.
    ///
    /// Returns true when this call made the binding.
    pub fn set_group_for_app(&self, application_id: &str, group: Arc<GroupTracker>) -> bool {
        let mut state = self.state.write();
        self.bind_locked(&mut state, application_id, group)
    }

    fn bind_locked(
        &self,
        state: &mut UserState,
        application_id: &str,
        group: Arc<GroupTracker>,
    ) -> bool {
        if let Some(existing) = state.app_group_trackers.get(application_id) {
            if existing.group_name() != group.group_name() {
                tracing::warn!(
                    user = %self.user_name,
                    application = application_id,
                    "application already bound to group {}, ignoring {}",
                    existing.group_name(),
                    group.group_name()
                );
            }
            return false;
        }
        self.events
            .send_app_group_linked(&self.user_name, group.group_name(), application_id);
        state
            .app_group_trackers
            .insert(application_id.to_string(), group);
        true
    }

    /// Drop the group binding of `application_id`, returning the group it was
    /// bound to.
    pub fn remove_group_for_app(&self, application_id: &str) -> Option<Arc<GroupTracker>> {
        let group = self.state.write().app_group_trackers.remove(application_id)?;
        self.events
            .send_app_group_unlinked(&self.user_name, group.group_name(), application_id);
        Some(group)
    }

    /// Name of the group bound to `application_id`.
    pub fn get_group_for_app(&self, application_id: &str) -> Option<String> {
        self.state
            .read()
            .app_group_trackers
            .get(application_id)
            .map(|group| group.group_name().to_string())
    }

    /// Group tracker bound to `application_id`.
    pub fn group_tracker_for_app(&self, application_id: &str) -> Option<Arc<GroupTracker>> {
        self.state
            .read()
            .app_group_trackers
            .get(application_id)
            .cloned()
    }

    /// Application id to group name for every bound application.
    pub fn tracked_applications(&self) -> HashMap<String, String> {
        self.state
            .read()
            .app_group_trackers
            .iter()
            .map(|(app, group)| (app.clone(), group.group_name().to_string()))
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
            EventDetail::UserLimit,
            &self.user_name,
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
                EventDetail::UserLimit,
                &self.user_name,
                &limit.queue_path,
                limit.max_resources.as_ref(),
            );
        }
        Ok(())
    }

    /// User headroom at `queue_path`, `None` when unbounded.
    pub fn headroom(&self, queue_path: &str) -> Result<Option<Resource>, TrackerError> {
        self.state.read().queue_tracker.headroom(queue_path)
    }

    /// Deep snapshot for reporting.
    pub fn user_resource_usage_dao_info(&self) -> UserResourceUsageDaoInfo {
        let state = self.state.read();
        UserResourceUsageDaoInfo {
            user_name: self.user_name.clone(),
            groups: state
                .app_group_trackers
                .iter()
                .map(|(app, group)| (app.clone(), group.group_name().to_string()))
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
