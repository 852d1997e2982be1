//! Process-wide registry of user and group trackers.
//!
//! The registry creates trackers on first use, applies the configured limits
//! to them, binds applications to groups and evicts trackers once they are
//! empty. Lock order is user tracker, then group tracker. Registry map
//! guards are never held while calling into a live tracker; the config guard
//! is only ever taken inside a map guard, when a new tracker is built.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::TrackerConfig;
use crate::core::events::UgmEvents;
use crate::core::{
    GroupResourceUsageDaoInfo, GroupTracker, Resource, TrackerError, UserResourceUsageDaoInfo,
    UserTracker,
};
use crate::util::path::split_queue_path;

/// A user and the groups it belongs to, primary group first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserGroup {
    /// User name.
    pub user: String,
    /// Group names, primary group first.
    pub groups: Vec<String>,
}

impl UserGroup {
    /// Build from a user name and its groups.
    pub fn new<I, S>(user: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user: user.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }
}

/// Process-wide map from user and group names to their trackers.
pub struct UsageRegistry {
    user_trackers: RwLock<HashMap<String, Arc<UserTracker>>>,
    group_trackers: RwLock<HashMap<String, Arc<GroupTracker>>>,
    config: RwLock<TrackerConfig>,
    events: UgmEvents,
}

impl Default for UsageRegistry {
    fn default() -> Self {
        Self::new(TrackerConfig::default(), UgmEvents::disabled())
    }
}

impl UsageRegistry {
    /// Create a registry with `config` limits. The config is assumed valid;
    /// use the builder to validate it.
    #[must_use]
    pub fn new(config: TrackerConfig, events: UgmEvents) -> Self {
        Self {
            user_trackers: RwLock::new(HashMap::new()),
            group_trackers: RwLock::new(HashMap::new()),
            config: RwLock::new(config),
            events,
        }
    }

    /// Track `usage` for `application_id` run by `user` at `queue_path`.
    ///
    /// The application is bound to a group on first use. Fails with
    /// [`TrackerError::LimitExceeded`] when the user or group ledger rejects
    /// the increase; nothing is tracked in that case.
    pub fn increase_tracked_resource(
        &self,
        queue_path: &str,
        application_id: &str,
        usage: &Resource,
        user: &UserGroup,
    ) -> Result<(), TrackerError> {
        split_queue_path(queue_path)?;
        let user_tracker = self.get_or_create_user_tracker(&user.user);
        // Only a hint; the binding is re-checked under the user lock.
        let group_tracker = if user_tracker.has_group_for_app(application_id) {
            None
        } else {
            self.select_group(user, queue_path)
                .map(|group_name| self.get_or_create_group_tracker(&group_name))
        };
        let selected_group = group_tracker
            .as_ref()
            .map(|group| group.group_name().to_string());
        if user_tracker.increase_tracked_resource_with_group(
            queue_path,
            application_id,
            usage,
            group_tracker,
        ) {
            return Ok(());
        }
        let group_name = user_tracker
            .get_group_for_app(application_id)
            .or(selected_group);
        user_tracker.prune_empty_path(queue_path);
        drop(user_tracker);
        self.remove_user_tracker_if_unused(&user.user);
        if let Some(group_name) = group_name {
            self.remove_group_tracker_if_unused(&group_name);
        }
        Err(TrackerError::LimitExceeded {
            subject: user.user.clone(),
            queue_path: queue_path.to_string(),
            application_id: application_id.to_string(),
        })
    }

    /// Release `usage` for `application_id` run by `user` at `queue_path` from
    /// the user ledger and then from the bound group ledger.
    ///
    /// With `remove_app` the application is forgotten, emptied queue paths are
    /// pruned and trackers left empty are evicted.
    pub fn decrease_tracked_resource(
        &self,
        queue_path: &str,
        application_id: &str,
        usage: &Resource,
        user: &UserGroup,
        remove_app: bool,
    ) -> Result<(), TrackerError> {
        split_queue_path(queue_path)?;
        let untracked = |subject: &str| TrackerError::UntrackedDecrease {
            subject: subject.to_string(),
            queue_path: queue_path.to_string(),
            application_id: application_id.to_string(),
        };
        let Some(user_tracker) = self.user_tracker(&user.user) else {
            tracing::warn!(user = %user.user, queue_path, "decrease for unknown user");
            return Err(untracked(&user.user));
        };
        let group_tracker = user_tracker.group_tracker_for_app(application_id);
        let outcome =
            user_tracker.decrease_tracked_resource(queue_path, application_id, usage, remove_app);
        if !outcome.decreased {
            return Err(untracked(&user.user));
        }
        let mut group_untracked = None;
        if let Some(group_tracker) = &group_tracker {
            let outcome = group_tracker.decrease_tracked_resource(
                queue_path,
                application_id,
                usage,
                remove_app,
            );
            if !outcome.decreased {
                tracing::warn!(
                    group = group_tracker.group_name(),
                    queue_path,
                    application = application_id,
                    "group usage not tracked, user usage was decreased"
                );
                group_untracked = Some(untracked(group_tracker.group_name()));
            }
        }
        // The user side was released, group outcome aside.
        if remove_app {
            user_tracker.prune_empty_path(queue_path);
            drop(user_tracker);
            self.remove_user_tracker_if_unused(&user.user);
            if let Some(group_tracker) = group_tracker {
                group_tracker.prune_empty_path(queue_path);
                let group_name = group_tracker.group_name().to_string();
                drop(group_tracker);
                self.remove_group_tracker_if_unused(&group_name);
            }
        }
        group_untracked.map_or(Ok(()), Err)
    }

    /// Headroom of `user` at `queue_path`, combined with the headroom of the
    /// group bound to `application_id` (or the group it would be bound to).
    /// `None` when nothing limits it.
    pub fn headroom(
        &self,
        queue_path: &str,
        application_id: &str,
        user: &UserGroup,
    ) -> Result<Option<Resource>, TrackerError> {
        split_queue_path(queue_path)?;
        let (user_headroom, group_tracker) = match self.user_tracker(&user.user) {
            Some(user_tracker) => (
                user_tracker.headroom(queue_path)?,
                user_tracker.group_tracker_for_app(application_id),
            ),
            None => {
                let limits = self.config.read().user_limits(&user.user);
                let user_tracker = UserTracker::new(user.user.clone(), UgmEvents::disabled());
                user_tracker.replace_limits(&limits)?;
                (user_tracker.headroom(queue_path)?, None)
            }
        };
        let group_headroom = match group_tracker {
            Some(group_tracker) => group_tracker.headroom(queue_path)?,
            None => self.unbound_group_headroom(queue_path, user)?,
        };
        Ok(Resource::component_wise_min_permissive(
            user_headroom.as_ref(),
            group_headroom.as_ref(),
        ))
    }

    /// Headroom of the group an unbound application of `user` would get.
    fn unbound_group_headroom(
        &self,
        queue_path: &str,
        user: &UserGroup,
    ) -> Result<Option<Resource>, TrackerError> {
        let selected = {
            let config = self.config.read();
            Self::select_group_from(&config, user, queue_path).map(|name| {
                let limits = config.group_limits(&name);
                (name, limits)
            })
        };
        let Some((group_name, group_limits)) = selected else {
            return Ok(None);
        };
        if let Some(group_tracker) = self.group_tracker(&group_name) {
            return group_tracker.headroom(queue_path);
        }
        let group_tracker = GroupTracker::new(group_name, UgmEvents::disabled());
        group_tracker.replace_limits(&group_limits)?;
        group_tracker.headroom(queue_path)
    }

    /// Install a new configuration and re-apply limits to every live tracker.
    pub fn update_limits(&self, config: TrackerConfig) -> Result<(), TrackerError> {
        config.validate().map_err(TrackerError::InvalidConfig)?;
        *self.config.write() = config.clone();

        let users: Vec<Arc<UserTracker>> = self.user_trackers.read().values().cloned().collect();
        for user_tracker in users {
            user_tracker.replace_limits(&config.user_limits(user_tracker.user_name()))?;
        }
        let groups: Vec<Arc<GroupTracker>> = self.group_trackers.read().values().cloned().collect();
        for group_tracker in groups {
            group_tracker.replace_limits(&config.group_limits(group_tracker.group_name()))?;
        }
        tracing::info!("limits updated for live trackers");
        Ok(())
    }

    /// Tracker of `user`, if one is live.
    pub fn user_tracker(&self, user: &str) -> Option<Arc<UserTracker>> {
        self.user_trackers.read().get(user).cloned()
    }

    /// Tracker of `group`, if one is live.
    pub fn group_tracker(&self, group: &str) -> Option<Arc<GroupTracker>> {
        self.group_trackers.read().get(group).cloned()
    }

    /// Snapshot of one user.
    pub fn user_resource_usage(&self, user: &str) -> Option<UserResourceUsageDaoInfo> {
        self.user_tracker(user)
            .map(|tracker| tracker.user_resource_usage_dao_info())
    }

    /// Snapshot of one group.
    pub fn group_resource_usage(&self, group: &str) -> Option<GroupResourceUsageDaoInfo> {
        self.group_tracker(group)
            .map(|tracker| tracker.group_resource_usage_dao_info())
    }

    /// Snapshots of every live user, sorted by name.
    pub fn users_resource_usage(&self) -> Vec<UserResourceUsageDaoInfo> {
        let users: Vec<Arc<UserTracker>> = self.user_trackers.read().values().cloned().collect();
        let mut snapshots: Vec<_> = users
            .iter()
            .map(|tracker| tracker.user_resource_usage_dao_info())
            .collect();
        snapshots.sort_by(|a, b| a.user_name.cmp(&b.user_name));
        snapshots
    }

    /// Snapshots of every live group, sorted by name.
    pub fn groups_resource_usage(&self) -> Vec<GroupResourceUsageDaoInfo> {
        let groups: Vec<Arc<GroupTracker>> = self.group_trackers.read().values().cloned().collect();
        let mut snapshots: Vec<_> = groups
            .iter()
            .map(|tracker| tracker.group_resource_usage_dao_info())
            .collect();
        snapshots.sort_by(|a, b| a.group_name.cmp(&b.group_name));
        snapshots
    }

    fn select_group(&self, user: &UserGroup, queue_path: &str) -> Option<String> {
        Self::select_group_from(&self.config.read(), user, queue_path)
    }

    fn select_group_from(
        config: &TrackerConfig,
        user: &UserGroup,
        queue_path: &str,
    ) -> Option<String> {
        config
            .limited_group_for_queue(&user.groups, queue_path)
            .or_else(|| user.groups.first().map(String::as_str))
            .map(str::to_string)
    }

    fn get_or_create_user_tracker(&self, user: &str) -> Arc<UserTracker> {
        if let Some(tracker) = self.user_tracker(user) {
            return tracker;
        }
        let mut users = self.user_trackers.write();
        let tracker = users.entry(user.to_string()).or_insert_with(|| {
            // Config is read under the map guard, see `update_limits`.
            let limits = self.config.read().user_limits(user);
            let tracker = UserTracker::new(user, self.events.clone());
            if let Err(err) = tracker.replace_limits(&limits) {
                tracing::warn!(user, "applying configured limits failed: {err}");
            }
            tracing::debug!(user, "created user tracker");
            Arc::new(tracker)
        });
        Arc::clone(tracker)
    }

    fn get_or_create_group_tracker(&self, group: &str) -> Arc<GroupTracker> {
        if let Some(tracker) = self.group_tracker(group) {
            return tracker;
        }
        let mut groups = self.group_trackers.write();
        let tracker = groups.entry(group.to_string()).or_insert_with(|| {
            // Config is read under the map guard, see `update_limits`.
            let limits = self.config.read().group_limits(group);
            let tracker = GroupTracker::new(group, self.events.clone());
            if let Err(err) = tracker.replace_limits(&limits) {
                tracing::warn!(group, "applying configured limits failed: {err}");
            }
            tracing::debug!(group, "created group tracker");
            Arc::new(tracker)
        });
        Arc::clone(tracker)
    }

    /// Evict `user` when its tracker is empty and only the map refers to it.
    fn remove_user_tracker_if_unused(&self, user: &str) {
        let mut users = self.user_trackers.write();
        let removable = users
            .get(user)
            .is_some_and(|tracker| Arc::strong_count(tracker) == 1 && tracker.can_be_removed());
        if removable {
            users.remove(user);
            tracing::debug!(user, "removed user tracker");
        }
    }

    /// Evict `group` when its tracker is empty and no binding refers to it.
    fn remove_group_tracker_if_unused(&self, group: &str) {
        let mut groups = self.group_trackers.write();
        let removable = groups
            .get(group)
            .is_some_and(|tracker| Arc::strong_count(tracker) == 1 && tracker.can_be_removed());
        if removable {
            groups.remove(group);
            tracing::debug!(group, "removed group tracker");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_group_prefers_limited_group() {
        let cfg = TrackerConfig::from_json_str(
            r#"{"limits": [{"queue_path": "root.teamA", "groups": ["ops"], "max_applications": 2}]}"#,
        )
        .unwrap();
        let user = UserGroup::new("alice", ["dev", "ops"]);
        assert_eq!(
            UsageRegistry::select_group_from(&cfg, &user, "root.teamA.leaf").as_deref(),
            Some("ops")
        );
        assert_eq!(
            UsageRegistry::select_group_from(&cfg, &user, "root.teamB").as_deref(),
            Some("dev")
        );
        let loner = UserGroup::new("bob", Vec::<String>::new());
        assert_eq!(UsageRegistry::select_group_from(&cfg, &loner, "root.teamA"), None);
    }
}
