//! Limit and event channel configuration.
//!
//! Limits arrive already resolved: each entry names a queue path, the users
//! and groups it applies to, and the numeric caps.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{AppResult, QueueLimit, Resource};
use crate::util::path::{is_same_or_ancestor, split_queue_path};

const fn default_buffer_size() -> usize {
    1024
}

/// Event channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Emit usage events. Disabled by default.
    #[serde(default)]
    pub enabled: bool,
    /// Records kept by the default in-memory event system.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            buffer_size: default_buffer_size(),
        }
    }
}

/// Limit for a set of users and groups at one queue path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitConfig {
    /// Root-anchored queue path the limit applies to.
    pub queue_path: String,
    /// Users the limit applies to, each individually.
    #[serde(default)]
    pub users: Vec<String>,
    /// Groups the limit applies to, each individually.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Resource cap, absent when unbounded.
    #[serde(default)]
    pub max_resources: Option<Resource>,
    /// Application cap, zero when unbounded.
    #[serde(default)]
    pub max_applications: u64,
}

impl LimitConfig {
    /// Validate a single limit entry.
    pub fn validate(&self) -> Result<(), String> {
        split_queue_path(&self.queue_path).map_err(|e| e.to_string())?;
        if self.users.is_empty() && self.groups.is_empty() {
            return Err("at least one user or group must be listed".into());
        }
        if let Some(max) = &self.max_resources {
            if let Some((name, quantity)) = max.iter().find(|(_, quantity)| *quantity < 0) {
                return Err(format!("max_resources `{name}` is negative: {quantity}"));
            }
        }
        Ok(())
    }

    fn queue_limit(&self) -> QueueLimit {
        QueueLimit {
            queue_path: self.queue_path.clone(),
            max_resources: self.max_resources.clone(),
            max_applications: self.max_applications,
        }
    }
}

/// Root tracker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Configured limits.
    #[serde(default)]
    pub limits: Vec<LimitConfig>,
    /// Event channel settings.
    #[serde(default)]
    pub events: EventsConfig,
}

impl TrackerConfig {
    /// Validate every limit and reject users or groups listed twice for the
    /// same queue path.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for limit in &self.limits {
            limit
                .validate()
                .map_err(|e| format!("limit for `{}` invalid: {e}", limit.queue_path))?;
            for user in &limit.users {
                if !seen.insert((limit.queue_path.as_str(), "user", user.as_str())) {
                    return Err(format!(
                        "user `{user}` has more than one limit for `{}`",
                        limit.queue_path
                    ));
                }
            }
            for group in &limit.groups {
                if !seen.insert((limit.queue_path.as_str(), "group", group.as_str())) {
                    return Err(format!(
                        "group `{group}` has more than one limit for `{}`",
                        limit.queue_path
                    ));
                }
            }
        }
        if self.events.enabled && self.events.buffer_size == 0 {
            return Err("events.buffer_size must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse tracker configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("reading tracker config {}", path.display()))?;
        Self::from_json_str(&input)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("loading tracker config {}", path.display()))
    }

    /// Limits that apply to `user`.
    #[must_use]
    pub fn user_limits(&self, user: &str) -> Vec<QueueLimit> {
        self.limits
            .iter()
            .filter(|limit| limit.users.iter().any(|u| u == user))
            .map(LimitConfig::queue_limit)
            .collect()
    }

    /// Limits that apply to `group`.
    #[must_use]
    pub fn group_limits(&self, group: &str) -> Vec<QueueLimit> {
        self.limits
            .iter()
            .filter(|limit| limit.groups.iter().any(|g| g == group))
            .map(LimitConfig::queue_limit)
            .collect()
    }

    /// First of `groups` with a limit on `queue_path` or one of its ancestors.
    #[must_use]
    pub fn limited_group_for_queue<'a>(
        &self,
        groups: &'a [String],
        queue_path: &str,
    ) -> Option<&'a str> {
        groups
            .iter()
            .find(|group| {
                self.limits.iter().any(|limit| {
                    limit.groups.contains(group)
                        && is_same_or_ancestor(&limit.queue_path, queue_path)
                })
            })
            .map(String::as_str)
    }
}
