//! Error types for usage tracking operations.

use thiserror::Error;

/// Errors produced by the usage trackers and the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// Increase rejected because a resource cap or application cap would be violated.
    #[error("limit exceeded for {subject} at queue {queue_path} (application {application_id})")]
    LimitExceeded {
        /// User name the increase was attempted for.
        subject: String,
        /// Queue path of the attempted increase.
        queue_path: String,
        /// Application the usage belongs to.
        application_id: String,
    },
    /// Decrease requested against usage that is not tracked.
    #[error("untracked decrease for {subject} at queue {queue_path} (application {application_id})")]
    UntrackedDecrease {
        /// User or group name the decrease was attempted for.
        subject: String,
        /// Queue path of the attempted decrease.
        queue_path: String,
        /// Application the usage belongs to.
        application_id: String,
    },
    /// Compensating decrease after a rejected group increase did not apply.
    #[error(
        "rollback of user {user} usage {usage} at queue {queue_path} failed after group {group} rejected application {application_id}"
    )]
    InconsistentRollback {
        /// Owning user.
        user: String,
        /// Group that rejected the increase.
        group: String,
        /// Queue path of the increase.
        queue_path: String,
        /// Application the usage belongs to.
        application_id: String,
        /// Amount that could not be rolled back, rendered for logs.
        usage: String,
    },
    /// Queue path is not root-anchored or has empty segments.
    #[error("invalid queue path: {0}")]
    InvalidQueuePath(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
