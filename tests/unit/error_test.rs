//! Tests for error types

use ugm_tracker::core::TrackerError;

#[test]
fn test_limit_exceeded_error() {
    let err = TrackerError::LimitExceeded {
        subject: "alice".to_string(),
        queue_path: "root.teamA".to_string(),
        application_id: "app1".to_string(),
    };
    assert_eq!(
        format!("{err}"),
        "limit exceeded for alice at queue root.teamA (application app1)"
    );
}

#[test]
fn test_untracked_decrease_error() {
    let err = TrackerError::UntrackedDecrease {
        subject: "dev".to_string(),
        queue_path: "root.a".to_string(),
        application_id: "app9".to_string(),
    };
    assert_eq!(
        format!("{err}"),
        "untracked decrease for dev at queue root.a (application app9)"
    );
}

#[test]
fn test_invalid_queue_path_error() {
    let err = TrackerError::InvalidQueuePath("teamA".to_string());
    assert!(format!("{err}").starts_with("invalid queue path: "));
}

#[test]
fn test_invalid_config_error() {
    let err = TrackerError::InvalidConfig("bad".to_string());
    assert_eq!(format!("{err}"), "invalid configuration: bad");
}

#[test]
fn test_inconsistent_rollback_mentions_both_sides() {
    let err = TrackerError::InconsistentRollback {
        user: "alice".to_string(),
        group: "dev".to_string(),
        queue_path: "root.a".to_string(),
        application_id: "app1".to_string(),
        usage: "{vcore: 2}".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("alice"));
    assert!(msg.contains("dev"));
    assert!(msg.contains("{vcore: 2}"));
}
