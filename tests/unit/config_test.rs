//! Tests for configuration validation

use std::io::Write;

use ugm_tracker::config::{EventsConfig, LimitConfig, TrackerConfig};
use ugm_tracker::core::Resource;

fn limit(queue_path: &str) -> LimitConfig {
    LimitConfig {
        queue_path: queue_path.to_string(),
        users: vec!["alice".to_string()],
        groups: Vec::new(),
        max_resources: Some(Resource::from_pairs([("memory", 1024), ("vcore", 4)])),
        max_applications: 2,
    }
}

#[test]
fn test_limit_config_validation() {
    assert!(limit("root.teamA").validate().is_ok());
}

#[test]
fn test_limit_config_invalid_queue_path() {
    assert!(limit("teamA").validate().is_err());
    assert!(limit("root..teamA").validate().is_err());
}

#[test]
fn test_limit_config_requires_a_subject() {
    let mut invalid = limit("root.teamA");
    invalid.users.clear();
    assert!(invalid.validate().is_err());
}

#[test]
fn test_limit_config_rejects_negative_quantity() {
    let mut invalid = limit("root.teamA");
    invalid.max_resources = Some(Resource::from_pairs([("vcore", -1)]));
    assert!(invalid.validate().is_err());
}

#[test]
fn test_tracker_config_rejects_duplicate_user() {
    let cfg = TrackerConfig {
        limits: vec![limit("root.teamA"), limit("root.teamA")],
        events: EventsConfig::default(),
    };
    assert!(cfg.validate().is_err());

    let cfg = TrackerConfig {
        limits: vec![limit("root.teamA"), limit("root.teamB")],
        events: EventsConfig::default(),
    };
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_tracker_config_rejects_empty_event_buffer() {
    let cfg = TrackerConfig {
        limits: Vec::new(),
        events: EventsConfig {
            enabled: true,
            buffer_size: 0,
        },
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_tracker_config_from_json_defaults() {
    let cfg = TrackerConfig::from_json_str(
        r#"{"limits": [{"queue_path": "root.a", "groups": ["dev"]}]}"#,
    )
    .unwrap();
    assert!(!cfg.events.enabled);
    assert_eq!(cfg.events.buffer_size, 1024);
    assert_eq!(cfg.limits[0].max_resources, None);
    assert_eq!(cfg.limits[0].max_applications, 0);
    assert_eq!(cfg.group_limits("dev").len(), 1);
}

#[test]
fn test_tracker_config_from_json_parse_error() {
    let err = TrackerConfig::from_json_str("{not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_tracker_config_from_file() {
    let path = std::env::temp_dir().join(format!("ugm-config-{}.json", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        r#"{{"limits": [{{"queue_path": "root.teamA", "users": ["alice"], "max_resources": {{"vcore": 10}}}}]}}"#
    )
    .unwrap();
    drop(file);

    let cfg = TrackerConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    let limits = cfg.user_limits("alice");
    assert_eq!(limits.len(), 1);
    assert_eq!(limits[0].max_resources, Some(Resource::from_pairs([("vcore", 10)])));
}

#[test]
fn test_tracker_config_from_missing_file() {
    let err = TrackerConfig::from_file("/nonexistent/ugm.json").unwrap_err();
    assert!(format!("{err:#}").contains("reading tracker config"));
}
