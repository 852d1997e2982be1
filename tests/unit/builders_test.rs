//! Tests for the registry builder

use std::sync::Arc;

use ugm_tracker::builders::build_registry;
use ugm_tracker::config::{EventsConfig, TrackerConfig};
use ugm_tracker::core::{
    ChannelEventSystem, EventAction, EventDetail, EventSystem, Resource, TrackerError, UserGroup,
};

#[test]
fn test_build_registry_rejects_invalid_config() {
    let cfg = TrackerConfig {
        limits: Vec::new(),
        events: EventsConfig {
            enabled: true,
            buffer_size: 0,
        },
    };
    let Err(err) = build_registry(&cfg, None) else {
        panic!("expected invalid config");
    };
    assert!(matches!(err, TrackerError::InvalidConfig(_)));
}

#[test]
fn test_build_registry_without_events() {
    let (system, receiver) = ChannelEventSystem::bounded(8);
    let system: Arc<dyn EventSystem> = Arc::new(system);
    let registry = build_registry(&TrackerConfig::default(), Some(system)).unwrap();
    registry
        .increase_tracked_resource(
            "root.a",
            "app1",
            &Resource::from_pairs([("vcore", 1)]),
            &UserGroup::new("alice", ["dev"]),
        )
        .unwrap();
    assert!(receiver.try_recv().is_err());
}

#[test]
fn test_build_registry_with_channel_events() {
    let cfg = TrackerConfig {
        limits: Vec::new(),
        events: EventsConfig {
            enabled: true,
            buffer_size: 16,
        },
    };
    let (system, receiver) = ChannelEventSystem::bounded(16);
    let registry = build_registry(&cfg, Some(Arc::new(system))).unwrap();
    let alice = UserGroup::new("alice", ["dev"]);
    let usage = Resource::from_pairs([("vcore", 2)]);
    registry
        .increase_tracked_resource("root.a", "app1", &usage, &alice)
        .unwrap();

    let events: Vec<_> = receiver.try_iter().collect();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].detail, EventDetail::AppGroupLink);
    assert_eq!(events[0].object_id, "alice");
    assert_eq!(events[0].reason, "dev");
    assert_eq!(events[1].detail, EventDetail::GroupResource);
    assert_eq!(events[1].object_id, "dev");
    assert_eq!(events[2].detail, EventDetail::UserResource);
    assert_eq!(events[2].action, EventAction::Add);
    assert_eq!(events[2].resource, Some(usage.clone()));

    registry
        .decrease_tracked_resource("root.a", "app1", &usage, &alice, true)
        .unwrap();
    let events: Vec<_> = receiver.try_iter().collect();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|event| event.action == EventAction::Remove));
}
