//! Tests for event sinks

use std::sync::Arc;

use ugm_tracker::core::{
    ChannelEventSystem, EventAction, EventDetail, EventRecord, EventSystem, GroupTracker,
    InMemoryEventSystem, Resource, UgmEvents, UserTracker,
};

#[test]
fn test_event_record_ids_are_unique() {
    let record = || {
        EventRecord::new("alice", "", "app1", EventAction::Add, EventDetail::UserResource, None)
    };
    assert_ne!(record().event_id, record().event_id);
}

#[test]
fn test_channel_event_system_drops_when_full() {
    let (system, receiver) = ChannelEventSystem::bounded(1);
    for _ in 0..3 {
        system.add_event(EventRecord::new(
            "dev",
            "root.a",
            "",
            EventAction::Set,
            EventDetail::GroupLimit,
            None,
        ));
    }
    assert_eq!(receiver.try_iter().count(), 1);
}

#[test]
fn test_channel_event_system_survives_closed_receiver() {
    let (system, receiver) = ChannelEventSystem::bounded(1);
    drop(receiver);
    system.add_event(EventRecord::new(
        "alice",
        "",
        "app1",
        EventAction::Remove,
        EventDetail::UserResource,
        None,
    ));
}

#[test]
fn test_trackers_emit_limit_events() {
    let system = Arc::new(InMemoryEventSystem::new(16));
    let events = UgmEvents::new(Some(system.clone()));
    let user = UserTracker::new("alice", events.clone());
    let group = GroupTracker::new("dev", events);
    user.set_limits("root.a", Some(Resource::from_pairs([("vcore", 4)])), 1)
        .unwrap();
    group.set_limits("root.b", None, 3).unwrap();

    let recorded = system.events();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].detail, EventDetail::UserLimit);
    assert_eq!(recorded[0].reason, "root.a");
    assert_eq!(recorded[0].action, EventAction::Set);
    assert_eq!(recorded[1].detail, EventDetail::GroupLimit);
    assert_eq!(recorded[1].resource, None);
}
