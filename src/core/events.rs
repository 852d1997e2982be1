//! Usage event records and sinks.
//!
//! Events are best effort: trackers only emit them when an [`EventSystem`] is
//! attached, and a sink that drops records never affects tracking.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::core::Resource;
use crate::util::clock::now_ms;

/// What happened to the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// Something was added or increased.
    Add,
    /// Something was removed or decreased.
    Remove,
    /// Something was overwritten.
    Set,
}

/// Kind of change the record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDetail {
    /// Usage of a user changed.
    UserResource,
    /// Usage of a group changed.
    GroupResource,
    /// An application was linked to or unlinked from a group.
    AppGroupLink,
    /// A user limit was set.
    UserLimit,
    /// A group limit was set.
    GroupLimit,
}

/// Immutable, timestamped event record.
#[derive(Debug, Clone)]
pub struct EventRecord {
    /// Event identifier.
    pub event_id: Uuid,
    /// User or group the event is about.
    pub object_id: String,
    /// Free-form reason, e.g. the group name or queue path.
    pub reason: String,
    /// Related object, usually the application id.
    pub reference_id: String,
    /// Action taken.
    pub action: EventAction,
    /// Kind of change.
    pub detail: EventDetail,
    /// Resource payload, if any.
    pub resource: Option<Resource>,
    /// Timestamp milliseconds.
    pub timestamp_ms: u128,
}

impl EventRecord {
    /// Build a record stamped with a fresh id and the current time.
    pub fn new(
        object_id: impl Into<String>,
        reason: impl Into<String>,
        reference_id: impl Into<String>,
        action: EventAction,
        detail: EventDetail,
        resource: Option<Resource>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            object_id: object_id.into(),
            reason: reason.into(),
            reference_id: reference_id.into(),
            action,
            detail,
            resource,
            timestamp_ms: now_ms(),
        }
    }
}

/// External event bus abstraction.
pub trait EventSystem: Send + Sync {
    /// Publish one record.
    fn add_event(&self, event: EventRecord);
}

/// In-memory event system for testing and dev.
pub struct InMemoryEventSystem {
    events: Mutex<VecDeque<EventRecord>>,
    max_events: usize,
}

impl InMemoryEventSystem {
    /// Create a new in-memory system with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().iter().cloned().collect()
    }
}

impl EventSystem for InMemoryEventSystem {
    fn add_event(&self, event: EventRecord) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Event system forwarding records over a bounded channel.
pub struct ChannelEventSystem {
    sender: Sender<EventRecord>,
}

impl ChannelEventSystem {
    /// Create the system and the receiving end of its channel.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, Receiver<EventRecord>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self { sender }, receiver)
    }
}

impl EventSystem for ChannelEventSystem {
    fn add_event(&self, event: EventRecord) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::debug!("event channel full, dropping event {}", event.event_id);
            }
            Err(TrySendError::Disconnected(event)) => {
                tracing::debug!("event channel closed, dropping event {}", event.event_id);
            }
        }
    }
}

/// Emits usage events when an event system is attached.
#[derive(Clone, Default)]
pub struct UgmEvents {
    event_system: Option<Arc<dyn EventSystem>>,
}

impl fmt::Debug for UgmEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UgmEvents")
            .field("enabled", &self.enabled())
            .finish()
    }
}

impl UgmEvents {
    /// Events go to `event_system`, or nowhere when `None`.
    #[must_use]
    pub fn new(event_system: Option<Arc<dyn EventSystem>>) -> Self {
        Self { event_system }
    }

    /// Disabled emitter.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { event_system: None }
    }

    /// Is an event system attached?
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.event_system.is_some()
    }

    fn send(&self, build: impl FnOnce() -> EventRecord) {
        if let Some(system) = &self.event_system {
            system.add_event(build());
        }
    }

    pub(crate) fn send_increase_resource_usage_for_user(
        &self,
        user: &str,
        application_id: &str,
        usage: &Resource,
    ) {
        self.send(|| {
            EventRecord::new(
                user,
                "",
                application_id,
                EventAction::Add,
                EventDetail::UserResource,
                Some(usage.clone()),
            )
        });
    }

    pub(crate) fn send_decrease_resource_usage_for_user(
        &self,
        user: &str,
        application_id: &str,
        usage: &Resource,
    ) {
        self.send(|| {
            EventRecord::new(
                user,
                "",
                application_id,
                EventAction::Remove,
                EventDetail::UserResource,
                Some(usage.clone()),
            )
        });
    }

    pub(crate) fn send_increase_resource_usage_for_group(
        &self,
        group: &str,
        application_id: &str,
        usage: &Resource,
    ) {
        self.send(|| {
            EventRecord::new(
                group,
                "",
                application_id,
                EventAction::Add,
                EventDetail::GroupResource,
                Some(usage.clone()),
            )
        });
    }

    pub(crate) fn send_decrease_resource_usage_for_group(
        &self,
        group: &str,
        application_id: &str,
        usage: &Resource,
    ) {
        self.send(|| {
            EventRecord::new(
                group,
                "",
                application_id,
                EventAction::Remove,
                EventDetail::GroupResource,
                Some(usage.clone()),
            )
        });
    }

    pub(crate) fn send_app_group_linked(&self, user: &str, group: &str, application_id: &str) {
        self.send(|| {
            EventRecord::new(
                user,
                group,
                application_id,
                EventAction::Add,
                EventDetail::AppGroupLink,
                None,
            )
        });
    }

    pub(crate) fn send_app_group_unlinked(&self, user: &str, group: &str, application_id: &str) {
        self.send(|| {
            EventRecord::new(
                user,
                group,
                application_id,
                EventAction::Remove,
                EventDetail::AppGroupLink,
                None,
            )
        });
    }

    pub(crate) fn send_limit_set(
        &self,
        detail: EventDetail,
        name: &str,
        queue_path: &str,
        limit: Option<&Resource>,
    ) {
        self.send(|| {
            EventRecord::new(name, queue_path, "", EventAction::Set, detail, limit.cloned())
        });
    }
}
