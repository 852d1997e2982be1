//! Builder that turns a [`TrackerConfig`] into a ready [`UsageRegistry`].

use std::sync::Arc;

use crate::config::TrackerConfig;
use crate::core::{EventSystem, InMemoryEventSystem, TrackerError, UgmEvents, UsageRegistry};

/// Build a usage registry from tracker configuration.
///
/// When events are enabled, records go to `event_system` or, if none is
/// given, to an in-memory system sized by `events.buffer_size`. When events
/// are disabled `event_system` is ignored.
pub fn build_registry(
    cfg: &TrackerConfig,
    event_system: Option<Arc<dyn EventSystem>>,
) -> Result<UsageRegistry, TrackerError> {
    cfg.validate()
        .map_err(|e| TrackerError::InvalidConfig(format!("config invalid: {e}")))?;

    let events = if cfg.events.enabled {
        let system = event_system.unwrap_or_else(|| {
            Arc::new(InMemoryEventSystem::new(cfg.events.buffer_size)) as Arc<dyn EventSystem>
        });
        UgmEvents::new(Some(system))
    } else {
        UgmEvents::disabled()
    };
    tracing::info!(
        limits = cfg.limits.len(),
        events = events.enabled(),
        "building usage registry"
    );
    Ok(UsageRegistry::new(cfg.clone(), events))
}
