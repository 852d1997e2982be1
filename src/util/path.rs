//! Queue path helpers.
//!
//! Queue paths are root-anchored and dot separated, e.g. `root.teamA.leaf`.

use crate::core::TrackerError;

/// Name of the queue every path is anchored at.
pub const ROOT_QUEUE: &str = "root";

/// Separator between queue path segments.
pub const QUEUE_SEPARATOR: char = '.';

/// Split a queue path into the segments below `root`.
///
/// `root` itself yields an empty vector. Paths that are not anchored at
/// `root` or that contain empty segments are rejected.
pub fn split_queue_path(queue_path: &str) -> Result<Vec<&str>, TrackerError> {
    let mut segments = queue_path.split(QUEUE_SEPARATOR);
    if segments.next() != Some(ROOT_QUEUE) {
        return Err(TrackerError::InvalidQueuePath(queue_path.to_string()));
    }
    let below_root: Vec<&str> = segments.collect();
    if below_root.iter().any(|segment| segment.is_empty()) {
        return Err(TrackerError::InvalidQueuePath(queue_path.to_string()));
    }
    Ok(below_root)
}

/// Parent of a queue path, `None` for a single-segment path.
#[must_use]
pub fn parent_queue_path(queue_path: &str) -> Option<&str> {
    queue_path
        .rsplit_once(QUEUE_SEPARATOR)
        .map(|(parent, _)| parent)
}

/// Full path of `name` below `parent`.
#[must_use]
pub fn join_queue_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        return name.to_string();
    }
    format!("{parent}{QUEUE_SEPARATOR}{name}")
}

/// True when `ancestor` is `queue_path` or one of its ancestors.
#[must_use]
pub fn is_same_or_ancestor(ancestor: &str, queue_path: &str) -> bool {
    queue_path == ancestor
        || queue_path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with(QUEUE_SEPARATOR))
}
