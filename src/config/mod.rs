//! Configuration models for limits and the event channel.

pub mod limits;

pub use limits::{EventsConfig, LimitConfig, TrackerConfig};
