//! # UGM Tracker
//!
//! Hierarchical user/group resource-usage tracking for a queue scheduler.
//!
//! Every user and every application group owns a tree of queue trackers that
//! mirrors the part of the queue hierarchy it actually uses. The scheduler
//! consults these trees on every allocation and release to enforce per-user
//! and per-group resource caps and running-application caps, and to compute
//! the headroom left before a workload is admitted to a queue.
//!
//! ## Key Features
//!
//! - **All-or-nothing increases**: limits are checked root to leaf before any
//!   node on the path is touched
//! - **Two ledgers, one outcome**: an increase must be accepted by both the
//!   user tree and the bound group tree, otherwise the user side is rolled back
//! - **Lazy growth, explicit pruning**: nodes appear on first use and only
//!   disappear through an explicit unlink
//! - **Coarse locking**: one `parking_lot::RwLock` per user or group tracker
//! - **Snapshots**: deep, serializable copies for reporting
//! - **Optional events**: best-effort usage events, disabled by default
//!
//! ```rust
//! use ugm_tracker::core::{Resource, UserGroup};
//! use ugm_tracker::config::TrackerConfig;
//!
//! let config = TrackerConfig::from_json_str(r#"{
//!     "limits": [
//!         {"queue_path": "root.teamA", "users": ["alice"], "max_resources": {"vcore": 10}}
//!     ]
//! }"#).unwrap();
//! let registry = ugm_tracker::builders::build_registry(&config, None).unwrap();
//! let alice = UserGroup::new("alice", ["dev"]);
//!
//! let four = Resource::from_pairs([("vcore", 4)]);
//! registry.increase_tracked_resource("root.teamA.leaf", "app1", &four, &alice).unwrap();
//! let headroom = registry.headroom("root.teamA.leaf", "app1", &alice).unwrap();
//! assert_eq!(headroom, Some(Resource::from_pairs([("vcore", 6)])));
//!
//! let eight = Resource::from_pairs([("vcore", 8)]);
//! assert!(registry.increase_tracked_resource("root.teamA.leaf", "app2", &eight, &alice).is_err());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Trackers, limit enforcement, events and snapshots.
pub mod core;
/// Configuration models for limits and events.
pub mod config;
/// Builders to construct the registry from configuration.
pub mod builders;
/// Shared utilities.
pub mod util;
