//! Tests for utility helpers

use ugm_tracker::util::clock::now_ms;
use ugm_tracker::util::path::{join_queue_path, parent_queue_path, split_queue_path, ROOT_QUEUE};

#[test]
fn test_now_ms_monotonic_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(b >= a);
}

#[test]
fn test_queue_path_helpers() {
    assert_eq!(split_queue_path(ROOT_QUEUE).unwrap(), Vec::<&str>::new());
    assert_eq!(split_queue_path("root.a.b").unwrap(), vec!["a", "b"]);
    assert!(split_queue_path("").is_err());
    assert_eq!(parent_queue_path("root.a.b"), Some("root.a"));
    assert_eq!(parent_queue_path(ROOT_QUEUE), None);
    assert_eq!(join_queue_path("root.a", "b"), "root.a.b");
}

#[test]
fn test_init_tracing_installs_once() {
    use ugm_tracker::util::telemetry::init_tracing;

    init_tracing();
    assert!(!init_tracing());
    tracing::warn!(queue_path = "root.a", "logging works after init");
}
