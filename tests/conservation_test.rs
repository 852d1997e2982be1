//! Randomised operation sequences checked against a simple model: usage is
//! conserved between user and group ledgers and never exceeds a limit.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ugm_tracker::builders::build_registry;
use ugm_tracker::config::TrackerConfig;
use ugm_tracker::core::{Resource, UsageRegistry, UserGroup};

const PATHS: [&str; 4] = ["root.p1", "root.p2.y.z", "root.p2", "root.p1.x"];
const APPS: usize = 12;
const USER_CAP: i64 = 8;

struct App {
    id: String,
    user: UserGroup,
    path: &'static str,
}

fn apps() -> Vec<App> {
    let users = [
        UserGroup::new("user-0", ["dev"]),
        UserGroup::new("user-1", ["dev"]),
        UserGroup::new("user-2", ["ops"]),
    ];
    (0..APPS)
        .map(|i| App {
            id: format!("app-{i}"),
            user: users[i % users.len()].clone(),
            path: PATHS[i % PATHS.len()],
        })
        .collect()
}

fn registry() -> UsageRegistry {
    let cfg = TrackerConfig::from_json_str(&format!(
        r#"{{"limits": [{{"queue_path": "root.p1", "users": ["user-0"], "max_resources": {{"vcore": {USER_CAP}}}}}]}}"#
    ))
    .unwrap();
    build_registry(&cfg, None).unwrap()
}

fn vcore(n: i64) -> Resource {
    Resource::from_pairs([("vcore", n)])
}

fn user_usage(registry: &UsageRegistry, user: &str) -> i64 {
    registry
        .user_resource_usage(user)
        .map_or(0, |u| u.queues.resource_usage.get("vcore"))
}

fn group_usage(registry: &UsageRegistry, group: &str) -> i64 {
    registry
        .group_resource_usage(group)
        .map_or(0, |g| g.queues.resource_usage.get("vcore"))
}

fn check(registry: &UsageRegistry, apps: &[App], model: &HashMap<usize, i64>) {
    let expected = |pred: &dyn Fn(&App) -> bool| -> i64 {
        model
            .iter()
            .filter(|(i, _)| pred(&apps[**i]))
            .map(|(_, usage)| usage)
            .sum()
    };
    for user in ["user-0", "user-1", "user-2"] {
        assert_eq!(user_usage(registry, user), expected(&|app: &App| app.user.user == user));
    }
    for group in ["dev", "ops"] {
        assert_eq!(
            group_usage(registry, group),
            expected(&|app: &App| app.user.groups[0] == group)
        );
    }
    let limited = registry
        .user_resource_usage("user-0")
        .and_then(|u| u.queues.find("root.p1").map(|n| n.resource_usage.get("vcore")))
        .unwrap_or(0);
    assert!(limited <= USER_CAP);
}

fn run(seed: u64, steps: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let apps = apps();
    let registry = registry();
    let mut model: HashMap<usize, i64> = HashMap::new();

    for _ in 0..steps {
        let i = rng.random_range(0..APPS);
        let app = &apps[i];
        match model.get(&i).copied() {
            Some(current) if rng.random_bool(0.4) => {
                let amount = rng.random_range(1..=current);
                let remove = amount == current;
                registry
                    .decrease_tracked_resource(app.path, &app.id, &vcore(amount), &app.user, remove)
                    .unwrap();
                if remove {
                    model.remove(&i);
                } else {
                    model.insert(i, current - amount);
                }
            }
            current => {
                let amount = rng.random_range(1..=5);
                if registry
                    .increase_tracked_resource(app.path, &app.id, &vcore(amount), &app.user)
                    .is_ok()
                {
                    model.insert(i, current.unwrap_or(0) + amount);
                }
            }
        }
        check(&registry, &apps, &model);
    }

    for (i, usage) in model.drain() {
        let app = &apps[i];
        registry
            .decrease_tracked_resource(app.path, &app.id, &vcore(usage), &app.user, true)
            .unwrap();
    }
    for user in registry.users_resource_usage() {
        assert_eq!(user.queues.resource_usage.get("vcore"), 0);
        assert!(user.queues.running_applications.is_empty());
        assert!(user.groups.is_empty());
    }
    assert!(registry.groups_resource_usage().is_empty());
}

#[test]
fn test_usage_is_conserved_for_random_sequences() {
    for seed in [7, 42, 1234] {
        run(seed, 500);
    }
}
