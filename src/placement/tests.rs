//! Placement Module Tests
//!
//! ## Test Scopes
//! - **Rotation**: order, exclusion, index clamping on pool replacement.
//! - **Least-loaded**: minimum selection, tie breaking, lease release.
//! - **assign_host**: local mode short-circuit.

#[cfg(test)]
mod tests {
    use crate::config::RelayConfig;
    use crate::placement::{assign_host, HostSelector, LeastLoadedSelector, RotationSelector};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|h| h.to_string()).collect()
    }

    fn pick(selector: &dyn HostSelector) -> String {
        selector.select().unwrap().host().to_string()
    }

    // ============================================================
    // ROTATION TESTS
    // ============================================================

    #[test]
    fn test_rotation_cycles_in_pool_order() {
        let selector = RotationSelector::new(&hosts(&["h1", "h2"]));

        assert_eq!(pick(&selector), "h1");
        assert_eq!(pick(&selector), "h2");
        assert_eq!(pick(&selector), "h1");
    }

    #[test]
    fn test_rotation_empty_pool_selects_nothing() {
        let selector = RotationSelector::new(&[]);
        assert!(selector.select().is_none());
        assert!(selector.select_excluding(&["h1"]).is_none());
    }

    #[test]
    fn test_rotation_excluding_skips_host() {
        let selector = RotationSelector::new(&hosts(&["h1", "h2", "h3"]));

        // Next in line is h1, which is excluded.
        let lease = selector.select_excluding(&["h1"]).unwrap();

        assert_eq!(lease.host(), "h2");
        assert_eq!(selector.position(), 2);
    }

    #[test]
    fn test_rotation_excluding_several_hosts_finds_the_rest() {
        let selector = RotationSelector::new(&hosts(&["h1", "h2", "h3"]));

        let lease = selector.select_excluding(&["h1", "h2"]).unwrap();

        assert_eq!(lease.host(), "h3");
        assert_eq!(selector.position(), 0);
    }

    #[test]
    fn test_rotation_excluding_every_host_falls_back_to_next() {
        let selector = RotationSelector::new(&hosts(&["h1", "h2"]));

        let lease = selector.select_excluding(&["h1", "h2"]).unwrap();

        assert_eq!(lease.host(), "h1");
    }

    #[test]
    fn test_rotation_excluding_single_host_returns_it() {
        let selector = RotationSelector::new(&hosts(&["h1"]));
        assert_eq!(selector.select_excluding(&["h1"]).unwrap().host(), "h1");
    }

    #[test]
    fn test_rotation_shrinking_pool_clamps_index() {
        let selector = RotationSelector::new(&hosts(&["h1", "h2", "h3"]));
        pick(&selector);
        pick(&selector);
        assert_eq!(selector.position(), 2);

        selector.replace_pool(&hosts(&["a", "b"]));

        assert_eq!(selector.position(), 0);
        assert_eq!(pick(&selector), "a");
    }

    #[test]
    fn test_rotation_identical_pool_keeps_index() {
        let selector = RotationSelector::new(&hosts(&["h1", "h2", "h3"]));
        pick(&selector);

        selector.replace_pool(&hosts(&["h1", "h2", "h3"]));

        assert_eq!(selector.position(), 1);
    }

    #[test]
    fn test_rotation_is_fair_under_concurrency() {
        let selector = Arc::new(RotationSelector::new(&hosts(&["h1", "h2", "h3", "h4"])));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let selector = selector.clone();
                std::thread::spawn(move || (0..100).map(|_| pick(selector.as_ref())).collect::<Vec<_>>())
            })
            .collect();

        let mut counts = std::collections::HashMap::new();
        for handle in handles {
            for host in handle.join().unwrap() {
                *counts.entry(host).or_insert(0) += 1;
            }
        }

        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&n| n == 100));
    }

    // ============================================================
    // LEAST-LOADED TESTS
    // ============================================================

    #[test]
    fn test_least_loaded_ties_follow_pool_order() {
        let selector = LeastLoadedSelector::new(&hosts(&["h1", "h2"]));

        // Leases dropped immediately: both counts stay at zero.
        assert_eq!(pick(&selector), "h1");
        assert_eq!(pick(&selector), "h1");
    }

    #[test]
    fn test_least_loaded_spreads_held_leases() {
        let selector = LeastLoadedSelector::new(&hosts(&["h1", "h2", "h3"]));

        let a = selector.select().unwrap();
        let b = selector.select().unwrap();
        let c = selector.select().unwrap();

        let picked: HashSet<_> = [a.host(), b.host(), c.host()].into_iter().collect();
        assert_eq!(picked.len(), 3);
        assert_eq!(selector.in_flight("h1"), Some(1));
    }

    #[test]
    fn test_least_loaded_lease_drop_releases_slot() {
        let selector = LeastLoadedSelector::new(&hosts(&["h1", "h2"]));

        let lease = selector.lease_for("h1");
        assert_eq!(selector.in_flight("h1"), Some(1));
        assert_eq!(pick(&selector), "h2");

        drop(lease);

        assert_eq!(selector.in_flight("h1"), Some(0));
        assert_eq!(pick(&selector), "h1");
    }

    #[test]
    fn test_least_loaded_excluding_avoids_host() {
        let selector = LeastLoadedSelector::new(&hosts(&["h1", "h2"]));
        let _busy = selector.lease_for("h2");

        // h1 is less loaded but excluded.
        let lease = selector.select_excluding(&["h1"]).unwrap();

        assert_eq!(lease.host(), "h2");
    }

    #[test]
    fn test_least_loaded_excluding_several_hosts() {
        let selector = LeastLoadedSelector::new(&hosts(&["h1", "h2", "h3"]));
        let _busy = selector.lease_for("h3");

        // h3 is the busiest, but the only one left.
        let lease = selector.select_excluding(&["h1", "h2"]).unwrap();

        assert_eq!(lease.host(), "h3");
        assert_eq!(selector.in_flight("h3"), Some(2));
    }

    #[test]
    fn test_least_loaded_replace_pool_keeps_surviving_counts() {
        let selector = LeastLoadedSelector::new(&hosts(&["h1", "h2"]));
        let lease = selector.lease_for("h2");

        selector.replace_pool(&hosts(&["h2", "h3"]));

        assert_eq!(selector.in_flight("h1"), None);
        assert_eq!(selector.in_flight("h2"), Some(1));
        assert_eq!(selector.in_flight("h3"), Some(0));

        drop(lease);
        assert_eq!(selector.in_flight("h2"), Some(0));
    }

    #[test]
    fn test_least_loaded_lease_for_unknown_host_is_untracked() {
        let selector = LeastLoadedSelector::new(&hosts(&["h1"]));

        let lease = selector.lease_for("gone");

        assert_eq!(lease.host(), "gone");
        assert_eq!(selector.in_flight("h1"), Some(0));
    }

    // ============================================================
    // ASSIGN HOST TESTS
    // ============================================================

    #[test]
    fn test_assign_host_local_mode_uses_loopback() {
        let selector = RotationSelector::new(&hosts(&["h1", "h2"]));
        let mut config = RelayConfig::with_hosts(["h1", "h2"]);
        config.local_mode = true;

        let lease = assign_host(&selector, &config, &["127.0.0.1"]).unwrap();

        assert_eq!(lease.host(), "127.0.0.1");
        assert_eq!(selector.position(), 0);
    }

    #[test]
    fn test_assign_host_excluding_differs_from_old_host() {
        let selector = RotationSelector::new(&hosts(&["h1", "h2"]));
        let config = RelayConfig::with_hosts(["h1", "h2"]);

        for _ in 0..4 {
            let lease = assign_host(&selector, &config, &["h2"]).unwrap();
            assert_eq!(lease.host(), "h1");
        }
    }
}
