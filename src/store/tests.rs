//! Store Module Tests
//!
//! ## Test Scopes
//! - **LocalStateStore**: per-partition put/get/remove/iterate.
//! - **ModelStateStore**: pending/current slot discipline, cleanup accounting,
//!   snapshot publication.
//! - **StoreRegistry**: local stats lookup and the unavailable case.

#[cfg(test)]
mod tests {
    use crate::serving::test_support::FixedScorer;
    use crate::store::model_state::{ModelStateStore, SnapshotCell};
    use crate::store::partitioned::{LocalStateStore, PartitionedStateStore};
    use crate::store::registry::StoreRegistry;
    use crate::store::types::{MODEL_STATE_KEY, ServingStats};
    use crate::error::RoutingError;
    use std::sync::Arc;

    fn backing() -> Arc<LocalStateStore<u32, SnapshotCell>> {
        Arc::new(LocalStateStore::new("modelStore"))
    }

    // ============================================================
    // LOCAL STATE STORE
    // ============================================================

    #[test]
    fn test_local_store_put_get_per_partition() {
        let store: LocalStateStore<String, u64> = LocalStateStore::new("counts");

        store.put(1, "a".to_string(), 10);
        store.put(2, "a".to_string(), 20);

        assert_eq!(store.get(1, &"a".to_string()), Some(10));
        assert_eq!(store.get(2, &"a".to_string()), Some(20));
        assert_eq!(store.get(3, &"a".to_string()), None);
        assert_eq!(store.partitions(), vec![1, 2]);
        assert_eq!(store.iterate(1).len() + store.iterate(2).len(), 2);
    }

    #[test]
    fn test_local_store_iterate_partition() {
        let store: LocalStateStore<String, u64> = LocalStateStore::new("counts");
        for i in 0..10 {
            store.put(7, format!("k{}", i), i);
        }

        let mut entries = store.iterate(7);
        entries.sort();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0], ("k0".to_string(), 0));
        assert!(store.iterate(8).is_empty());
    }

    #[test]
    fn test_local_store_remove_drops_empty_partition() {
        let store: LocalStateStore<String, u64> = LocalStateStore::new("counts");
        store.put(1, "a".to_string(), 1);

        assert_eq!(store.remove(1, &"a".to_string()), Some(1));
        assert!(store.iterate(1).is_empty());
        assert!(store.partitions().is_empty());
        assert_eq!(store.remove(1, &"a".to_string()), None);
    }

    // ============================================================
    // MODEL STATE STORE
    // ============================================================

    #[test]
    fn test_open_registers_empty_snapshot() {
        let backing = backing();
        let store = ModelStateStore::open(3, backing.clone());

        let cell = backing.get(3, &MODEL_STATE_KEY).expect("cell registered");
        assert!(!cell.load().has_model());
        assert!(!store.has_model());
        assert!(!store.has_pending());
    }

    #[test]
    fn test_promote_without_pending_is_noop() {
        let mut store = ModelStateStore::open(0, backing());
        let before = store.snapshot().generation;

        assert!(!store.promote_pending());
        assert_eq!(store.snapshot().generation, before);
    }

    #[test]
    fn test_promote_moves_pending_to_current() {
        let mut store = ModelStateStore::open(0, backing());
        let (m1, _) = FixedScorer::new(1.0);

        store.set_pending_model(m1, ServingStats::new("m1", "first"));
        let staged = store.snapshot();
        assert!(staged.has_pending());
        assert!(!staged.has_model());

        assert!(store.promote_pending());

        let snap = store.snapshot();
        assert!(!snap.has_pending());
        let current = snap.current.as_ref().unwrap();
        assert_eq!(current.name, "m1");
        assert!(current.since > 0, "activation time is stamped on promotion");
        assert_eq!(current.invocations, 0);
    }

    #[test]
    fn test_overwritten_pending_is_never_cleaned_up() {
        let mut store = ModelStateStore::open(0, backing());
        let (m1, p1) = FixedScorer::new(1.0);
        let (m2, p2) = FixedScorer::new(2.0);
        let (m3, p3) = FixedScorer::new(3.0);

        store.set_pending_model(m1, ServingStats::new("m1", ""));
        store.promote_pending();

        store.set_pending_model(m2, ServingStats::new("m2", ""));
        store.set_pending_model(m3, ServingStats::new("m3", ""));
        store.promote_pending();

        assert_eq!(store.current_stats().unwrap().name, "m3");
        assert_eq!(p1.cleanups(), 1);
        assert_eq!(p2.cleanups(), 0);
        assert_eq!(p3.cleanups(), 0);
    }

    #[test]
    fn test_failing_cleanup_does_not_block_promotion() {
        let mut store = ModelStateStore::open(0, backing());
        let (bad, bad_counters) = FixedScorer::failing_cleanup(1.0);
        let (good, _) = FixedScorer::new(2.0);

        store.set_pending_model(bad, ServingStats::new("bad", ""));
        store.promote_pending();
        store.set_pending_model(good, ServingStats::new("good", ""));

        assert!(store.promote_pending());
        assert_eq!(bad_counters.cleanups(), 1);
        assert_eq!(store.current_stats().unwrap().name, "good");
    }

    #[test]
    fn test_record_invocation_updates_published_stats() {
        let mut store = ModelStateStore::open(0, backing());
        let (m1, _) = FixedScorer::new(1.0);
        store.set_pending_model(m1, ServingStats::new("m1", ""));
        store.promote_pending();

        let reader = store.reader();
        store.record_invocation(2.0);
        store.record_invocation(4.0);

        let snap = reader.load();
        let stats = snap.current.as_ref().unwrap();
        assert_eq!(stats.invocations, 2);
        assert_eq!(stats.average_duration_ms(), 3.0);
        assert_eq!(stats.min_duration_ms, 2.0);
        assert_eq!(stats.max_duration_ms, 4.0);
    }

    #[test]
    fn test_reader_snapshot_is_immutable_across_swaps() {
        let mut store = ModelStateStore::open(0, backing());
        let before = store.snapshot();

        let (m1, _) = FixedScorer::new(1.0);
        store.set_pending_model(m1, ServingStats::new("m1", ""));
        store.promote_pending();

        // The snapshot taken earlier still describes the earlier state.
        assert!(!before.has_model());
        assert!(store.snapshot().has_model());
        assert!(store.snapshot().generation > before.generation);
    }

    #[test]
    fn test_close_cleans_up_current_and_unregisters() {
        let backing = backing();
        let mut store = ModelStateStore::open(5, backing.clone());
        let (m1, p1) = FixedScorer::new(1.0);
        let (m2, p2) = FixedScorer::new(2.0);
        store.set_pending_model(m1, ServingStats::new("m1", ""));
        store.promote_pending();
        store.set_pending_model(m2, ServingStats::new("m2", ""));

        let reader = store.reader();
        store.close();

        assert_eq!(p1.cleanups(), 1);
        assert_eq!(p2.cleanups(), 0, "a never-active model is not cleaned up");
        assert!(backing.get(5, &MODEL_STATE_KEY).is_none());
        assert!(!reader.load().has_model());
    }

    #[test]
    fn test_stale_store_does_not_unregister_successor() {
        let backing = backing();
        let old = ModelStateStore::open(1, backing.clone());
        let new = ModelStateStore::open(1, backing.clone());

        drop(old);

        let cell = backing.get(1, &MODEL_STATE_KEY).expect("successor still registered");
        assert!(Arc::ptr_eq(&cell, &new.reader()));
    }

    // ============================================================
    // STORE REGISTRY
    // ============================================================

    #[test]
    fn test_registry_unknown_store_is_unavailable() {
        let registry = StoreRegistry::new();

        let err = registry.local_stats("missing").unwrap_err();
        assert!(matches!(err, RoutingError::StoreUnavailable(_)));
    }

    #[test]
    fn test_registry_store_without_partitions_is_unavailable() {
        let registry = StoreRegistry::new();
        registry.register("modelStore");

        assert!(registry.local_stats("modelStore").is_err());
    }

    #[test]
    fn test_registry_reports_none_before_promotion() {
        let registry = StoreRegistry::new();
        let handle = registry.register("modelStore");
        let _store = ModelStateStore::open(0, handle);

        assert_eq!(registry.local_stats("modelStore").unwrap(), None);
    }

    #[test]
    fn test_registry_reports_latest_promoted_model() {
        let registry = StoreRegistry::new();
        let handle = registry.register("modelStore");
        let mut p0 = ModelStateStore::open(0, handle.clone());
        let mut p1 = ModelStateStore::open(1, handle);

        let (m_old, _) = FixedScorer::new(1.0);
        p0.set_pending_model(m_old, ServingStats::new("old", ""));
        p0.promote_pending();

        std::thread::sleep(std::time::Duration::from_millis(5));

        let (m_new, _) = FixedScorer::new(2.0);
        p1.set_pending_model(m_new, ServingStats::new("new", ""));
        p1.promote_pending();

        let stats = registry.local_stats("modelStore").unwrap().unwrap();
        assert_eq!(stats.name, "new");
    }
}
