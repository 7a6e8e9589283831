//! Routing Module Tests
//!
//! ## Test Scopes
//! - **Partitioner**: deterministic hashing, spread, and ownership over a static view.
//! - **MetadataService**: store/key lookups, staleness flag, refresh after reassignment.

#[cfg(test)]
mod tests {
    use crate::cluster::types::{Instance, InstanceId, InstanceState};
    use crate::cluster::view::StaticClusterView;
    use crate::error::RoutingError;
    use crate::routing::metadata::MetadataService;
    use crate::routing::partitioner::PartitionManager;
    use std::collections::HashSet;
    use std::sync::Arc;

    const STORE: &str = "modelStore";

    fn instance(id: &str, port: u16) -> Instance {
        Instance {
            id: InstanceId(id.to_string()),
            gossip_addr: format!("127.0.0.1:{}", port - 1000).parse().unwrap(),
            http_addr: format!("127.0.0.1:{}", port).parse().unwrap(),
            stores: vec![STORE.to_string()],
            state: InstanceState::Alive,
            incarnation: 1,
            last_seen: None,
        }
    }

    fn two_node_view() -> Arc<StaticClusterView> {
        Arc::new(StaticClusterView::new(
            InstanceId("a".to_string()),
            vec![instance("b", 7002), instance("a", 7001)],
        ))
    }

    // ============================================================
    // PARTITIONER
    // ============================================================

    #[test]
    fn test_partition_is_deterministic_and_in_range() {
        let partitioner = PartitionManager::new(two_node_view(), 16);

        assert_eq!(
            partitioner.get_partition("wine-1"),
            partitioner.get_partition("wine-1")
        );
        for i in 0..1000 {
            assert!(partitioner.get_partition(&format!("key-{}", i)) < 16);
        }
    }

    #[test]
    fn test_partition_hash_is_crc32_of_key() {
        let partitioner = PartitionManager::new(two_node_view(), 7);

        // Fixed values: the mapping must not drift between builds or hosts.
        assert_eq!(partitioner.get_partition("wine-1"), 3_621_149_384 % 7);
        assert_eq!(partitioner.get_partition("wine-1"), 6);
        assert_eq!(partitioner.get_partition("wine-2"), 3);
        assert_eq!(partitioner.get_partition("wine-3"), 1);
        assert_eq!(partitioner.get_partition("customer-7"), 5);
        assert_eq!(partitioner.get_partition(""), 0);
    }

    #[test]
    fn test_partition_distribution() {
        let partitioner = PartitionManager::new(two_node_view(), 16);

        let used: HashSet<u32> = (0..2000)
            .map(|i| partitioner.get_partition(&format!("record-{}", i)))
            .collect();

        assert_eq!(used.len(), 16, "every partition should receive keys");
    }

    #[test]
    fn test_zero_partitions_is_clamped() {
        let partitioner = PartitionManager::new(two_node_view(), 0);
        assert_eq!(partitioner.num_partitions(), 1);
        assert_eq!(partitioner.get_partition("anything"), 0);
    }

    #[test]
    fn test_assignment_covers_every_partition_once() {
        let partitioner = PartitionManager::new(two_node_view(), 8);

        let assignment = partitioner.assignment();
        assert_eq!(assignment.len(), 2);
        // Ordered by id regardless of view order.
        assert_eq!(assignment[0].0.id, InstanceId("a".to_string()));
        assert_eq!(assignment[0].1, vec![0, 2, 4, 6]);
        assert_eq!(assignment[1].1, vec![1, 3, 5, 7]);

        assert_eq!(partitioner.my_partitions(), vec![0, 2, 4, 6]);
        assert_eq!(partitioner.get_owner(3).unwrap().id, InstanceId("b".to_string()));
    }

    #[test]
    fn test_instances_beyond_partition_count_own_nothing() {
        let view = Arc::new(StaticClusterView::new(
            InstanceId("a".to_string()),
            vec![instance("a", 7001), instance("b", 7002), instance("c", 7003)],
        ));
        let partitioner = PartitionManager::new(view, 2);

        let assignment = partitioner.assignment();
        assert_eq!(assignment.len(), 2);
        assert!(partitioner.partitions_of(&InstanceId("c".to_string())).is_empty());
    }

    #[test]
    fn test_no_live_instances_means_no_owner() {
        let view = Arc::new(StaticClusterView::new(InstanceId("a".to_string()), vec![]));
        let partitioner = PartitionManager::new(view, 4);

        assert!(partitioner.get_owner(0).is_none());
        assert!(partitioner.assignment().is_empty());
        assert!(partitioner.my_partitions().is_empty());
    }

    // ============================================================
    // METADATA SERVICE
    // ============================================================

    #[test]
    fn test_store_metadata_lists_owning_instances() {
        let metadata = MetadataService::new(PartitionManager::new(two_node_view(), 8));

        let routed = metadata.metadata_for_store(STORE).unwrap();
        assert!(!routed.stale);
        let ports: Vec<u16> = routed.value.iter().map(|h| h.port).collect();
        assert_eq!(ports, vec![7001, 7002]);
        assert_eq!(routed.value[0].host, "127.0.0.1");
        assert_eq!(routed.value[0].store_names, vec![STORE.to_string()]);
    }

    #[test]
    fn test_metadata_for_key_matches_partition_owner() {
        let partitioner = PartitionManager::new(two_node_view(), 8);
        let metadata = MetadataService::new(partitioner.clone());

        for key in ["wine-1", "wine-2", "wine-3", "wine-4"] {
            let owner = partitioner.get_owner(partitioner.get_partition(key)).unwrap();
            let routed = metadata.metadata_for_key(STORE, key).unwrap();
            assert_eq!(routed.value.port, owner.http_addr.port());
        }
    }

    #[test]
    fn test_unknown_store_has_no_instances() {
        let metadata = MetadataService::new(PartitionManager::new(two_node_view(), 8));

        assert!(matches!(
            metadata.metadata_for_store("nope"),
            Err(RoutingError::NoLiveInstances(_))
        ));
        assert!(metadata.metadata_for_key("nope", "k").is_err());
    }

    #[test]
    fn test_metadata_reflects_reassignment_on_next_call() {
        let a = instance("a", 7001);
        let view = Arc::new(StaticClusterView::single(a.clone()));
        let metadata = MetadataService::new(PartitionManager::new(view.clone(), 4));

        assert_eq!(metadata.metadata_for_store(STORE).unwrap().value.len(), 1);
        assert_eq!(metadata.owner_of(1).unwrap().port, 7001);

        view.set_instances(vec![a, instance("b", 7002)]);

        let routed = metadata.metadata_for_store(STORE).unwrap();
        assert_eq!(routed.value.len(), 2);
        assert_eq!(metadata.owner_of(1).unwrap().port, 7002);
        assert_eq!(metadata.refresh().version, view_version(&view));
    }

    #[test]
    fn test_unsettled_cluster_yields_stale_answers() {
        let view = two_node_view();
        let metadata = MetadataService::new(PartitionManager::new(view.clone(), 8));

        view.set_settled(false);
        let routed = metadata.metadata_for_store(STORE).unwrap();
        assert!(routed.stale);
        assert_eq!(routed.value.len(), 2, "best-known assignment is still returned");

        view.set_settled(true);
        assert!(!metadata.metadata_for_store(STORE).unwrap().stale);
    }

    #[test]
    fn test_refresh_reuses_table_while_topology_is_unchanged() {
        let metadata = MetadataService::new(PartitionManager::new(two_node_view(), 8));

        let first = metadata.refresh();
        let second = metadata.refresh();
        assert!(Arc::ptr_eq(&first, &second));
    }

    fn view_version(view: &StaticClusterView) -> u64 {
        use crate::cluster::view::ClusterView;
        view.topology_version()
    }
}
