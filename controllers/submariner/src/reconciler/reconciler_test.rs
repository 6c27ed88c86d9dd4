//! Unit tests for the reconcilers

#[cfg(test)]
mod tests {
    use crate::client::MockClusterClient;
    use crate::config::{DEFAULT_PAUSE_IMAGE, OperatorConfig};
    use crate::metrics::RecordingMetrics;
    use crate::reconciler::{FINALIZER, Reconciler, has_finalizer};
    use crate::resources::{GATEWAY, GLOBALNET, MANAGED_BY_LABEL, NETWORK_PLUGIN_SYNCER, ROUTE_AGENT};
    use crate::test_utils::*;
    use crate::uninstall::{Outcome, Workload};
    use cluster_client::{Failure, Verb};
    use crds::{ServiceDiscovery, Submariner};
    use k8s_openapi::api::apps::v1::DaemonSet;
    use k8s_openapi::api::core::v1::Service;
    use kube_runtime::controller::Action;
    use std::sync::Arc;
    use std::time::Duration;

    const DELETED_AT: &str = "2026-03-01T10:00:00Z";

    struct Harness {
        client: Arc<MockClusterClient>,
        metrics: Arc<RecordingMetrics>,
        reconciler: Reconciler,
    }

    fn harness(config: OperatorConfig, now: &str) -> Harness {
        let client = Arc::new(MockClusterClient::new());
        let metrics = Arc::new(RecordingMetrics::default());
        let now = utc(now);
        let reconciler = Reconciler::new(client.clone(), config, metrics.clone())
            .with_clock(Arc::new(move || now));
        Harness {
            client,
            metrics,
            reconciler,
        }
    }

    fn default_harness() -> Harness {
        harness(OperatorConfig::default(), "2026-03-01T10:00:10Z")
    }

    fn terminating<K: kube::Resource>(mut obj: K) -> K {
        let meta = obj.meta_mut();
        meta.finalizers = Some(vec![FINALIZER.to_string()]);
        meta.deletion_timestamp = Some(time(DELETED_AT));
        obj
    }

    fn stored_submariner(h: &Harness, sm: Submariner) -> Submariner {
        h.client.submariners.insert(sm)
    }

    fn mark_ready(h: &Harness, name: &str, desired: i32) {
        assert!(h.client.daemon_sets.update(TEST_NAMESPACE, name, |ds: &mut DaemonSet| {
            ds.status = Some(daemon_set_status(1, desired, desired));
        }));
    }

    #[tokio::test]
    async fn test_submariner_steady_state_deploys_dataplane() {
        let h = default_harness();
        let sm = stored_submariner(&h, submariner("submariner"));

        let action = h.reconciler.reconcile_submariner(&sm).await.unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(60)));
        let stored = h.client.submariners.stored(TEST_NAMESPACE, "submariner").unwrap();
        assert!(has_finalizer(&stored.metadata));

        for name in [GATEWAY, ROUTE_AGENT] {
            let ds = h.client.daemon_sets.stored(TEST_NAMESPACE, name).unwrap();
            assert!(ds.metadata.owner_references.is_none());
            assert!(ds.metadata.labels.unwrap().contains_key(MANAGED_BY_LABEL));
        }
        assert!(!h.client.daemon_sets.contains(TEST_NAMESPACE, GLOBALNET));
        assert!(h.client.deployments.is_empty());
        assert!(h.client.service_discoveries.is_empty());

        let status = stored.status.unwrap();
        assert_eq!(status.cluster_id, "east");
        assert_eq!(status.network_plugin.as_deref(), Some("generic"));
        assert_eq!(status.cluster_cidr.as_deref(), Some("10.42.0.0/16"));
        assert!(status.gateway_daemon_set_status.is_some());
        assert!(status.globalnet_daemon_set_status.is_none());

        assert_eq!(*h.metrics.gateways.lock().unwrap(), Some(0));
        assert_eq!(
            *h.metrics.reconciles.lock().unwrap(),
            vec![("Submariner".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_submariner_optional_components() {
        let h = harness(
            OperatorConfig {
                network_plugin: "OVNKubernetes".to_string(),
                ..Default::default()
            },
            "2026-03-01T10:00:10Z",
        );
        let mut sm = submariner("submariner");
        sm.spec.global_cidr = "242.0.0.0/16".to_string();
        sm.spec.service_discovery_enabled = true;
        sm.spec.load_balancer_enabled = true;
        let sm = stored_submariner(&h, sm);

        h.reconciler.reconcile_submariner(&sm).await.unwrap();

        assert!(h.client.daemon_sets.contains(TEST_NAMESPACE, GLOBALNET));
        assert!(h.client.deployments.contains(TEST_NAMESPACE, NETWORK_PLUGIN_SYNCER));

        let sd = h
            .client
            .service_discoveries
            .stored(TEST_NAMESPACE, "service-discovery")
            .unwrap();
        let owners = sd.metadata.owner_references.unwrap();
        assert_eq!(owners[0].kind, "Submariner");
        assert_eq!(owners[0].name, "submariner");
        assert!(sd.spec.globalnet_enabled);

        let service = h.client.services.stored(TEST_NAMESPACE, GATEWAY).unwrap();
        assert_eq!(service.metadata.owner_references.unwrap()[0].kind, "Submariner");
    }

    #[tokio::test]
    async fn test_submariner_removes_components_no_longer_requested() {
        let h = default_harness();
        h.client.daemon_sets.insert(daemon_set(GLOBALNET));
        h.client.deployments.insert(deployment(NETWORK_PLUGIN_SYNCER));
        let sm = stored_submariner(&h, submariner("submariner"));

        h.reconciler.reconcile_submariner(&sm).await.unwrap();

        assert!(!h.client.daemon_sets.contains(TEST_NAMESPACE, GLOBALNET));
        assert!(!h.client.deployments.contains(TEST_NAMESPACE, NETWORK_PLUGIN_SYNCER));
    }

    #[tokio::test]
    async fn test_submariner_second_reconcile_writes_nothing() {
        let h = default_harness();
        let sm = stored_submariner(&h, submariner("submariner"));
        h.reconciler.reconcile_submariner(&sm).await.unwrap();
        let sm = h.client.submariners.stored(TEST_NAMESPACE, "submariner").unwrap();
        h.client.daemon_sets.clear_calls();
        h.client.submariners.clear_calls();

        h.reconciler.reconcile_submariner(&sm).await.unwrap();

        assert_eq!(h.client.daemon_sets.count(Verb::Replace, TEST_NAMESPACE, GATEWAY), 0);
        assert_eq!(h.client.daemon_sets.count(Verb::Create, TEST_NAMESPACE, GATEWAY), 0);
        assert_eq!(
            h.client
                .submariners
                .count(Verb::PatchStatus, TEST_NAMESPACE, "submariner"),
            0
        );
        assert_eq!(
            h.client.submariners.count(Verb::Patch, TEST_NAMESPACE, "submariner"),
            0
        );
    }

    #[tokio::test]
    async fn test_submariner_deletion_runs_uninstall_then_removes_finalizer() {
        let h = default_harness();
        h.client.daemon_sets.insert(daemon_set(GATEWAY));
        h.client.daemon_sets.insert(daemon_set(ROUTE_AGENT));
        let sm = stored_submariner(&h, terminating(submariner("submariner")));

        let action = h.reconciler.reconcile_submariner(&sm).await.unwrap();

        assert_eq!(action, Action::requeue(Duration::from_millis(200)));
        assert!(!h.client.daemon_sets.contains(TEST_NAMESPACE, GATEWAY));
        assert!(h.client.daemon_sets.contains(TEST_NAMESPACE, "submariner-gateway-uninstall"));
        assert!(h.client.daemon_sets.contains(TEST_NAMESPACE, "submariner-routeagent-uninstall"));
        assert!(!h.client.daemon_sets.contains(TEST_NAMESPACE, "submariner-globalnet-uninstall"));
        assert!(h.client.submariners.contains(TEST_NAMESPACE, "submariner"));

        mark_ready(&h, "submariner-gateway-uninstall", 1);
        mark_ready(&h, "submariner-routeagent-uninstall", 3);
        let action = h.reconciler.reconcile_submariner(&sm).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert!(h.client.daemon_sets.is_empty());
        assert!(!h.client.submariners.contains(TEST_NAMESPACE, "submariner"));
        assert_eq!(
            *h.metrics.outcomes.lock().unwrap(),
            vec![
                ("Submariner".to_string(), Outcome::Requeue),
                ("Submariner".to_string(), Outcome::Complete),
            ]
        );
    }

    #[tokio::test]
    async fn test_submariner_deletion_deletes_service_discovery_child() {
        let h = default_harness();
        h.client
            .service_discoveries
            .insert(service_discovery("service-discovery"));
        let sm = stored_submariner(&h, terminating(submariner("submariner")));

        h.reconciler.reconcile_submariner(&sm).await.unwrap();

        assert!(h.client.service_discoveries.is_empty());
    }

    #[tokio::test]
    async fn test_submariner_deletion_times_out() {
        let h = harness(OperatorConfig::default(), "2026-03-01T10:05:00Z");
        h.client
            .daemon_sets
            .insert(daemon_set(GATEWAY).uninstall_variant(DEFAULT_PAUSE_IMAGE));
        let sm = stored_submariner(&h, terminating(submariner("submariner")));

        let action = h.reconciler.reconcile_submariner(&sm).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert!(h.client.daemon_sets.is_empty());
        assert!(!h.client.submariners.contains(TEST_NAMESPACE, "submariner"));
        assert_eq!(
            *h.metrics.outcomes.lock().unwrap(),
            vec![("Submariner".to_string(), Outcome::TimedOut)]
        );
    }

    #[tokio::test]
    async fn test_late_deletion_still_removes_steady_state_workloads() {
        let h = harness(OperatorConfig::default(), "2026-03-01T10:05:00Z");
        let sm = stored_submariner(&h, submariner("submariner"));
        h.reconciler.reconcile_submariner(&sm).await.unwrap();
        assert!(h.client.daemon_sets.contains(TEST_NAMESPACE, GATEWAY));

        assert!(h.client.submariners.update(TEST_NAMESPACE, "submariner", |sm: &mut Submariner| {
            sm.metadata.deletion_timestamp = Some(time(DELETED_AT));
        }));
        let sm = h.client.submariners.stored(TEST_NAMESPACE, "submariner").unwrap();

        let action = h.reconciler.reconcile_submariner(&sm).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(
            *h.metrics.outcomes.lock().unwrap(),
            vec![("Submariner".to_string(), Outcome::TimedOut)]
        );
        assert!(!h.client.daemon_sets.contains(TEST_NAMESPACE, GATEWAY));
        assert!(!h.client.daemon_sets.contains(TEST_NAMESPACE, ROUTE_AGENT));
        assert!(h.client.daemon_sets.is_empty());
        assert!(!h.client.submariners.contains(TEST_NAMESPACE, "submariner"));
    }

    #[tokio::test]
    async fn test_submariner_deletion_of_old_version_deletes_directly() {
        let h = default_harness();
        h.client.daemon_sets.insert(daemon_set(GATEWAY));
        let mut sm = terminating(submariner("submariner"));
        sm.spec.version = Some("0.11.2".to_string());
        let sm = stored_submariner(&h, sm);

        let action = h.reconciler.reconcile_submariner(&sm).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert!(h.client.daemon_sets.is_empty());
        assert_eq!(
            h.client
                .daemon_sets
                .count(Verb::Create, TEST_NAMESPACE, "submariner-gateway-uninstall"),
            0
        );
        assert!(h.metrics.outcomes.lock().unwrap().is_empty());
        assert!(!h.client.submariners.contains(TEST_NAMESPACE, "submariner"));
    }

    #[tokio::test]
    async fn test_submariner_deletion_without_finalizer_is_noop() {
        let h = default_harness();
        let mut sm = submariner("submariner");
        sm.metadata.deletion_timestamp = Some(time(DELETED_AT));

        let action = h.reconciler.reconcile_submariner(&sm).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert!(h.client.daemon_sets.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_reconcile_is_recorded_and_backoff_resets_on_success() {
        let h = default_harness();
        let sm = stored_submariner(&h, submariner("submariner"));
        h.client.daemon_sets.fail_next(Verb::Create, Failure::Server);

        assert!(h.reconciler.reconcile_submariner(&sm).await.is_err());

        let key = "Submariner/submariner-operator/submariner";
        let delays: Vec<_> = (0..4).map(|_| h.reconciler.backoff_for_error(key).0).collect();
        assert_eq!(delays, [1, 1, 2, 3].map(Duration::from_secs).to_vec());

        h.reconciler.reconcile_submariner(&sm).await.unwrap();
        assert_eq!(
            h.reconciler.backoff_for_error(key),
            (Duration::from_secs(1), 1)
        );
        assert_eq!(
            *h.metrics.reconciles.lock().unwrap(),
            vec![
                ("Submariner".to_string(), false),
                ("Submariner".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_service_discovery_steady_state() {
        let h = default_harness();
        let sd = h.client.service_discoveries.insert(service_discovery("service-discovery"));

        h.reconciler.reconcile_service_discovery(&sd).await.unwrap();

        let agent = h
            .client
            .deployments
            .stored(TEST_NAMESPACE, "submariner-lighthouse-agent")
            .unwrap();
        assert!(agent.metadata.owner_references.is_none());
        let coredns = h
            .client
            .deployments
            .stored(TEST_NAMESPACE, "submariner-lighthouse-coredns")
            .unwrap();
        assert_eq!(coredns.metadata.owner_references.unwrap()[0].kind, "ServiceDiscovery");
        assert!(h.client.config_maps.contains(TEST_NAMESPACE, "submariner-lighthouse-coredns"));

        // The API server allocates the ClusterIP
        assert!(h.client.services.update(
            TEST_NAMESPACE,
            "submariner-lighthouse-coredns",
            |svc: &mut Service| {
                if let Some(spec) = svc.spec.as_mut() {
                    spec.cluster_ip = Some("10.43.0.10".to_string());
                }
            },
        ));
        let sd = h
            .client
            .service_discoveries
            .stored(TEST_NAMESPACE, "service-discovery")
            .unwrap();
        h.reconciler.reconcile_service_discovery(&sd).await.unwrap();

        let status = h
            .client
            .service_discoveries
            .stored(TEST_NAMESPACE, "service-discovery")
            .unwrap()
            .status
            .unwrap();
        assert_eq!(status.coredns_cluster_ip.as_deref(), Some("10.43.0.10"));
    }

    #[tokio::test]
    async fn test_service_discovery_deletion_uninstalls_agent() {
        let h = default_harness();
        h.client.deployments.insert(deployment("submariner-lighthouse-agent"));
        let sd: ServiceDiscovery = h
            .client
            .service_discoveries
            .insert(terminating(service_discovery("service-discovery")));

        let action = h.reconciler.reconcile_service_discovery(&sd).await.unwrap();

        assert_eq!(action, Action::requeue(Duration::from_millis(200)));
        assert!(h
            .client
            .deployments
            .contains(TEST_NAMESPACE, "submariner-lighthouse-agent-uninstall"));
        assert!(!h.client.deployments.contains(TEST_NAMESPACE, "submariner-lighthouse-agent"));
    }

    #[tokio::test]
    async fn test_broker_publishes_globalnet_info() {
        let h = default_harness();
        let broker = h.client.brokers.insert(broker("submariner-broker"));

        h.reconciler.reconcile_broker(&broker).await.unwrap();

        let config_map = h
            .client
            .config_maps
            .stored("submariner-k8s-broker", "submariner-globalnet-info")
            .unwrap();
        assert_eq!(config_map.metadata.owner_references.unwrap()[0].kind, "Broker");
        let status = h
            .client
            .brokers
            .stored("submariner-k8s-broker", "submariner-broker")
            .unwrap()
            .status
            .unwrap();
        assert_eq!(
            status.globalnet_config_map.as_deref(),
            Some("submariner-globalnet-info")
        );
        assert!(!has_finalizer(&broker.metadata));
    }
}
