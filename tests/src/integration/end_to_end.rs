//! # End-to-End Scenarios
//!
//! Several clients share one broker: providers announce layers, consumers
//! subscribe, packets flow, and statistics land where they should.

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    use vms_broker::{
        BrokerEvent, ChannelCallback, ClientConfig, InMemoryStatsService, LayerTraffic,
        PrometheusStatsService, VmsBrokerApi, VmsBrokerService, VmsClient, VmsClientCallback,
    };
    use vms_types::{
        AssociatedLayer, AvailableLayers, ClientToken, ConnectionState, Layer, LayerDependency,
        ProcessId, ProviderId, ProviderInfo, SubscriptionState, NO_SUBSCRIBERS_PROCESS,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const MAP_TILES: Layer = Layer::new(1, 0, 1);
    const LANE_GRAPH: Layer = Layer::new(2, 0, 1);
    const HAZARDS: Layer = Layer::new(3, 1, 2);

    #[derive(Default)]
    struct Collector {
        availability: Mutex<Vec<AvailableLayers>>,
        subscriptions: Mutex<Vec<SubscriptionState>>,
        packets: Mutex<Vec<(ProviderId, Layer, Vec<u8>)>>,
    }

    impl VmsClientCallback for Collector {
        fn on_layer_availability_changed(&self, layers: &AvailableLayers) {
            self.availability.lock().push(layers.clone());
        }

        fn on_subscription_state_changed(&self, state: &SubscriptionState) {
            self.subscriptions.lock().push(state.clone());
        }

        fn on_packet_received(&self, provider_id: ProviderId, layer: &Layer, payload: &[u8]) {
            self.packets.lock().push((provider_id, *layer, payload.to_vec()));
        }
    }

    /// Broker whose caller identity can be switched between registrations.
    struct Harness {
        broker: VmsBrokerService,
        stats: Arc<InMemoryStatsService>,
        process: Arc<AtomicI64>,
    }

    impl Harness {
        fn new() -> Self {
            let stats = Arc::new(InMemoryStatsService::new());
            let process = Arc::new(AtomicI64::new(0));
            let caller = Arc::clone(&process);
            let broker = VmsBrokerService::new(
                stats.clone(),
                Arc::new(move || -> ProcessId { caller.load(Ordering::SeqCst) }),
            );
            Self {
                broker,
                stats,
                process,
            }
        }

        fn connect(&self, process: ProcessId) -> (VmsClient, Arc<Collector>) {
            self.process.store(process, Ordering::SeqCst);
            let collector = Arc::new(Collector::default());
            let client = VmsClient::connect(Arc::new(self.broker.clone()), collector.clone())
                .expect("client should connect");
            (client, collector)
        }
    }

    // =============================================================================
    // PROVIDERS AND AVAILABILITY
    // =============================================================================

    #[test]
    fn test_provider_ids_follow_description_content() {
        let harness = Harness::new();
        let (client, _) = harness.connect(1);

        assert_eq!(client.register_provider(&[1, 2, 3]).unwrap(), 1);
        assert_eq!(client.register_provider(&[1, 2, 3]).unwrap(), 1);
        assert_eq!(client.register_provider(&[1, 2, 3, 4]).unwrap(), 2);
    }

    #[test]
    fn test_dependency_chain_becomes_available() {
        let harness = Harness::new();
        let (client, collector) = harness.connect(1);
        let provider_id = client.register_provider(b"lane provider").unwrap();

        client
            .set_provider_offerings(
                provider_id,
                vec![
                    LayerDependency::with_dependencies(LANE_GRAPH, [MAP_TILES]),
                    LayerDependency::new(MAP_TILES),
                ],
            )
            .unwrap();

        let expected = AvailableLayers::new(
            1,
            [
                AssociatedLayer::new(LANE_GRAPH, [provider_id]),
                AssociatedLayer::new(MAP_TILES, [provider_id]),
            ],
        );
        assert_eq!(client.available_layers(), expected);
        assert_eq!(collector.availability.lock().last(), Some(&expected));
    }

    #[test]
    fn test_self_dependency_never_resolves() {
        let harness = Harness::new();
        let (client, _) = harness.connect(1);
        let provider_id = client.register_provider(b"loop").unwrap();

        client
            .set_provider_offerings(
                provider_id,
                vec![LayerDependency::with_dependencies(LANE_GRAPH, [LANE_GRAPH])],
            )
            .unwrap();

        assert_eq!(client.available_layers(), AvailableLayers::new(1, []));
    }

    #[test]
    fn test_availability_sequence_counts_every_offering_call() {
        let harness = Harness::new();
        let (client, _) = harness.connect(1);
        let provider_id = client.register_provider(b"tiles").unwrap();

        for _ in 0..5 {
            client
                .set_provider_offerings(provider_id, vec![LayerDependency::new(MAP_TILES)])
                .unwrap();
        }

        assert_eq!(harness.broker.available_layers().sequence, 5);
        assert_eq!(client.available_layers().sequence, 5);
    }

    #[test]
    fn test_provider_withdrawal_reaches_consumers() {
        let harness = Harness::new();
        let (producer, _) = harness.connect(1);
        let (consumer, _) = harness.connect(2);
        let provider_id = producer.register_provider(b"hazards").unwrap();
        producer
            .set_provider_offerings(provider_id, vec![LayerDependency::new(HAZARDS)])
            .unwrap();
        assert!(consumer.available_layers().contains_layer(&HAZARDS));

        drop(producer);

        assert!(!consumer.available_layers().contains_layer(&HAZARDS));
        assert_eq!(
            harness.stats.stats_for(1).connection_events,
            vec![ConnectionState::Connected, ConnectionState::Disconnected]
        );
    }

    // =============================================================================
    // SUBSCRIPTIONS AND ROUTING
    // =============================================================================

    #[test]
    fn test_whole_layer_subscription_masks_provider_subscription() {
        let harness = Harness::new();
        let (a, _) = harness.connect(1);
        let (b, collector) = harness.connect(2);

        a.set_subscriptions(vec![AssociatedLayer::new(MAP_TILES, [7])])
            .unwrap();
        b.set_subscriptions(vec![AssociatedLayer::layer_only(MAP_TILES)])
            .unwrap();

        let state = b.subscription_state();
        assert!(state.layers.contains(&MAP_TILES));
        assert!(state
            .associated_layers
            .iter()
            .all(|entry| entry.layer != MAP_TILES));
        assert_eq!(state.sequence, 2);
        assert_eq!(collector.subscriptions.lock().len(), 3);
    }

    #[test]
    fn test_packet_reaches_subscriber_only() {
        let harness = Harness::new();
        let (subscriber, subscriber_collector) = harness.connect(1);
        let (publisher, _) = harness.connect(2);
        let (bystander, bystander_collector) = harness.connect(3);

        subscriber
            .set_subscriptions(vec![AssociatedLayer::layer_only(MAP_TILES)])
            .unwrap();
        let provider_id = publisher.register_provider(b"tiles").unwrap();
        publisher
            .set_provider_offerings(provider_id, vec![LayerDependency::new(MAP_TILES)])
            .unwrap();

        publisher
            .publish_packet(provider_id, MAP_TILES, b"tile 12/34")
            .unwrap();

        assert_eq!(
            *subscriber_collector.packets.lock(),
            vec![(provider_id, MAP_TILES, b"tile 12/34".to_vec())]
        );
        assert!(bystander_collector.packets.lock().is_empty());
        assert!(!bystander.is_monitoring_enabled());

        let one = LayerTraffic { packets: 1, bytes: 10 };
        assert_eq!(harness.stats.stats_for(2).sent_for(&MAP_TILES), one);
        assert_eq!(harness.stats.stats_for(1).received_for(&MAP_TILES), one);
        assert_eq!(harness.stats.stats_for(3).received_for(&MAP_TILES), LayerTraffic::default());
    }

    #[test]
    fn test_monitor_sees_all_packets() {
        let harness = Harness::new();
        let (monitor, collector) = harness.connect(1);
        let (publisher, _) = harness.connect(2);
        monitor.set_monitoring_enabled(true).unwrap();

        let provider_id = publisher.register_provider(b"many").unwrap();
        publisher
            .set_provider_offerings(
                provider_id,
                vec![LayerDependency::new(MAP_TILES), LayerDependency::new(HAZARDS)],
            )
            .unwrap();
        publisher.publish_packet(provider_id, MAP_TILES, b"a").unwrap();
        publisher.publish_packet(provider_id, HAZARDS, b"b").unwrap();

        assert_eq!(collector.packets.lock().len(), 2);
        assert_eq!(
            harness.stats.stats_for(NO_SUBSCRIBERS_PROCESS).dropped_for(&MAP_TILES),
            LayerTraffic::default()
        );
    }

    #[test]
    fn test_large_packets_arrive_as_bytes() {
        let harness = Harness::new();
        harness.process.store(1, Ordering::SeqCst);
        let collector = Arc::new(Collector::default());
        let subscriber = VmsClient::connect(Arc::new(harness.broker.clone()), collector.clone())
            .unwrap();
        let (publisher, _) = harness.connect(2);
        let small_threshold = ClientConfig::default().with_large_packet_threshold(8);
        let large_publisher = VmsClient::connect_with_config(
            Arc::new(harness.broker.clone()),
            Arc::new(Collector::default()),
            false,
            small_threshold,
        )
        .unwrap();

        subscriber
            .set_subscriptions(vec![AssociatedLayer::layer_only(HAZARDS)])
            .unwrap();
        for client in [&publisher, &large_publisher] {
            let provider_id = client.register_provider(b"hazards").unwrap();
            client
                .set_provider_offerings(provider_id, vec![LayerDependency::new(HAZARDS)])
                .unwrap();
            client
                .publish_packet(provider_id, HAZARDS, b"pothole at km 12")
                .unwrap();
        }

        let packets = collector.packets.lock();
        assert_eq!(packets.len(), 2);
        assert!(packets
            .iter()
            .all(|(_, _, payload)| payload.as_slice() == b"pothole at km 12"));
    }

    #[test]
    fn test_unsubscribed_packet_is_dropped() {
        let harness = Harness::new();
        let (publisher, _) = harness.connect(5);
        let provider_id = publisher.register_provider(b"lonely").unwrap();
        publisher
            .set_provider_offerings(provider_id, vec![LayerDependency::new(LANE_GRAPH)])
            .unwrap();

        publisher
            .publish_packet(provider_id, LANE_GRAPH, b"nobody listens")
            .unwrap();

        assert_eq!(
            harness.stats.stats_for(NO_SUBSCRIBERS_PROCESS).dropped_for(&LANE_GRAPH),
            LayerTraffic { packets: 1, bytes: 14 }
        );
        assert_eq!(harness.stats.stats_for(5).sent_for(&LANE_GRAPH).packets, 1);
    }

    #[test]
    fn test_prometheus_stats_backend() {
        let stats = Arc::new(PrometheusStatsService::new().unwrap());
        let broker = VmsBrokerService::new(stats, Arc::new(|| -> ProcessId { 9090 }));
        let collector = Arc::new(Collector::default());
        let client = VmsClient::connect(Arc::new(broker.clone()), collector).unwrap();

        let provider_id = client.register_provider(b"prom").unwrap();
        client
            .set_provider_offerings(provider_id, vec![LayerDependency::new(Layer::new(90, 9, 0))])
            .unwrap();
        client
            .publish_packet(provider_id, Layer::new(90, 9, 0), b"xyz")
            .unwrap();

        let exposition = vms_telemetry::encode_metrics().unwrap();
        assert!(exposition.contains("90/9/0"));
    }

    #[test]
    fn test_broker_runs_under_initialized_telemetry() {
        // Only test in this binary that installs the global subscriber
        let _guard = vms_telemetry::init_telemetry(
            vms_telemetry::TelemetryConfig::default().with_log_level("debug"),
        )
        .unwrap();

        let harness = Harness::new();
        let (client, _) = harness.connect(1);
        let provider_id = client.register_provider(b"logged").unwrap();
        client
            .set_provider_offerings(provider_id, vec![LayerDependency::new(MAP_TILES)])
            .unwrap();
        client.disconnect();

        assert_eq!(harness.broker.client_count(), 0);
    }

    // =============================================================================
    // ASYNC CLIENTS
    // =============================================================================

    #[tokio::test]
    async fn test_channel_client_receives_events() {
        let broker = VmsBrokerService::new(
            Arc::new(InMemoryStatsService::new()),
            Arc::new(|| -> ProcessId { 1 }),
        );
        let token = ClientToken::new();
        let (callback, mut events) = ChannelCallback::new();
        broker
            .register_client(token, Arc::new(callback), false)
            .unwrap();
        broker
            .set_subscriptions(token, vec![AssociatedLayer::layer_only(MAP_TILES)])
            .unwrap();

        let publisher = ClientToken::new();
        let (publisher_callback, _publisher_events) = ChannelCallback::new();
        broker
            .register_client(publisher, Arc::new(publisher_callback), false)
            .unwrap();
        let provider_id = broker
            .register_provider(publisher, ProviderInfo::new(b"tiles".to_vec()))
            .unwrap();
        broker
            .set_provider_offerings(publisher, provider_id, vec![LayerDependency::new(MAP_TILES)])
            .unwrap();
        broker
            .publish_packet(publisher, provider_id, MAP_TILES, b"tile")
            .unwrap();

        let mut received = Vec::new();
        while received.len() < 3 {
            let event = timeout(Duration::from_millis(500), events.recv())
                .await
                .expect("timeout waiting for event")
                .expect("channel should stay open");
            received.push(event);
        }

        assert!(matches!(received[0], BrokerEvent::SubscriptionStateChanged(_)));
        assert!(matches!(received[1], BrokerEvent::LayerAvailabilityChanged(_)));
        assert_eq!(
            received[2],
            BrokerEvent::PacketReceived {
                provider_id,
                layer: MAP_TILES,
                payload: b"tile".to_vec()
            }
        );
    }
}
