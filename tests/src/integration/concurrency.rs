//! # Concurrency Scenarios
//!
//! Many clients mutating and publishing at once. Snapshots may reach a
//! client out of order, but once the dust settles every client must hold
//! the broker's final state and no packet may be lost.

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use rand::Rng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use vms_broker::{
        ChannelCallback, InMemoryStatsService, NoOpStatsService, VmsBrokerApi, VmsBrokerService,
        VmsClient, VmsClientCallback,
    };
    use vms_types::{
        AssociatedLayer, AvailableLayers, ClientToken, Layer, LayerDependency, ProcessId,
        ProviderId, SubscriptionState,
    };

    const THREADS: usize = 8;

    #[derive(Default)]
    struct Counter {
        packets: AtomicUsize,
        last_availability: Mutex<Option<AvailableLayers>>,
    }

    impl VmsClientCallback for Counter {
        fn on_layer_availability_changed(&self, layers: &AvailableLayers) {
            *self.last_availability.lock() = Some(layers.clone());
        }

        fn on_subscription_state_changed(&self, _: &SubscriptionState) {}

        fn on_packet_received(&self, _: ProviderId, _: &Layer, _: &[u8]) {
            self.packets.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn broker() -> VmsBrokerService {
        VmsBrokerService::new(
            Arc::new(InMemoryStatsService::new()),
            Arc::new(|| -> ProcessId { 1 }),
        )
    }

    #[test]
    fn test_concurrent_offerings_converge() {
        let broker = broker();
        let clients: Vec<_> = (0..THREADS)
            .map(|_| {
                let counter = Arc::new(Counter::default());
                let client = VmsClient::connect(Arc::new(broker.clone()), counter.clone()).unwrap();
                (Arc::new(client), counter)
            })
            .collect();

        const ROUNDS: usize = 25;
        let handles: Vec<_> = clients
            .iter()
            .enumerate()
            .map(|(i, (client, _))| {
                let client = Arc::clone(client);
                thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    let provider_id = client
                        .register_provider(format!("provider-{i}").as_bytes())
                        .unwrap();
                    for _ in 0..ROUNDS {
                        let layer = Layer::new(rng.gen_range(0..4), 0, 0);
                        client
                            .set_provider_offerings(provider_id, vec![LayerDependency::new(layer)])
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let final_state = broker.available_layers();
        assert_eq!(final_state.sequence, (THREADS * ROUNDS) as u64);
        for (client, counter) in &clients {
            assert_eq!(client.available_layers(), final_state);
            assert_eq!(counter.last_availability.lock().as_ref(), Some(&final_state));
        }
    }

    #[test]
    fn test_concurrent_publishers_lose_nothing() {
        let broker = broker();
        let counter = Arc::new(Counter::default());
        let subscriber = VmsClient::connect(Arc::new(broker.clone()), counter.clone()).unwrap();
        let layer = Layer::new(5, 0, 0);
        subscriber
            .set_subscriptions(vec![AssociatedLayer::layer_only(layer)])
            .unwrap();

        const PACKETS: usize = 200;
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let broker = broker.clone();
                thread::spawn(move || {
                    let publisher =
                        VmsClient::connect(Arc::new(broker), Arc::new(Counter::default())).unwrap();
                    let provider_id = publisher
                        .register_provider(format!("publisher-{i}").as_bytes())
                        .unwrap();
                    publisher
                        .set_provider_offerings(provider_id, vec![LayerDependency::new(layer)])
                        .unwrap();
                    for n in 0..PACKETS {
                        publisher
                            .publish_packet(provider_id, layer, &n.to_le_bytes())
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.packets.load(Ordering::SeqCst), THREADS * PACKETS);
        assert_eq!(broker.metrics().packets_published, (THREADS * PACKETS) as u64);
        // Publishers disconnected when their threads finished
        assert_eq!(broker.client_count(), 1);
    }

    #[test]
    fn test_register_and_unregister_churn() {
        let broker = broker();

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let broker = broker.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        let client = VmsClient::connect(
                            Arc::new(broker.clone()),
                            Arc::new(Counter::default()),
                        )
                        .unwrap();
                        client
                            .set_subscriptions(vec![AssociatedLayer::layer_only(Layer::new(1, 0, 0))])
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(broker.client_count(), 0);
        assert!(broker.subscription_state().layers.is_empty());
        let metrics = broker.metrics();
        assert_eq!(metrics.clients_registered, (THREADS * 50) as u64);
        assert_eq!(metrics.clients_unregistered, (THREADS * 50) as u64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dropped_receivers_are_reaped() {
        let broker = VmsBrokerService::new(Arc::new(NoOpStatsService), Arc::new(|| -> ProcessId { 1 }));

        let mut receivers = Vec::new();
        for _ in 0..THREADS {
            let (callback, receiver) = ChannelCallback::new();
            let token = ClientToken::new();
            broker
                .register_client(token, Arc::new(callback), false)
                .unwrap();
            receivers.push(receiver);
        }
        assert_eq!(broker.client_count(), THREADS);

        drop(receivers);

        tokio::time::timeout(Duration::from_secs(5), async {
            while broker.client_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("dead clients should be reaped");
        assert_eq!(broker.metrics().clients_died, THREADS as u64);
    }
}
