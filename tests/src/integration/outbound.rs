//! # Outbound Flows
//!
//! Backend-initiated messages through the outbound listener.
//!
//! ## Flows Tested
//!
//! 1. Malformed payloads are skipped without stopping the listener
//! 2. Publishing twice is delivered twice
//! 3. Messages published before the listener subscribes are not replayed
//! 4. Outbound traffic runs alongside a blocked request

#[cfg(test)]
mod tests {
    use crate::fixtures::{
        spawn_responder, wait_for_subscriber, RecordingHandler, Reply, OUTBOUND, REQUESTS,
    };
    use relay_bus::{BrokerClient, InMemoryBroker};
    use relay_core::{
        CorrelationStrategy, ListenerStats, OutboundListener, RequestEngine, UserService,
    };
    use std::sync::Arc;
    use std::time::Duration;

    async fn start_listener(
        broker: &Arc<InMemoryBroker>,
    ) -> (
        Arc<RecordingHandler>,
        tokio::task::JoinHandle<ListenerStats>,
    ) {
        let handler = Arc::new(RecordingHandler::default());
        let listener = OutboundListener::new(broker.clone(), OUTBOUND);
        let run_handler = handler.clone();
        let task = tokio::spawn(async move { listener.run(run_handler).await.unwrap() });
        wait_for_subscriber(broker, OUTBOUND).await;
        (handler, task)
    }

    #[tokio::test]
    async fn test_malformed_payloads_are_skipped() {
        const TOTAL: usize = 10;
        const MALFORMED: [usize; 3] = [2, 5, 9];

        let broker = Arc::new(InMemoryBroker::new());
        let (handler, task) = start_listener(&broker).await;

        for i in 0..TOTAL {
            let payload = if MALFORMED.contains(&i) {
                format!("{{\"chat_id\": {i}, \"text\": ")
            } else {
                format!(r#"{{"chat_id": {i}, "text": "update {i}"}}"#)
            };
            broker.publish(OUTBOUND, payload.as_bytes()).await.unwrap();
        }
        broker.close_topic(OUTBOUND);

        let stats = task.await.unwrap();
        assert_eq!(stats.received, TOTAL as u64);
        assert_eq!(stats.malformed, MALFORMED.len() as u64);
        assert_eq!(stats.delivered, (TOTAL - MALFORMED.len()) as u64);

        let expected: Vec<(i64, String)> = (0..TOTAL)
            .filter(|i| !MALFORMED.contains(i))
            .map(|i| (i as i64, format!("update {i}")))
            .collect();
        assert_eq!(handler.delivered(), expected);
    }

    #[tokio::test]
    async fn test_duplicate_publish_is_delivered_twice() {
        let broker = Arc::new(InMemoryBroker::new());
        let (handler, task) = start_listener(&broker).await;

        let payload = br#"{"user_id": 42, "text": "Your order is ready"}"#;
        broker.publish(OUTBOUND, payload).await.unwrap();
        broker.publish(OUTBOUND, payload).await.unwrap();
        broker.close_topic(OUTBOUND);

        task.await.unwrap();
        assert_eq!(
            handler.delivered(),
            vec![
                (42, "Your order is ready".to_string()),
                (42, "Your order is ready".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_replay_of_earlier_messages() {
        let broker = Arc::new(InMemoryBroker::new());

        let receivers = broker
            .publish(OUTBOUND, br#"{"chat_id": 1, "text": "too early"}"#)
            .await
            .unwrap();
        assert_eq!(receivers, 0);

        let (handler, task) = start_listener(&broker).await;
        broker
            .publish(OUTBOUND, br#"{"chat_id": 2, "text": "on time"}"#)
            .await
            .unwrap();
        broker.close_topic(OUTBOUND);

        task.await.unwrap();
        assert_eq!(handler.delivered(), vec![(2, "on time".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_not_blocked_by_pending_request() {
        let broker = Arc::new(InMemoryBroker::new());
        spawn_responder(broker.clone(), |_| {
            Reply::After(Duration::from_millis(1500), "true".into())
        })
        .await;
        let (handler, task) = start_listener(&broker).await;

        let engine = Arc::new(RequestEngine::new(broker.clone()));
        let users = UserService::new(engine, REQUESTS).with_strategy(CorrelationStrategy::PerEntity);
        let request = tokio::spawn(async move { users.check_user_exists(3).await });

        // While the request waits, an outbound message goes through
        tokio::time::sleep(Duration::from_millis(10)).await;
        broker
            .publish(OUTBOUND, br#"{"chat_id": 3, "text": "hello"}"#)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handler.delivered(), vec![(3, "hello".to_string())]);
        assert!(!request.is_finished());

        assert!(request.await.unwrap().unwrap());
        broker.close_topic(OUTBOUND);
        task.await.unwrap();
    }
}
