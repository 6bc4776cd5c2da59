//! # Request/Reply Flows
//!
//! The request engine and user service against a scripted backend on the
//! in-memory broker.
//!
//! ## Flows Tested
//!
//! 1. Answer inside the deadline is returned before the deadline
//! 2. Silent backend yields `Timeout` no earlier than the deadline
//! 3. Concurrent requests each receive their own answer, whatever the
//!    answer order
//! 4. Shared keys are refused rather than cross-delivered
//! 5. Late answers on reused keys

#[cfg(test)]
mod tests {
    use crate::fixtures::{
        spawn_responder, spawn_shuffling_responder, ObservedRequest, Reply, REQUESTS,
    };
    use relay_bus::{BrokerClient, InMemoryBroker};
    use relay_core::{
        CorrelationKey, CorrelationStrategy, RequestEngine, RequestEnvelope, RequestError,
        SignUp, UserExists, UserService,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn service(broker: &Arc<InMemoryBroker>, strategy: CorrelationStrategy) -> UserService {
        let engine = Arc::new(RequestEngine::new(broker.clone()));
        UserService::new(engine, REQUESTS)
            .with_strategy(strategy)
            .with_timeout(TIMEOUT)
    }

    // =========================================================================
    // DEADLINE BEHAVIOUR
    // =========================================================================

    /// user 42 asks, the backend answers "true" after 500ms.
    #[tokio::test(start_paused = true)]
    async fn test_answer_within_deadline() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut observed = broker.subscribe(REQUESTS).await.unwrap();
        spawn_responder(broker.clone(), |_| {
            Reply::After(Duration::from_millis(500), "true".into())
        })
        .await;
        let engine = RequestEngine::new(broker.clone());
        let key = CorrelationKey::from("user_exists_response:42");

        let started = Instant::now();
        let value = engine
            .send_and_wait(REQUESTS, &key, &UserExists { user_id: 42 }.into(), TIMEOUT)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(value.as_bool(), Ok(true));
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < TIMEOUT);

        let request = ObservedRequest::parse(&observed.recv().await.unwrap());
        assert_eq!(request.op, "user_exists");
        assert_eq!(request.user_id, 42);
        assert_eq!(broker.messages_published(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_backend_times_out_at_deadline() {
        let broker = Arc::new(InMemoryBroker::new());
        spawn_responder(broker.clone(), |_| Reply::Silent).await;
        let engine = RequestEngine::new(broker.clone());
        let key = CorrelationKey::from("user_exists_response:42");

        let started = Instant::now();
        let err = engine
            .send_and_wait(REQUESTS, &key, &UserExists { user_id: 42 }.into(), TIMEOUT)
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        match err {
            RequestError::Timeout {
                correlation_key,
                timeout,
            } => {
                assert_eq!(correlation_key, "user_exists_response:42");
                assert_eq!(timeout, TIMEOUT);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(elapsed >= TIMEOUT);
        assert!(elapsed < Duration::from_millis(2500));

        // No retry on timeout
        assert_eq!(broker.messages_published(), 1);
        assert_eq!(engine.stats().timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_after_deadline_is_not_returned() {
        let broker = Arc::new(InMemoryBroker::new());
        spawn_responder(broker.clone(), |_| {
            Reply::After(Duration::from_millis(2100), "true".into())
        })
        .await;
        let users = service(&broker, CorrelationStrategy::PerEntity);

        let err = users.check_user_exists(42).await.unwrap_err();
        assert!(matches!(err, RequestError::Timeout { .. }));
    }

    // =========================================================================
    // CONCURRENCY
    // =========================================================================

    #[tokio::test]
    async fn test_interleaved_per_request_answers_reach_their_callers() {
        const CALLERS: usize = 20;

        let broker = Arc::new(InMemoryBroker::new());
        let responder = spawn_shuffling_responder(broker.clone(), CALLERS, 7, |request| {
            (request.user_id % 2 == 0).to_string()
        })
        .await;
        let users = service(&broker, CorrelationStrategy::PerRequest);

        let calls: Vec<_> = (0..CALLERS as i64)
            .map(|user_id| {
                let users = users.clone();
                tokio::spawn(async move { (user_id, users.check_user_exists(user_id).await) })
            })
            .collect();

        for call in calls {
            let (user_id, result) = call.await.unwrap();
            assert_eq!(result.unwrap(), user_id % 2 == 0, "user {user_id}");
        }

        let answered = responder.await.unwrap();
        assert_eq!(answered.len(), CALLERS);
        // Every request advertised its own reply key
        let mut keys: Vec<_> = answered.iter().map(|r| r.reply_key.clone()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), CALLERS);
    }

    #[tokio::test]
    async fn test_interleaved_per_entity_answers_for_distinct_users() {
        const CALLERS: usize = 10;

        let broker = Arc::new(InMemoryBroker::new());
        spawn_shuffling_responder(broker.clone(), CALLERS, 11, |request| {
            (request.user_id >= 5).to_string()
        })
        .await;
        let users = service(&broker, CorrelationStrategy::PerEntity);

        let calls: Vec<_> = (0..CALLERS as i64)
            .map(|user_id| {
                let users = users.clone();
                tokio::spawn(async move { (user_id, users.check_user_exists(user_id).await) })
            })
            .collect();

        for call in calls {
            let (user_id, result) = call.await.unwrap();
            assert_eq!(result.unwrap(), user_id >= 5);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_keys_refuse_concurrent_callers() {
        let broker = Arc::new(InMemoryBroker::new());
        let responder = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            responder.push("user_exists_response", b"true").await.unwrap();
        });
        let users = service(&broker, CorrelationStrategy::Static);

        let (first, second) = tokio::join!(users.check_user_exists(1), users.check_user_exists(2));

        // Exactly one caller got the shared key; the other was refused
        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(RequestError::CorrelationConflict(key)) if key == "user_exists_response"
        )));
        assert_eq!(broker.messages_published(), 1);
    }

    // =========================================================================
    // STALE ANSWERS
    // =========================================================================

    /// An answer that misses its deadline stays queued under a per-entity key
    /// and is taken by the next request for the same user.
    #[tokio::test(start_paused = true)]
    async fn test_late_answer_is_taken_by_next_per_entity_request() {
        let broker = Arc::new(InMemoryBroker::new());
        let engine = RequestEngine::new(broker.clone());
        let key = CorrelationKey::per_entity("user_exists_response", 8);
        let envelope: RequestEnvelope = UserExists { user_id: 8 }.into();

        let err = engine
            .send_and_wait(REQUESTS, &key, &envelope, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Timeout { .. }));

        // The backend finally answers the first request
        broker.push(key.as_str(), b"false").await.unwrap();
        assert_eq!(broker.queue_len(key.as_str()), 1);

        let value = engine
            .send_and_wait(REQUESTS, &key, &envelope, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(value.as_str(), "false");
        assert_eq!(broker.queue_len(key.as_str()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_answer_never_reaches_per_request_caller() {
        let broker = Arc::new(InMemoryBroker::new());
        let attempts = AtomicU32::new(0);
        spawn_responder(broker.clone(), move |_| {
            // First request is answered too late, second on time
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Reply::After(Duration::from_millis(300), "false".into())
            } else {
                Reply::After(Duration::from_millis(10), "true".into())
            }
        })
        .await;
        let users = service(&broker, CorrelationStrategy::PerRequest)
            .with_timeout(Duration::from_millis(200));

        assert!(matches!(
            users.check_user_exists(8).await,
            Err(RequestError::Timeout { .. })
        ));
        assert!(users.check_user_exists(8).await.unwrap());
    }

    // =========================================================================
    // SIGN-UP
    // =========================================================================

    #[tokio::test]
    async fn test_sign_up_round_trip() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut observed = broker.subscribe(REQUESTS).await.unwrap();
        spawn_responder(broker.clone(), |request| {
            let answer = request.op == "sign_up";
            Reply::After(Duration::ZERO, answer.to_string())
        })
        .await;
        let users = service(&broker, CorrelationStrategy::PerEntity);

        let registered = users
            .register_user(SignUp {
                user_id: 42,
                phone: "+15550100".into(),
                name: "Ada".into(),
                username: None,
            })
            .await
            .unwrap();
        assert!(registered);

        let payload: serde_json::Value =
            serde_json::from_slice(&observed.recv().await.unwrap()).unwrap();
        assert_eq!(
            payload,
            serde_json::json!({
                "type": "sign_up",
                "data": {"user_id": 42, "phone": "+15550100", "name": "Ada"}
            })
        );
    }

    #[tokio::test]
    async fn test_non_boolean_answer_is_decode_error() {
        let broker = Arc::new(InMemoryBroker::new());
        spawn_responder(broker.clone(), |_| Reply::After(Duration::ZERO, "yes".into())).await;
        let users = service(&broker, CorrelationStrategy::PerEntity);

        let err = users.check_user_exists(1).await.unwrap_err();
        assert!(matches!(err, RequestError::Decode { .. }));
        assert!(!err.is_retryable());
    }
}
