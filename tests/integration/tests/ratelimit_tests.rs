//! Rate limiter end-to-end tests
//!
//! Every test runs on tokio's paused clock: sleeps complete instantly once the
//! runtime is idle, and `RecordedCall::at` reports the virtual time of each
//! send.
//!
//! Run with: cargo test -p integration-tests --test ratelimit_tests

use std::sync::Arc;
use std::time::Duration;

use chat_common::{AccountType, RestError, RouteLimitTable};
use chat_core::catalog::messages;
use chat_rest::RestClient;
use integration_tests::{
    add_reaction, bulk_ban, execute_webhook, send_message, test_limiter, test_limiter_with,
    unique_id, MockExecutor, MockReply, MockResponse, ORIGIN_MILLIS,
};

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Let spawned bucket tasks run to their next await point
async fn settle() {
    tokio::time::sleep(ms(1)).await;
}

// ============================================================================
// Route buckets
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_exhausted_bucket_holds_sixth_request_until_reset() {
    let executor = Arc::new(MockExecutor::new());
    let limiter = test_limiter(&executor);
    let guild = unique_id();
    let path = format!("guilds/{guild}/bulk-ban");

    executor.script(
        &path,
        (0..5)
            .rev()
            .map(|remaining| MockResponse::ok().limits(5, remaining, ORIGIN_MILLIS + 2_000)),
    );

    let handles: Vec<_> = (0..6).map(|_| limiter.queue(bulk_ban(&guild, &["1"]))).collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().status(), 200);
    }

    let calls = executor.calls_to(&path);
    assert_eq!(calls.len(), 6);
    for call in &calls[..5] {
        assert_eq!(call.at, Duration::ZERO);
    }
    assert!(calls[5].at >= ms(2_000));
    assert!(calls[5].at < ms(2_100));
}

#[tokio::test(start_paused = true)]
async fn test_known_exhaustion_delays_new_request() {
    let executor = Arc::new(MockExecutor::new());
    let limiter = test_limiter(&executor);
    let channel = unique_id();
    let path = format!("channels/{channel}/messages");

    executor.script(&path, [MockResponse::ok().limits(5, 0, ORIGIN_MILLIS + 3_000)]);

    limiter.queue(send_message(&channel, "first")).await.unwrap();

    let bucket = limiter.bucket(&path).unwrap();
    let delay = limiter.current_rate_limit_delay(&bucket).unwrap();
    assert!(delay <= ms(3_000));
    assert!(delay > ms(2_900));

    limiter.queue(send_message(&channel, "second")).await.unwrap();

    let calls = executor.calls_to(&path);
    assert!(calls[1].at >= ms(3_000));
    assert!(calls[1].at < ms(3_100));
}

#[tokio::test(start_paused = true)]
async fn test_route_429_retries_same_request_first() {
    let executor = Arc::new(MockExecutor::new());
    let limiter = test_limiter(&executor);
    let channel = unique_id();
    let path = format!("channels/{channel}/messages");

    executor.script(&path, [MockResponse::too_many_requests(1.0, false)]);

    let first = limiter.queue(send_message(&channel, "one"));
    let second = limiter.queue(send_message(&channel, "two"));
    assert_eq!(first.await.unwrap().status(), 200);
    assert_eq!(second.await.unwrap().status(), 200);

    let contents: Vec<_> = executor
        .calls_to(&path)
        .iter()
        .map(|call| call.body.as_ref().unwrap()["content"].clone())
        .collect();
    assert_eq!(contents, ["one", "one", "two"]);

    let calls = executor.calls_to(&path);
    assert!(calls[1].at >= ms(1_000));
    assert_eq!(limiter.global_cooldown_until(), None);
}

#[tokio::test(start_paused = true)]
async fn test_fixed_reaction_limit_spaces_requests() {
    let executor = Arc::new(MockExecutor::new());
    let limiter = test_limiter(&executor);
    let channel = unique_id();

    let handles: Vec<_> = ["1", "2", "3"]
        .iter()
        .map(|message| limiter.queue(add_reaction(&channel, message, "%F0%9F%91%8D")))
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let calls = executor.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.rate_limit_key == calls[0].rate_limit_key));
    assert_eq!(calls[0].at, Duration::ZERO);
    assert!(calls[1].at >= ms(250) && calls[1].at < ms(260));
    assert!(calls[2].at >= ms(500) && calls[2].at < ms(510));
}

#[tokio::test(start_paused = true)]
async fn test_major_parameters_select_buckets() {
    let executor = Arc::new(MockExecutor::new());
    let limiter = test_limiter(&executor);
    let (channel_a, channel_b) = (unique_id(), unique_id());

    let handles = vec![
        limiter.queue(send_message(&channel_a, "a")),
        limiter.queue(send_message(&channel_b, "b")),
        limiter.queue(add_reaction(&channel_a, "10", "x")),
        limiter.queue(add_reaction(&channel_a, "11", "y")),
        limiter.queue(execute_webhook("42", "secret-one", "hook")),
        limiter.queue(execute_webhook("42", "secret-two", "hook")),
    ];
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(limiter.bucket_count(), 4);
    assert!(limiter
        .bucket(&format!("channels/{channel_a}/messages/{{message_id}}/reactions/{{emoji}}/@me"))
        .is_some());
    assert!(limiter.bucket("webhooks/42/{token}").is_some());
}

// ============================================================================
// Global cooldown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_global_429_blocks_every_bucket() {
    let executor = Arc::new(MockExecutor::new());
    let limiter = test_limiter(&executor);
    let (limited, other) = (unique_id(), unique_id());
    let limited_path = format!("channels/{limited}/messages");
    let other_path = format!("channels/{other}/messages");

    executor.script(&limited_path, [MockResponse::too_many_requests(2.5, true)]);

    let first = limiter.queue(send_message(&limited, "hit"));
    settle().await;
    assert_eq!(limiter.global_cooldown_until(), Some(ORIGIN_MILLIS + 2_500));
    assert!(limiter.global_delay().is_some());

    let second = limiter.queue(send_message(&other, "blocked"));
    assert_eq!(first.await.unwrap().status(), 200);
    assert_eq!(second.await.unwrap().status(), 200);

    let retried = &executor.calls_to(&limited_path)[1];
    let blocked = &executor.calls_to(&other_path)[0];
    assert!(retried.at >= ms(2_500));
    assert!(blocked.at >= ms(2_500));

    // A global 429 leaves the route budget alone
    let other_bucket = limiter.bucket(&other_path).unwrap();
    assert_eq!(other_bucket.snapshot().limit, 1);
}

#[tokio::test(start_paused = true)]
async fn test_global_cooldown_only_extends() {
    let executor = Arc::new(MockExecutor::with_latency(ms(10)));
    let limiter = test_limiter(&executor);
    let (a, b) = (unique_id(), unique_id());

    executor.script(&format!("channels/{a}/messages"), [MockResponse::too_many_requests(5.0, true)]);
    executor.script(&format!("channels/{b}/messages"), [MockResponse::too_many_requests(1.0, true)]);

    // Both are in flight together; the shorter cooldown arrives second
    let first = limiter.queue(send_message(&a, "long"));
    let second = limiter.queue(send_message(&b, "short"));
    tokio::time::sleep(ms(20)).await;

    assert_eq!(limiter.global_cooldown_until(), Some(ORIGIN_MILLIS + 5_010));
    first.await.unwrap();
    second.await.unwrap();

    let retried = executor.calls_to(&format!("channels/{b}/messages"));
    assert!(retried[1].at >= ms(5_010));
}

// ============================================================================
// Clock skew
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_server_clock_offset_is_applied() {
    let executor = Arc::new(MockExecutor::new());
    let limiter = test_limiter(&executor);
    let channel = unique_id();
    let path = format!("channels/{channel}/messages");
    let server_now = ORIGIN_MILLIS + 10_000;

    executor.script(
        &path,
        [MockResponse::ok()
            .date(server_now)
            .limits(1, 0, server_now + 2_000)],
    );

    let first = limiter.queue(send_message(&channel, "one"));
    let second = limiter.queue(send_message(&channel, "two"));
    first.await.unwrap();
    second.await.unwrap();

    assert_eq!(limiter.clock_offset(), Some(10_000));
    let calls = executor.calls_to(&path);
    assert!(calls[1].at >= ms(2_000));
    assert!(calls[1].at < ms(2_100));
}

// ============================================================================
// Failures and cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_transport_failure_completes_immediately() {
    let executor = Arc::new(MockExecutor::new());
    let limiter = test_limiter(&executor);
    let channel = unique_id();
    let path = format!("channels/{channel}/messages");

    executor.script(&path, [MockReply::TransportFailure]);

    let failed = limiter.queue(send_message(&channel, "lost"));
    let next = limiter.queue(send_message(&channel, "sent"));

    let err = failed.await.unwrap_err();
    assert_eq!(err.error_code(), "TRANSPORT_ERROR");
    assert!(err.is_retriable());
    assert_eq!(next.await.unwrap().status(), 200);

    let calls = executor.calls_to(&path);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].at, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_executor_panic_fails_one_request() {
    let executor = Arc::new(MockExecutor::new());
    let limiter = test_limiter(&executor);
    let channel = unique_id();

    executor.script(&format!("channels/{channel}/messages"), [MockReply::Panic]);

    let panicked = limiter.queue(send_message(&channel, "boom"));
    let next = limiter.queue(send_message(&channel, "fine"));

    assert!(matches!(panicked.await, Err(RestError::Internal(_))));
    assert_eq!(next.await.unwrap().status(), 200);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_requests_are_never_sent() {
    let executor = Arc::new(MockExecutor::with_latency(ms(100)));
    let limiter = test_limiter(&executor);
    let channel = unique_id();
    let path = format!("channels/{channel}/messages");

    let sent = limiter.queue(send_message(&channel, "sent"));
    let cancelled = limiter.queue(send_message(&channel, "cancelled"));
    let dropped = limiter.queue(send_message(&channel, "dropped"));
    cancelled.cancel();
    drop(dropped);

    assert_eq!(sent.await.unwrap().status(), 200);
    assert!(matches!(cancelled.await, Err(RestError::Cancelled)));

    assert_eq!(executor.calls_to(&path).len(), 1);
    settle().await;
    assert!(!limiter.is_scheduled(&path));
}

#[tokio::test(start_paused = true)]
async fn test_error_status_is_returned_to_caller() {
    let executor = Arc::new(MockExecutor::new());
    let limiter = test_limiter(&executor);
    let client = RestClient::from_limiter(limiter.clone());
    let channel = unique_id();
    let not_found = MockResponse::status(404)
        .json(&serde_json::json!({"message": "Unknown Channel", "code": 10003}));

    executor.script(
        &format!("channels/{channel}/messages"),
        [not_found.clone(), not_found],
    );

    let response = limiter.queue(send_message(&channel, "x")).await.unwrap();
    assert_eq!(response.status(), 404);

    let err = client.execute(send_message(&channel, "y")).await.unwrap_err();
    assert_eq!(err.status_code(), Some(404));
    assert!(!err.is_retriable());
    assert_eq!(executor.calls().len(), 2);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_bucket_sends_one_at_a_time_in_order() {
    let executor = Arc::new(MockExecutor::with_latency(ms(50)));
    let limiter = test_limiter(&executor);
    let (a, b) = (unique_id(), unique_id());

    let mut handles = Vec::new();
    for i in 0..5 {
        handles.push(limiter.queue(send_message(&a, &i.to_string())));
        handles.push(limiter.queue(send_message(&b, &i.to_string())));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let path_a = format!("channels/{a}/messages");
    let path_b = format!("channels/{b}/messages");
    assert_eq!(executor.max_in_flight(&path_a), 1);
    assert_eq!(executor.max_in_flight(&path_b), 1);
    // Different buckets proceed in parallel
    assert_eq!(executor.max_total_in_flight(), 2);

    let order: Vec<_> = executor
        .calls_to(&path_a)
        .iter()
        .map(|call| call.body.as_ref().unwrap()["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(order, ["0", "1", "2", "3", "4"]);

    let last = executor.calls_to(&path_b).last().unwrap().at;
    assert!(last >= ms(200) && last < ms(210));
}

#[tokio::test(start_paused = true)]
async fn test_many_producers_share_one_bucket() {
    let executor = Arc::new(MockExecutor::with_latency(ms(5)));
    let limiter = test_limiter(&executor);
    let channel = unique_id();
    let path = format!("channels/{channel}/messages");

    let producers: Vec<_> = (0..8)
        .map(|p| {
            let limiter = limiter.clone();
            let channel = channel.clone();
            tokio::spawn(async move {
                let handles: Vec<_> = (0..5)
                    .map(|i| limiter.queue(send_message(&channel, &format!("{p}-{i}"))))
                    .collect();
                for handle in handles {
                    handle.await.unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    assert_eq!(executor.calls_to(&path).len(), 40);
    assert_eq!(executor.max_in_flight(&path), 1);
    settle().await;
    assert!(!limiter.is_scheduled(&path));
}

// ============================================================================
// Account policy
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_client_account_learns_only_from_429() {
    let executor = Arc::new(MockExecutor::new());
    let limiter = test_limiter_with(&executor, AccountType::Client, RouteLimitTable::new());
    let channel = unique_id();
    let path = format!("channels/{channel}/messages");

    executor.script(
        &path,
        [
            MockResponse::ok().limits(5, 0, ORIGIN_MILLIS + 5_000),
            MockResponse::too_many_requests(1.0, false),
        ],
    );

    let first = limiter.queue(send_message(&channel, "one"));
    let second = limiter.queue(send_message(&channel, "two"));
    first.await.unwrap();
    second.await.unwrap();

    let calls = executor.calls_to(&path);
    assert_eq!(calls.len(), 3);
    // Headers did not block the second request; the 429 did delay its retry
    assert_eq!(calls[1].at, Duration::ZERO);
    assert!(calls[2].at >= ms(1_000));
}

// ============================================================================
// Client facade
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_client_queue_compiles_route() {
    let executor = Arc::new(MockExecutor::new());
    let client = RestClient::from_limiter(test_limiter(&executor));
    let channel = unique_id();

    let handle = client
        .queue(
            &messages::SEND_MESSAGE,
            &[&channel],
            Some(serde_json::json!({"content": "hi"})),
        )
        .unwrap();
    handle.await.unwrap();

    let err = client.queue(&messages::SEND_MESSAGE, &[], None).unwrap_err();
    assert_eq!(err.error_code(), "ROUTE_PARAMETER_COUNT");

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, format!("channels/{channel}/messages"));
}

#[tokio::test(start_paused = true)]
async fn test_client_execute_json_decodes_body() {
    let executor = Arc::new(MockExecutor::new());
    let client = RestClient::from_limiter(test_limiter(&executor));
    let channel = unique_id();

    executor.script(
        &format!("channels/{channel}/messages"),
        [MockResponse::ok()
            .json(&serde_json::json!({"id": "9", "content": "hi"}))],
    );

    let message: serde_json::Value = client
        .execute_json(send_message(&channel, "hi"))
        .await
        .unwrap();
    assert_eq!(message["id"], "9");
}
