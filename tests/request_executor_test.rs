mod common;

use chrono::Utc;
use common::{shared, PacedSleeper, RecordingSleeper};
use list_benchmark::api::backoff::RetryPolicy;
use list_benchmark::api::client::ApiClient;
use list_benchmark::api::fetchers;
use list_benchmark::config;
use list_benchmark::error::{AppError, FailureCause};
use list_benchmark::model::job::ApiKey;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn key() -> ApiKey {
    ApiKey::parse("0123456789abcdef-us7").unwrap()
}

/// Answers 429 to the first `rate_limited` requests and 200 afterwards,
/// every response held back by `delay`. Notes when each request arrived.
#[derive(Clone)]
struct ArrivalLog {
    arrivals: Arc<Mutex<Vec<Instant>>>,
    seen: Arc<AtomicUsize>,
    rate_limited: usize,
    delay: Duration,
    body: fn(&Request) -> serde_json::Value,
}

impl ArrivalLog {
    fn new(rate_limited: usize, delay: Duration, body: fn(&Request) -> serde_json::Value) -> Self {
        ArrivalLog {
            arrivals: Arc::new(Mutex::new(Vec::new())),
            seen: Arc::new(AtomicUsize::new(0)),
            rate_limited,
            delay,
            body,
        }
    }

    /// Most requests that arrived within any `window`. With `window` shorter
    /// than `delay`, this is the number of requests in flight at once.
    fn peak_within(&self, window: Duration) -> usize {
        let mut arrivals = self.arrivals.lock().unwrap().clone();
        arrivals.sort();
        (0..arrivals.len())
            .map(|i| {
                arrivals[i..]
                    .iter()
                    .take_while(|t| t.duration_since(arrivals[i]) < window)
                    .count()
            })
            .max()
            .unwrap_or(0)
    }
}

impl Respond for ArrivalLog {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        let template = if self.seen.fetch_add(1, Ordering::SeqCst) < self.rate_limited {
            ResponseTemplate::new(429)
        } else {
            ResponseTemplate::new(200).set_body_json((self.body)(request))
        };
        template.set_delay(self.delay)
    }
}

fn activity_body(request: &Request) -> serde_json::Value {
    // /lists/{list}/members/{id}/activity
    let id = request.url.path().split('/').nth(4).unwrap_or_default();
    common::activity(id, &[])
}

fn empty_page(_: &Request) -> serde_json::Value {
    serde_json::json!({"members": []})
}

#[tokio::test]
async fn retries_rate_limited_requests_with_exponential_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lists/l1"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lists/l1"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok": true}"#))
        .mount(&server)
        .await;

    let sleeper = RecordingSleeper::new();
    let client = ApiClient::new(server.uri(), &key(), None, shared(&sleeper)).unwrap();
    let body = client
        .execute(&client.endpoint("lists/l1"), &[])
        .await
        .unwrap();

    assert_eq!(body, r#"{"ok": true}"#);
    assert_eq!(sleeper.secs(), vec![5, 25]);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn gives_up_after_three_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(504))
        .mount(&server)
        .await;

    let sleeper = RecordingSleeper::new();
    let client = ApiClient::new(server.uri(), &key(), None, shared(&sleeper)).unwrap();
    let err = client
        .execute(&client.endpoint("lists/l1/members"), &[])
        .await
        .unwrap_err();

    assert_eq!(server.received_requests().await.unwrap().len(), 4);
    assert_eq!(sleeper.secs(), vec![5, 25, 125]);
    match err {
        AppError::Import(e) => {
            assert_eq!(
                e.cause,
                FailureCause::RemoteStatus {
                    code: 504,
                    reason: "Gateway Timeout".to_string()
                }
            );
            assert_eq!(e.api_key, "0123456789abcdef-us7");
            assert!(e.url.ends_with("/lists/l1/members"));
        }
        other => panic!("expected import error, got {:?}", other),
    }
}

#[tokio::test]
async fn non_retryable_status_fails_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = RecordingSleeper::new();
    let client = ApiClient::new(server.uri(), &key(), None, shared(&sleeper)).unwrap();
    let err = client
        .execute(&client.endpoint("lists/missing"), &[])
        .await
        .unwrap_err();

    assert!(sleeper.secs().is_empty());
    let report = err.report();
    assert_eq!(report.remote_error_code, Some(404));
    assert_eq!(report.remote_error_reason.as_deref(), Some("Not Found"));
}

#[tokio::test]
async fn transport_failures_are_retried_then_reported() {
    let sleeper = RecordingSleeper::new();
    // Nothing listens on port 1.
    let client = ApiClient::new("http://127.0.0.1:1", &key(), None, shared(&sleeper)).unwrap();
    let err = client
        .execute(&client.endpoint("lists/l1"), &[])
        .await
        .unwrap_err();

    assert_eq!(sleeper.secs(), vec![5, 25, 125]);
    let report = err.report();
    assert_eq!(report.remote_error_code, None);
    assert!(report.exception_type.is_some());
}

#[tokio::test]
async fn member_pages_are_requested_in_planned_chunks() {
    let server = MockServer::start().await;
    for (offset, count) in [("0", "5000"), ("5000", "5000"), ("10000", "20")] {
        Mock::given(method("GET"))
            .and(path("/lists/big/members"))
            .and(query_param("offset", offset))
            .and(query_param("count", count))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "members": [common::member(&format!("m{}", offset), "subscribed", 0.3)]
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let sleeper = RecordingSleeper::new();
    let client = ApiClient::new(server.uri(), &key(), None, shared(&sleeper)).unwrap();
    let pages = fetchers::fetch_member_pages(&client, "big", 10020, 4)
        .await
        .unwrap();

    assert_eq!(pages.len(), 3);
    let mut ids: Vec<String> = pages
        .iter()
        .flat_map(|p| p.members.iter().map(|m| m.id.clone()))
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["m0", "m10000", "m5000"]);
}

#[tokio::test]
async fn one_failed_chunk_fails_the_phase() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lists/big/members"))
        .and(query_param("offset", "5000"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lists/big/members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"members": []})))
        .mount(&server)
        .await;

    let sleeper = RecordingSleeper::new();
    let client = ApiClient::new(server.uri(), &key(), None, shared(&sleeper)).unwrap();
    let err = fetchers::fetch_member_pages(&client, "big", 12000, 2)
        .await
        .unwrap_err();

    assert_eq!(err.report().remote_error_code, Some(401));
}

#[tokio::test]
async fn unparseable_body_is_a_response_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let sleeper = RecordingSleeper::new();
    let client = ApiClient::new(server.uri(), &key(), None, shared(&sleeper)).unwrap();
    let err = fetchers::fetch_list_summary(&client, "l1").await.unwrap_err();
    assert!(matches!(err, AppError::ApiResponseInvalid { .. }));
}

#[tokio::test]
async fn custom_policy_bounds_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let sleeper = RecordingSleeper::new();
    let client = ApiClient::new(server.uri(), &key(), None, shared(&sleeper))
        .unwrap()
        .with_policy(RetryPolicy {
            max_retries: 1,
            backoff_base_secs: 2,
        });
    let err = client
        .execute(&client.endpoint("lists/l1"), &[])
        .await
        .unwrap_err();

    assert_eq!(sleeper.secs(), vec![2]);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    assert_eq!(err.report().remote_error_code, Some(429));
}

#[tokio::test]
async fn timed_out_attempts_are_retried_like_rate_limits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let sleeper = RecordingSleeper::new();
    let client = ApiClient::new(server.uri(), &key(), None, shared(&sleeper))
        .unwrap()
        .with_request_timeout(Duration::from_millis(100));
    let err = client
        .execute(&client.endpoint("lists/l1"), &[])
        .await
        .unwrap_err();

    assert_eq!(sleeper.secs(), vec![5, 25, 125]);
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
    let report = err.report();
    assert_eq!(report.exception_type.as_deref(), Some("TimeoutError"));
    assert_eq!(report.remote_error_code, None);
}

#[tokio::test]
async fn activity_requests_stay_under_cap_while_retrying() {
    let server = MockServer::start().await;
    let responder = ArrivalLog::new(4, Duration::from_millis(150), activity_body);
    Mock::given(method("GET"))
        .respond_with(responder.clone())
        .mount(&server)
        .await;

    let sleeper = PacedSleeper::new(Duration::from_millis(40));
    let client = ApiClient::new(server.uri(), &key(), None, shared(&sleeper)).unwrap();
    let ids: Vec<String> = (1..=6).map(|i| format!("m{}", i)).collect();
    let records = fetchers::fetch_subscriber_activity(
        &client,
        "l1",
        ids,
        config::MAX_ACTIVITY_CONNECTIONS,
        Utc::now(),
        365,
    )
    .await
    .unwrap();

    assert_eq!(records.len(), 6);
    assert_eq!(server.received_requests().await.unwrap().len(), 10);
    // The two first tries and the two second tries were rate limited; no
    // other task got a slot while they waited.
    let mut secs = sleeper.secs();
    secs.sort();
    assert_eq!(secs, vec![5, 5, 25, 25]);
    let peak = responder.peak_within(Duration::from_millis(120));
    assert!(peak <= config::MAX_ACTIVITY_CONNECTIONS, "{} in flight", peak);
}

#[tokio::test]
async fn member_chunks_stay_under_cap() {
    let server = MockServer::start().await;
    let responder = ArrivalLog::new(4, Duration::from_millis(150), empty_page);
    Mock::given(method("GET"))
        .and(path("/lists/big/members"))
        .respond_with(responder.clone())
        .mount(&server)
        .await;

    let sleeper = PacedSleeper::new(Duration::from_millis(40));
    let client = ApiClient::new(server.uri(), &key(), None, shared(&sleeper)).unwrap();
    let pages = fetchers::fetch_member_pages(&client, "big", 30_000, config::MAX_CONNECTIONS)
        .await
        .unwrap();

    assert_eq!(pages.len(), 6);
    assert_eq!(sleeper.secs(), vec![5, 5, 5, 5]);
    let peak = responder.peak_within(Duration::from_millis(120));
    assert!(peak >= 2, "chunks never overlapped");
    assert!(peak <= config::MAX_CONNECTIONS, "{} in flight", peak);
}
