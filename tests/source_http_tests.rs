//! Upstream client tests against a loopback tag-index server.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use booru_tags::{GelbooruClient, RetryPolicy, SourceError, TagSource};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted upstream: attempt `n` gets the `n`-th response, the last one
/// repeating. Records attempt count and the decoded `names` parameter.
struct ServerState {
    responses: Vec<(u16, Value)>,
    attempts: AtomicUsize,
    last_names: Mutex<String>,
}

async fn tag_index(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let attempt = state.attempts.fetch_add(1, Ordering::SeqCst);
    if let Some(names) = params.get("names") {
        *state.last_names.lock().unwrap() = names.clone();
    }
    let (status, body) = &state.responses[attempt.min(state.responses.len() - 1)];
    (
        StatusCode::from_u16(*status).unwrap(),
        Json(body.clone()),
    )
}

async fn spawn_upstream(responses: Vec<(u16, Value)>) -> (Arc<ServerState>, String) {
    let state = Arc::new(ServerState {
        responses,
        attempts: AtomicUsize::new(0),
        last_names: Mutex::new(String::new()),
    });
    let app = Router::new()
        .route("/index.php", get(tag_index))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let base_url = format!("http://{addr}/index.php?page=dapi&s=tag&q=index&json=1");
    (state, base_url)
}

fn client(base_url: &str, max_attempts: u32) -> GelbooruClient {
    GelbooruClient::with_config(
        base_url,
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        },
        Duration::from_secs(5),
    )
    .unwrap()
}

fn tokens(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_accepts_first_valid_response() {
    let (state, base_url) = spawn_upstream(vec![(
        200,
        json!({
            "@attributes": {"limit": 100, "offset": 0, "count": 2},
            "tag": [
                {"id": 152532, "name": "1girl", "count": 6177827, "type": 0, "ambiguous": 0},
                {"id": 138893, "name": "1boy", "count": 1481404, "type": 0, "ambiguous": 0}
            ]
        }),
    )])
    .await;

    let records = client(&base_url, 10)
        .fetch_bulk(&tokens(&["1girl", "1boy"]))
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "1girl");
    assert_eq!(state.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(*state.last_names.lock().unwrap(), "1girl 1boy");
}

#[tokio::test]
async fn test_query_remaps_apostrophe_to_named_entity() {
    let (state, base_url) = spawn_upstream(vec![(
        200,
        json!({"tag": [{"id": 3, "name": "ninomae_ina'nis", "count": 1, "type": 4, "ambiguous": 0}]}),
    )])
    .await;

    client(&base_url, 10)
        .fetch_bulk(&tokens(&["ninomae_ina'nis"]))
        .await
        .unwrap();
    assert_eq!(
        *state.last_names.lock().unwrap(),
        "ninomae_ina&#039;nis"
    );
}

#[tokio::test]
async fn test_missing_result_list_is_retried() {
    let (state, base_url) = spawn_upstream(vec![
        (200, json!({"@attributes": {"limit": 100, "offset": 0, "count": 0}})),
        (200, json!({"tag": [{"id": 7, "name": "solo", "count": 9, "type": 0, "ambiguous": 0}]})),
    ])
    .await;

    let records = client(&base_url, 5)
        .fetch_bulk(&tokens(&["solo"]))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(state.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let (state, base_url) = spawn_upstream(vec![
        (503, json!({"error": "overloaded"})),
        (200, json!({"tag": [{"id": 7, "name": "solo", "count": 9, "type": 0, "ambiguous": 0}]})),
    ])
    .await;

    let records = client(&base_url, 5)
        .fetch_bulk(&tokens(&["solo"]))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(state.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retry_bound_is_exhausted() {
    let (state, base_url) = spawn_upstream(vec![(
        200,
        json!({"@attributes": {"limit": 100, "offset": 0, "count": 0}}),
    )])
    .await;

    let err = client(&base_url, 3)
        .fetch_bulk(&tokens(&["unknown"]))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Exhausted { attempts: 3 }));
    assert_eq!(state.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_partial_response_stops_the_loop() {
    // one of two requested tokens comes back; the response is still
    // accepted on the first attempt, with no focused re-request
    let (state, base_url) = spawn_upstream(vec![(
        200,
        json!({"tag": [{"id": 1, "name": "1girl", "count": 5, "type": 0, "ambiguous": 0}]}),
    )])
    .await;

    let records = client(&base_url, 10)
        .fetch_bulk(&tokens(&["1girl", "obscure_tag"]))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(state.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_token_list_makes_no_request() {
    let (state, base_url) = spawn_upstream(vec![(200, json!({"tag": []}))]).await;
    let records = client(&base_url, 10).fetch_bulk(&[]).await.unwrap();
    assert!(records.is_empty());
    assert_eq!(state.attempts.load(Ordering::SeqCst), 0);
}
