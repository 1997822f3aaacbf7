//! # Supabase Client Tests
//!
//! These tests point the Supabase client at a fake Storage + PostgREST
//! server and check the requests it sends and how it reads the replies.
//!
//! ## Running the Tests
//!
//! ```bash
//! cargo test --test supabase_test
//! ```

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use voice_feedback::store::{BlobStore, MetadataStore, StoreError};
use voice_feedback::supabase::SupabaseClient;
use voice_feedback::{FeedbackFilter, FeedbackRecord, FeedbackType};

const KEY: &str = "service-role-key";

#[derive(Default)]
struct FakeSupabase {
    uploads: Vec<(String, String, Vec<u8>)>,
    rows: Vec<serde_json::Value>,
    queries: Vec<HashMap<String, String>>,
}

type FakeState = Arc<Mutex<FakeSupabase>>;

fn authorized(headers: &HeaderMap) -> bool {
    let bearer = format!("Bearer {}", KEY);
    headers.get("apikey").map(|v| v == KEY).unwrap_or(false)
        && headers
            .get("authorization")
            .map(|v| v == bearer.as_str())
            .unwrap_or(false)
}

async fn upload_handler(
    State(state): State<FakeState>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state
        .lock()
        .unwrap()
        .uploads
        .push((format!("{}/{}", bucket, key), content_type, body.to_vec()));
    Json(serde_json::json!({ "Key": format!("{}/{}", bucket, key) })).into_response()
}

async fn sign_handler(
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    if key.ends_with("missing.wav") {
        return (StatusCode::BAD_REQUEST, r#"{"error":"not_found"}"#).into_response();
    }
    if key.ends_with("blank.wav") {
        return Json(serde_json::json!({ "signedURL": "" })).into_response();
    }
    let expires = body["expiresIn"].as_u64().unwrap_or_default();
    Json(serde_json::json!({
        "signedURL": format!("/object/sign/{}/{}?token=tok&ttl={}", bucket, key, expires)
    }))
    .into_response()
}

async fn insert_handler(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(row): Json<serde_json::Value>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    state.lock().unwrap().rows.push(row);
    StatusCode::CREATED
}

async fn select_handler(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, r#"{"message":"Invalid API key"}"#).into_response();
    }
    let mut state = state.lock().unwrap();
    state.queries.push(params);
    // Newest first, like the real `order=timestamp.desc`
    let mut rows = state.rows.clone();
    rows.reverse();
    Json(rows).into_response()
}

async fn start_fake_supabase() -> (String, FakeState, tokio::task::JoinHandle<()>) {
    let state: FakeState = Arc::new(Mutex::new(FakeSupabase::default()));

    let app = Router::new()
        .route("/storage/v1/object/sign/{bucket}/{*key}", post(sign_handler))
        .route("/storage/v1/object/{bucket}/{*key}", post(upload_handler))
        .route("/rest/v1/feedback", post(insert_handler).get(select_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = format!("http://{}", addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    (url, state, handle)
}

fn client(url: &str, key: &str) -> SupabaseClient {
    SupabaseClient::new(reqwest::Client::new(), url, key, "voice-recordings", "feedback")
}

fn record(room: &str, feedback_type: FeedbackType) -> FeedbackRecord {
    FeedbackRecord::new(
        chrono::Utc::now(),
        feedback_type,
        Some("too warm".to_string()),
        Some(room.to_string()),
        None,
        format!("voice/20240501_080000_{}.wav", uuid::Uuid::new_v4().simple()),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_upload_sends_bytes_to_bucket_path() {
    let (url, state, _handle) = start_fake_supabase().await;
    let supabase = client(&url, KEY);

    supabase
        .upload("voice/20240501_080000_abc.wav", b"RIFF1234".to_vec(), "audio/wav")
        .await
        .unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.uploads.len(), 1);
    let (path, content_type, body) = &state.uploads[0];
    assert_eq!(path, "voice-recordings/voice/20240501_080000_abc.wav");
    assert_eq!(content_type, "audio/wav");
    assert_eq!(body, b"RIFF1234");
}

#[tokio::test]
async fn test_signed_url_is_made_absolute() {
    let (url, _state, _handle) = start_fake_supabase().await;
    let supabase = client(&url, KEY);

    let signed = supabase
        .create_signed_url("voice/a.wav", 3600)
        .await
        .unwrap();
    assert_eq!(
        signed,
        format!(
            "{}/storage/v1/object/sign/voice-recordings/voice/a.wav?token=tok&ttl=3600",
            url
        )
    );
}

#[tokio::test]
async fn test_signed_url_problems() {
    let (url, _state, _handle) = start_fake_supabase().await;
    let supabase = client(&url, KEY);

    let blank = supabase.create_signed_url("voice/blank.wav", 60).await.unwrap();
    assert_eq!(blank, "");

    match supabase.create_signed_url("voice/missing.wav", 60).await {
        Err(StoreError::Status { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("not_found"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_insert_then_select_round_trip() {
    let (url, state, _handle) = start_fake_supabase().await;
    let supabase = client(&url, KEY);

    let first = record("ARC_1119", FeedbackType::Thermal);
    let second = record("B2_Lab", FeedbackType::Iaq);
    supabase.insert(&first).await.unwrap();
    supabase.insert(&second).await.unwrap();

    {
        let state = state.lock().unwrap();
        assert_eq!(state.rows[1]["feedback_type"], "IAQ");
        assert_eq!(state.rows[1]["user_id"], serde_json::Value::Null);
        assert_eq!(state.rows[1]["source"], "voice-feedback-web");
    }

    let records = supabase.select(&FeedbackFilter::default()).await.unwrap();
    assert_eq!(records, vec![second, first]);
}

#[tokio::test]
async fn test_select_sends_filters_as_postgrest_params() {
    let (url, state, _handle) = start_fake_supabase().await;
    let supabase = client(&url, KEY);

    let filter = FeedbackFilter::new(Some("arc".to_string()), Some(FeedbackType::Acoustic), None);
    supabase.select(&filter).await.unwrap();

    let state = state.lock().unwrap();
    let params = &state.queries[0];
    assert_eq!(params["select"], "*");
    assert_eq!(params["order"], "timestamp.desc,id.desc");
    assert_eq!(params["room"], "ilike.*arc*");
    assert_eq!(params["feedback_type"], "eq.acoustic");
    assert_eq!(params["limit"], "50");
}

#[tokio::test]
async fn test_rejected_key_surfaces_status() {
    let (url, _state, _handle) = start_fake_supabase().await;
    let supabase = client(&url, "wrong");

    match supabase.select(&FeedbackFilter::default()).await {
        Err(StoreError::Status { status, body }) => {
            assert_eq!(status, 401);
            assert!(body.contains("Invalid API key"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
    assert!(supabase.insert(&record("ARC_1119", FeedbackType::Other)).await.is_err());
}
