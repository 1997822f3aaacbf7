use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::browse::{self, PlaybackUrl};
use crate::config::Config;
use crate::constants::MAX_UPLOAD_BYTES;
use crate::credentials::Credentials;
use crate::model::{non_empty, FeedbackFilter, FeedbackRecord, FeedbackType};
use crate::pages;
use crate::services::Services;
use crate::submit::{self, Draft, SubmitContext, SubmitError, SAVED_MESSAGE};

type SharedState = Arc<Services>;

/// Start the web server and block until it exits
pub fn serve(
    config: Config,
    credentials: Option<Credentials>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let port = port_override.unwrap_or(config.port);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let services = Services::from_config(&config, &credentials)
            .await
            .map_err(|e| format!("Failed to initialise services: {}", e))?;

        println!("Listening on: http://[::]:{} (IPv4 + IPv6)", port);
        println!("Endpoints:");
        println!("  GET  /  - Record voice feedback");
        println!("  GET  /playback?room=<q>&feedback_type=<t>  - Browse and play recordings");
        println!("  POST /api/transcribe  - Encode and transcribe a recording");
        println!("  POST /api/feedback  - Save a recording and its metadata");
        println!("  GET  /api/feedback?room=<q>&feedback_type=<t>&limit=<n>  - List records");
        println!("  GET  /api/playback-url?path=<key>  - Signed playback URL");
        if services.local_blobs.is_some() {
            println!("  GET  /blobs/<key>?expires=<unix>&token=<hex>  - Local audio files");
        }
        println!("  GET  /health  - Health check");

        let app = router(Arc::new(services));

        let listener = tokio::net::TcpListener::bind(format!("[::]:{}", port))
            .await
            .map_err(|e| format!("Failed to bind to port {}: {}", port, e))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| format!("Server error: {}", e))?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

pub fn router(services: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/playback", get(playback_page_handler))
        .route("/health", get(health_handler))
        .route("/api/transcribe", post(transcribe_handler))
        .route("/api/feedback", post(save_handler).get(list_handler))
        .route("/api/playback-url", get(playback_url_handler))
        .route("/blobs/{*key}", get(blob_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(services)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn index_handler() -> impl IntoResponse {
    Html(pages::capture_page())
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub room: Option<String>,
    pub feedback_type: Option<String>,
    pub limit: Option<u64>,
}

impl ListQuery {
    /// Empty type means all types; anything else must be an exact wire name
    fn to_filter(&self) -> Result<FeedbackFilter, String> {
        let feedback_type = match non_empty(self.feedback_type.clone()) {
            Some(t) => Some(t.parse::<FeedbackType>()?),
            None => None,
        };
        Ok(FeedbackFilter::new(self.room.clone(), feedback_type, self.limit))
    }
}

async fn playback_page_handler(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let filter = match query.to_filter() {
        Ok(f) => f,
        Err(e) => return (StatusCode::BAD_REQUEST, Html(pages::error_page(&e))).into_response(),
    };
    match browse::list(state.metadata_store.as_ref(), &filter).await {
        Ok(records) => Html(pages::playback_page(&filter, &records)).into_response(),
        Err(e) => {
            error!("Failed to query feedback records: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Html(pages::error_page(&format!("Failed to load recordings: {}", e))),
            )
                .into_response()
        }
    }
}

async fn list_handler(
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Response {
    let filter = match query.to_filter() {
        Ok(f) => f,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    match browse::list(state.metadata_store.as_ref(), &filter).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            error!("Failed to query feedback records: {}", e);
            error_response(StatusCode::BAD_GATEWAY, format!("Failed to load recordings: {}", e))
        }
    }
}

#[derive(Deserialize)]
struct PlaybackUrlQuery {
    path: String,
}

#[derive(Serialize)]
struct PlaybackUrlResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

async fn playback_url_handler(
    State(state): State<SharedState>,
    Query(query): Query<PlaybackUrlQuery>,
) -> impl IntoResponse {
    let response = match browse::playback_url(
        state.blob_store.as_ref(),
        &query.path,
        state.signed_url_ttl_secs,
    )
    .await
    {
        PlaybackUrl::Ready(url) => PlaybackUrlResponse {
            url: Some(url),
            warning: None,
        },
        PlaybackUrl::Unavailable(warning) => PlaybackUrlResponse {
            url: None,
            warning: Some(warning),
        },
    };
    Json(response)
}

/// Multipart fields by name. Repeated names keep the last value.
async fn read_form(mut multipart: Multipart) -> Result<HashMap<String, Vec<u8>>, Response> {
    let mut fields = HashMap::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid form data: {}", e),
                ))
            }
        };
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(|e| {
            error_response(StatusCode::BAD_REQUEST, format!("Invalid form data: {}", e))
        })?;
        fields.insert(name, bytes.to_vec());
    }
    Ok(fields)
}

fn text_field(fields: &HashMap<String, Vec<u8>>, name: &str) -> Option<String> {
    fields
        .get(name)
        .map(|v| String::from_utf8_lossy(v).into_owned())
}

fn draft_from_form(fields: &HashMap<String, Vec<u8>>) -> Result<Draft, Response> {
    let audio = fields.get("audio").map(Vec::as_slice).unwrap_or_default();
    Draft::from_upload(audio).map_err(|e| match e {
        SubmitError::NoRecording => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        SubmitError::Audio(_) => {
            warn!("Rejected undecodable upload: {}", e);
            error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
    })
}

#[derive(Serialize)]
struct TranscribeResponse {
    duration_secs: f64,
    duration_display: String,
    status: &'static str,
    message: String,
    transcript: Option<String>,
}

async fn transcribe_handler(State(state): State<SharedState>, multipart: Multipart) -> Response {
    let fields = match read_form(multipart).await {
        Ok(fields) => fields,
        Err(response) => return response,
    };
    let draft = match draft_from_form(&fields) {
        Ok(draft) => draft,
        Err(response) => return response,
    };

    let outcome = submit::transcribe(state.recognizer.as_ref(), draft.audio()).await;
    Json(TranscribeResponse {
        duration_secs: draft.audio().duration_secs(),
        duration_display: draft.audio().duration_display(),
        status: outcome.status(),
        message: outcome.message(),
        transcript: outcome.transcript().map(str::to_string),
    })
    .into_response()
}

#[derive(Serialize)]
struct SaveResponse {
    message: &'static str,
    record: FeedbackRecord,
}

async fn save_handler(State(state): State<SharedState>, multipart: Multipart) -> Response {
    let fields = match read_form(multipart).await {
        Ok(fields) => fields,
        Err(response) => return response,
    };
    let draft = match draft_from_form(&fields) {
        Ok(draft) => draft,
        Err(response) => return response,
    };

    let feedback_type = match non_empty(text_field(&fields, "feedback_type")) {
        Some(t) => match t.parse::<FeedbackType>() {
            Ok(t) => t,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        },
        None => return error_response(StatusCode::BAD_REQUEST, "feedback_type is required"),
    };

    let context = SubmitContext {
        feedback_type,
        room: text_field(&fields, "room"),
        user_id: text_field(&fields, "user_id"),
        transcript: text_field(&fields, "transcript"),
    };

    match submit::save(&state, &draft, context).await {
        Ok(record) => (
            StatusCode::CREATED,
            Json(SaveResponse {
                message: SAVED_MESSAGE,
                record,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("{}", e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

#[derive(Deserialize)]
struct BlobQuery {
    expires: i64,
    token: String,
}

fn content_type_for(key: &str) -> &'static str {
    if key.ends_with(".wav") {
        "audio/wav"
    } else {
        "application/octet-stream"
    }
}

async fn blob_handler(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Query(query): Query<BlobQuery>,
) -> Response {
    let Some(store) = state.local_blobs.as_ref() else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };
    if !store.verify(&key, query.expires, &query.token, Utc::now().timestamp()) {
        return (StatusCode::FORBIDDEN, "Invalid or expired signature").into_response();
    }
    match store.read(&key).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type_for(&key)),
                (header::CACHE_CONTROL, "private, max-age=3600"),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to read blob {}: {}", key, e);
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
    }
}
