//! Supabase over REST: Storage for blobs, PostgREST for the feedback table.

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use crate::model::FeedbackFilter;
use crate::model::FeedbackRecord;
use crate::store::{BlobStore, MetadataStore, Result, StoreError};

#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
    bucket: String,
    table: String,
}

/// Response of `POST /storage/v1/object/sign/{bucket}/{key}`.
/// Older servers answer `signedURL`, newer ones `signedUrl`.
#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url_upper: Option<String>,
    #[serde(rename = "signedUrl")]
    signed_url_camel: Option<String>,
}

impl SupabaseClient {
    pub fn new(http: reqwest::Client, base_url: &str, key: &str, bucket: &str, table: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            bucket: bucket.to_string(),
            table: table.to_string(),
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
    }

    fn object_url(&self, action: &str, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}{}/{}",
            self.base_url,
            action,
            urlencoding::encode(&self.bucket),
            encode_key(key)
        )
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, urlencoding::encode(&self.table))
    }

    /// Signed paths come back relative to `/storage/v1`
    fn absolute_signed_url(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            signed.to_string()
        } else if signed.starts_with('/') {
            format!("{}/storage/v1{}", self.base_url, signed)
        } else {
            format!("{}/storage/v1/{}", self.base_url, signed)
        }
    }
}

/// Percent-encode each path segment of a key, keeping the separators
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// PostgREST pattern for a case-insensitive substring.
/// `%`, `_` and `\` in the needle are escaped with a backslash; `*` cannot be
/// escaped because PostgREST rewrites every `*` to `%`.
fn ilike_contains(room: &str) -> String {
    let mut pattern = String::from("*");
    for c in room.chars() {
        if c == '%' || c == '_' || c == '\\' {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

/// Query string pairs for a filtered select
pub fn postgrest_select_params(filter: &FeedbackFilter) -> Vec<(String, String)> {
    let mut params = vec![
        ("select".to_string(), "*".to_string()),
        ("order".to_string(), "timestamp.desc,id.desc".to_string()),
    ];
    if let Some(room) = filter.room.as_deref() {
        params.push(("room".to_string(), format!("ilike.{}", ilike_contains(room))));
    }
    if let Some(feedback_type) = filter.feedback_type {
        params.push(("feedback_type".to_string(), format!("eq.{}", feedback_type)));
    }
    params.push(("limit".to_string(), filter.limit.to_string()));
    params
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl BlobStore for SupabaseClient {
    fn name(&self) -> &'static str {
        "supabase-storage"
    }

    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let size = bytes.len();
        let response = self
            .authorized(self.http.post(self.object_url("", key)))
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        check_status(response).await?;
        debug!("Uploaded {} bytes to {}/{}", size, self.bucket, key);
        Ok(())
    }

    async fn create_signed_url(&self, key: &str, ttl_secs: u64) -> Result<String> {
        let response = self
            .authorized(self.http.post(self.object_url("sign/", key)))
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await?;
        let signed: SignedUrlResponse = check_status(response).await?.json().await?;
        Ok(signed
            .signed_url_upper
            .or(signed.signed_url_camel)
            .filter(|s| !s.is_empty())
            .map(|s| self.absolute_signed_url(&s))
            .unwrap_or_default())
    }
}

#[async_trait]
impl MetadataStore for SupabaseClient {
    fn name(&self) -> &'static str {
        "supabase-postgrest"
    }

    async fn insert(&self, record: &FeedbackRecord) -> Result<()> {
        let response = self
            .authorized(self.http.post(self.table_url()))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        check_status(response).await?;
        debug!("Inserted feedback row {} into {}", record.id, self.table);
        Ok(())
    }

    async fn select(&self, filter: &FeedbackFilter) -> Result<Vec<FeedbackRecord>> {
        let response = self
            .authorized(self.http.get(self.table_url()))
            .query(&postgrest_select_params(filter))
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }
}
