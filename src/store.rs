//! Collaborator interfaces for the two external stores.
//!
//! The Blob Store holds the audio clips and hands out signed URLs;
//! the Metadata Store holds one [`FeedbackRecord`] per clip. Both are
//! trait objects so the server can run against Supabase, a SQL database,
//! or a local directory without the flows knowing which.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;

use crate::model::{FeedbackFilter, FeedbackRecord};

/// Errors raised by blob or metadata backends
#[derive(Debug)]
pub enum StoreError {
    /// Transport failure talking to a remote store
    Http(reqwest::Error),
    /// Remote store answered with a non-success status
    Status { status: u16, body: String },
    /// SQL backend error
    Database(sqlx::Error),
    /// Local filesystem error
    Io(std::io::Error),
    /// Blob key rejected by the backend
    InvalidKey(String),
    /// Stored data could not be mapped back to a record
    Decode(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Http(err) => write!(f, "HTTP error: {}", err),
            StoreError::Status { status, body } => {
                write!(f, "Store returned status {}: {}", status, body)
            }
            StoreError::Database(err) => write!(f, "Database error: {}", err),
            StoreError::Io(err) => write!(f, "I/O error: {}", err),
            StoreError::InvalidKey(key) => write!(f, "Invalid blob key '{}'", key),
            StoreError::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl StdError for StoreError {}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Http(err)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Key-addressed binary storage with signed, time-limited read URLs
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Write `bytes` at `key`. Always an upsert: an existing object is replaced.
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Issue a URL granting read access to `key` for `ttl_secs` seconds.
    /// An empty string means the backend answered but gave no usable URL.
    async fn create_signed_url(&self, key: &str, ttl_secs: u64) -> Result<String>;
}

/// Single-table datastore of feedback records
#[async_trait]
pub trait MetadataStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn insert(&self, record: &FeedbackRecord) -> Result<()>;

    /// Records matching `filter`, newest first, at most `filter.limit`
    async fn select(&self, filter: &FeedbackFilter) -> Result<Vec<FeedbackRecord>>;
}
