//! SQLite metadata backend

use async_trait::async_trait;
use log::debug;
use sea_query::{Value, Values};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use crate::model::{parse_timestamp, FeedbackFilter, FeedbackRecord, FeedbackType};
use crate::queries::{ddl, feedback};
use crate::store::{MetadataStore, Result, StoreError};

/// Open a file-based database connection pool, creating the file if needed.
/// Enables WAL mode.
pub async fn open_database_connection(db_path: &Path) -> std::result::Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}

/// Create a database in a fresh temporary directory for tests.
/// Keep the returned guard alive for as long as the pool is used.
pub async fn create_test_connection_in_temporary_file(
) -> std::result::Result<(SqlitePool, tempfile::TempDir), sqlx::Error> {
    let dir = tempfile::tempdir()?;
    let pool = open_database_connection(&dir.path().join("test.sqlite")).await?;
    Ok((pool, dir))
}

/// Create the feedback table and its timestamp index
pub async fn init_database_schema(pool: &SqlitePool, table: &str) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(&ddl::create_feedback_table(table))
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_timestamp_index(table))
        .execute(pool)
        .await?;
    Ok(())
}

/// Attach sea-query bind values to an sqlx query.
/// Only the value kinds the feedback queries produce are supported.
pub(crate) fn bind_values<'q, DB>(
    mut query: sqlx::query::Query<'q, DB, <DB as sqlx::Database>::Arguments<'q>>,
    values: Values,
) -> Result<sqlx::query::Query<'q, DB, <DB as sqlx::Database>::Arguments<'q>>>
where
    DB: sqlx::Database,
    Option<String>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    Option<i64>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
{
    for value in values.0 {
        query = match value {
            Value::String(s) => query.bind(s.map(|s| *s)),
            Value::BigInt(i) => query.bind(i),
            Value::Int(i) => query.bind(i.map(i64::from)),
            Value::BigUnsigned(u) => query.bind(u.map(|u| u as i64)),
            Value::Unsigned(u) => query.bind(u.map(i64::from)),
            other => {
                return Err(StoreError::Decode(format!(
                    "Unsupported bind value: {:?}",
                    other
                )))
            }
        };
    }
    Ok(query)
}

/// Map a stored row back to a record. Shared by the SQLite and PostgreSQL
/// backends through the column names.
pub(crate) fn record_from_parts(
    id: String,
    timestamp: String,
    feedback_type: String,
    feedback_text: Option<String>,
    room: Option<String>,
    user_id: Option<String>,
    audio_path: String,
    audio_mime: String,
    source: String,
) -> Result<FeedbackRecord> {
    Ok(FeedbackRecord {
        id: Uuid::from_str(&id)
            .map_err(|e| StoreError::Decode(format!("Invalid id '{}': {}", id, e)))?,
        timestamp: parse_timestamp(&timestamp)
            .map_err(|e| StoreError::Decode(format!("Invalid timestamp '{}': {}", timestamp, e)))?,
        feedback_type: FeedbackType::from_str(&feedback_type).map_err(StoreError::Decode)?,
        feedback_text,
        room,
        user_id,
        audio_path,
        audio_mime,
        source,
    })
}

fn record_from_row(row: &SqliteRow) -> Result<FeedbackRecord> {
    record_from_parts(
        row.try_get("id")?,
        row.try_get("timestamp")?,
        row.try_get("feedback_type")?,
        row.try_get("feedback_text")?,
        row.try_get("room")?,
        row.try_get("user_id")?,
        row.try_get("audio_path")?,
        row.try_get("audio_mime")?,
        row.try_get("source")?,
    )
}

/// Metadata store backed by a local SQLite file
pub struct SqliteMetadataStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Open (or create) the database file and make sure the schema exists
    pub async fn open(db_path: &Path, table: &str) -> Result<Self> {
        let pool = open_database_connection(db_path).await?;
        init_database_schema(&pool, table).await?;
        Ok(Self::new(pool, table))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&feedback::count(&self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert(&self, record: &FeedbackRecord) -> Result<()> {
        let (sql, values) = feedback::insert(&self.table, record);
        bind_values(sqlx::query(&sql), values)?
            .execute(&self.pool)
            .await?;
        debug!("Inserted feedback row {} into {}", record.id, self.table);
        Ok(())
    }

    async fn select(&self, filter: &FeedbackFilter) -> Result<Vec<FeedbackRecord>> {
        let (sql, values) = feedback::select_filtered(&self.table, filter);
        let rows = bind_values(sqlx::query(&sql), values)?
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }
}
