//! PostgreSQL metadata backend
//!
//! Mirrors db.rs but against a PgPool. The schema matches what a Supabase
//! project would hold, so the same table can be reached directly over SQL.

use async_trait::async_trait;
use log::debug;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::str::FromStr;

use crate::db::{bind_values, record_from_parts};
use crate::model::{FeedbackFilter, FeedbackRecord};
use crate::queries::{ddl, feedback};
use crate::store::{MetadataStore, Result, StoreError};

type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Build a full PostgreSQL connection URL with password and database
///
/// Takes a base URL like `postgres://user@host:5432` and inserts the password
/// and appends the database name.
pub fn build_postgres_url(base_url: &str, password: &str, database: &str) -> std::result::Result<String, DynError> {
    let url = url::Url::parse(base_url)?;

    let user = url.username();
    let host = url.host_str().ok_or("Missing host in postgres_url")?;
    let port = url.port().unwrap_or(5432);

    let full_url = format!(
        "postgres://{}:{}@{}:{}/{}",
        user,
        urlencoding::encode(password),
        host,
        port,
        database
    );

    Ok(full_url)
}

/// Open a PostgreSQL connection pool
pub async fn open_postgres_connection(
    base_url: &str,
    password: &str,
    database: &str,
) -> std::result::Result<PgPool, DynError> {
    let full_url = build_postgres_url(base_url, password, database)?;

    let options = PgConnectOptions::from_str(&full_url)?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Initialize the feedback table for PostgreSQL
pub async fn init_database_schema_pg(pool: &PgPool, table: &str) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(&ddl::create_feedback_table_pg(table))
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_timestamp_index_pg(table))
        .execute(pool)
        .await?;
    Ok(())
}

fn record_from_row(row: &PgRow) -> Result<FeedbackRecord> {
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

/// Metadata store backed by a PostgreSQL table
pub struct PgMetadataStore {
    pool: PgPool,
    table: String,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Connect and make sure the schema exists
    pub async fn connect(
        base_url: &str,
        password: &str,
        database: &str,
        table: &str,
    ) -> std::result::Result<Self, DynError> {
        let pool = open_postgres_connection(base_url, password, database).await?;
        init_database_schema_pg(&pool, table).await?;
        Ok(Self::new(pool, table))
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, record: &FeedbackRecord) -> Result<()> {
        let (sql, values) = feedback::insert_pg(&self.table, record);
        bind_values(sqlx::query(&sql), values)?
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        debug!("Inserted feedback row {} into {}", record.id, self.table);
        Ok(())
    }

    async fn select(&self, filter: &FeedbackFilter) -> Result<Vec<FeedbackRecord>> {
        let (sql, values) = feedback::select_filtered_pg(&self.table, filter);
        let rows = bind_values(sqlx::query(&sql), values)?
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }
}
