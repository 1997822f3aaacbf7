use sea_query::{Alias, ColumnDef, Index, PostgresQueryBuilder, SqliteQueryBuilder, Table, TableCreateStatement};

use crate::schema::Feedback;

fn feedback_table(table: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(table))
        .if_not_exists()
        .col(ColumnDef::new(Feedback::Id).string().primary_key())
        .col(ColumnDef::new(Feedback::Timestamp).string().not_null())
        .col(ColumnDef::new(Feedback::FeedbackType).string().not_null())
        .col(ColumnDef::new(Feedback::FeedbackText).string().null())
        .col(ColumnDef::new(Feedback::Room).string().null())
        .col(ColumnDef::new(Feedback::UserId).string().null())
        .col(ColumnDef::new(Feedback::AudioPath).string().not_null().unique_key())
        .col(ColumnDef::new(Feedback::AudioMime).string().not_null())
        .col(ColumnDef::new(Feedback::Source).string().not_null())
        .to_owned()
}

fn timestamp_index_name(table: &str) -> String {
    format!("idx_{}_timestamp", table)
}

/// CREATE TABLE IF NOT EXISTS {table} (
///     id TEXT PRIMARY KEY,
///     timestamp TEXT NOT NULL,
///     feedback_type TEXT NOT NULL,
///     feedback_text TEXT NULL,
///     room TEXT NULL,
///     user_id TEXT NULL,
///     audio_path TEXT NOT NULL UNIQUE,
///     audio_mime TEXT NOT NULL,
///     source TEXT NOT NULL
/// )
pub fn create_feedback_table(table: &str) -> String {
    feedback_table(table).to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_{table}_timestamp ON {table}(timestamp)
pub fn create_timestamp_index(table: &str) -> String {
    Index::create()
        .if_not_exists()
        .name(timestamp_index_name(table))
        .table(Alias::new(table))
        .col(Feedback::Timestamp)
        .to_string(SqliteQueryBuilder)
}

// ============================================================================
// PostgreSQL variants
// ============================================================================

/// CREATE TABLE IF NOT EXISTS {table} (...) - PostgreSQL
pub fn create_feedback_table_pg(table: &str) -> String {
    feedback_table(table).to_string(PostgresQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_{table}_timestamp ON {table}(timestamp) - PostgreSQL
pub fn create_timestamp_index_pg(table: &str) -> String {
    Index::create()
        .if_not_exists()
        .name(timestamp_index_name(table))
        .table(Alias::new(table))
        .col(Feedback::Timestamp)
        .to_string(PostgresQueryBuilder)
}
