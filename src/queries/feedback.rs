use sea_query::{
    Alias, Expr, Func, InsertStatement, LikeExpr, Order, PostgresQueryBuilder, Query,
    SelectStatement, SqliteQueryBuilder, Values,
};

use crate::model::{format_timestamp, FeedbackFilter, FeedbackRecord};
use crate::schema::{Feedback, ALL_COLUMNS};

/// Escape character for LIKE patterns; must not be backslash, which SQLite
/// and PostgreSQL treat differently in literals
const LIKE_ESCAPE: char = '!';

/// `%needle%` with LIKE wildcards in the needle matched literally, lower-cased
/// so it can be compared against `LOWER(room)`
pub fn room_contains_pattern(room: &str) -> String {
    let mut pattern = String::with_capacity(room.len() + 2);
    pattern.push('%');
    for c in room.to_lowercase().chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn insert_statement(table: &str, record: &FeedbackRecord) -> InsertStatement {
    Query::insert()
        .into_table(Alias::new(table))
        .columns(ALL_COLUMNS)
        .values_panic([
            record.id.to_string().into(),
            format_timestamp(&record.timestamp).into(),
            record.feedback_type.as_str().into(),
            record.feedback_text.clone().into(),
            record.room.clone().into(),
            record.user_id.clone().into(),
            record.audio_path.clone().into(),
            record.audio_mime.clone().into(),
            record.source.clone().into(),
        ])
        .to_owned()
}

fn select_statement(table: &str, filter: &FeedbackFilter) -> SelectStatement {
    let mut query = Query::select();
    query
        .columns(ALL_COLUMNS)
        .from(Alias::new(table))
        .order_by(Feedback::Timestamp, Order::Desc)
        .order_by(Feedback::Id, Order::Desc)
        .limit(filter.limit);

    if let Some(room) = filter.room.as_deref() {
        query.and_where(
            Expr::expr(Func::lower(Expr::col(Feedback::Room)))
                .like(LikeExpr::new(room_contains_pattern(room)).escape(LIKE_ESCAPE)),
        );
    }
    if let Some(feedback_type) = filter.feedback_type {
        query.and_where(Expr::col(Feedback::FeedbackType).eq(feedback_type.as_str()));
    }
    query
}

/// INSERT INTO {table} (id, timestamp, ...) VALUES (?, ?, ...)
///
/// Row values carry user text, so they are returned as bind parameters
/// instead of being inlined.
pub fn insert(table: &str, record: &FeedbackRecord) -> (String, Values) {
    insert_statement(table, record).build(SqliteQueryBuilder)
}

/// SELECT ... FROM {table} WHERE LOWER(room) LIKE ? AND feedback_type = ?
/// ORDER BY timestamp DESC, id DESC LIMIT ?
pub fn select_filtered(table: &str, filter: &FeedbackFilter) -> (String, Values) {
    select_statement(table, filter).build(SqliteQueryBuilder)
}

/// SELECT COUNT(*) FROM {table}
pub fn count(table: &str) -> String {
    Query::select()
        .expr(Func::count(Expr::col(Feedback::Id)))
        .from(Alias::new(table))
        .to_string(SqliteQueryBuilder)
}

// ============================================================================
// PostgreSQL variants
// ============================================================================

/// INSERT INTO {table} (id, timestamp, ...) VALUES ($1, $2, ...) - PostgreSQL
pub fn insert_pg(table: &str, record: &FeedbackRecord) -> (String, Values) {
    insert_statement(table, record).build(PostgresQueryBuilder)
}

/// Filtered, ordered, limited select - PostgreSQL
pub fn select_filtered_pg(table: &str, filter: &FeedbackFilter) -> (String, Values) {
    select_statement(table, filter).build(PostgresQueryBuilder)
}
