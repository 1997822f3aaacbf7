//! SQL text for the feedback table, built with sea-query.
//!
//! Each statement has a SQLite variant and a `_pg` PostgreSQL variant.

pub mod ddl;
pub mod feedback;
