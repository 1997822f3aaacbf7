// Library interface for testing

pub mod audio;
pub mod browse;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod db;
pub mod db_postgres;
pub mod local_blob;
pub mod model;
pub mod pages;
pub mod queries;
pub mod recognition;
pub mod schema;
pub mod serve;
pub mod services;
pub mod store;
pub mod submit;
pub mod supabase;

pub use model::{FeedbackFilter, FeedbackRecord, FeedbackType};
pub use services::Services;
