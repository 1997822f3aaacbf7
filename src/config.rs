use serde::Deserialize;
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_BUCKET, DEFAULT_PORT, DEFAULT_SIGNED_URL_TTL_SECS, DEFAULT_TABLE};

#[derive(Debug)]
pub enum ConfigError {
    Read(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(path, err) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), err)
            }
            ConfigError::Parse(path, err) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), err)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    /// Supabase Storage bucket
    Supabase,
    /// Directory on this machine, served back through `/blobs`
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    /// Supabase table through PostgREST
    Supabase,
    /// Local SQLite file
    Sqlite,
    /// PostgreSQL database
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionBackend {
    /// Google Web Speech API
    Google,
    /// OpenAI-compatible transcription server
    Whisper,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_ttl() -> u64 {
    DEFAULT_SIGNED_URL_TTL_SECS
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_whisper_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_whisper_model() -> String {
    crate::recognition::DEFAULT_WHISPER_MODEL.to_string()
}

/// Server configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port to listen on (default: 8501)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL browsers use to reach this server; prefixes local signed URLs
    pub public_base_url: Option<String>,
    /// Validity of playback URLs in seconds (default: 3600)
    #[serde(default = "default_ttl")]
    pub signed_url_ttl_secs: u64,
    pub blob_store: BlobStoreConfig,
    pub metadata_store: MetadataStoreConfig,
    /// Required when either store uses the supabase backend
    pub supabase: Option<SupabaseConfig>,
    pub recognition: RecognitionConfig,
}

/// Blob store configuration (maps to [blob_store] section in TOML)
#[derive(Debug, Clone, Deserialize)]
pub struct BlobStoreConfig {
    pub backend: BlobBackend,
    /// Bucket name (default: voice-recordings)
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Root directory for the local backend
    pub root_dir: Option<PathBuf>,
}

/// Metadata store configuration (maps to [metadata_store] section in TOML)
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataStoreConfig {
    pub backend: MetadataBackend,
    /// Table name (default: feedback)
    #[serde(default = "default_table")]
    pub table: String,
    pub sqlite_path: Option<PathBuf>,
    /// Base PostgreSQL URL without password or database (e.g., postgres://user@host:5432)
    pub postgres_url: Option<String>,
    pub postgres_database: Option<String>,
}

/// Supabase project configuration (maps to [supabase] section in TOML)
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL (e.g., https://xyz.supabase.co)
    pub url: String,
}

/// Recognition configuration (maps to [recognition] section in TOML)
#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionConfig {
    pub backend: RecognitionBackend,
    /// BCP-47 language tag (default: en-US)
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_whisper_url")]
    pub whisper_url: String,
    #[serde(default = "default_whisper_model")]
    pub whisper_model: String,
}

/// Environment variables that override file values.
/// Names match the secrets the hosted deployment already uses.
pub struct EnvOverrides {
    pub supabase_url: Option<String>,
    pub bucket: Option<String>,
    pub table: Option<String>,
    pub signed_seconds: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            supabase_url: std::env::var("SUPABASE_URL").ok(),
            bucket: std::env::var("SUPABASE_BUCKET").ok(),
            table: std::env::var("SUPABASE_TABLE").ok(),
            signed_seconds: std::env::var("SIGNED_SECONDS").ok(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Read, apply environment overrides, and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let mut config = Self::from_toml(&content, path)?;
        config.apply_overrides(EnvOverrides::from_env())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, env: EnvOverrides) -> Result<(), ConfigError> {
        if let Some(url) = env.supabase_url {
            self.supabase = Some(SupabaseConfig { url });
        }
        if let Some(bucket) = env.bucket {
            self.blob_store.bucket = bucket;
        }
        if let Some(table) = env.table {
            self.metadata_store.table = table;
        }
        if let Some(secs) = env.signed_seconds {
            self.signed_url_ttl_secs = secs.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("SIGNED_SECONDS must be an integer, got '{}'", secs))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let uses_supabase = self.blob_store.backend == BlobBackend::Supabase
            || self.metadata_store.backend == MetadataBackend::Supabase;
        if uses_supabase && self.supabase.is_none() {
            return Err(ConfigError::Invalid(
                "a supabase backend is selected but [supabase] url is missing".to_string(),
            ));
        }
        if self.blob_store.backend == BlobBackend::Local && self.blob_store.root_dir.is_none() {
            return Err(ConfigError::Invalid(
                "blob_store backend 'local' requires root_dir".to_string(),
            ));
        }
        match self.metadata_store.backend {
            MetadataBackend::Sqlite if self.metadata_store.sqlite_path.is_none() => {
                return Err(ConfigError::Invalid(
                    "metadata_store backend 'sqlite' requires sqlite_path".to_string(),
                ));
            }
            MetadataBackend::Postgres
                if self.metadata_store.postgres_url.is_none()
                    || self.metadata_store.postgres_database.is_none() =>
            {
                return Err(ConfigError::Invalid(
                    "metadata_store backend 'postgres' requires postgres_url and postgres_database"
                        .to_string(),
                ));
            }
            _ => {}
        }
        if self.signed_url_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "signed_url_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.blob_store.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("bucket name is empty".to_string()));
        }
        if self.metadata_store.table.trim().is_empty() {
            return Err(ConfigError::Invalid("table name is empty".to_string()));
        }
        Ok(())
    }

    /// Base URL for links back to this server
    pub fn public_base_url(&self) -> String {
        self.public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }
}
