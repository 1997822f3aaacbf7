//! Collaborators shared by every request, built once at startup.

use log::{info, warn};
use std::sync::Arc;

use crate::config::{BlobBackend, Config, MetadataBackend, RecognitionBackend};
use crate::constants::generate_signing_secret;
use crate::credentials::{self, Credentials, Secret};
use crate::db::SqliteMetadataStore;
use crate::db_postgres::PgMetadataStore;
use crate::local_blob::LocalBlobStore;
use crate::recognition::{GoogleWebSpeech, Recognizer, WhisperApi};
use crate::store::{BlobStore, MetadataStore};
use crate::supabase::SupabaseClient;

type DynError = Box<dyn std::error::Error + Send + Sync>;

pub struct Services {
    pub blob_store: Arc<dyn BlobStore>,
    pub metadata_store: Arc<dyn MetadataStore>,
    pub recognizer: Arc<dyn Recognizer>,
    pub signed_url_ttl_secs: u64,
    /// Set when blobs live on this machine, so `/blobs` can serve them
    pub local_blobs: Option<Arc<LocalBlobStore>>,
}

impl Services {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        metadata_store: Arc<dyn MetadataStore>,
        recognizer: Arc<dyn Recognizer>,
        signed_url_ttl_secs: u64,
    ) -> Self {
        Self {
            blob_store,
            metadata_store,
            recognizer,
            signed_url_ttl_secs,
            local_blobs: None,
        }
    }

    /// Use `store` as the blob store and expose it on `/blobs`
    pub fn with_local_blobs(mut self, store: Arc<LocalBlobStore>) -> Self {
        self.blob_store = store.clone();
        self.local_blobs = Some(store);
        self
    }

    pub async fn from_config(
        config: &Config,
        credentials: &Option<Credentials>,
    ) -> Result<Self, DynError> {
        let http = reqwest::Client::builder().build()?;

        let supabase = match &config.supabase {
            Some(sb)
                if config.blob_store.backend == BlobBackend::Supabase
                    || config.metadata_store.backend == MetadataBackend::Supabase =>
            {
                let key = credentials::require(credentials, Secret::SupabaseKey)?;
                Some(Arc::new(SupabaseClient::new(
                    http.clone(),
                    &sb.url,
                    &key,
                    &config.blob_store.bucket,
                    &config.metadata_store.table,
                )))
            }
            _ => None,
        };

        let mut local_blobs = None;
        let blob_store: Arc<dyn BlobStore> = match config.blob_store.backend {
            BlobBackend::Supabase => {
                let client = supabase
                    .clone()
                    .ok_or("blob_store backend 'supabase' requires [supabase] url")?;
                client as Arc<dyn BlobStore>
            }
            BlobBackend::Local => {
                let root = config
                    .blob_store
                    .root_dir
                    .clone()
                    .ok_or("blob_store backend 'local' requires root_dir")?;
                let secret = match credentials::lookup(credentials, Secret::BlobSigningSecret) {
                    Some(secret) => secret,
                    None => {
                        warn!(
                            "{} not set; using a random signing secret, playback URLs will not survive a restart",
                            Secret::BlobSigningSecret.env_var()
                        );
                        generate_signing_secret()
                    }
                };
                let store = Arc::new(LocalBlobStore::new(
                    root.join(&config.blob_store.bucket),
                    &config.public_base_url(),
                    secret,
                ));
                local_blobs = Some(store.clone());
                store as Arc<dyn BlobStore>
            }
        };

        let table = &config.metadata_store.table;
        let metadata_store: Arc<dyn MetadataStore> = match config.metadata_store.backend {
            MetadataBackend::Supabase => {
                let client = supabase
                    .clone()
                    .ok_or("metadata_store backend 'supabase' requires [supabase] url")?;
                client as Arc<dyn MetadataStore>
            }
            MetadataBackend::Sqlite => {
                let path = config
                    .metadata_store
                    .sqlite_path
                    .clone()
                    .ok_or("metadata_store backend 'sqlite' requires sqlite_path")?;
                Arc::new(SqliteMetadataStore::open(&path, table).await?)
            }
            MetadataBackend::Postgres => {
                let base_url = config
                    .metadata_store
                    .postgres_url
                    .as_deref()
                    .ok_or("metadata_store backend 'postgres' requires postgres_url")?;
                let database = config
                    .metadata_store
                    .postgres_database
                    .as_deref()
                    .ok_or("metadata_store backend 'postgres' requires postgres_database")?;
                let password = credentials::require(credentials, Secret::PostgresPassword)?;
                Arc::new(PgMetadataStore::connect(base_url, &password, database, table).await?)
            }
        };

        let rec = &config.recognition;
        let recognizer: Arc<dyn Recognizer> = match rec.backend {
            RecognitionBackend::Google => {
                let key = credentials::require(credentials, Secret::GoogleSpeechKey)?;
                Arc::new(GoogleWebSpeech::new(http.clone(), &key, &rec.language))
            }
            RecognitionBackend::Whisper => {
                // Self-hosted servers usually accept any bearer token
                let key = credentials::lookup(credentials, Secret::WhisperApiKey)
                    .unwrap_or_else(|| "no-auth".to_string());
                Arc::new(WhisperApi::new(
                    http.clone(),
                    &rec.whisper_url,
                    &key,
                    &rec.whisper_model,
                    Some(&rec.language),
                ))
            }
        };

        info!(
            "Blob store: {}, metadata store: {}, recognizer: {}",
            blob_store.name(),
            metadata_store.name(),
            recognizer.name()
        );

        Ok(Self {
            blob_store,
            metadata_store,
            recognizer,
            signed_url_ttl_secs: config.signed_url_ttl_secs,
            local_blobs,
        })
    }
}
