//! Blob store on the local filesystem.
//!
//! Objects live under a root directory at their key. Signed URLs point back
//! at this server (`/blobs/{key}`) and carry an expiry plus an HMAC-SHA256
//! token over the key and expiry, keyed with a server secret.

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::path::{Component, Path, PathBuf};

use crate::store::{BlobStore, Result, StoreError};

type HmacSha256 = Hmac<Sha256>;

pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
    secret: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str, secret: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            secret: secret.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path under the root, rejecting anything that
    /// could escape it
    pub fn path_for_key(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains('\\') || key.split('/').any(|s| s.is_empty()) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn mac(&self, key: &str, expires: i64) -> HmacSha256 {
        let mut mac = match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC accepts any key length"),
        };
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac
    }

    /// Token for `key` valid until `expires` (unix seconds)
    pub fn sign(&self, key: &str, expires: i64) -> String {
        hex::encode(self.mac(key, expires).finalize().into_bytes())
    }

    /// Check a token presented on `/blobs/{key}` against the clock
    pub fn verify(&self, key: &str, expires: i64, token: &str, now: i64) -> bool {
        if now > expires {
            return false;
        }
        let Ok(tag) = hex::decode(token) else {
            return false;
        };
        // Constant-time comparison
        self.mac(key, expires).verify_slice(&tag).is_ok()
    }

    pub async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for_key(key)?;
        Ok(tokio::fs::read(&path).await?)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn upload(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.path_for_key(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write to a temporary name and rename so readers never see a partial file
        let tmp_path = path.with_extension("part");
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(())
    }

    async fn create_signed_url(&self, key: &str, ttl_secs: u64) -> Result<String> {
        let path = self.path_for_key(key)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(StoreError::Status {
                status: 404,
                body: format!("Object not found: {}", key),
            });
        }

        let expires = Utc::now().timestamp() + ttl_secs as i64;
        let encoded_key = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Ok(format!(
            "{}/blobs/{}?expires={}&token={}",
            self.public_base_url,
            encoded_key,
            expires,
            self.sign(key, expires)
        ))
    }
}
