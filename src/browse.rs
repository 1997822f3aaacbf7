//! Browse-and-playback: filtered listing plus per-record signed URLs.

use log::warn;

use crate::constants::AUDIO_KEY_PREFIX;
use crate::model::{FeedbackFilter, FeedbackRecord};
use crate::store::{BlobStore, MetadataStore, Result};

pub const NO_RECORDINGS: &str = "No recordings yet.";
pub const NO_TRANSCRIPT: &str = "(no transcript)";
pub const NO_SIGNED_URL: &str = "Could not create a signed URL. Check bucket policy/key.";
pub const NOT_A_RECORDING: &str = "Not a recording path.";

/// Newest-first records matching `filter`
pub async fn list(store: &dyn MetadataStore, filter: &FeedbackFilter) -> Result<Vec<FeedbackRecord>> {
    store.select(filter).await
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackUrl {
    Ready(String),
    /// Shown as a warning on that one entry
    Unavailable(String),
}

/// Keys this app writes: `voice/<name>.wav`, one segment, no traversal
pub fn is_recording_key(key: &str) -> bool {
    key.strip_prefix(AUDIO_KEY_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))
        .and_then(|name| name.strip_suffix(".wav"))
        .map(|stem| !stem.is_empty() && !stem.contains(['/', '\\']) && !stem.contains(".."))
        .unwrap_or(false)
}

/// Resolve a time-limited URL for one record's clip. Never fails the
/// listing: every problem becomes [`PlaybackUrl::Unavailable`].
/// Only recording keys are signed.
pub async fn playback_url(blob_store: &dyn BlobStore, audio_path: &str, ttl_secs: u64) -> PlaybackUrl {
    if audio_path.trim().is_empty() {
        return PlaybackUrl::Unavailable("Recording has no audio file.".to_string());
    }
    if !is_recording_key(audio_path) {
        warn!("Refusing to sign non-recording key {:?}", audio_path);
        return PlaybackUrl::Unavailable(NOT_A_RECORDING.to_string());
    }
    match blob_store.create_signed_url(audio_path, ttl_secs).await {
        Ok(url) if !url.trim().is_empty() => PlaybackUrl::Ready(url),
        Ok(_) => {
            warn!("Blob store returned no signed URL for {}", audio_path);
            PlaybackUrl::Unavailable(NO_SIGNED_URL.to_string())
        }
        Err(e) => {
            warn!("Signed URL for {} failed: {}", audio_path, e);
            PlaybackUrl::Unavailable(format!("Signed URL error: {}", e))
        }
    }
}
