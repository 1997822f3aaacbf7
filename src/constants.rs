use rand::Rng;

/// Content type of every stored clip
pub const AUDIO_MIME: &str = "audio/wav";

/// Tag written to `source` so rows from this client can be told apart
pub const SOURCE_TAG: &str = "voice-feedback-web";

/// Upper bound on rows returned by a playback query
pub const MAX_RESULTS: u64 = 50;

pub const DEFAULT_BUCKET: &str = "voice-recordings";
pub const DEFAULT_TABLE: &str = "feedback";
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;
pub const DEFAULT_PORT: u16 = 8501;

/// Key prefix inside the bucket
pub const AUDIO_KEY_PREFIX: &str = "voice";

/// Sample rate sent to recognizers that take raw PCM
pub const RECOGNITION_SAMPLE_RATE: u32 = 16000;

/// Largest accepted upload (multipart body)
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Generate a random signing secret for the local blob backend.
/// Signed URLs issued with it stop working after a restart.
pub fn generate_signing_secret() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(32)
        .map(char::from)
        .collect::<String>()
}
