//! Capture-and-submit: encode a recording, transcribe it, and on explicit
//! confirmation upload the clip and write its metadata row.

use chrono::{DateTime, Utc};
use log::{info, warn};
use std::error::Error as StdError;
use std::fmt;
use uuid::Uuid;

use crate::audio::{encode_wav, AudioError, EncodedAudio};
use crate::constants::{AUDIO_KEY_PREFIX, AUDIO_MIME};
use crate::model::{FeedbackRecord, FeedbackType};
use crate::recognition::{Recognition, Recognizer};
use crate::services::Services;
use crate::store::StoreError;

pub const SAVED_MESSAGE: &str = "Saved! Open the Playback page to listen.";

#[derive(Debug)]
pub enum SubmitError {
    /// No audio was captured
    NoRecording,
    /// Audio was captured but could not be decoded
    Audio(AudioError),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::NoRecording => write!(f, "No recording to submit"),
            SubmitError::Audio(err) => write!(f, "{}", err),
        }
    }
}

impl StdError for SubmitError {}

impl From<AudioError> for SubmitError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::Empty => SubmitError::NoRecording,
            other => SubmitError::Audio(other),
        }
    }
}

/// Which half of the two-step save failed
#[derive(Debug)]
pub enum SaveError {
    Upload(StoreError),
    /// The blob at `audio_path` was written but has no metadata row
    Insert { audio_path: String, source: StoreError },
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveError::Upload(err) => write!(f, "Save failed: {}", err),
            SaveError::Insert { source, .. } => write!(f, "Save failed: {}", source),
        }
    }
}

impl StdError for SaveError {}

/// A non-empty recording, re-encoded and ready to transcribe or save
#[derive(Debug, Clone)]
pub struct Draft {
    audio: EncodedAudio,
}

impl Draft {
    pub fn from_upload(bytes: &[u8]) -> Result<Self, SubmitError> {
        if bytes.is_empty() {
            return Err(SubmitError::NoRecording);
        }
        Ok(Self {
            audio: encode_wav(bytes)?,
        })
    }

    pub fn audio(&self) -> &EncodedAudio {
        &self.audio
    }
}

/// Context fields from the form
#[derive(Debug, Clone)]
pub struct SubmitContext {
    pub feedback_type: FeedbackType,
    pub room: Option<String>,
    pub user_id: Option<String>,
    /// Transcript accepted from the transcription step, if any
    pub transcript: Option<String>,
}

/// What the page shows after the transcription step
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptOutcome {
    Ready(String),
    Unintelligible,
    Failed(String),
}

impl TranscriptOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            TranscriptOutcome::Ready(_) => "ready",
            TranscriptOutcome::Unintelligible => "unintelligible",
            TranscriptOutcome::Failed(_) => "failed",
        }
    }

    pub fn message(&self) -> String {
        match self {
            TranscriptOutcome::Ready(_) => "Transcript ready.".to_string(),
            TranscriptOutcome::Unintelligible => {
                "Could not understand the audio (no transcript).".to_string()
            }
            TranscriptOutcome::Failed(detail) => format!("Speech recognition error: {}", detail),
        }
    }

    /// Candidate text for the record; only a successful recognition has one
    pub fn transcript(&self) -> Option<&str> {
        match self {
            TranscriptOutcome::Ready(text) => Some(text),
            _ => None,
        }
    }
}

pub async fn transcribe(recognizer: &dyn Recognizer, audio: &EncodedAudio) -> TranscriptOutcome {
    match recognizer.recognize(audio).await {
        Recognition::Transcript(text) if !text.trim().is_empty() => {
            info!("Recognition via {} succeeded", recognizer.name());
            TranscriptOutcome::Ready(text)
        }
        Recognition::Transcript(_) | Recognition::Unintelligible => {
            info!("Recognition via {} found no speech", recognizer.name());
            TranscriptOutcome::Unintelligible
        }
        Recognition::Failed(detail) => {
            warn!("Recognition via {} failed: {}", recognizer.name(), detail);
            TranscriptOutcome::Failed(detail)
        }
    }
}

/// Blob key `voice/{yyyymmdd_HHMMSS}_{32 hex}.wav` for a clip saved at `now`
pub fn generate_audio_path(now: DateTime<Utc>) -> String {
    format!(
        "{}/{}_{}.wav",
        AUDIO_KEY_PREFIX,
        now.format("%Y%m%d_%H%M%S"),
        Uuid::new_v4().simple()
    )
}

/// Upload the clip, then insert its record.
///
/// The two writes are not atomic. When the insert fails the uploaded blob is
/// left in place and its key is logged so it can be found later.
pub async fn save(
    services: &Services,
    draft: &Draft,
    context: SubmitContext,
) -> Result<FeedbackRecord, SaveError> {
    let audio_path = generate_audio_path(Utc::now());

    services
        .blob_store
        .upload(&audio_path, draft.audio.wav.clone(), AUDIO_MIME)
        .await
        .map_err(SaveError::Upload)?;

    let record = FeedbackRecord::new(
        Utc::now(),
        context.feedback_type,
        context.transcript,
        context.room,
        context.user_id,
        audio_path,
    );

    if let Err(source) = services.metadata_store.insert(&record).await {
        warn!(
            "Blob {} was uploaded but its metadata insert failed: {}",
            record.audio_path, source
        );
        return Err(SaveError::Insert {
            audio_path: record.audio_path,
            source,
        });
    }

    info!(
        "Saved {} feedback {} at {}",
        record.feedback_type, record.id, record.audio_path
    );
    Ok(record)
}
