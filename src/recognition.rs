//! Speech-to-text collaborators.
//!
//! A recognizer never fails with an error: every outcome, including a
//! transport failure, comes back as a [`Recognition`] value.

use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;

use crate::audio::{pcm_for_recognition, EncodedAudio};
use crate::constants::RECOGNITION_SAMPLE_RATE;

pub const GOOGLE_SPEECH_URL: &str = "http://www.google.com/speech-api/v2/recognize";
pub const DEFAULT_WHISPER_MODEL: &str = "whisper-1";

/// Outcome of one recognition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    Transcript(String),
    /// The service answered but could not make out any speech
    Unintelligible,
    /// The request did not complete; carries a human-readable detail
    Failed(String),
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn recognize(&self, audio: &EncodedAudio) -> Recognition;
}

/// Google Web Speech API (the endpoint Chromium uses)
pub struct GoogleWebSpeech {
    http: reqwest::Client,
    endpoint: String,
    key: String,
    language: String,
}

impl GoogleWebSpeech {
    pub fn new(http: reqwest::Client, key: &str, language: &str) -> Self {
        Self::with_endpoint(http, GOOGLE_SPEECH_URL, key, language)
    }

    pub fn with_endpoint(http: reqwest::Client, endpoint: &str, key: &str, language: &str) -> Self {
        Self {
            http,
            endpoint: endpoint.to_string(),
            key: key.to_string(),
            language: language.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct GoogleLine {
    #[serde(default)]
    result: Vec<GoogleResult>,
}

#[derive(Deserialize)]
struct GoogleResult {
    #[serde(default)]
    alternative: Vec<GoogleAlternative>,
}

#[derive(Deserialize)]
struct GoogleAlternative {
    transcript: Option<String>,
    confidence: Option<f64>,
}

/// Parse the newline-separated JSON the Web Speech endpoint streams back.
///
/// The first line is usually `{"result":[]}`; the first line with a
/// non-empty result wins. Within it the alternative with the highest
/// confidence is chosen, falling back to the first one.
pub fn parse_google_response(body: &str) -> Recognition {
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parsed: GoogleLine = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(e) => return Recognition::Failed(format!("Invalid recognition response: {}", e)),
        };
        let Some(result) = parsed.result.into_iter().next() else {
            continue;
        };

        let best = result
            .alternative
            .iter()
            .filter(|a| a.confidence.is_some())
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .or_else(|| result.alternative.first());

        return match best.and_then(|a| a.transcript.as_deref()).map(str::trim) {
            Some(text) if !text.is_empty() => Recognition::Transcript(text.to_string()),
            _ => Recognition::Unintelligible,
        };
    }
    Recognition::Unintelligible
}

/// Big-endian 16-bit PCM, the byte order `audio/l16` expects
fn l16_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}

#[async_trait]
impl Recognizer for GoogleWebSpeech {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn recognize(&self, audio: &EncodedAudio) -> Recognition {
        let pcm = pcm_for_recognition(audio, RECOGNITION_SAMPLE_RATE);
        let result = self
            .http
            .post(&self.endpoint)
            .query(&[
                ("client", "chromium"),
                ("lang", self.language.as_str()),
                ("key", self.key.as_str()),
            ])
            .header(
                "Content-Type",
                format!("audio/l16; rate={};", RECOGNITION_SAMPLE_RATE),
            )
            .body(l16_bytes(&pcm))
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("Google speech request failed: {}", e);
                return Recognition::Failed(format!("recognition connection failed: {}", e));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Recognition::Failed(format!("recognition connection failed: {}", e)),
        };
        if !status.is_success() {
            warn!("Google speech request returned {}", status);
            return Recognition::Failed(format!("recognition request failed: {}", status));
        }

        debug!("Google speech response: {} bytes", body.len());
        parse_google_response(&body)
    }
}

/// Any OpenAI-compatible `/v1/audio/transcriptions` server
pub struct WhisperApi {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    language: Option<String>,
}

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

impl WhisperApi {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        language: Option<&str>,
    ) -> Self {
        Self {
            http,
            api_url: format!("{}/v1/audio/transcriptions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
            // The API takes ISO-639-1, so "en-US" becomes "en"
            language: language
                .and_then(|l| l.split(['-', '_']).next())
                .filter(|l| !l.is_empty())
                .map(|l| l.to_lowercase()),
        }
    }
}

#[async_trait]
impl Recognizer for WhisperApi {
    fn name(&self) -> &'static str {
        "whisper"
    }

    async fn recognize(&self, audio: &EncodedAudio) -> Recognition {
        let part = match reqwest::multipart::Part::bytes(audio.wav.clone())
            .file_name("recording.wav")
            .mime_str("audio/wav")
        {
            Ok(part) => part,
            Err(e) => return Recognition::Failed(e.to_string()),
        };
        let mut form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", part);
        if let Some(lang) = &self.language {
            form = form.text("language", lang.clone());
        }

        let response = match self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Whisper request failed: {}", e);
                return Recognition::Failed(format!("Failed to send request: {}", e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Whisper API returned {}", status);
            return Recognition::Failed(format!("API error ({}): {}", status, error_text));
        }

        match response.json::<WhisperResponse>().await {
            Ok(parsed) if parsed.text.trim().is_empty() => Recognition::Unintelligible,
            Ok(parsed) => Recognition::Transcript(parsed.text.trim().to_string()),
            Err(e) => Recognition::Failed(format!("Failed to parse API response: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_empty_result_is_unintelligible() {
        assert_eq!(parse_google_response("{\"result\":[]}\n"), Recognition::Unintelligible);
        assert_eq!(parse_google_response(""), Recognition::Unintelligible);
    }

    #[test]
    fn test_google_picks_highest_confidence() {
        let body = concat!(
            "{\"result\":[]}\n",
            "{\"result\":[{\"alternative\":[",
            "{\"transcript\":\"it is too cold\",\"confidence\":0.62},",
            "{\"transcript\":\"it is too hot\",\"confidence\":0.91}",
            "],\"final\":true}],\"result_index\":0}\n"
        );
        assert_eq!(
            parse_google_response(body),
            Recognition::Transcript("it is too hot".to_string())
        );
    }

    #[test]
    fn test_google_without_confidence_uses_first() {
        let body = "{\"result\":[{\"alternative\":[{\"transcript\":\"lights flicker\"},{\"transcript\":\"light flicker\"}]}]}";
        assert_eq!(
            parse_google_response(body),
            Recognition::Transcript("lights flicker".to_string())
        );
    }

    #[test]
    fn test_google_invalid_json_is_failure() {
        assert!(matches!(parse_google_response("<html>"), Recognition::Failed(_)));
    }

    #[test]
    fn test_l16_is_big_endian() {
        assert_eq!(l16_bytes(&[1, -2]), vec![0x00, 0x01, 0xFF, 0xFE]);
    }

    #[test]
    fn test_whisper_language_code() {
        let api = WhisperApi::new(reqwest::Client::new(), "http://localhost:8765/", "k", "m", Some("en-US"));
        assert_eq!(api.language.as_deref(), Some("en"));
        assert_eq!(api.api_url, "http://localhost:8765/v1/audio/transcriptions");
    }
}
