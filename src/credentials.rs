use serde::Deserialize;
use std::path::PathBuf;

/// Credentials file structure
///
/// Format:
/// ```toml
/// [supabase]
/// key = "service_role_or_anon_key"
///
/// [postgres]
/// password = "your_postgres_password_here"
///
/// [recognition]
/// google_key = "..."
/// whisper_key = "..."
///
/// [local_blob]
/// signing_secret = "..."
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Credentials {
    #[serde(default)]
    pub supabase: SupabaseCredentials,
    #[serde(default)]
    pub postgres: PostgresCredentials,
    #[serde(default)]
    pub recognition: RecognitionCredentials,
    #[serde(default)]
    pub local_blob: LocalBlobCredentials,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SupabaseCredentials {
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PostgresCredentials {
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RecognitionCredentials {
    pub google_key: Option<String>,
    pub whisper_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LocalBlobCredentials {
    pub signing_secret: Option<String>,
}

/// Secret looked up from the environment first, then the credentials file
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Secret {
    SupabaseKey,
    PostgresPassword,
    GoogleSpeechKey,
    WhisperApiKey,
    BlobSigningSecret,
}

impl Secret {
    pub fn env_var(&self) -> &'static str {
        match self {
            Secret::SupabaseKey => "SUPABASE_KEY",
            Secret::PostgresPassword => "POSTGRES_PASSWORD",
            Secret::GoogleSpeechKey => "GOOGLE_SPEECH_KEY",
            Secret::WhisperApiKey => "WHISPER_API_KEY",
            Secret::BlobSigningSecret => "BLOB_SIGNING_SECRET",
        }
    }

    fn file_entry(&self) -> &'static str {
        match self {
            Secret::SupabaseKey => "[supabase] key",
            Secret::PostgresPassword => "[postgres] password",
            Secret::GoogleSpeechKey => "[recognition] google_key",
            Secret::WhisperApiKey => "[recognition] whisper_key",
            Secret::BlobSigningSecret => "[local_blob] signing_secret",
        }
    }

    fn from_file<'a>(&self, creds: &'a Credentials) -> Option<&'a String> {
        match self {
            Secret::SupabaseKey => creds.supabase.key.as_ref(),
            Secret::PostgresPassword => creds.postgres.password.as_ref(),
            Secret::GoogleSpeechKey => creds.recognition.google_key.as_ref(),
            Secret::WhisperApiKey => creds.recognition.whisper_key.as_ref(),
            Secret::BlobSigningSecret => creds.local_blob.signing_secret.as_ref(),
        }
    }
}

/// Get the default credentials file path: ~/.config/voice_feedback/credentials.toml
pub fn get_credentials_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("voice_feedback")
            .join("credentials.toml")
    })
}

/// Load credentials from the default location
/// Returns None if the file doesn't exist
pub fn load_credentials() -> Result<Option<Credentials>, Box<dyn std::error::Error + Send + Sync>> {
    let creds_path = match get_credentials_path() {
        Some(path) if path.exists() => path,
        _ => return Ok(None),
    };

    let content = std::fs::read_to_string(&creds_path)?;
    let credentials: Credentials = toml::from_str(&content)?;

    Ok(Some(credentials))
}

/// Resolve a secret: non-empty env var wins, then the credentials file
pub fn lookup(credentials: &Option<Credentials>, secret: Secret) -> Option<String> {
    lookup_with_env(credentials, secret, |name| std::env::var(name).ok())
}

pub fn lookup_with_env<F>(credentials: &Option<Credentials>, secret: Secret, env: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(secret.env_var())
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            credentials
                .as_ref()
                .and_then(|c| secret.from_file(c))
                .filter(|v| !v.trim().is_empty())
                .cloned()
        })
}

/// Like [`lookup`] but an absent secret is an error naming both sources
pub fn require(credentials: &Option<Credentials>, secret: Secret) -> Result<String, String> {
    lookup(credentials, secret).ok_or_else(|| {
        let file = get_credentials_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/voice_feedback/credentials.toml".to_string());
        format!(
            "Missing secret: set {} or add {} to {}",
            secret.env_var(),
            secret.file_entry(),
            file
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Option<Credentials> {
        Some(
            toml::from_str(
                r#"
[supabase]
key = "from-file"

[recognition]
google_key = ""
"#,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_env_wins_over_file() {
        let value = lookup_with_env(&creds(), Secret::SupabaseKey, |name| {
            (name == "SUPABASE_KEY").then(|| "from-env".to_string())
        });
        assert_eq!(value.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_file_fallback_and_blank_values() {
        let no_env = |_: &str| None;
        assert_eq!(
            lookup_with_env(&creds(), Secret::SupabaseKey, no_env).as_deref(),
            Some("from-file")
        );
        assert_eq!(lookup_with_env(&creds(), Secret::GoogleSpeechKey, no_env), None);
        assert_eq!(lookup_with_env(&None, Secret::PostgresPassword, no_env), None);
    }
}
