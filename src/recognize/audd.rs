use crate::error::{ClipmatchError, Result};
use crate::recognize::{audio_mime_type, MatchCandidate, Recognizer, SegmentSample, UNKNOWN};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const AUDD_API_URL: &str = "https://api.audd.io";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// AudD reports a match without a score; it only answers when it is sure.
pub const AUDD_MATCH_CONFIDENCE: f64 = 100.0;

/// Error codes AudD uses for a wrong, missing or exhausted API token.
const TOKEN_ERROR_CODES: [i64; 2] = [900, 901];

/// AudD recognition API client.
pub struct AuddClient {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
    timeout: Duration,
}

impl AuddClient {
    pub fn new(api_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_token,
            base_url: AUDD_API_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Point the client at a different origin (for testing with mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/", self.base_url)
    }

    fn build_form(&self, sample: &SegmentSample) -> Result<Form> {
        let file_part = Part::bytes(sample.bytes.clone())
            .file_name(sample.name.clone())
            .mime_str(audio_mime_type(&sample.name))?;

        Ok(Form::new()
            .text("api_token", self.api_token.clone())
            .part("file", file_part))
    }
}

#[async_trait]
impl Recognizer for AuddClient {
    async fn identify(&self, sample: &SegmentSample) -> Result<Option<MatchCandidate>> {
        info!(
            "Uploading {} bytes for segment {} to AudD",
            sample.bytes.len(),
            sample.window.index + 1
        );

        let form = self.build_form(sample)?;
        let response = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClipmatchError::Api {
                code: i64::from(status.as_u16()),
                message: format!("AudD HTTP {}: {}", status, body.chars().take(200).collect::<String>()),
            });
        }

        debug!("AudD response: {}", body.chars().take(500).collect::<String>());
        parse_audd_response(&body, sample.window.index)
    }

    fn name(&self) -> &'static str {
        "AudD"
    }
}

/// Interpret an AudD response body.
///
/// `status == "success"` with a non-null `result` is a match; a null result
/// is a plain non-match. Token errors map to
/// [`ClipmatchError::Authentication`].
pub fn parse_audd_response(body: &str, segment: usize) -> Result<Option<MatchCandidate>> {
    let response: AuddResponse = serde_json::from_str(body)?;

    if response.status != "success" {
        let error = response.error.unwrap_or_default();
        let message = error
            .error_message
            .unwrap_or_else(|| format!("AudD returned status '{}'", response.status));
        let code = error.error_code.unwrap_or_default();

        if TOKEN_ERROR_CODES.contains(&code) {
            return Err(ClipmatchError::Authentication(message));
        }
        return Err(ClipmatchError::Api { code, message });
    }

    Ok(response.result.map(|song| {
        let unknown = || UNKNOWN.to_string();
        MatchCandidate {
            title: song.title.unwrap_or_else(unknown),
            artist: song.artist.unwrap_or_else(unknown),
            album: song.album.unwrap_or_else(unknown),
            genre: song.genre.unwrap_or_else(unknown),
            confidence: AUDD_MATCH_CONFIDENCE,
            segment,
        }
    }))
}

#[derive(Debug, Deserialize)]
struct AuddResponse {
    status: String,
    #[serde(default)]
    result: Option<AuddSong>,
    #[serde(default)]
    error: Option<AuddError>,
}

#[derive(Debug, Deserialize)]
struct AuddSong {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    genre: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuddError {
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_match() {
        let body = r#"{
            "status": "success",
            "result": {
                "artist": "Imagine Dragons",
                "title": "Believer",
                "album": "Evolve",
                "release_date": "2017-02-01",
                "label": "KIDinaKORNER",
                "song_link": "https://lis.tn/Believer"
            }
        }"#;

        let candidate = parse_audd_response(body, 3).unwrap().unwrap();
        assert_eq!(candidate.title, "Believer");
        assert_eq!(candidate.artist, "Imagine Dragons");
        assert_eq!(candidate.album, "Evolve");
        assert_eq!(candidate.genre, UNKNOWN);
        assert_eq!(candidate.confidence, AUDD_MATCH_CONFIDENCE);
        assert_eq!(candidate.segment, 3);
    }

    #[test]
    fn test_parse_null_result() {
        let body = r#"{"status": "success", "result": null}"#;
        assert!(parse_audd_response(body, 0).unwrap().is_none());
    }

    #[test]
    fn test_parse_token_error() {
        let body = r#"{"status": "error", "error": {"error_code": 900, "error_message": "Recognition failed: authorization failed: wrong api_token"}}"#;
        let err = parse_audd_response(body, 0).unwrap_err();
        assert!(err.is_authentication(), "got: {err}");
    }

    #[test]
    fn test_parse_other_error() {
        let body = r#"{"status": "error", "error": {"error_code": 300, "error_message": "Recognition failed: a problem with fingerprints creating"}}"#;
        match parse_audd_response(body, 0) {
            Err(ClipmatchError::Api { code, message }) => {
                assert_eq!(code, 300);
                assert!(message.contains("fingerprints"));
            }
            other => panic!("Expected API error, got: {other:?}"),
        }
    }

    #[test]
    fn test_endpoint() {
        let client = AuddClient::new("token".to_string());
        assert_eq!(client.endpoint(), "https://api.audd.io/");
        assert_eq!(client.name(), "AudD");

        let client = client.with_base_url("http://127.0.0.1:9000/");
        assert_eq!(client.endpoint(), "http://127.0.0.1:9000/");
    }
}
