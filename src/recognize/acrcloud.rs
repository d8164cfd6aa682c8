use crate::error::{ClipmatchError, Result};
use crate::recognize::signing::{IdentifyRequest, HTTP_URI};
use crate::recognize::{
    audio_mime_type, Credentials, MatchCandidate, Recognizer, SegmentSample, UNKNOWN,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound on a single identify call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Status code the service uses for a bad signature or access key.
pub const STATUS_INVALID_SIGNATURE: i64 = 3014;

/// ACRCloud identify API client.
pub struct AcrCloudClient {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
    timeout: Duration,
}

impl AcrCloudClient {
    /// Create a client that talks to `https://{credentials.host}`.
    pub fn new(credentials: Credentials) -> Self {
        let base_url = format!("https://{}", credentials.host);
        Self {
            client: reqwest::Client::new(),
            credentials,
            base_url,
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Point the client at a different origin (scheme + host, no path).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, HTTP_URI)
    }

    /// Build the multipart form. The request is signed here, per sample.
    fn build_form(&self, sample: &SegmentSample) -> Result<Form> {
        let request = IdentifyRequest::new(&self.credentials, sample.bytes.len());
        debug!(
            "Signed request for segment {}: timestamp={}, sample_bytes={}",
            sample.window.index, request.timestamp, request.sample_bytes
        );

        let sample_part = Part::bytes(sample.bytes.clone())
            .file_name(sample.name.clone())
            .mime_str(audio_mime_type(&sample.name))?;

        let form = request
            .form_fields()
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value))
            .part("sample", sample_part);

        Ok(form)
    }

    async fn call_api(&self, form: Form) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        debug!("ACRCloud response status: {}", status);

        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClipmatchError::Api {
                code: i64::from(status.as_u16()),
                message: format!("HTTP {}: {}", status, preview(&body, 200)),
            });
        }

        debug!("ACRCloud response: {}", preview(&body, 500));
        Ok(body)
    }
}

#[async_trait]
impl Recognizer for AcrCloudClient {
    async fn identify(&self, sample: &SegmentSample) -> Result<Option<MatchCandidate>> {
        info!(
            "Uploading {} bytes for segment {} to ACRCloud",
            sample.bytes.len(),
            sample.window.index + 1
        );

        let form = self.build_form(sample)?;
        let body = self.call_api(form).await?;
        parse_identify_response(&body, sample.window.index)
    }

    fn name(&self) -> &'static str {
        "ACRCloud"
    }
}

/// Interpret an identify response body.
///
/// `Ok(None)` is a well-formed "no music found" answer. Status 3014 maps to
/// [`ClipmatchError::Authentication`], other non-zero codes to
/// [`ClipmatchError::Api`] with the service message verbatim.
pub fn parse_identify_response(body: &str, segment: usize) -> Result<Option<MatchCandidate>> {
    let response: IdentifyResponse = serde_json::from_str(body)?;

    match response.status.code {
        0 => {}
        STATUS_INVALID_SIGNATURE => {
            return Err(ClipmatchError::Authentication(
                response.status.msg.unwrap_or_else(|| "Invalid signature".to_string()),
            ));
        }
        code => {
            return Err(ClipmatchError::Api {
                code,
                message: response.status.msg.unwrap_or_else(|| "Unknown error".to_string()),
            });
        }
    }

    let first = response
        .metadata
        .and_then(|m| m.music)
        .and_then(|music| music.into_iter().next());

    Ok(first.map(|music| music.into_candidate(segment)))
}

fn preview(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}

// API response types

#[derive(Debug, Deserialize)]
struct IdentifyResponse {
    status: Status,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
struct Status {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    music: Option<Vec<Music>>,
}

#[derive(Debug, Deserialize)]
struct Music {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artists: Option<Vec<Named>>,
    #[serde(default)]
    album: Option<Named>,
    #[serde(default)]
    genres: Option<Vec<Named>>,
    #[serde(default)]
    score: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Named {
    #[serde(default)]
    name: Option<String>,
}

fn first_name(items: Option<Vec<Named>>) -> Option<String> {
    items.and_then(|v| v.into_iter().next()).and_then(|n| n.name)
}

impl Music {
    fn into_candidate(self, segment: usize) -> MatchCandidate {
        let unknown = || UNKNOWN.to_string();

        // Scores usually arrive as integers, occasionally as strings.
        let confidence = match self.score {
            Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        };

        MatchCandidate {
            title: self.title.unwrap_or_else(unknown),
            artist: first_name(self.artists).unwrap_or_else(unknown),
            album: self.album.and_then(|a| a.name).unwrap_or_else(unknown),
            genre: first_name(self.genres).unwrap_or_else(unknown),
            confidence,
            segment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_match() {
        let body = r#"{
            "status": {"code": 0, "msg": "Success", "version": "1.0"},
            "metadata": {"music": [
                {
                    "title": "Blinding Lights",
                    "artists": [{"name": "The Weeknd"}, {"name": "Someone Else"}],
                    "album": {"name": "After Hours"},
                    "genres": [{"name": "Pop"}, {"name": "R&B"}],
                    "score": 96
                },
                {"title": "Other", "score": 40}
            ]}
        }"#;

        let candidate = parse_identify_response(body, 2).unwrap().unwrap();
        assert_eq!(candidate.title, "Blinding Lights");
        assert_eq!(candidate.artist, "The Weeknd");
        assert_eq!(candidate.album, "After Hours");
        assert_eq!(candidate.genre, "Pop");
        assert_eq!(candidate.confidence, 96.0);
        assert_eq!(candidate.segment, 2);
    }

    #[test]
    fn test_parse_missing_fields_default_to_unknown() {
        let body = r#"{"status": {"code": 0}, "metadata": {"music": [{"artists": []}]}}"#;
        let candidate = parse_identify_response(body, 0).unwrap().unwrap();
        assert_eq!(candidate.title, UNKNOWN);
        assert_eq!(candidate.artist, UNKNOWN);
        assert_eq!(candidate.album, UNKNOWN);
        assert_eq!(candidate.genre, UNKNOWN);
        assert_eq!(candidate.confidence, 0.0);
    }

    #[test]
    fn test_parse_string_score() {
        let body = r#"{"status": {"code": 0}, "metadata": {"music": [{"title": "T", "score": "87"}]}}"#;
        let candidate = parse_identify_response(body, 0).unwrap().unwrap();
        assert_eq!(candidate.confidence, 87.0);
    }

    #[test]
    fn test_parse_empty_music_list() {
        let body = r#"{"status": {"code": 0, "msg": "Success"}, "metadata": {"music": []}}"#;
        assert!(parse_identify_response(body, 0).unwrap().is_none());

        let body = r#"{"status": {"code": 0, "msg": "Success"}}"#;
        assert!(parse_identify_response(body, 0).unwrap().is_none());
    }

    #[test]
    fn test_parse_invalid_signature() {
        let body = r#"{"status": {"code": 3014, "msg": "invalid signature"}}"#;
        match parse_identify_response(body, 0) {
            Err(ClipmatchError::Authentication(msg)) => assert_eq!(msg, "invalid signature"),
            other => panic!("Expected authentication error, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_other_api_error_keeps_message() {
        let body = r#"{"status": {"code": 3003, "msg": "limit exceeded"}}"#;
        match parse_identify_response(body, 0) {
            Err(ClipmatchError::Api { code, message }) => {
                assert_eq!(code, 3003);
                assert_eq!(message, "limit exceeded");
            }
            other => panic!("Expected API error, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_malformed_body() {
        assert!(matches!(
            parse_identify_response("<html>502 Bad Gateway</html>", 0),
            Err(ClipmatchError::Json(_))
        ));
    }

    #[test]
    fn test_endpoint() {
        let client = AcrCloudClient::new(Credentials::new(
            "k".to_string(),
            "s".to_string(),
            "identify-eu-west-1.acrcloud.com".to_string(),
        ));
        assert_eq!(
            client.endpoint(),
            "https://identify-eu-west-1.acrcloud.com/v1/identify"
        );

        let client = client.with_base_url("http://127.0.0.1:9000/");
        assert_eq!(client.endpoint(), "http://127.0.0.1:9000/v1/identify");
    }
}
