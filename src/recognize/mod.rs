pub mod acrcloud;
pub mod aggregate;
pub mod audd;
pub mod chain;
pub mod orchestrator;
pub mod signing;

pub use acrcloud::{parse_identify_response, AcrCloudClient};
pub use aggregate::{best_of, unique_songs};
pub use audd::{parse_audd_response, AuddClient};
pub use chain::FallbackRecognizer;
pub use orchestrator::{IdentificationOrchestrator, IdentificationReport, SegmentOutcome};
pub use signing::{canonical_string, sign, IdentifyRequest};

use crate::error::Result;
use crate::sampler::SegmentWindow;
use async_trait::async_trait;

/// Placeholder for metadata fields the service did not return.
pub const UNKNOWN: &str = "Unknown";

/// Credentials for the recognition service.
#[derive(Clone)]
pub struct Credentials {
    pub access_key: String,
    pub access_secret: String,
    pub host: String,
}

impl Credentials {
    pub fn new(access_key: String, access_secret: String, host: String) -> Self {
        Self {
            access_key,
            access_secret,
            host,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &mask(&self.access_key))
            .field("access_secret", &"***")
            .field("host", &self.host)
            .finish()
    }
}

/// Show only the first few characters of a secret-ish value.
pub fn mask(value: &str) -> String {
    let prefix: String = value.chars().take(8).collect();
    format!("{prefix}...")
}

/// Content type for an uploaded sample, from its file extension.
pub(crate) fn audio_mime_type(name: &str) -> &'static str {
    match name.rsplit('.').next().map(|e| e.to_lowercase()).as_deref() {
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        Some("aac") => "audio/aac",
        _ => "audio/mpeg",
    }
}

/// A trimmed piece of audio ready for upload.
#[derive(Debug, Clone)]
pub struct SegmentSample {
    pub window: SegmentWindow,
    /// File name reported in the multipart upload.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A track reported by the recognition service for one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub confidence: f64,
    /// Index of the segment window that produced this match.
    pub segment: usize,
}

impl MatchCandidate {
    /// Composite key used to detect the same song across segments.
    pub fn song_key(&self) -> (&str, &str) {
        (&self.title, &self.artist)
    }
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Submit one sample. `Ok(None)` means the service answered but found no music.
    async fn identify(&self, sample: &SegmentSample) -> Result<Option<MatchCandidate>>;
    fn name(&self) -> &'static str;
}
