use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipmatchError {
    #[error("Audio too short to sample: {duration:.1}s (window is {window:.1}s)")]
    TooShort { duration: f64, window: f64 },

    #[error("Media tool failed: {0}")]
    MediaTool(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Vocal separation failed: {0}")]
    Separation(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Authentication failed (check access key and secret): {0}")]
    Authentication(String),

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClipmatchError {
    /// Whether this error points at credential misconfiguration rather than
    /// a genuine non-match.
    pub fn is_authentication(&self) -> bool {
        matches!(self, ClipmatchError::Authentication(_))
    }
}

pub type Result<T> = std::result::Result<T, ClipmatchError>;
