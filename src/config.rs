use crate::error::{ClipmatchError, Result};
use crate::recognize::Credentials;
use crate::sampler::SamplingPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default sample window length in seconds.
pub const DEFAULT_WINDOW_LENGTH: f64 = 20.0;

/// Default number of windows probed per recording.
pub const DEFAULT_MAX_WINDOWS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub acrcloud_access_key: Option<String>,
    pub acrcloud_access_secret: Option<String>,
    pub acrcloud_host: Option<String>,
    /// Optional AudD token; when set AudD is asked before ACRCloud.
    pub audd_api_token: Option<String>,
    pub window_length: f64,
    pub max_windows: usize,
    pub sampling: SamplingPolicy,
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            acrcloud_access_key: None,
            acrcloud_access_secret: None,
            acrcloud_host: None,
            audd_api_token: None,
            window_length: DEFAULT_WINDOW_LENGTH,
            max_windows: DEFAULT_MAX_WINDOWS,
            sampling: SamplingPolicy::default(),
            concurrency: 1,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                if let Ok(file_config) = toml::from_str::<Config>(&contents) {
                    config = file_config;
                }
            }
        }

        config.apply_env();
        Ok(config)
    }

    /// Override fields from environment variables.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("ACRCLOUD_ACCESS_KEY") {
            self.acrcloud_access_key = Some(key);
        }
        if let Ok(secret) = std::env::var("ACRCLOUD_ACCESS_SECRET") {
            self.acrcloud_access_secret = Some(secret);
        }
        if let Ok(host) = std::env::var("ACRCLOUD_HOST") {
            self.acrcloud_host = Some(host);
        }
        if let Ok(token) = std::env::var("AUDD_API_TOKEN") {
            self.audd_api_token = Some(token);
        }
        if let Ok(length) = std::env::var("CLIPMATCH_WINDOW_LENGTH") {
            if let Ok(l) = length.parse() {
                self.window_length = l;
            }
        }
        if let Ok(max) = std::env::var("CLIPMATCH_MAX_WINDOWS") {
            if let Ok(m) = max.parse() {
                self.max_windows = m;
            }
        }
        if let Ok(policy) = std::env::var("CLIPMATCH_SAMPLING") {
            if let Ok(p) = policy.parse() {
                self.sampling = p;
            }
        }
        if let Ok(concurrency) = std::env::var("CLIPMATCH_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                self.concurrency = c;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("ACRCLOUD_ACCESS_KEY", &self.acrcloud_access_key),
            ("ACRCLOUD_ACCESS_SECRET", &self.acrcloud_access_secret),
            ("ACRCLOUD_HOST", &self.acrcloud_host),
        ]
        .iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();

        if !missing.is_empty() {
            return Err(ClipmatchError::Config(format!(
                "{} not set. Get credentials at https://www.acrcloud.com/ and export them, e.g. export ACRCLOUD_HOST=identify-eu-west-1.acrcloud.com",
                missing.join(", ")
            )));
        }

        if !self.window_length.is_finite() || self.window_length <= 0.0 {
            return Err(ClipmatchError::Config(
                "Window length must be greater than 0".to_string(),
            ));
        }

        if self.max_windows == 0 {
            return Err(ClipmatchError::Config(
                "Max windows must be greater than 0".to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(ClipmatchError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Credentials for the recognition service.
    pub fn credentials(&self) -> Result<Credentials> {
        match (
            &self.acrcloud_access_key,
            &self.acrcloud_access_secret,
            &self.acrcloud_host,
        ) {
            (Some(key), Some(secret), Some(host)) => Ok(Credentials::new(
                key.trim().to_string(),
                secret.trim().to_string(),
                host.trim().to_string(),
            )),
            _ => Err(ClipmatchError::Config(
                "ACRCloud credentials are incomplete".to_string(),
            )),
        }
    }

    /// The AudD token, if one is configured and non-blank.
    pub fn audd_token(&self) -> Option<String> {
        self.audd_api_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    pub fn has_credentials(&self) -> bool {
        self.acrcloud_access_key.is_some()
            && self.acrcloud_access_secret.is_some()
            && self.acrcloud_host.is_some()
    }

    pub fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("clipmatch").join("config.toml"))
    }
}
