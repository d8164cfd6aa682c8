//! Try several recognition services in order for each segment.

use crate::error::{ClipmatchError, Result};
use crate::recognize::{MatchCandidate, Recognizer, SegmentSample};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Asks each recognizer in turn and returns the first match.
///
/// When nobody matches, an authentication failure from any service wins over
/// a plain non-match so bad credentials stay visible. Otherwise a non-match
/// wins over other errors, and the last error is returned only when every
/// service failed.
pub struct FallbackRecognizer {
    recognizers: Vec<Box<dyn Recognizer>>,
}

impl FallbackRecognizer {
    pub fn new(recognizers: Vec<Box<dyn Recognizer>>) -> Self {
        Self { recognizers }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.recognizers.iter().map(|r| r.name()).collect()
    }
}

#[async_trait]
impl Recognizer for FallbackRecognizer {
    async fn identify(&self, sample: &SegmentSample) -> Result<Option<MatchCandidate>> {
        let mut answered = false;
        let mut auth_error = None;
        let mut last_error = None;

        for recognizer in &self.recognizers {
            match recognizer.identify(sample).await {
                Ok(Some(candidate)) => {
                    debug!(
                        "Segment {} matched by {}",
                        sample.window.index + 1,
                        recognizer.name()
                    );
                    return Ok(Some(candidate));
                }
                Ok(None) => answered = true,
                Err(e) if e.is_authentication() => {
                    warn!("{} rejected the credentials: {}", recognizer.name(), e);
                    auth_error = Some(e);
                }
                Err(e) => {
                    warn!("{} failed: {}", recognizer.name(), e);
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = auth_error {
            return Err(e);
        }
        if answered {
            return Ok(None);
        }
        match last_error {
            Some(e) => Err(e),
            None => Err(ClipmatchError::Config(
                "No recognition service configured".to_string(),
            )),
        }
    }

    fn name(&self) -> &'static str {
        "fallback chain"
    }
}
