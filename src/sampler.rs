//! Segment sampling: choose which windows of a recording to submit for
//! recognition.
//!
//! Fingerprinting tends to fail on vocal-heavy or noisy spans, so a long
//! recording is probed at several independent windows and the best match
//! wins.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Seconds kept clear at the start and end of the usable range.
const EDGE_GUARD: f64 = 5.0;

/// Where sample windows are placed within the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingPolicy {
    /// Deterministic, evenly spaced across the interior.
    #[default]
    Even,
    /// Independently uniform starts; a lighter-weight probe.
    Random,
}

impl std::fmt::Display for SamplingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SamplingPolicy::Even => write!(f, "even"),
            SamplingPolicy::Random => write!(f, "random"),
        }
    }
}

impl std::str::FromStr for SamplingPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "even" => Ok(SamplingPolicy::Even),
            "random" => Ok(SamplingPolicy::Random),
            _ => Err(format!(
                "Unknown sampling policy: {}. Use 'even' or 'random'",
                s
            )),
        }
    }
}

/// A contiguous sub-range of the recording to trim and submit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentWindow {
    /// Zero-based position in the sampling pass.
    pub index: usize,
    /// Start offset in seconds.
    pub start: f64,
    /// Length in seconds.
    pub length: f64,
}

impl SegmentWindow {
    pub fn end(&self) -> f64 {
        self.start + self.length
    }
}

/// Sample windows using the thread-local RNG for the random policy.
pub fn sample(
    duration: f64,
    window_length: f64,
    max_windows: usize,
    policy: SamplingPolicy,
) -> Vec<SegmentWindow> {
    sample_with_rng(duration, window_length, max_windows, policy, &mut rand::rng())
}

/// Sample windows with an explicit randomness source.
///
/// Returns an empty list when the recording cannot hold a single full window.
pub fn sample_with_rng<R: Rng>(
    duration: f64,
    window_length: f64,
    max_windows: usize,
    policy: SamplingPolicy,
    rng: &mut R,
) -> Vec<SegmentWindow> {
    if !duration.is_finite() || !window_length.is_finite() || window_length <= 0.0 {
        return Vec::new();
    }
    if duration <= window_length {
        return Vec::new();
    }

    let available = duration - window_length;
    if available <= 0.0 {
        return Vec::new();
    }

    let count = max_windows.min((duration / window_length).floor() as usize);
    if count < 1 {
        return Vec::new();
    }

    (0..count)
        .map(|index| {
            let start = match policy {
                SamplingPolicy::Even => even_start(index, count, available),
                SamplingPolicy::Random => random_start(available, rng),
            };
            SegmentWindow {
                index,
                start,
                length: window_length,
            }
        })
        .collect()
}

fn even_start(index: usize, count: usize, available: f64) -> f64 {
    let start = EDGE_GUARD + index as f64 * (available - 2.0 * EDGE_GUARD) / count as f64;
    // Short recordings leave less than two guards of room; stay inside.
    start.clamp(0.0, available)
}

fn random_start<R: Rng>(available: f64, rng: &mut R) -> f64 {
    let (low, high) = if available - EDGE_GUARD >= EDGE_GUARD {
        (EDGE_GUARD, available - EDGE_GUARD)
    } else {
        (0.0, available)
    };
    rng.random_range(low..=high)
}
