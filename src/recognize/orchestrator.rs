use crate::error::{ClipmatchError, Result};
use crate::media::{AudioAsset, SegmentSource};
use crate::recognize::{best_of, unique_songs, MatchCandidate, Recognizer};
use crate::sampler::SegmentWindow;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// What happened to one sampled window.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentOutcome {
    Matched(MatchCandidate),
    NoMatch,
    /// Trim, transport, protocol or API failure; treated as a non-match.
    Failed(String),
    /// The service rejected the signature or access key.
    AuthenticationFailed(String),
}

/// Result of processing a single window.
#[derive(Debug, Clone)]
pub struct SegmentResult {
    pub window: SegmentWindow,
    pub outcome: SegmentOutcome,
    pub duration_ms: u64,
}

/// Aggregate of one identification pass over an asset.
#[derive(Debug, Clone, Default)]
pub struct IdentificationReport {
    /// Highest-confidence match across all windows.
    pub best: Option<MatchCandidate>,
    /// Distinct `(title, artist)` matches, best instance of each.
    pub unique_songs: Vec<MatchCandidate>,
    /// Per-window results ordered by window index.
    pub results: Vec<SegmentResult>,
    pub attempted: usize,
    pub matched: usize,
    pub failed: usize,
    /// Message of the last authentication failure, if any occurred.
    pub auth_error: Option<String>,
    /// Whether the pass stopped early because of cancellation.
    pub cancelled: bool,
    pub total_time: Duration,
}

impl IdentificationReport {
    pub fn had_auth_error(&self) -> bool {
        self.auth_error.is_some()
    }
}

/// Trims each window, submits it, and folds the answers together.
pub struct IdentificationOrchestrator {
    recognizer: Arc<dyn Recognizer>,
    source: Arc<dyn SegmentSource>,
    concurrency: usize,
    show_progress: bool,
    cancelled: Arc<AtomicBool>,
}

impl IdentificationOrchestrator {
    /// Create an orchestrator that submits one window at a time.
    pub fn new(recognizer: Box<dyn Recognizer>, source: Box<dyn SegmentSource>) -> Self {
        Self {
            recognizer: Arc::from(recognizer),
            source: Arc::from(source),
            concurrency: 1,
            show_progress: true,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Allow up to `concurrency` windows in flight (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Enable or disable progress bar display.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Share a cancellation flag; once set, no further windows are submitted.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Attempt every window and aggregate the matches.
    ///
    /// Per-window failures never abort the pass; they are recorded in the
    /// report. An empty window list yields an empty report.
    pub async fn identify_windows(
        &self,
        asset: &AudioAsset,
        windows: Vec<SegmentWindow>,
    ) -> Result<IdentificationReport> {
        let start_time = Instant::now();
        let total = windows.len();

        if total == 0 {
            return Ok(IdentificationReport::default());
        }

        info!(
            "Testing {} segments of {:.0}s with {} (concurrency: {})",
            total,
            windows[0].length,
            self.recognizer.name(),
            self.concurrency
        );

        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({msg})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut futures = FuturesUnordered::new();

        for window in windows {
            let sem = semaphore.clone();
            let recognizer = self.recognizer.clone();
            let source = self.source.clone();
            let cancelled = self.cancelled.clone();
            let pb = progress_bar.clone();

            futures.push(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return None;
                };
                if cancelled.load(Ordering::Relaxed) {
                    debug!("Skipping segment {} after cancellation", window.index + 1);
                    return None;
                }

                let segment_start = Instant::now();
                let outcome = process_window(recognizer.as_ref(), source.as_ref(), asset, &window).await;
                let duration_ms = segment_start.elapsed().as_millis() as u64;

                if let Some(ref pb) = pb {
                    if matches!(outcome, SegmentOutcome::Matched(_)) {
                        pb.set_message("match found");
                    }
                    pb.inc(1);
                }

                Some(SegmentResult {
                    window,
                    outcome,
                    duration_ms,
                })
            });
        }

        let mut results: Vec<SegmentResult> = Vec::with_capacity(total);
        while let Some(result) = futures.next().await {
            if let Some(result) = result {
                results.push(result);
            }
        }

        if let Some(pb) = progress_bar {
            pb.finish_with_message("done");
        }

        results.sort_by_key(|r| r.window.index);

        let mut report = summarize(results);
        report.cancelled = self.cancelled.load(Ordering::Relaxed) && report.attempted < total;
        report.total_time = start_time.elapsed();

        info!(
            "Identification complete: {}/{} segments matched, {} failed in {:.2}s",
            report.matched,
            report.attempted,
            report.failed,
            report.total_time.as_secs_f64()
        );

        Ok(report)
    }
}

async fn process_window(
    recognizer: &dyn Recognizer,
    source: &dyn SegmentSource,
    asset: &AudioAsset,
    window: &SegmentWindow,
) -> SegmentOutcome {
    let label = window.index + 1;
    debug!("Testing segment {} (starting at {:.1}s)", label, window.start);

    let sample = match source.trim(asset, window).await {
        Ok(sample) => sample,
        Err(e) => {
            warn!("Failed to extract segment {}: {}", label, e);
            return SegmentOutcome::Failed(e.to_string());
        }
    };

    match recognizer.identify(&sample).await {
        Ok(Some(candidate)) => {
            info!(
                "Segment {}: {} - {} (score {})",
                label, candidate.title, candidate.artist, candidate.confidence
            );
            SegmentOutcome::Matched(candidate)
        }
        Ok(None) => {
            info!("Segment {}: no music found", label);
            SegmentOutcome::NoMatch
        }
        Err(ClipmatchError::Authentication(msg)) => {
            warn!("Segment {}: authentication failed: {}", label, msg);
            SegmentOutcome::AuthenticationFailed(msg)
        }
        Err(e) => {
            warn!("Segment {} failed: {}", label, e);
            SegmentOutcome::Failed(e.to_string())
        }
    }
}

fn summarize(results: Vec<SegmentResult>) -> IdentificationReport {
    let mut report = IdentificationReport {
        attempted: results.len(),
        ..IdentificationReport::default()
    };

    let mut candidates = Vec::new();
    for result in &results {
        match &result.outcome {
            SegmentOutcome::Matched(candidate) => {
                report.matched += 1;
                candidates.push(candidate.clone());
            }
            SegmentOutcome::NoMatch => {}
            SegmentOutcome::Failed(_) => report.failed += 1,
            SegmentOutcome::AuthenticationFailed(msg) => {
                report.failed += 1;
                report.auth_error = Some(msg.clone());
            }
        }
    }

    report.unique_songs = unique_songs(candidates.clone());
    report.best = best_of(candidates);
    report.results = results;
    report
}
