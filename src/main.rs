use anyhow::{Context, Result};
use clap::Parser;
use clipmatch::config::Config;
use clipmatch::interactive::run_interactive_wizard;
use clipmatch::pipeline::{identify_clip_with_cancel, print_summary, PipelineConfig};
use clipmatch::sampler::SamplingPolicy;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "clipmatch")]
#[command(version, about = "Identify the song playing in a short video clip")]
#[command(long_about = "Download a clip (or use a local file), optionally strip vocals with Demucs, \
and identify the music by testing several short segments against ACRCloud.")]
struct Cli {
    /// Video URL (e.g. a YouTube Short) or local audio/video file
    input: Option<String>,

    /// Remove vocals with Demucs before identification
    #[arg(long)]
    remove_vocals: bool,

    /// Segment placement: even, random
    #[arg(short, long)]
    sampling: Option<String>,

    /// Length of each tested segment in seconds
    #[arg(short, long)]
    window_length: Option<f64>,

    /// Maximum number of segments to test
    #[arg(short, long)]
    max_windows: Option<usize>,

    /// Number of segments submitted concurrently
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// ACRCloud host (overrides ACRCLOUD_HOST)
    #[arg(long)]
    host: Option<String>,

    /// ACRCloud access key (overrides ACRCLOUD_ACCESS_KEY)
    #[arg(long)]
    access_key: Option<String>,

    /// ACRCloud access secret (overrides ACRCLOUD_ACCESS_SECRET)
    #[arg(long)]
    access_secret: Option<String>,

    /// AudD API token; AudD is tried before ACRCloud (overrides AUDD_API_TOKEN)
    #[arg(long)]
    audd_token: Option<String>,

    /// Keep downloaded and intermediate files
    #[arg(long)]
    keep_files: bool,

    /// Disable progress bars
    #[arg(long)]
    no_progress: bool,

    /// Run the interactive wizard
    #[arg(short, long)]
    interactive: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Fold command-line overrides into the loaded configuration.
fn apply_overrides(cli: &Cli, config: &mut Config) -> Result<()> {
    if let Some(ref key) = cli.access_key {
        config.acrcloud_access_key = Some(key.clone());
    }
    if let Some(ref secret) = cli.access_secret {
        config.acrcloud_access_secret = Some(secret.clone());
    }
    if let Some(ref host) = cli.host {
        config.acrcloud_host = Some(host.clone());
    }
    if let Some(ref token) = cli.audd_token {
        config.audd_api_token = Some(token.clone());
    }
    if let Some(length) = cli.window_length {
        config.window_length = length;
    }
    if let Some(max) = cli.max_windows {
        config.max_windows = max;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(ref sampling) = cli.sampling {
        config.sampling = sampling
            .parse::<SamplingPolicy>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let (input, config, mut pipeline_config) = if cli.interactive || cli.input.is_none() {
        let mut result = run_interactive_wizard()?;
        result.config.sampling = result.pipeline_config.sampling;
        apply_overrides(&cli, &mut result.config)?;
        let pipeline_config = PipelineConfig {
            separate_vocals: result.pipeline_config.separate_vocals || cli.remove_vocals,
            ..PipelineConfig::from_config(&result.config)
        };
        (result.input, result.config, pipeline_config)
    } else {
        let mut config = Config::load().context("Failed to load configuration")?;
        apply_overrides(&cli, &mut config)?;
        let pipeline_config = PipelineConfig {
            separate_vocals: cli.remove_vocals,
            ..PipelineConfig::from_config(&config)
        };
        (cli.input.clone().unwrap_or_default(), config, pipeline_config)
    };

    config
        .validate()
        .context("Configuration validation failed")?;

    pipeline_config.keep_files = cli.keep_files;
    pipeline_config.show_progress = !cli.no_progress;

    info!("Input:    {}", input);
    info!(
        "Services: {}",
        if config.audd_token().is_some() { "AudD, then ACRCloud" } else { "ACRCloud" }
    );
    info!("Vocals:   {}", if pipeline_config.separate_vocals { "remove" } else { "keep" });
    info!(
        "Segments: up to {} x {:.0}s ({})",
        pipeline_config.max_windows, pipeline_config.window_length, pipeline_config.sampling
    );

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            cancelled.store(true, Ordering::Relaxed);
        }) {
            warn!("Could not install Ctrl+C handler: {}", e);
        }
    }

    let result = identify_clip_with_cancel(&input, &config, pipeline_config, cancelled)
        .await
        .context("Identification failed")?;

    print_summary(&result);

    if result.report.best.is_none() && result.report.had_auth_error() {
        anyhow::bail!("The recognition service rejected the credentials");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "clipmatch",
            "https://youtu.be/abcdef123",
            "--host",
            "identify-us-west-2.acrcloud.com",
            "--sampling",
            "random",
            "-m",
            "3",
            "--audd-token",
            "tok",
        ]);
        let mut config = Config::default();
        apply_overrides(&cli, &mut config).unwrap();

        assert_eq!(config.acrcloud_host.as_deref(), Some("identify-us-west-2.acrcloud.com"));
        assert_eq!(config.sampling, SamplingPolicy::Random);
        assert_eq!(config.max_windows, 3);
        assert_eq!(config.window_length, 20.0);
        assert_eq!(config.audd_token().as_deref(), Some("tok"));
    }

    #[test]
    fn test_remove_vocals_flag() {
        let cli = Cli::parse_from(["clipmatch", "clip.mp4", "--remove-vocals"]);
        assert!(cli.remove_vocals);

        let cli = Cli::parse_from(["clipmatch", "clip.mp4"]);
        assert!(!cli.remove_vocals);
        assert!(Cli::try_parse_from(["clipmatch", "clip.mp4", "--no-vocals"]).is_err());
    }

    #[test]
    fn test_cli_rejects_unknown_sampling() {
        let cli = Cli::parse_from(["clipmatch", "clip.mp4", "--sampling", "middle"]);
        let mut config = Config::default();
        assert!(apply_overrides(&cli, &mut config).is_err());
    }
}
