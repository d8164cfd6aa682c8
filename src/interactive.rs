use crate::config::Config;
use crate::media::is_url;
use crate::pipeline::PipelineConfig;
use crate::recognize::mask;
use crate::sampler::SamplingPolicy;
use console::style;
use dialoguer::{Confirm, Input, Password, Select};
use std::fs;
use std::path::PathBuf;

const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", // Video
    "mp3", "wav", "flac", "m4a", "ogg", "aac", // Audio
];

pub struct InteractiveResult {
    pub input: String,
    pub config: Config,
    pub pipeline_config: PipelineConfig,
}

pub fn run_interactive_wizard() -> anyhow::Result<InteractiveResult> {
    print_header();

    // Step 1: Check/Setup credentials
    let config = setup_credentials()?;

    // Step 2: Select source
    let input = select_source()?;

    // Step 3: Original audio or vocals removed
    let separate_vocals = select_approach()?;

    // Step 4: Window placement
    let sampling = select_sampling(config.sampling)?;

    let pipeline_config = PipelineConfig {
        separate_vocals,
        sampling,
        ..PipelineConfig::from_config(&config)
    };

    // Step 5: Confirm
    print_summary(&input, &config, &pipeline_config);

    if !Confirm::new()
        .with_prompt("Proceed with these settings?")
        .default(true)
        .interact()?
    {
        anyhow::bail!("Cancelled by user");
    }

    println!();

    Ok(InteractiveResult {
        input,
        config,
        pipeline_config,
    })
}

fn print_header() {
    println!();
    println!(
        "{}",
        style("╔═══════════════════════════════════════════════════╗").cyan()
    );
    println!(
        "{}",
        style("║        clipmatch - Song ID for Short Clips        ║").cyan()
    );
    println!(
        "{}",
        style("╚═══════════════════════════════════════════════════╝").cyan()
    );
    println!();
}

fn setup_credentials() -> anyhow::Result<Config> {
    let mut config = Config::load().unwrap_or_default();

    if config.has_credentials() {
        println!(
            "{} ACRCloud credentials configured (host: {}, key: {})",
            style("✓").green(),
            config.acrcloud_host.as_deref().unwrap_or_default(),
            mask(config.acrcloud_access_key.as_deref().unwrap_or_default())
        );
        return Ok(config);
    }

    println!("{} ACRCloud credentials not found", style("!").yellow());
    println!("  Get a free project at: https://www.acrcloud.com/\n");

    let access_key: String = Input::new()
        .with_prompt("Access key")
        .with_initial_text(config.acrcloud_access_key.clone().unwrap_or_default())
        .interact_text()?;
    let access_secret = Password::new().with_prompt("Access secret").interact()?;
    let host: String = Input::new()
        .with_prompt("Host")
        .default("identify-eu-west-1.acrcloud.com".to_string())
        .interact_text()?;

    if access_key.trim().is_empty() || access_secret.trim().is_empty() || host.trim().is_empty() {
        anyhow::bail!("Access key, secret and host are all required");
    }

    config.acrcloud_access_key = Some(access_key.trim().to_string());
    config.acrcloud_access_secret = Some(access_secret.trim().to_string());
    config.acrcloud_host = Some(host.trim().to_string());

    // Offer to save
    if Confirm::new()
        .with_prompt("Save credentials to config file?")
        .default(true)
        .interact()?
    {
        save_config(&config)?;
        println!("{} Credentials saved to config\n", style("✓").green());
    }

    Ok(config)
}

fn save_config(config: &Config) -> anyhow::Result<()> {
    if let Some(config_path) = Config::config_file_path() {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml_content = toml::to_string_pretty(config)?;
        fs::write(config_path, toml_content)?;
    }
    Ok(())
}

fn select_source() -> anyhow::Result<String> {
    println!("\n{}", style("Select source:").bold());

    let files = scan_media_files(".")?;

    let mut items = vec!["Enter a video URL (YouTube Shorts, ...)".to_string()];
    items.extend(files.iter().map(|f| {
        let size = fs::metadata(f)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "?".to_string());
        format!("{} ({})", f.display(), size)
    }));
    items.push("Enter custom path...".to_string());

    let selection = Select::new()
        .with_prompt("Choose a source")
        .items(&items)
        .default(0)
        .interact()?;

    if selection == 0 {
        let url: String = Input::new()
            .with_prompt("Video URL")
            .validate_with(|input: &String| -> Result<(), &str> {
                if is_url(input) {
                    Ok(())
                } else {
                    Err("Enter a full http(s) URL")
                }
            })
            .interact_text()?;
        return Ok(url.trim().to_string());
    }

    if selection == items.len() - 1 {
        let path: String = Input::new()
            .with_prompt("Enter file path")
            .interact_text()?;
        let path = PathBuf::from(path.trim());
        if !path.exists() {
            anyhow::bail!("File not found: {}", path.display());
        }
        return Ok(path.display().to_string());
    }

    Ok(files[selection - 1].display().to_string())
}

fn scan_media_files(dir: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() {
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                    files.push(path);
                }
            }
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn select_approach() -> anyhow::Result<bool> {
    let items = [
        "Use original audio",
        "Remove vocals with Demucs first (slower, better for speech-heavy clips)",
    ];

    let selection = Select::new()
        .with_prompt("Choose your approach")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(selection == 1)
}

fn select_sampling(current: SamplingPolicy) -> anyhow::Result<SamplingPolicy> {
    let policies = [
        (SamplingPolicy::Even, "Even - spread segments across the clip"),
        (SamplingPolicy::Random, "Random - independent random segments"),
    ];

    let items: Vec<&str> = policies.iter().map(|(_, desc)| *desc).collect();
    let default = policies
        .iter()
        .position(|(p, _)| *p == current)
        .unwrap_or(0);

    let selection = Select::new()
        .with_prompt("Segment placement")
        .items(&items)
        .default(default)
        .interact()?;

    Ok(policies[selection].0)
}

fn print_summary(input: &str, config: &Config, pipeline_config: &PipelineConfig) {
    println!("\n{}", style("═══ Summary ═══").bold());
    println!("  Source:    {}", style(input).cyan());
    println!(
        "  Host:      {}",
        config.acrcloud_host.as_deref().unwrap_or_default()
    );
    println!(
        "  AudD:      {}",
        if config.audd_token().is_some() {
            "tried first"
        } else {
            "not configured"
        }
    );
    println!(
        "  Vocals:    {}",
        if pipeline_config.separate_vocals {
            "removed before identification"
        } else {
            "kept"
        }
    );
    println!(
        "  Segments:  up to {} × {:.0}s, {} spread",
        pipeline_config.max_windows, pipeline_config.window_length, pipeline_config.sampling
    );
    println!();
}
