//! Vocal removal through Demucs.
//!
//! Demucs can be reached two ways (its Python module or its console script).
//! Both are modelled as [`SeparationStrategy`] values tried in order by
//! [`VocalSeparator`].

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::{ClipmatchError, Result};

/// Demucs model used for two-stem separation.
pub const DEMUCS_MODEL: &str = "htdemucs";

/// One way of producing the accompaniment (no-vocals) stem.
pub trait SeparationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Separate `input` under `out_dir` and return the accompaniment stem path.
    fn separate(&self, input: &Path, out_dir: &Path) -> Result<PathBuf>;
}

/// Arguments shared by every Demucs invocation.
fn demucs_args(input: &Path, out_dir: &Path) -> Vec<std::ffi::OsString> {
    vec![
        "--two-stems".into(),
        "vocals".into(),
        "-n".into(),
        DEMUCS_MODEL.into(),
        "--mp3".into(),
        "-o".into(),
        out_dir.as_os_str().to_owned(),
        input.as_os_str().to_owned(),
    ]
}

/// Where Demucs writes the accompaniment stem for `input`.
pub fn no_vocals_path(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    out_dir
        .join(DEMUCS_MODEL)
        .join(stem)
        .join("no_vocals.mp3")
}

fn run_demucs(mut command: Command, input: &Path, out_dir: &Path) -> Result<PathBuf> {
    let output = command
        .args(demucs_args(input, out_dir))
        .output()
        .map_err(|e| ClipmatchError::Separation(format!("Failed to start Demucs: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ClipmatchError::Separation(format!(
            "Demucs exited with {}: {}",
            output.status,
            stderr.lines().last().unwrap_or_default()
        )));
    }

    let expected = no_vocals_path(input, out_dir);
    if !expected.exists() {
        return Err(ClipmatchError::Separation(format!(
            "Could not find {}",
            expected.display()
        )));
    }

    Ok(expected)
}

/// `python3 -m demucs.separate ...`
pub struct DemucsPythonModule {
    python: String,
}

impl Default for DemucsPythonModule {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
        }
    }
}

impl SeparationStrategy for DemucsPythonModule {
    fn name(&self) -> &'static str {
        "demucs python module"
    }

    fn separate(&self, input: &Path, out_dir: &Path) -> Result<PathBuf> {
        let mut command = Command::new(&self.python);
        command.args(["-m", "demucs.separate"]);
        run_demucs(command, input, out_dir)
    }
}

/// The `demucs` console script.
#[derive(Default)]
pub struct DemucsCli;

impl SeparationStrategy for DemucsCli {
    fn name(&self) -> &'static str {
        "demucs executable"
    }

    fn separate(&self, input: &Path, out_dir: &Path) -> Result<PathBuf> {
        run_demucs(Command::new("demucs"), input, out_dir)
    }
}

/// Module invocation first, console script as the fallback.
pub fn default_strategies() -> Vec<Box<dyn SeparationStrategy>> {
    vec![Box::new(DemucsPythonModule::default()), Box::new(DemucsCli)]
}

/// Tries each strategy in order until one yields the accompaniment stem.
pub struct VocalSeparator {
    strategies: Vec<Box<dyn SeparationStrategy>>,
}

impl Default for VocalSeparator {
    fn default() -> Self {
        Self::new(default_strategies())
    }
}

impl VocalSeparator {
    pub fn new(strategies: Vec<Box<dyn SeparationStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn separate(&self, input: &Path, out_dir: &Path) -> Result<PathBuf> {
        if !input.exists() {
            return Err(ClipmatchError::FileNotFound(input.display().to_string()));
        }

        info!("Removing vocals from {}", input.display());
        let mut errors = Vec::new();

        for strategy in &self.strategies {
            debug!("Trying {}", strategy.name());
            match strategy.separate(input, out_dir) {
                Ok(path) => {
                    info!("Vocals removed with {}: {}", strategy.name(), path.display());
                    return Ok(path);
                }
                Err(e) => {
                    warn!("{} failed: {}", strategy.name(), e);
                    errors.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        if errors.is_empty() {
            return Err(ClipmatchError::Separation(
                "No separation strategy configured".to_string(),
            ));
        }

        Err(ClipmatchError::Separation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FakeStrategy {
        succeed: bool,
        calls: Arc<AtomicUsize>,
    }

    impl SeparationStrategy for FakeStrategy {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn separate(&self, input: &Path, out_dir: &Path) -> Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(no_vocals_path(input, out_dir))
            } else {
                Err(ClipmatchError::Separation("boom".to_string()))
            }
        }
    }

    fn input_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("audio.mp3");
        std::fs::write(&path, b"fake").unwrap();
        path
    }

    #[test]
    fn test_no_vocals_path_layout() {
        let path = no_vocals_path(Path::new("/tmp/x/audio.mp3"), Path::new("/tmp/x/separated"));
        assert_eq!(
            path,
            PathBuf::from("/tmp/x/separated/htdemucs/audio/no_vocals.mp3")
        );
    }

    #[test]
    fn test_falls_back_to_next_strategy() {
        let dir = TempDir::new().unwrap();
        let input = input_file(&dir);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let separator = VocalSeparator::new(vec![
            Box::new(FakeStrategy {
                succeed: false,
                calls: first.clone(),
            }),
            Box::new(FakeStrategy {
                succeed: true,
                calls: second.clone(),
            }),
        ]);

        let out = separator.separate(&input, dir.path()).unwrap();
        assert!(out.ends_with("htdemucs/audio/no_vocals.mp3"));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stops_at_first_success() {
        let dir = TempDir::new().unwrap();
        let input = input_file(&dir);
        let second = Arc::new(AtomicUsize::new(0));

        let separator = VocalSeparator::new(vec![
            Box::new(FakeStrategy {
                succeed: true,
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(FakeStrategy {
                succeed: true,
                calls: second.clone(),
            }),
        ]);

        separator.separate(&input, dir.path()).unwrap();
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_all_strategies_fail() {
        let dir = TempDir::new().unwrap();
        let input = input_file(&dir);
        let separator = VocalSeparator::new(vec![Box::new(FakeStrategy {
            succeed: false,
            calls: Arc::new(AtomicUsize::new(0)),
        })]);

        match separator.separate(&input, dir.path()) {
            Err(ClipmatchError::Separation(msg)) => assert!(msg.contains("boom")),
            other => panic!("Expected separation error, got: {other:?}"),
        }
    }

    #[test]
    fn test_missing_input() {
        let separator = VocalSeparator::default();
        assert!(matches!(
            separator.separate(Path::new("/nonexistent/audio.mp3"), Path::new("/tmp")),
            Err(ClipmatchError::FileNotFound(_))
        ));
    }
}
