use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "post_converter.toml";
pub const ENV_PREFIX: &str = "POST_CONVERTER";

/// Runtime settings: defaults, then `post_converter.toml`, then
/// `POST_CONVERTER_*` environment variables. CLI flags are applied last.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub input_dir: PathBuf,
    pub processed_dir: PathBuf,
    /// Pages fetched at once.
    pub concurrency: usize,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let settings: Settings = Config::builder()
            .set_default("input_dir", "./inputs")?
            .set_default("processed_dir", "./processed")?
            .set_default("concurrency", 4_i64)?
            .set_default("max_retries", 3_i64)?
            .set_default("base_backoff_ms", 2000_i64)?
            .set_default("timeout_secs", 30_i64)?
            .set_default(
                "user_agent",
                concat!("post_converter/", env!("CARGO_PKG_VERSION")),
            )?
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .and_then(|c| c.try_deserialize())
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;

        Ok(Settings {
            concurrency: settings.concurrency.max(1),
            ..settings
        })
    }

    pub fn with_overrides(mut self, input_dir: Option<PathBuf>, processed_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = input_dir {
            self.input_dir = dir;
        }
        if let Some(dir) = processed_dir {
            self.processed_dir = dir;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let s = Settings::load_from(Path::new("tests/fixtures/missing.toml")).unwrap();
        assert_eq!(s.input_dir, PathBuf::from("./inputs"));
        assert_eq!(s.processed_dir, PathBuf::from("./processed"));
        assert_eq!(s.concurrency, 4);
        assert_eq!(s.max_retries, 3);
        assert_eq!(s.base_backoff(), Duration::from_secs(2));
        assert!(s.user_agent.starts_with("post_converter/"));
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("post_converter.toml");
        std::fs::write(
            &path,
            "input_dir = \"posts\"\nconcurrency = 0\ntimeout_secs = 5\n",
        )
        .unwrap();

        let s = Settings::load_from(&path).unwrap();
        assert_eq!(s.input_dir, PathBuf::from("posts"));
        assert_eq!(s.concurrency, 1);
        assert_eq!(s.timeout(), Duration::from_secs(5));
        assert_eq!(s.processed_dir, PathBuf::from("./processed"));
    }

    #[test]
    fn cli_overrides_win() {
        let s = Settings::load_from(Path::new("tests/fixtures/missing.toml"))
            .unwrap()
            .with_overrides(None, Some(PathBuf::from("out")));
        assert_eq!(s.input_dir, PathBuf::from("./inputs"));
        assert_eq!(s.processed_dir, PathBuf::from("out"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("post_converter.toml");
        std::fs::write(&path, "concurrency = [").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }
}
