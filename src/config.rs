use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::analyzer::chroma::ChromaConfig;
use crate::key::KeyMethod;
use crate::organizer::ConflictPolicy;

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the config file is optional.
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Music library to organize (used when `organize` has no SOURCE arg).
    pub source_dir: Option<PathBuf>,
    /// Where key folders are created (used when `organize` has no DEST arg).
    pub dest_dir: Option<PathBuf>,
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Key estimation method.
    pub method: KeyMethod,
    /// Behaviour when a destination file already exists.
    pub on_conflict: ConflictPolicy,
    /// Chroma STFT settings.
    pub chroma: ChromaConfig,
}

impl AppConfig {
    /// Load config from `~/.config/keysort/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Parse config file contents.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Get the config file path.
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.method, KeyMethod::Reference);
        assert_eq!(config.on_conflict, ConflictPolicy::Overwrite);
        assert_eq!(config.chroma, ChromaConfig::default());
    }

    #[test]
    fn full_file_parses() {
        let config = AppConfig::parse(
            r#"
            source_dir = "/music/library"
            dest_dir = "/music/by-key"
            workers = 3
            method = "profile"
            on_conflict = "skip"

            [chroma]
            n_fft = 8192
            max_freq = 4000.0
            "#,
        )
        .unwrap();
        assert_eq!(config.source_dir, Some(PathBuf::from("/music/library")));
        assert_eq!(config.dest_dir, Some(PathBuf::from("/music/by-key")));
        assert_eq!(config.resolve_workers(), 3);
        assert_eq!(config.method, KeyMethod::Profile);
        assert_eq!(config.on_conflict, ConflictPolicy::Skip);
        assert_eq!(config.chroma.n_fft, 8192);
        assert_eq!(config.chroma.max_freq, 4000.0);
        // unspecified chroma fields keep their defaults
        assert_eq!(config.chroma.hop_length, ChromaConfig::default().hop_length);
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(AppConfig::parse(r#"method = "bayesian""#).is_err());
    }

    #[test]
    fn auto_workers_is_at_least_one() {
        let config = AppConfig::default();
        assert!(config.resolve_workers() >= 1);
    }
}
