//! Engine configuration: a TOML file with `[logging]` and `[capped]` sections
//! plus a couple of environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::capped::CappedConfig;
use crate::errors::DbError;

pub const CONFIG_FILE: &str = "docmatch.toml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log directory; the working directory when unset.
    pub dir: Option<PathBuf>,
    pub level: String,
    /// Rolled files kept per log.
    pub retention: usize,
    /// Persist developer traces to `dev6.log`.
    pub dev6: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { dir: None, level: "info".to_string(), retention: 7, dev6: false }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub logging: LoggingConfig,
    pub capped: CappedConfig,
}

impl EngineConfig {
    /// # Errors
    /// `Config` for malformed TOML or mistyped values.
    pub fn from_toml_str(s: &str) -> Result<Self, DbError> {
        toml::from_str(s).map_err(|e| DbError::Config(e.to_string()))
    }

    /// # Errors
    /// `Io` if the file cannot be read, otherwise as [`from_toml_str`](Self::from_toml_str).
    pub fn load_file(path: &Path) -> Result<Self, DbError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| DbError::Io(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&s)
    }

    /// Loads the first config found (see [`candidate_paths`]) and applies
    /// `DOCMATCH_LOG_LEVEL` / `DOCMATCH_CAPPED_PERCENTAGE`. Defaults when no file exists.
    ///
    /// # Errors
    /// A file named with `--config` that does not exist, or any file that fails to parse.
    pub fn load(cli_path: Option<&Path>) -> Result<Self, DbError> {
        if let Some(p) = cli_path.filter(|p| !p.exists()) {
            return Err(DbError::Config(format!("config file {} does not exist", p.display())));
        }
        let env_path = std::env::var("DOCMATCH_CONFIG").ok().map(PathBuf::from);
        let mut cfg = match candidate_paths(cli_path, env_path.as_deref()).into_iter().find(|p| p.exists()) {
            Some(p) => {
                log::debug!("loading config from {}", p.display());
                Self::load_file(&p)?
            }
            None => Self::default(),
        };
        cfg.apply_overrides(
            std::env::var("DOCMATCH_LOG_LEVEL").ok().as_deref(),
            std::env::var("DOCMATCH_CAPPED_PERCENTAGE").ok().as_deref(),
        )?;
        Ok(cfg)
    }

    /// Applies override values as read from the environment.
    ///
    /// # Errors
    /// `Config` if the percentage is not an integer in 0..=255.
    pub fn apply_overrides(&mut self, log_level: Option<&str>, capped_percentage: Option<&str>) -> Result<(), DbError> {
        if let Some(level) = log_level.filter(|l| !l.trim().is_empty()) {
            self.logging.level = level.trim().to_ascii_lowercase();
        }
        if let Some(pct) = capped_percentage {
            self.capped.cleanup_percentage = pct
                .trim()
                .parse::<u8>()
                .map_err(|e| DbError::Config(format!("DOCMATCH_CAPPED_PERCENTAGE: {e}")))?;
        }
        Ok(())
    }
}

/// Config file locations in lookup order: `--config`, `DOCMATCH_CONFIG`,
/// `<config_dir>/docmatch.toml`, `./docmatch.toml`.
#[must_use]
pub fn candidate_paths(cli_path: Option<&Path>, env_path: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    paths.extend(cli_path.map(Path::to_path_buf));
    paths.extend(env_path.map(Path::to_path_buf));
    if let Some(dir) = dirs_next::config_dir() {
        paths.push(dir.join(CONFIG_FILE));
    }
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join(CONFIG_FILE));
    }
    paths
}
