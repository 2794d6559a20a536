use mnemo_core::{MnemoError, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::MnemoConfig;

/// Loads the Mnemo configuration once per run.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: MnemoConfig,
    config_path: PathBuf,
    from_file: bool,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > MNEMO_CONFIG env > ~/.mnemo/mnemo.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("MNEMO_CONFIG") {
            return PathBuf::from(p);
        }
        Self::default_path()
    }

    /// `~/.mnemo/mnemo.toml`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mnemo")
            .join("mnemo.toml")
    }

    /// Load the config from disk, falling back to defaults, then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an explicit variable lookup.
    pub fn load_with(path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_path = Self::resolve_path(path);
        let from_file = config_path.exists();
        let config = if from_file {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw, &config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            MnemoConfig::default()
        };

        let config = Self::apply_overrides(config, lookup)?;

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(MnemoError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
            from_file,
        })
    }

    /// Parse TOML text. `origin` is only used in the error message.
    pub fn parse(raw: &str, origin: &Path) -> Result<MnemoConfig> {
        toml::from_str::<MnemoConfig>(raw).map_err(|e| {
            MnemoError::Config(format!("failed to parse {}: {}", origin.display(), e))
        })
    }

    pub fn get(&self) -> &MnemoConfig {
        &self.config
    }

    pub fn into_config(self) -> MnemoConfig {
        self.config
    }

    /// Path the config was resolved to, whether or not it exists.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// False when defaults were used because the file was missing.
    pub fn from_file(&self) -> bool {
        self.from_file
    }

    /// Apply MNEMO_* overrides. A malformed numeric value is an error rather
    /// than being silently ignored.
    pub fn apply_overrides(
        mut config: MnemoConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<MnemoConfig> {
        if let Some(v) = lookup("MNEMO_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MNEMO_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Some(v) = lookup("MNEMO_MIN_COUNT_FOR_CORE") {
            config.thresholds.min_count_for_core = parse_u32("MNEMO_MIN_COUNT_FOR_CORE", &v)?;
        }
        if let Some(v) = lookup("MNEMO_MIN_DAYS_IN_LONG_TERM") {
            config.thresholds.min_days_in_long_term = parse_u32("MNEMO_MIN_DAYS_IN_LONG_TERM", &v)?;
        }
        Ok(config)
    }
}

fn parse_u32(field: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| MnemoError::ConfigValidation {
            field: field.to_string(),
            reason: format!("expected a non-negative integer, got '{value}'"),
        })
}
