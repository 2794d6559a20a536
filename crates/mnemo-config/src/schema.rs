use mnemo_core::PromotionThresholds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Root configuration. Maps to `mnemo.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MnemoConfig {
    pub storage: StorageConfig,
    pub thresholds: PromotionThresholds,
    /// Core-memory destinations keyed by target id, e.g. `claude_md`.
    pub targets: BTreeMap<String, TargetConfig>,
    pub logging: LoggingConfig,
}

// ── Storage ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding observations.json, long_term.json and run_state.json.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.mnemo"),
        }
    }
}

// ── Targets ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// File the entries are appended to.
    pub path: PathBuf,
    /// Written once above the first entry when the file does not contain it.
    #[serde(default)]
    pub heading: Option<String>,
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    pub level: String,
    /// pretty, json, compact
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

/// Expand a leading `~` against the home directory. Other paths pass through.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

impl MnemoConfig {
    /// Data directory with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir)
    }

    /// Expanded file path for a configured target.
    pub fn target_path(&self, target: &str) -> Option<PathBuf> {
        self.targets.get(target).map(|t| expand_tilde(&t.path))
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
pub const VALID_LOG_FORMATS: [&str; 3] = ["pretty", "json", "compact"];

impl MnemoConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Storage ───
        if self.storage.data_dir.as_os_str().is_empty() {
            warnings.push(ConfigWarning {
                field: "storage.data_dir".into(),
                message: "data directory is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '~/.mnemo'".into()),
            });
        }

        // ── Thresholds ───
        let t = &self.thresholds;
        if t.min_count_to_long_term == 0 {
            warnings.push(ConfigWarning {
                field: "thresholds.min_count_to_long_term".into(),
                message: "must be at least 1".into(),
                severity: WarningSeverity::Error,
                hint: Some("Every observation starts with a count of 1".into()),
            });
        }
        if t.min_count_for_core == 0 {
            warnings.push(ConfigWarning {
                field: "thresholds.min_count_for_core".into(),
                message: "must be at least 1".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 5".into()),
            });
        } else if t.min_count_for_core < t.min_count_to_long_term {
            warnings.push(ConfigWarning {
                field: "thresholds.min_count_for_core".into(),
                message: format!(
                    "{} is lower than min_count_to_long_term ({})",
                    t.min_count_for_core, t.min_count_to_long_term
                ),
                severity: WarningSeverity::Warning,
                hint: Some("Core promotion would need less evidence than review".into()),
            });
        }
        if t.min_days_in_long_term == 0 {
            warnings.push(ConfigWarning {
                field: "thresholds.min_days_in_long_term".into(),
                message: "no waiting period before core promotion".into(),
                severity: WarningSeverity::Info,
                hint: Some("Items become promotable as soon as they reach the count".into()),
            });
        }

        // ── Targets ───
        if self.targets.is_empty() {
            warnings.push(ConfigWarning {
                field: "targets".into(),
                message: "no core-memory targets configured".into(),
                severity: WarningSeverity::Info,
                hint: Some("Add e.g. [targets.claude_md] with path = \"~/.claude/CLAUDE.md\"".into()),
            });
        }
        for (id, target) in &self.targets {
            if target.path.as_os_str().is_empty() {
                warnings.push(ConfigWarning {
                    field: format!("targets.{}.path", id),
                    message: "path is empty".into(),
                    severity: WarningSeverity::Error,
                    hint: Some("Point it at the file entries should be appended to".into()),
                });
            }
            if let Some(ref heading) = target.heading {
                if !heading.trim_start().starts_with('#') {
                    warnings.push(ConfigWarning {
                        field: format!("targets.{}.heading", id),
                        message: format!("heading '{}' is not a markdown heading", heading),
                        severity: WarningSeverity::Info,
                        hint: Some("Use e.g. '## Learned patterns'".into()),
                    });
                }
            }
        }

        // ── Logging format ───
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", VALID_LOG_FORMATS.join(", "))),
            });
        }

        // ── Logging level ───
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", VALID_LOG_LEVELS.join(", "))),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
