//! Conntrack comparison and deduplication configuration.

use std::time::Duration;

use domain::conntrack::dedup::DedupSettings;
use domain::conntrack::flags::ComparisonFlags;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::common::{
    ConfigError, default_true, parse_compare_mode, parse_scope, parse_timeout_ordering,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnTrackSection {
    #[serde(default)]
    pub compare: CompareConfig,

    #[serde(default)]
    pub dedup: DedupConfig,
}

/// Flags used when filtering the connection table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareConfig {
    /// `all`, `original`, `reply`, `both` or `none`.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// `wildcard`, `mask` or `strict`.
    #[serde(default = "default_compare_mode")]
    pub mode: String,

    /// Timeout orderings (`lt`, `gt`, `eq`). Empty means exact match.
    #[serde(default)]
    pub timeout: Vec<String>,
}

fn default_scope() -> String {
    "all".to_string()
}

fn default_compare_mode() -> String {
    "mask".to_string()
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            mode: default_compare_mode(),
            timeout: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Flags deciding whether two events are the same connection.
    #[serde(default)]
    pub compare: DedupCompareConfig,
}

fn default_window_secs() -> u64 {
    5
}

fn default_max_entries() -> usize {
    4096
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: default_window_secs(),
            max_entries: default_max_entries(),
            compare: DedupCompareConfig::default(),
        }
    }
}

/// Same keys as [`CompareConfig`], defaulting to strict comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupCompareConfig {
    #[serde(default = "default_scope")]
    pub scope: String,

    #[serde(default = "default_dedup_mode")]
    pub mode: String,

    #[serde(default)]
    pub timeout: Vec<String>,
}

fn default_dedup_mode() -> String {
    "strict".to_string()
}

impl Default for DedupCompareConfig {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            mode: default_dedup_mode(),
            timeout: Vec::new(),
        }
    }
}

impl ConnTrackSection {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        let flags = self.compare_flags()?;
        if flags.scope().is_empty() {
            warn!("conntrack.compare.scope is 'none': every record will match");
        }

        if self.dedup.enabled {
            if self.dedup.window_secs == 0 {
                return Err(ConfigError::Validation {
                    field: "conntrack.dedup.window_secs".to_string(),
                    message: "window must be > 0".to_string(),
                });
            }
            if self.dedup.max_entries == 0 {
                return Err(ConfigError::Validation {
                    field: "conntrack.dedup.max_entries".to_string(),
                    message: "max_entries must be > 0".to_string(),
                });
            }
            let dedup_flags = self.dedup_settings()?.flags;
            if dedup_flags.scope().is_empty() {
                warn!("conntrack.dedup.compare.scope is 'none': all repeats are suppressed");
            }
        }

        Ok(())
    }

    /// Combine scope, mode and timeout orderings into comparison flags.
    pub fn compare_flags(&self) -> Result<ComparisonFlags, ConfigError> {
        let cfg = &self.compare;
        parse_flags("conntrack.compare", &cfg.scope, &cfg.mode, &cfg.timeout)
    }

    /// Convert the dedup section to domain settings.
    pub fn dedup_settings(&self) -> Result<DedupSettings, ConfigError> {
        let cfg = &self.dedup.compare;
        let flags = parse_flags("conntrack.dedup.compare", &cfg.scope, &cfg.mode, &cfg.timeout)?;

        Ok(DedupSettings {
            enabled: self.dedup.enabled,
            window: Duration::from_secs(self.dedup.window_secs),
            max_entries: self.dedup.max_entries,
            flags,
        })
    }
}

/// Parse one scope/mode/timeout block. `prefix` names the block in errors.
fn parse_flags(
    prefix: &str,
    scope: &str,
    mode: &str,
    timeout: &[String],
) -> Result<ComparisonFlags, ConfigError> {
    let scope_bits = parse_scope(scope).map_err(|()| ConfigError::InvalidValue {
        field: format!("{prefix}.scope"),
        value: scope.to_string(),
        expected: "all, original, reply, both, none".to_string(),
    })?;

    let mode = parse_compare_mode(mode).map_err(|()| ConfigError::InvalidValue {
        field: format!("{prefix}.mode"),
        value: mode.to_string(),
        expected: "wildcard, mask, strict".to_string(),
    })?;

    let mut flags = scope_bits | mode.to_flags();
    for (idx, name) in timeout.iter().enumerate() {
        flags |= parse_timeout_ordering(name).map_err(|()| ConfigError::InvalidValue {
            field: format!("{prefix}.timeout[{idx}]"),
            value: name.clone(),
            expected: "lt, gt, eq".to_string(),
        })?;
    }

    Ok(flags)
}
