use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

/// Tool settings, deserialized from `.license-audit/config.toml`.
///
/// Everything here has a sensible default; the file only needs the keys it
/// wants to change.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub resolver: ResolverSettings,
    pub audit: AuditSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// AI provider for the last-resort lookup: `github`, `openai`, or `none`.
    pub ai_provider: String,
    /// Model name passed to the provider.
    pub model: String,
    /// Minimum similarity for a fuzzy match, between 0.0 and 1.0.
    pub fuzzy_threshold: f64,
    /// Seconds to wait for an AI lookup before giving up on it.
    pub ai_timeout_secs: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        ResolverSettings {
            ai_provider: "github".to_string(),
            model: "gpt-4o-mini".to_string(),
            fuzzy_threshold: 0.8,
            ai_timeout_secs: 10,
        }
    }
}

impl ResolverSettings {
    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Regexes for internal packages, matched against purl and name.
    pub internal_patterns: Vec<String>,
    /// Allow GitHub Actions that carry no license metadata.
    pub allow_github_actions: bool,
}

impl Default for AuditSettings {
    fn default() -> Self {
        AuditSettings {
            internal_patterns: Vec::new(),
            allow_github_actions: true,
        }
    }
}

/// Load tool settings, searching in order:
///
/// 1. the `--config` override
/// 2. `<base_dir>/.license-audit/config.toml`
/// 3. `~/.config/license-audit/config.toml`
/// 4. Built-in [`Settings::default`]
pub fn load_settings(base_dir: &Path, config_override: Option<&Path>) -> Result<Settings> {
    if let Some(path) = config_override {
        return read_settings(path);
    }

    let project_config = base_dir.join(".license-audit").join("config.toml");
    if project_config.exists() {
        return read_settings(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("license-audit").join("config.toml");
        if home_config.exists() {
            return read_settings(&home_config);
        }
    }

    debug!("no config file found, using built-in defaults");
    Ok(Settings::default())
}

fn read_settings(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config file {}", path.display()))
}
