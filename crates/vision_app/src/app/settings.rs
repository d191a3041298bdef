//! Persisted client settings: server address, threshold, timeouts.

use crate::client::Timeouts;
use anyhow::{Context, Result};
use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    /// Scores strictly above this value count as abnormal.
    pub threshold: f64,
    pub single_timeout_secs: u64,
    pub batch_timeout_secs: u64,
    /// Descend into subfolders when a label set is given as a folder.
    pub recursive: bool,
    /// Where temporary batch archives are kept during evaluation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:55630".to_string(),
            threshold: vision_core::DEFAULT_THRESHOLD,
            single_timeout_secs: 60,
            batch_timeout_secs: 300,
            recursive: false,
            scratch_dir: None,
        }
    }
}

impl Settings {
    /// `<config dir>/vision-ad/settings.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "vision-ad").map(|dirs| dirs.config_dir().join("settings.toml"))
    }

    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read settings {}", path.display()))?;
        let settings: Settings = toml::from_str(&text)
            .with_context(|| format!("invalid settings file {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("cannot serialize settings")?;
        fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))?;
        tracing::info!("settings saved to {}", path.display());
        Ok(())
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            single: Duration::from_secs(self.single_timeout_secs),
            batch: Duration::from_secs(self.batch_timeout_secs),
        }
    }
}
