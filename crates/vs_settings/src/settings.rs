use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::defaults::*;

/// Which transform handles are built around a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleMode {
    /// Four corners and four edges.
    #[default]
    Full,
    /// Four corners only.
    Corners,
    /// No resize handles.
    None,
}

/// Stage settings.
///
/// Every field falls back to its default when missing from the JSON, so a
/// partial file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // Handles
    #[serde(default = "default_rotation_enabled")]
    pub rotation_enabled: bool,
    #[serde(default = "default_rotation_offset_deg")]
    pub rotation_offset_deg: f64,
    #[serde(default)]
    pub handle_mode: HandleMode,
    #[serde(default = "default_handle_size")]
    pub handle_size: f64,
    #[serde(default = "default_edge_tolerance")]
    pub edge_tolerance: f64,
    #[serde(default = "default_hit_tolerance")]
    pub hit_tolerance: f64,

    // History
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    // Mask overlay
    #[serde(default = "default_mask_color")]
    pub mask_color: (u8, u8, u8),

    #[serde(default = "default_log_debug")]
    pub log_debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rotation_enabled: default_rotation_enabled(),
            rotation_offset_deg: default_rotation_offset_deg(),
            handle_mode: HandleMode::default(),
            handle_size: default_handle_size(),
            edge_tolerance: default_edge_tolerance(),
            hit_tolerance: default_hit_tolerance(),
            history_limit: default_history_limit(),
            mask_color: default_mask_color(),
            log_debug: default_log_debug(),
        }
    }
}

impl Settings {
    /// Parse settings, merging the given fields over the defaults.
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load settings from `path`.
    ///
    /// A missing file yields defaults; an unreadable or malformed one is an error.
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "settings file missing, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save settings to `path`, creating parent directories.
    pub fn save_to(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
