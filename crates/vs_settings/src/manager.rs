use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::Settings;

/// Shared settings handle.
///
/// Readers take snapshots; a reload swaps the whole value.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    settings: Arc<RwLock<Settings>>,
    path: Option<PathBuf>,
}

impl ConfigManager {
    /// Manager over in-memory settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
            path: None,
        }
    }

    /// Manager backed by a JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let settings = Settings::load_from(&path)?;
        Ok(Self {
            settings: Arc::new(RwLock::new(settings)),
            path: Some(path),
        })
    }

    /// Snapshot copy of current settings.
    pub fn get(&self) -> Settings {
        self.settings.read().clone()
    }

    pub fn get_shared(&self) -> Arc<RwLock<Settings>> {
        Arc::clone(&self.settings)
    }

    /// Apply `f` to the settings in place.
    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        f(&mut self.settings.write());
    }

    /// Re-read the backing file. No-op for in-memory managers.
    pub fn reload(&self) -> anyhow::Result<()> {
        if let Some(path) = &self.path {
            let fresh = Settings::load_from(path)?;
            *self.settings.write() = fresh;
        }
        Ok(())
    }

    /// Persist to the backing file. No-op for in-memory managers.
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(path) = &self.path {
            self.get().save_to(path)?;
        }
        Ok(())
    }

    // Convenience accessors.

    #[inline]
    pub fn rotation_enabled(&self) -> bool {
        self.settings.read().rotation_enabled
    }

    #[inline]
    pub fn rotation_offset_deg(&self) -> f64 {
        self.settings.read().rotation_offset_deg
    }

    #[inline]
    pub fn history_limit(&self) -> usize {
        self.settings.read().history_limit
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
