use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_EXPORT_FILENAME: &str = "edited_image.png";

#[derive(Debug, Default, Serialize, Deserialize)]
/// Persisted UI/application settings for photoadjust.
pub struct AppConfig {
    pub window_width: Option<f32>,
    pub window_height: Option<f32>,
    pub debounce_ms: Option<u64>,
    pub thumbnail_size: Option<u32>,
    pub export_dir: Option<PathBuf>,
    pub export_filename: Option<String>,
}

impl AppConfig {
    /// Returns the user config file path, if a config directory is available.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("photoadjust").join("config.toml"))
    }

    /// Loads config from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Self {
        toml::from_str(contents).unwrap_or_default()
    }

    /// Writes config to disk, ignoring filesystem/serialization errors.
    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(s) = toml::to_string_pretty(self) {
            let _ = std::fs::write(&path, s);
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(crate::debounce::DEFAULT_DELAY)
    }

    pub fn thumbnail_size(&self) -> u32 {
        self.thumbnail_size
            .filter(|&s| s > 0)
            .unwrap_or(crate::session::DEFAULT_THUMB_SIZE)
    }

    /// Where downloads are written.
    pub fn export_path(&self) -> PathBuf {
        let dir = self
            .export_dir
            .clone()
            .or_else(dirs::picture_dir)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = self
            .export_filename
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_EXPORT_FILENAME);
        dir.join(name)
    }
}
