use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Player preferences that survive a session reset
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameSettings {
    /// Forward accepted keystrokes to the audio engine
    pub sound_enabled: bool,
    /// Combo bursts on the stage
    pub visual_effects: bool,
    /// Note names printed on the piano keys
    pub show_notes: bool,
    /// Render the piano keyboard at all
    pub show_keyboard: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            visual_effects: true,
            show_notes: true,
            show_keyboard: true,
        }
    }
}

impl GameSettings {
    /// Returns a copy with every `Some` override applied
    pub fn merged(&self, overrides: &SettingsOverrides) -> Self {
        Self {
            sound_enabled: overrides.sound_enabled.unwrap_or(self.sound_enabled),
            visual_effects: overrides.visual_effects.unwrap_or(self.visual_effects),
            show_notes: overrides.show_notes.unwrap_or(self.show_notes),
            show_keyboard: overrides.show_keyboard.unwrap_or(self.show_keyboard),
        }
    }
}

/// Per-start tweaks layered over the current settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub sound_enabled: Option<bool>,
    pub visual_effects: Option<bool>,
    pub show_notes: Option<bool>,
    pub show_keyboard: Option<bool>,
}

impl SettingsOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub username: String,
    pub settings: GameSettings,
    pub load_latency_ms: u64,
    pub tick_interval_ms: u64,
    pub catalog_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: "player".to_string(),
            settings: GameSettings::default(),
            load_latency_ms: 1000,
            tick_interval_ms: 100,
            catalog_path: None,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "ivory") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("ivory_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            username: "clara".into(),
            settings: GameSettings {
                sound_enabled: false,
                visual_effects: true,
                show_notes: false,
                show_keyboard: true,
            },
            load_latency_ms: 0,
            tick_interval_ms: 50,
            catalog_path: Some(PathBuf::from("/tmp/tracks.json")),
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load(), cfg);
    }

    #[test]
    fn missing_or_corrupt_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Config::default());

        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"username":"ada","settings":{"sound_enabled":false}}"#).unwrap();
        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.username, "ada");
        assert!(!cfg.settings.sound_enabled);
        assert!(cfg.settings.show_keyboard);
        assert_eq!(cfg.tick_interval_ms, 100);
    }

    #[test]
    fn overrides_merge_over_current() {
        let current = GameSettings {
            sound_enabled: false,
            ..GameSettings::default()
        };
        let merged = current.merged(&SettingsOverrides {
            show_notes: Some(false),
            ..SettingsOverrides::default()
        });
        assert!(!merged.sound_enabled);
        assert!(!merged.show_notes);
        assert!(merged.visual_effects);
        assert!(SettingsOverrides::default().is_empty());
    }
}
