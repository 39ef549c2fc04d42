use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::progress::{keys, ProgressStore};

/// Which language strings the presentation layer should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageMode {
    Primary,
    Secondary,
    Dual,
}

/// Player-facing preferences, persisted as one JSON value in the progress
/// store under the `settings` key.
///
/// Unknown saved fields are ignored and missing ones fall back to the
/// defaults, so the struct can grow without invalidating old saves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameSettings {
    pub language: LanguageMode,
    /// Milliseconds per character for the typewriter effect.
    pub text_speed: u32,
    pub auto_advance: bool,
    /// Milliseconds to wait before advancing in auto mode.
    pub auto_speed: u32,
    pub bgm_volume: f32,
    pub sfx_volume: f32,
    pub typewriter_effect: bool,
    pub quick_skip: bool,
    /// Display name the player picked for themselves.
    pub player_name: String,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            language: LanguageMode::Dual,
            text_speed: 30,
            auto_advance: false,
            auto_speed: 2000,
            bgm_volume: 0.5,
            sfx_volume: 0.7,
            typewriter_effect: true,
            quick_skip: false,
            player_name: "Player".to_string(),
        }
    }
}

impl GameSettings {
    /// Clamps out-of-range values in place and returns self.
    pub fn normalized(mut self) -> Self {
        self.bgm_volume = self.bgm_volume.clamp(0.0, 1.0);
        self.sfx_volume = self.sfx_volume.clamp(0.0, 1.0);
        self
    }

    /// Loads settings from the store, falling back to defaults when no
    /// value is saved or the saved value no longer parses.
    pub fn load(store: &dyn ProgressStore) -> Self {
        let Some(raw) = store.get(keys::SETTINGS) else {
            return Self::default();
        };
        match serde_json::from_str::<Self>(&raw) {
            Ok(settings) => settings.normalized(),
            Err(err) => {
                warn!("saved settings are unreadable, using defaults: {err}");
                Self::default()
            }
        }
    }

    pub fn save(&self, store: &dyn ProgressStore) -> Result<(), EngineError> {
        let raw = serde_json::to_string(self)
            .map_err(|err| EngineError::persistence(format!("unable to encode settings: {err}")))?;
        store.set(keys::SETTINGS, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::MemoryProgress;

    #[test]
    fn defaults_match_the_shipped_configuration() {
        let settings = GameSettings::default();
        assert_eq!(settings.language, LanguageMode::Dual);
        assert_eq!(settings.text_speed, 30);
        assert_eq!(settings.auto_speed, 2000);
        assert_eq!(settings.player_name, "Player");
        assert!(settings.typewriter_effect);
    }

    #[test]
    fn round_trips_through_a_progress_store() {
        let store = MemoryProgress::new();
        let mut settings = GameSettings::default();
        settings.language = LanguageMode::Secondary;
        settings.player_name = "Aoi".to_string();
        settings.save(&store).unwrap();

        let loaded = GameSettings::load(&store);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn missing_value_yields_defaults() {
        let store = MemoryProgress::new();
        assert_eq!(GameSettings::load(&store), GameSettings::default());
    }

    #[test]
    fn unreadable_value_yields_defaults() {
        let store = MemoryProgress::new();
        store.set(keys::SETTINGS, "{broken").unwrap();
        assert_eq!(GameSettings::load(&store), GameSettings::default());
    }

    #[test]
    fn partial_saves_merge_with_defaults() {
        let store = MemoryProgress::new();
        store
            .set(keys::SETTINGS, r#"{"language": "primary", "playerName": "Ken"}"#)
            .unwrap();
        let loaded = GameSettings::load(&store);
        assert_eq!(loaded.language, LanguageMode::Primary);
        assert_eq!(loaded.player_name, "Ken");
        assert_eq!(loaded.text_speed, GameSettings::default().text_speed);
    }

    #[test]
    fn volumes_clamp_on_load() {
        let store = MemoryProgress::new();
        store
            .set(keys::SETTINGS, r#"{"bgmVolume": 2.5, "sfxVolume": -1.0}"#)
            .unwrap();
        let loaded = GameSettings::load(&store);
        assert_eq!(loaded.bgm_volume, 1.0);
        assert_eq!(loaded.sfx_volume, 0.0);
    }
}
