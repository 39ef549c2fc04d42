use std::collections::HashMap;
use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

/// Reserved speaker id that resolves to the player's own display name.
pub const PLAYER_SPEAKER: &str = "player";

/// Immutable table mapping speaker ids to display names, loaded once per
/// session from the authoring mappings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerMap {
    #[serde(default)]
    pub character_names: HashMap<String, String>,
}

impl SpeakerMap {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn display_name(&self, speaker_id: &str) -> Option<&str> {
        self.character_names.get(speaker_id).map(String::as_str)
    }
}

/// Translates speaker ids to display names.
///
/// The player sentinel resolves to the externally configured player name so
/// name customization flows through without touching scene data.
#[derive(Debug, Clone)]
pub struct SpeakerResolver {
    map: Arc<SpeakerMap>,
    player_name: String,
}

impl SpeakerResolver {
    pub fn new(map: Arc<SpeakerMap>, player_name: impl Into<String>) -> Self {
        Self {
            map,
            player_name: player_name.into(),
        }
    }

    pub fn set_player_name(&mut self, name: impl Into<String>) {
        self.player_name = name.into();
    }

    /// Resolves a speaker id to a display name.
    ///
    /// An unmapped id is a content-authoring problem, not a control-flow
    /// one: it is logged and the raw id is shown instead.
    pub fn resolve<'a>(&'a self, speaker_id: &'a str) -> &'a str {
        if speaker_id == PLAYER_SPEAKER {
            return &self.player_name;
        }
        match self.map.display_name(speaker_id) {
            Some(name) => name,
            None => {
                warn!("no display name mapped for speaker \"{speaker_id}\"");
                speaker_id
            }
        }
    }
}
