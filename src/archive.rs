use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::EngineError;
use crate::speakers::SpeakerMap;
use crate::story::SceneGraph;

/// Hands out scene graphs by id.
///
/// Implementations validate graphs before exposing them, so the engine can
/// assume every reference it follows resolves.
pub trait ContentStore {
    fn load_scene(&self, scene_id: &str) -> Result<Arc<SceneGraph>, EngineError>;
}

/// On-disk story document: every scene graph plus the speaker mappings.
#[derive(Debug, Deserialize)]
struct StoryDocument {
    #[serde(default)]
    speakers: SpeakerMap,
    #[serde(default)]
    scenes: HashMap<String, SceneGraph>,
}

/// In-memory representation of a story bundle.
///
/// The whole document is parsed and validated eagerly at open time; a
/// malformed graph fails the open with the offending reference rather than
/// surfacing later mid-traversal.
#[derive(Debug, Clone)]
pub struct StoryArchive {
    speakers: Arc<SpeakerMap>,
    scenes: HashMap<String, Arc<SceneGraph>>,
}

impl StoryArchive {
    /// Opens a story bundle from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("unable to open {}", path.display()))?;
        Self::from_json(&data)
    }

    /// Parses a story bundle already resident in memory.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: StoryDocument =
            serde_json::from_str(json).context("story document is not valid JSON")?;

        let mut scenes = HashMap::with_capacity(document.scenes.len());
        for (scene_id, graph) in document.scenes {
            graph.validate(&scene_id)?;
            scenes.insert(scene_id, Arc::new(graph));
        }

        Ok(Self {
            speakers: Arc::new(document.speakers),
            scenes,
        })
    }

    /// Parses a story bundle from raw bytes, e.g. a fetched asset.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let json = std::str::from_utf8(data).context("story document is not valid UTF-8")?;
        Self::from_json(json)
    }

    pub fn speakers(&self) -> &Arc<SpeakerMap> {
        &self.speakers
    }

    /// Scene ids in sorted order.
    pub fn scene_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.scenes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn scene(&self, scene_id: &str) -> Option<&Arc<SceneGraph>> {
        self.scenes.get(scene_id)
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn node_count(&self) -> usize {
        self.scenes.values().map(|graph| graph.nodes.len()).sum()
    }

    pub fn voice_line_count(&self) -> usize {
        self.scenes
            .values()
            .map(|graph| graph.voice_lines().len())
            .sum()
    }
}

impl ContentStore for StoryArchive {
    fn load_scene(&self, scene_id: &str) -> Result<Arc<SceneGraph>, EngineError> {
        self.scenes
            .get(scene_id)
            .cloned()
            .ok_or_else(|| EngineError::ContentNotFound {
                scene_id: scene_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    static STORY_JSON: Lazy<String> = Lazy::new(|| {
        r#"
        {
            "speakers": { "characterNames": { "alex": "Alex Thompson" } },
            "scenes": {
                "scene001": {
                    "startAt": "010",
                    "nodes": {
                        "010": { "speakerId": "alex", "primary": "やあ", "secondary": "Hi", "audioRef": "a-010", "defaultNextId": "020" },
                        "020": {}
                    }
                },
                "scene002": {
                    "startAt": "010",
                    "nodes": { "010": {} }
                }
            }
        }
        "#
        .to_string()
    });

    #[test]
    fn open_archive_reads_scenes_and_speakers() {
        let mut tmp = NamedTempFile::new().expect("tmp file");
        tmp.write_all(STORY_JSON.as_bytes()).expect("write story");
        let archive = StoryArchive::open(tmp.path()).expect("open archive");

        assert_eq!(archive.scene_ids(), vec!["scene001", "scene002"]);
        assert_eq!(archive.scene_count(), 2);
        assert_eq!(archive.node_count(), 3);
        assert_eq!(archive.voice_line_count(), 1);
        assert_eq!(
            archive.speakers().display_name("alex"),
            Some("Alex Thompson")
        );
    }

    #[test]
    fn load_scene_returns_the_validated_graph() {
        let archive = StoryArchive::from_json(&STORY_JSON).unwrap();
        let graph = archive.load_scene("scene001").unwrap();
        assert_eq!(graph.start_at, "010");
    }

    #[test]
    fn load_missing_scene_is_content_not_found() {
        let archive = StoryArchive::from_json(&STORY_JSON).unwrap();
        let err = archive.load_scene("scene999").unwrap_err();
        assert!(matches!(err, EngineError::ContentNotFound { .. }));
    }

    #[test]
    fn malformed_graph_fails_the_open() {
        let err = StoryArchive::from_json(
            r#"{"scenes": {"bad": {"startAt": "x", "nodes": {"x": {"defaultNextId": "gone"}}}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn invalid_json_fails_the_open() {
        assert!(StoryArchive::from_json("{not json").is_err());
    }
}
