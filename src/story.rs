use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A dialogue string in both of the game's languages.
///
/// Either side may be independently empty; absent JSON keys deserialize to
/// the empty string so the presentation layer never sees a null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LocalizedText {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub primary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secondary: String,
}

impl LocalizedText {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }
}

/// One speaker turn within a scene's dialogue graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DialogueNode {
    /// Speaker identifier; absent or empty means narration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,
    #[serde(flatten)]
    pub text: LocalizedText,
    /// Voice clip identifier, keyed externally by (scene id, audio ref).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_ref: Option<String>,
    /// Where a plain advance goes when no choices are offered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_next_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
}

impl DialogueNode {
    /// Speaker id with the empty-string spelling of narration folded away.
    pub fn speaker(&self) -> Option<&str> {
        self.speaker_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn is_decision_point(&self) -> bool {
        !self.choices.is_empty()
    }

    /// A node with no outgoing edges ends the scene's linear content.
    pub fn is_terminal(&self) -> bool {
        self.default_next_id.is_none() && self.choices.is_empty()
    }
}

/// One branch option offered by a decision point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    #[serde(default)]
    pub label: LocalizedText,
    /// Target node in the same scene graph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_id: Option<String>,
    /// Target scene, loaded by the external collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_scene: Option<String>,
    /// One-off node shown before the transition is applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Box<DialogueNode>>,
}

impl Choice {
    /// The validated destination of this choice.
    ///
    /// Returns `None` only for unvalidated data; `SceneGraph::validate`
    /// rejects choices that set both or neither target.
    pub fn target(&self) -> Option<ChoiceTarget<'_>> {
        match (self.next_id.as_deref(), self.next_scene.as_deref()) {
            (Some(node), None) => Some(ChoiceTarget::Node(node)),
            (None, Some(scene)) => Some(ChoiceTarget::Scene(scene)),
            _ => None,
        }
    }
}

/// Destination of a resolved choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceTarget<'a> {
    /// Another node in the current scene.
    Node(&'a str),
    /// A different scene; the engine emits a scene-change request.
    Scene(&'a str),
}

/// Immutable dialogue graph for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SceneGraph {
    #[serde(default)]
    pub start_at: String,
    #[serde(default)]
    pub nodes: HashMap<String, DialogueNode>,
}

impl SceneGraph {
    /// Parses and validates a single scene graph from JSON.
    pub fn from_json(scene_id: &str, json: &str) -> Result<Self, EngineError> {
        let graph: Self = serde_json::from_str(json)
            .map_err(|err| EngineError::malformed(scene_id, format!("invalid JSON: {err}")))?;
        graph.validate(scene_id)?;
        Ok(graph)
    }

    pub fn node(&self, id: &str) -> Option<&DialogueNode> {
        self.nodes.get(id)
    }

    /// Checks that every reference in the graph resolves, so traversal can
    /// never hit a dangling id mid-scene.
    pub fn validate(&self, scene_id: &str) -> Result<(), EngineError> {
        if self.start_at.is_empty() {
            return Err(EngineError::malformed(scene_id, "missing startAt"));
        }
        if !self.nodes.contains_key(&self.start_at) {
            return Err(EngineError::malformed(
                scene_id,
                format!("startAt references unknown node \"{}\"", self.start_at),
            ));
        }
        let mut ids: Vec<&String> = self.nodes.keys().collect();
        ids.sort();
        for id in ids {
            self.validate_node(scene_id, id, &self.nodes[id])?;
        }
        Ok(())
    }

    fn validate_node(
        &self,
        scene_id: &str,
        node_label: &str,
        node: &DialogueNode,
    ) -> Result<(), EngineError> {
        if let Some(next) = &node.default_next_id {
            if !self.nodes.contains_key(next) {
                return Err(EngineError::malformed(
                    scene_id,
                    format!("node \"{node_label}\": defaultNextId references unknown node \"{next}\""),
                ));
            }
        }
        for (index, choice) in node.choices.iter().enumerate() {
            match (&choice.next_id, &choice.next_scene) {
                (Some(_), Some(_)) => {
                    return Err(EngineError::malformed(
                        scene_id,
                        format!("node \"{node_label}\" choice {index}: both nextId and nextScene are set"),
                    ));
                }
                (None, None) => {
                    return Err(EngineError::malformed(
                        scene_id,
                        format!("node \"{node_label}\" choice {index}: neither nextId nor nextScene is set"),
                    ));
                }
                (Some(next), None) => {
                    if !self.nodes.contains_key(next) {
                        return Err(EngineError::malformed(
                            scene_id,
                            format!("node \"{node_label}\" choice {index}: nextId references unknown node \"{next}\""),
                        ));
                    }
                }
                (None, Some(scene)) => {
                    if scene.is_empty() {
                        return Err(EngineError::malformed(
                            scene_id,
                            format!("node \"{node_label}\" choice {index}: nextScene is empty"),
                        ));
                    }
                }
            }
            if let Some(response) = &choice.response {
                let label = format!("{node_label}.choices[{index}].response");
                self.validate_node(scene_id, &label, response)?;
            }
        }
        Ok(())
    }

    /// Every voiced line in the scene, decision responses included, in a
    /// deterministic order for the external audio preloader.
    pub fn voice_lines(&self) -> Vec<(String, String)> {
        let mut ids: Vec<&String> = self.nodes.keys().collect();
        ids.sort();
        let mut lines = Vec::new();
        for id in ids {
            let node = &self.nodes[id];
            if let Some(audio) = &node.audio_ref {
                lines.push((id.clone(), audio.clone()));
            }
            for (index, choice) in node.choices.iter().enumerate() {
                if let Some(response) = &choice.response {
                    if let Some(audio) = &response.audio_ref {
                        lines.push((format!("{id}#{index}"), audio.clone()));
                    }
                }
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    {
        "startAt": "a",
        "nodes": {
            "a": {
                "speakerId": "alex",
                "primary": "こんにちは",
                "secondary": "Hello",
                "audioRef": "a-001",
                "defaultNextId": "b"
            },
            "b": {
                "choices": [
                    { "label": { "primary": "はい", "secondary": "Yes" }, "nextId": "a" }
                ]
            }
        }
    }
    "#;

    #[test]
    fn parse_sample_graph() {
        let graph = SceneGraph::from_json("scene001", SAMPLE).unwrap();
        assert_eq!(graph.start_at, "a");
        let a = graph.node("a").unwrap();
        assert_eq!(a.speaker(), Some("alex"));
        assert_eq!(a.text.primary, "こんにちは");
        assert_eq!(a.text.secondary, "Hello");
        assert_eq!(a.audio_ref.as_deref(), Some("a-001"));
        assert!(!a.is_terminal());
        let b = graph.node("b").unwrap();
        assert!(b.is_decision_point());
        assert_eq!(b.choices[0].target(), Some(ChoiceTarget::Node("a")));
    }

    #[test]
    fn absent_text_defaults_to_empty_strings() {
        let graph =
            SceneGraph::from_json("s", r#"{"startAt": "x", "nodes": {"x": {}}}"#).unwrap();
        let node = graph.node("x").unwrap();
        assert_eq!(node.text.primary, "");
        assert_eq!(node.text.secondary, "");
        assert_eq!(node.speaker(), None);
        assert!(node.is_terminal());
    }

    #[test]
    fn empty_speaker_id_is_narration() {
        let graph = SceneGraph::from_json(
            "s",
            r#"{"startAt": "x", "nodes": {"x": {"speakerId": ""}}}"#,
        )
        .unwrap();
        assert_eq!(graph.node("x").unwrap().speaker(), None);
    }

    #[test]
    fn missing_start_at_is_an_error() {
        let err = SceneGraph::from_json("s", r#"{"nodes": {"x": {}}}"#).unwrap_err();
        assert!(err.to_string().contains("missing startAt"));
    }

    #[test]
    fn dangling_start_at_is_an_error() {
        let err =
            SceneGraph::from_json("s", r#"{"startAt": "nope", "nodes": {"x": {}}}"#).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn dangling_default_next_id_is_an_error() {
        let err = SceneGraph::from_json(
            "s",
            r#"{"startAt": "x", "nodes": {"x": {"defaultNextId": "gone"}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn choice_with_both_targets_is_an_error() {
        let err = SceneGraph::from_json(
            "s",
            r#"{
                "startAt": "x",
                "nodes": {
                    "x": { "choices": [ { "nextId": "x", "nextScene": "other" } ] }
                }
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("both nextId and nextScene"));
    }

    #[test]
    fn choice_with_no_target_is_an_error() {
        let err = SceneGraph::from_json(
            "s",
            r#"{"startAt": "x", "nodes": {"x": {"choices": [ {} ]}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("neither nextId nor nextScene"));
    }

    #[test]
    fn dangling_choice_next_id_is_an_error() {
        let err = SceneGraph::from_json(
            "s",
            r#"{"startAt": "x", "nodes": {"x": {"choices": [ { "nextId": "gone" } ]}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn response_references_are_validated() {
        let err = SceneGraph::from_json(
            "s",
            r#"{
                "startAt": "x",
                "nodes": {
                    "x": {
                        "choices": [
                            {
                                "nextId": "x",
                                "response": { "defaultNextId": "gone" }
                            }
                        ]
                    }
                }
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn node_with_both_default_next_and_choices_is_accepted() {
        // Choices take precedence at traversal time; the data is not
        // rejected, but both references must still resolve.
        let graph = SceneGraph::from_json(
            "s",
            r#"{
                "startAt": "x",
                "nodes": {
                    "x": { "defaultNextId": "y", "choices": [ { "nextId": "y" } ] },
                    "y": {}
                }
            }"#,
        )
        .unwrap();
        assert!(graph.node("x").unwrap().is_decision_point());
    }

    #[test]
    fn voice_lines_are_sorted_and_include_responses() {
        let graph = SceneGraph::from_json(
            "s",
            r#"{
                "startAt": "010",
                "nodes": {
                    "020": {
                        "choices": [
                            {
                                "nextId": "010",
                                "response": { "audioRef": "resp-1" }
                            }
                        ]
                    },
                    "010": { "audioRef": "line-1", "defaultNextId": "020" },
                    "030": {}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(
            graph.voice_lines(),
            vec![
                ("010".to_string(), "line-1".to_string()),
                ("020#0".to_string(), "resp-1".to_string()),
            ]
        );
    }
}
