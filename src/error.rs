use thiserror::Error;

/// Errors surfaced by the dialogue runtime.
///
/// Load-time variants abort the scene load entirely; action variants reject
/// a single `advance` call and leave the engine state untouched, except for
/// `Persistence`, which is reported after the traversal step has already
/// been applied.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No scene data exists for the requested id.
    #[error("no scene data found for \"{scene_id}\"")]
    ContentNotFound { scene_id: String },

    /// A graph reference does not resolve, or a choice is missing/doubling
    /// its target. `detail` names the offending id or field.
    #[error("malformed scene graph \"{scene_id}\": {detail}")]
    MalformedGraph { scene_id: String, detail: String },

    /// The caller issued an action the current state does not accept.
    #[error("invalid action: {detail}")]
    InvalidAction { detail: String },

    /// The active node has no outgoing edges; the scenario is complete.
    #[error("scenario complete: the current node has no outgoing edges")]
    TerminalReached,

    /// The progress store rejected a read or write.
    #[error("progress store failure: {detail}")]
    Persistence { detail: String },
}

impl EngineError {
    pub fn malformed(scene_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedGraph {
            scene_id: scene_id.into(),
            detail: detail.into(),
        }
    }

    pub fn invalid_action(detail: impl Into<String>) -> Self {
        Self::InvalidAction {
            detail: detail.into(),
        }
    }

    pub fn persistence(detail: impl Into<String>) -> Self {
        Self::Persistence {
            detail: detail.into(),
        }
    }
}
