use std::sync::Arc;

use log::warn;

use crate::archive::ContentStore;
use crate::error::EngineError;
use crate::progress::{keys, ProgressStore};
use crate::speakers::SpeakerResolver;
use crate::story::{Choice, ChoiceTarget, DialogueNode, SceneGraph};

/// Discrete player intent fed into the engine by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceAction {
    /// Move to the default next node.
    Next,
    /// Pick the choice at the given index.
    Choice(usize),
}

impl AdvanceAction {
    /// Parses the string form used by the driver layers.
    pub fn from_name(name: &str, value: Option<usize>) -> Option<Self> {
        match name {
            "next" => Some(Self::Next),
            "choice" => value.map(Self::Choice),
            _ => None,
        }
    }
}

/// Per-scene traversal state; superseded wholesale when a scene loads.
struct EngineState {
    scene_id: String,
    graph: Arc<SceneGraph>,
    node_id: String,
    /// Inline response shown between a pick and its transition.
    response: Option<ActiveResponse>,
    /// Set after a cross-scene choice until the collaborator reloads.
    suspended: bool,
}

struct ActiveResponse {
    node: DialogueNode,
    target: ParkedTarget,
}

/// Choice destination held back while its response is displayed.
enum ParkedTarget {
    Node(String),
    Scene(String),
}

/// One planned traversal step, computed before any mutation so a rejected
/// action leaves the state untouched.
enum Step {
    Move(String),
    ShowResponse { node: DialogueNode, target: ParkedTarget },
    SceneChange(String),
}

impl EngineState {
    /// The node content queries and transitions operate on: the inline
    /// response while one is displayed, otherwise the graph node.
    fn active_node(&self) -> Option<&DialogueNode> {
        if let Some(response) = &self.response {
            return Some(&response.node);
        }
        self.graph.node(&self.node_id)
    }
}

/// Walks a scene's dialogue graph in response to player actions.
///
/// The engine owns the current position, answers the content queries the
/// presentation layer renders from, and writes the position through to the
/// progress store after every successful advance. Collaborators are
/// injected at construction; the only outbound signal is the scene-change
/// listener.
pub struct DialogueEngine {
    content: Arc<dyn ContentStore>,
    progress: Arc<dyn ProgressStore>,
    speakers: SpeakerResolver,
    listener: Option<Box<dyn FnMut(&str)>>,
    state: Option<EngineState>,
}

impl DialogueEngine {
    pub fn new(
        content: Arc<dyn ContentStore>,
        progress: Arc<dyn ProgressStore>,
        speakers: SpeakerResolver,
    ) -> Self {
        Self {
            content,
            progress,
            speakers,
            listener: None,
            state: None,
        }
    }

    /// Registers the callback invoked once per cross-scene advance. The
    /// collaborator answers by loading the requested scene and calling
    /// `load_scene` or `resume` again.
    pub fn set_scene_listener(&mut self, listener: impl FnMut(&str) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn set_player_name(&mut self, name: impl Into<String>) {
        self.speakers.set_player_name(name);
    }

    /// Loads a scene and positions the engine at its entry node.
    pub fn load_scene(&mut self, scene_id: &str) -> Result<(), EngineError> {
        let graph = self.content.load_scene(scene_id)?;
        let node_id = graph.start_at.clone();
        self.install(scene_id.to_string(), graph, node_id)
    }

    /// Reconstructs the engine position saved in the progress store.
    ///
    /// A saved node id that no longer exists in the scene is a stale save,
    /// not a fatal condition: the scene restarts from its entry node.
    pub fn resume(&mut self) -> Result<(), EngineError> {
        let scene_id = self
            .progress
            .get(keys::SCENE)
            .ok_or_else(|| EngineError::invalid_action("the progress store has no saved scene"))?;
        let graph = self.content.load_scene(&scene_id)?;
        let node_id = match self.progress.get(keys::DIALOGUE) {
            Some(id) if graph.node(&id).is_some() => id,
            Some(id) => {
                warn!(
                    "saved dialogue id \"{id}\" is not in scene \"{scene_id}\", restarting from \"{}\"",
                    graph.start_at
                );
                graph.start_at.clone()
            }
            None => graph.start_at.clone(),
        };
        self.install(scene_id, graph, node_id)
    }

    fn install(
        &mut self,
        scene_id: String,
        graph: Arc<SceneGraph>,
        node_id: String,
    ) -> Result<(), EngineError> {
        self.state = Some(EngineState {
            scene_id,
            graph,
            node_id,
            response: None,
            suspended: false,
        });
        self.persist_position()
    }

    /// Processes one player action.
    ///
    /// Rejected actions leave the state untouched. A `Persistence` error is
    /// reported after the traversal step has already been applied; the
    /// in-memory position stays valid.
    pub fn advance(&mut self, action: AdvanceAction) -> Result<(), EngineError> {
        let step = {
            let state = self
                .state
                .as_ref()
                .ok_or_else(|| EngineError::invalid_action("no scene is loaded"))?;
            if state.suspended {
                return Err(EngineError::invalid_action(
                    "a scene change is pending; load the next scene before advancing",
                ));
            }
            match action {
                AdvanceAction::Next => plan_next(state)?,
                AdvanceAction::Choice(index) => plan_choice(state, index)?,
            }
        };

        if let AdvanceAction::Choice(index) = action {
            self.record_choice(index)?;
        }

        match step {
            Step::Move(node_id) => {
                let state = self.state_mut()?;
                if state.graph.node(&node_id).is_none() {
                    return Err(EngineError::malformed(
                        &state.scene_id,
                        format!("node \"{node_id}\" is not in the graph"),
                    ));
                }
                state.node_id = node_id;
                state.response = None;
                self.persist_position()
            }
            Step::ShowResponse { node, target } => {
                let state = self.state_mut()?;
                state.response = Some(ActiveResponse { node, target });
                self.persist_position()
            }
            Step::SceneChange(scene_id) => {
                let state = self.state_mut()?;
                state.suspended = true;
                self.progress.set(keys::SCENE, &scene_id)?;
                self.progress.remove(keys::DIALOGUE)?;
                if let Some(listener) = self.listener.as_mut() {
                    listener(&scene_id);
                }
                Ok(())
            }
        }
    }

    fn state_mut(&mut self) -> Result<&mut EngineState, EngineError> {
        self.state
            .as_mut()
            .ok_or_else(|| EngineError::invalid_action("no scene is loaded"))
    }

    fn record_choice(&self, index: usize) -> Result<(), EngineError> {
        let Some(state) = &self.state else {
            return Ok(());
        };
        let key = keys::choice(&state.scene_id, &state.node_id);
        self.progress.set(&key, &index.to_string())
    }

    fn persist_position(&self) -> Result<(), EngineError> {
        let Some(state) = &self.state else {
            return Ok(());
        };
        self.progress.set(keys::SCENE, &state.scene_id)?;
        self.progress.set(keys::DIALOGUE, &state.node_id)
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    pub fn scene_id(&self) -> Option<&str> {
        self.state.as_ref().map(|state| state.scene_id.as_str())
    }

    pub fn current_node_id(&self) -> Option<&str> {
        self.state.as_ref().map(|state| state.node_id.as_str())
    }

    /// True after a cross-scene choice, until the next load.
    pub fn is_scene_change_pending(&self) -> bool {
        self.state
            .as_ref()
            .map(|state| state.suspended)
            .unwrap_or(false)
    }

    fn active_node(&self) -> Option<&DialogueNode> {
        self.state.as_ref().and_then(EngineState::active_node)
    }

    pub fn primary_text(&self) -> &str {
        self.active_node()
            .map(|node| node.text.primary.as_str())
            .unwrap_or("")
    }

    pub fn secondary_text(&self) -> &str {
        self.active_node()
            .map(|node| node.text.secondary.as_str())
            .unwrap_or("")
    }

    /// Display name of the active speaker; empty for narration.
    pub fn speaker_name(&self) -> &str {
        match self.active_node().and_then(DialogueNode::speaker) {
            Some(id) => self.speakers.resolve(id),
            None => "",
        }
    }

    pub fn audio_ref(&self) -> Option<&str> {
        self.active_node().and_then(|node| node.audio_ref.as_deref())
    }

    /// The pending choices, empty when none are offered.
    pub fn choices(&self) -> &[Choice] {
        if self.is_scene_change_pending() {
            return &[];
        }
        self.active_node()
            .map(|node| node.choices.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_choice_pending(&self) -> bool {
        !self.choices().is_empty()
    }

    /// True when the active node has no outgoing edges; callers consult
    /// this before issuing a plain advance.
    pub fn is_terminal(&self) -> bool {
        let Some(state) = &self.state else {
            return false;
        };
        if state.suspended || state.response.is_some() {
            return false;
        }
        state
            .graph
            .node(&state.node_id)
            .map(DialogueNode::is_terminal)
            .unwrap_or(false)
    }
}

fn plan_next(state: &EngineState) -> Result<Step, EngineError> {
    let active = require_active(state)?;
    if active.is_decision_point() {
        return Err(EngineError::invalid_action(
            "a choice is pending; pick one instead of advancing",
        ));
    }
    if let Some(response) = &state.response {
        // The response's own continuation wins over the parked target.
        if let Some(next) = &response.node.default_next_id {
            return Ok(Step::Move(next.clone()));
        }
        return Ok(match &response.target {
            ParkedTarget::Node(id) => Step::Move(id.clone()),
            ParkedTarget::Scene(id) => Step::SceneChange(id.clone()),
        });
    }
    match &active.default_next_id {
        Some(next) => Ok(Step::Move(next.clone())),
        None => Err(EngineError::TerminalReached),
    }
}

fn plan_choice(state: &EngineState, index: usize) -> Result<Step, EngineError> {
    let active = require_active(state)?;
    if !active.is_decision_point() {
        return Err(EngineError::invalid_action("no choice is pending"));
    }
    let count = active.choices.len();
    let Some(choice) = active.choices.get(index) else {
        return Err(EngineError::invalid_action(format!(
            "choice index {index} is out of range (0..{count})"
        )));
    };
    let target = parked_target(state, choice)?;
    match &choice.response {
        Some(node) => Ok(Step::ShowResponse {
            node: (**node).clone(),
            target,
        }),
        None => Ok(match target {
            ParkedTarget::Node(id) => Step::Move(id),
            ParkedTarget::Scene(id) => Step::SceneChange(id),
        }),
    }
}

fn parked_target(state: &EngineState, choice: &Choice) -> Result<ParkedTarget, EngineError> {
    match choice.target() {
        Some(ChoiceTarget::Node(id)) => Ok(ParkedTarget::Node(id.to_string())),
        Some(ChoiceTarget::Scene(id)) => Ok(ParkedTarget::Scene(id.to_string())),
        None => Err(EngineError::malformed(
            &state.scene_id,
            format!("node \"{}\": choice has no usable target", state.node_id),
        )),
    }
}

fn require_active(state: &EngineState) -> Result<&DialogueNode, EngineError> {
    state.active_node().ok_or_else(|| {
        EngineError::malformed(
            &state.scene_id,
            format!("node \"{}\" is not in the graph", state.node_id),
        )
    })
}
