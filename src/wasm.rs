#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use js_sys::Function;
use wasm_bindgen::prelude::*;

use crate::archive::{ContentStore, StoryArchive};
use crate::engine::{AdvanceAction, DialogueEngine};
use crate::error::EngineError;
use crate::progress::ProgressStore;
use crate::settings::GameSettings;
use crate::speakers::SpeakerResolver;

#[wasm_bindgen(start)]
pub fn init_logging() {
    console_error_panic_hook::set_once();
}

/// Progress store over the browser's `localStorage`, namespaced by a save
/// key so several stories can share one origin.
struct LocalStorageProgress {
    storage: web_sys::Storage,
    prefix: String,
}

impl LocalStorageProgress {
    fn new(prefix: impl Into<String>) -> Result<Self, EngineError> {
        let storage = web_sys::window()
            .and_then(|window| window.local_storage().ok().flatten())
            .ok_or_else(|| EngineError::persistence("localStorage is not available"))?;
        Ok(Self {
            storage,
            prefix: prefix.into(),
        })
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}.{key}", self.prefix)
    }
}

impl ProgressStore for LocalStorageProgress {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(&self.scoped(key)).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), EngineError> {
        self.storage
            .set_item(&self.scoped(key), value)
            .map_err(|err| EngineError::persistence(format!("localStorage write failed: {err:?}")))
    }

    fn remove(&self, key: &str) -> Result<(), EngineError> {
        self.storage
            .remove_item(&self.scoped(key))
            .map_err(|err| EngineError::persistence(format!("localStorage remove failed: {err:?}")))
    }
}

/// JavaScript-facing wrapper around the dialogue engine.
///
/// The presentation layer constructs one per session from the bundled story
/// JSON and drives it with the same action/query surface the native engine
/// exposes.
#[wasm_bindgen]
pub struct WasmEngine {
    inner: Rc<RefCell<DialogueEngine>>,
    progress: Arc<dyn ProgressStore>,
}

#[wasm_bindgen]
impl WasmEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(story_json: &str, save_key: &str) -> Result<WasmEngine, JsValue> {
        let archive = StoryArchive::from_json(story_json)
            .map_err(|err| JsValue::from_str(&format!("{err:?}")))?;
        let progress: Arc<dyn ProgressStore> = Arc::new(
            LocalStorageProgress::new(save_key)
                .map_err(|err| JsValue::from_str(&err.to_string()))?,
        );

        let settings = GameSettings::load(progress.as_ref());
        let speakers =
            SpeakerResolver::new(archive.speakers().clone(), settings.player_name.clone());
        let content: Arc<dyn ContentStore> = Arc::new(archive);
        let engine = DialogueEngine::new(content, Arc::clone(&progress), speakers);

        Ok(Self {
            inner: Rc::new(RefCell::new(engine)),
            progress,
        })
    }

    /// Registers the callback that receives scene-change requests; the
    /// JavaScript side answers by calling `load_scene` again.
    pub fn set_scene_callback(&self, callback: Function) {
        self.inner.borrow_mut().set_scene_listener(move |scene_id| {
            if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(scene_id)) {
                web_sys::console::error_1(&err);
            }
        });
    }

    pub fn load_scene(&self, scene_id: &str) -> Result<(), JsValue> {
        self.inner
            .borrow_mut()
            .load_scene(scene_id)
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }

    pub fn resume(&self) -> Result<(), JsValue> {
        self.inner
            .borrow_mut()
            .resume()
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }

    /// Applies an action by its wire name: `"next"`, or `"choice"` with an
    /// index.
    pub fn advance(&self, action: &str, value: Option<u32>) -> Result<(), JsValue> {
        let action = AdvanceAction::from_name(action, value.map(|index| index as usize))
            .ok_or_else(|| JsValue::from_str(&format!("unknown action \"{action}\"")))?;
        self.inner
            .borrow_mut()
            .advance(action)
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }

    pub fn primary_text(&self) -> String {
        self.inner.borrow().primary_text().to_string()
    }

    pub fn secondary_text(&self) -> String {
        self.inner.borrow().secondary_text().to_string()
    }

    pub fn speaker_name(&self) -> String {
        self.inner.borrow().speaker_name().to_string()
    }

    pub fn audio_ref(&self) -> Option<String> {
        self.inner.borrow().audio_ref().map(str::to_string)
    }

    pub fn is_choice_pending(&self) -> bool {
        self.inner.borrow().is_choice_pending()
    }

    pub fn is_terminal(&self) -> bool {
        self.inner.borrow().is_terminal()
    }

    pub fn is_scene_change_pending(&self) -> bool {
        self.inner.borrow().is_scene_change_pending()
    }

    pub fn scene_id(&self) -> Option<String> {
        self.inner.borrow().scene_id().map(str::to_string)
    }

    pub fn current_node_id(&self) -> Option<String> {
        self.inner.borrow().current_node_id().map(str::to_string)
    }

    /// The pending choices as a JSON array (labels plus targets), empty
    /// when no choice is offered.
    pub fn choices_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.inner.borrow().choices())
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }

    pub fn settings_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&GameSettings::load(self.progress.as_ref()))
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }

    /// Replaces the stored settings and applies the player name to the
    /// speaker resolver.
    pub fn store_settings(&self, settings_json: &str) -> Result<(), JsValue> {
        let settings: GameSettings = serde_json::from_str(settings_json)
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        let settings = settings.normalized();
        settings
            .save(self.progress.as_ref())
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        self.inner
            .borrow_mut()
            .set_player_name(settings.player_name);
        Ok(())
    }
}
