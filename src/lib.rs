//! Core modules for the Kaiwa visual novel, rewritten in Rust.
//!
//! The crate exposes the dialogue progression engine and its collaborator
//! interfaces so bespoke runtimes or tooling can be composed around the
//! Kaiwa story format.  Rendering, audio playback and platform integration
//! are intentionally kept outside of the crate so that the code remains
//! testable and easy to embed in headless tools.

pub mod archive;
pub mod engine;
pub mod error;
pub mod progress;
pub mod settings;
pub mod speakers;
pub mod story;
#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use archive::{ContentStore, StoryArchive};
pub use engine::{AdvanceAction, DialogueEngine};
pub use error::EngineError;
pub use progress::{keys, FileProgress, MemoryProgress, ProgressStore};
pub use settings::{GameSettings, LanguageMode};
pub use speakers::{SpeakerMap, SpeakerResolver, PLAYER_SPEAKER};
pub use story::{Choice, ChoiceTarget, DialogueNode, LocalizedText, SceneGraph};
