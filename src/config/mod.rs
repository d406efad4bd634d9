//! Configuration module for Kviss.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, QuestionPrompts};
pub use settings::{
    AudioFormat, ChunkingSettings, EmbeddingSettings, LlmSettings, ServerSettings, Settings,
    StorageSettings, TranscriptionProvider, TranscriptionSettings,
};
