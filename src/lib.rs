//! Kviss - Video ingestion, transcription, and question generation.
//!
//! The name "Kviss" is the Norwegian spelling of "quiz."
//!
//! # Overview
//!
//! Kviss ingests YouTube videos and turns them into study material:
//! - Download a video's audio with yt-dlp
//! - Split oversized audio at silence boundaries with FFmpeg
//! - Transcribe speech through a local or hosted Whisper-style backend
//! - Embed transcription text for semantic search (stored for future use)
//! - Generate educational questions with an LLM backend
//!
//! Everything is driven over a REST API; batches run sequentially per
//! request and report per-item outcomes in-band.
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `store` - SQLite persistence for all entities
//! - `media` - yt-dlp fetcher, subprocess plumbing, orphan sweep
//! - `chunking` - Silence-boundary audio splitting
//! - `transcription` - Speech-to-text providers and pipeline
//! - `embedding` - Embedding generation
//! - `questions` - LLM-backed question generation
//! - `orchestrator` - Batch coordination
//! - `server` - HTTP surface
//!
//! # Example
//!
//! ```rust,no_run
//! use kviss::config::Settings;
//! use kviss::server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     server::run_serve("127.0.0.1", 8000, settings).await
//! }
//! ```

pub mod chunking;
pub mod config;
pub mod embedding;
pub mod error;
pub mod media;
pub mod openai;
pub mod orchestrator;
pub mod questions;
pub mod retry;
pub mod server;
pub mod store;
pub mod transcription;

pub use error::{KvissError, Result};
