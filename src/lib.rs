//! Voice Chatbot - a voice and text chat widget with its companion backend
//!
//! This library provides:
//! - The conversation controller that keeps capture, the remote call and
//!   playback from overlapping
//! - Native speech capture (microphone + Whisper) and playback backends
//! - A persisted transcript in a local key-value store
//! - The chat backend answering as a configurable persona
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  Front end (chat CLI)                │
//! └──────────────────────────┬───────────────────────────┘
//!                            │ commands / updates
//! ┌──────────────────────────▼───────────────────────────┐
//! │               ConversationController                 │
//! │   Capture  │  Chat client  │  Playback  │  Transcript │
//! └──────────────────────────┬───────────────────────────┘
//!                            │ POST /api/chat
//! ┌──────────────────────────▼───────────────────────────┐
//! │             Backend (persona + LLM)                  │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod llm;
pub mod persona;
pub mod voice;

pub use client::{ChatClient, HttpChatClient};
pub use config::Config;
pub use conversation::{
    Capabilities, Command, ControllerSettings, ConversationController, InteractionState, Message,
    Role, Status, StatusKind, Transcript, Update,
};
pub use db::{DbConn, DbPool, KeyValueStore, MemoryStore, SqliteStore};
pub use error::{Error, Result};
pub use persona::Persona;
