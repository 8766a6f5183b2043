//! Shared types, error model, and configuration for notescout.
//!
//! This crate is the foundation depended on by all other notescout crates.
//! It provides:
//! - [`NoteScoutError`]: the unified error type
//! - Domain types ([`NoteRef`], [`Record`], [`SortPolicy`], [`RunId`])
//! - Configuration ([`AppConfig`], [`CollectConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiConfig, AppConfig, CollectConfig, CollectSection, DelayRange, SessionConfig, SignerConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, read_cookie,
};
pub use error::{NoteScoutError, Result};
pub use types::{COLUMNS, NOTE_ID_LEN, NoteRef, Record, RunId, SortPolicy, URL_SEPARATOR};
