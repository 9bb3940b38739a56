//! Vidgate Core Library
//!
//! This crate provides the domain models, error types, configuration, and
//! validation shared across all Vidgate components: upload sessions, assets,
//! transcode profiles, and the processing handoff message.

pub mod assets;
pub mod config;
pub mod error;
pub mod models;
pub mod profiles;
pub mod retry;
pub mod validation;

// Re-export commonly used types
pub use assets::{AssetRepository, AssetUpsert, InMemoryAssetRepository};
pub use config::Config;
pub use error::AppError;
pub use profiles::{load_profiles, load_profiles_from_str, TranscodeProfile};
