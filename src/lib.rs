//! Lifecycle and inference bridge for a single on-device language model.
//!
//! This crate provides the core functionality for:
//! - Staging a bundled model payload into writable storage
//! - Loading, generating with and releasing a native inference engine
//! - Serializing every engine call on one dedicated worker
//! - An async load/generate/unload surface with classified errors

pub mod bridge;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod history;
pub mod lifecycle;
pub mod staging;

pub use bridge::{LocalModelBridge, ModelBridge, ModelService};
pub use config::{BridgeConfig, ConfigArgs};
pub use engine::InferenceEngine;
pub use error::{BridgeError, EngineError, ErrorKind, Result, StagingError};
pub use generation::{GenerationRequest, GenerationResult};
pub use history::{GenerationHistory, HistoryEntry};
pub use lifecycle::{LifecycleState, LoadSettings};
pub use staging::{AssetBundle, AssetStager, DirectoryBundle};
