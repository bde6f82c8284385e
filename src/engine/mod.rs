//! Inference engine abstraction.
//!
//! The lifecycle worker is the only caller of an engine. Every method is
//! blocking and is invoked from the worker thread, never concurrently.

use std::path::Path;

use crate::error::EngineError;

#[cfg(feature = "llamacpp")]
pub mod llamacpp;

#[cfg(feature = "llamacpp")]
pub use llamacpp::{LlamaCppEngine, LlamaCppHandle};

/// A native inference backend.
///
/// `Handle` is the live loaded-model resource. The engine value itself is
/// moved onto the worker thread; handles are created and dropped there, so
/// they need not be `Send`.
pub trait InferenceEngine: Send + 'static {
    type Handle;

    /// Load weights from `path`, bounding every later generation to
    /// `max_tokens` new tokens.
    fn load(&mut self, path: &Path, max_tokens: usize) -> Result<Self::Handle, EngineError>;

    /// Run a single prompt-to-text generation.
    fn generate(&mut self, handle: &mut Self::Handle, prompt: &str) -> Result<String, EngineError>;

    /// Release a loaded model. Called at most once per handle.
    fn release(&mut self, handle: Self::Handle) -> Result<(), EngineError>;
}
