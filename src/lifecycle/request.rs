//! Request types for the lifecycle worker.
//!
//! Every variant carries a oneshot reply channel; the worker answers each
//! request exactly once, in submission order.

use tokio::sync::oneshot;

use crate::error::BridgeError;
use crate::generation::{GenerationRequest, GenerationResult};

pub type Reply<T> = oneshot::Sender<Result<T, BridgeError>>;

pub enum LifecycleRequest {
    /// Stage the configured asset and load it into the engine.
    Load { reply: Reply<String> },

    /// Run one generation against the loaded model.
    Generate {
        request: GenerationRequest,
        reply: Reply<GenerationResult>,
    },

    /// Release the loaded model.
    Unload { reply: Reply<String> },

    /// Release any held model and stop the worker.
    Shutdown { reply: Option<oneshot::Sender<()>> },
}

impl std::fmt::Debug for LifecycleRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load { .. } => write!(f, "LifecycleRequest::Load"),
            Self::Generate { request, .. } => {
                write!(
                    f,
                    "LifecycleRequest::Generate {{ prompt_len: {} }}",
                    request.prompt().len()
                )
            }
            Self::Unload { .. } => write!(f, "LifecycleRequest::Unload"),
            Self::Shutdown { .. } => write!(f, "LifecycleRequest::Shutdown"),
        }
    }
}
