//! Asynchronous request/response surface over the lifecycle worker.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │        LocalModelBridge (cloneable)              │
//! │  - validates prompts, reject-fast admission     │
//! │  - sender: mpsc::UnboundedSender<Request>       │
//! └───────────────────────┬─────────────────────────┘
//!                         │ sends request + oneshot reply
//!                         ▼
//! ┌─────────────────────────────────────────────────┐
//! │            LifecycleController                   │
//! │  - engine + loaded handle                       │
//! │  - runs on the dedicated worker thread          │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! [`ModelService`] owns the worker thread; dropping it releases the model.

mod local;
mod service;

pub use local::LocalModelBridge;
pub use service::ModelService;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::BridgeError;
use crate::generation::GenerationResult;
use crate::lifecycle::LifecycleState;

/// The load/generate/unload contract exposed to a UI.
///
/// Every call resolves to a success value or a classified [`BridgeError`];
/// nothing panics or escapes as an untyped error.
#[async_trait]
pub trait ModelBridge: Send + Sync {
    /// Stage and load the model. Resolves to a status message.
    async fn load_model(&self) -> Result<String, BridgeError>;

    /// Generate text for a non-blank prompt.
    async fn generate_text(&self, prompt: &str) -> Result<GenerationResult, BridgeError>;

    /// Release the loaded model. Resolves to a status message.
    async fn unload_model(&self) -> Result<String, BridgeError>;

    /// Latest published lifecycle state.
    fn state(&self) -> LifecycleState;

    /// Receiver notified on every lifecycle transition.
    fn subscribe(&self) -> watch::Receiver<LifecycleState>;
}
