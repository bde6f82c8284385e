//! Worker-side lifecycle controller.
//!
//! The controller owns the engine and the loaded handle. It runs on the
//! dedicated worker thread and processes requests one at a time, so engine
//! calls never overlap.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::request::LifecycleRequest;
use super::state::{LifecycleState, SharedState};
use crate::engine::InferenceEngine;
use crate::error::{BridgeError, ErrorKind};
use crate::generation::{GenerationRequest, GenerationResult};
use crate::staging::AssetStager;

pub const LOADED_MESSAGE: &str = "Model loaded successfully";
pub const UNLOADED_MESSAGE: &str = "Model unloaded successfully";
pub const ALREADY_LOADED_MESSAGE: &str = "Model already loaded";

/// What to load: the bundled asset and the load-time token bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSettings {
    pub asset_name: String,
    pub max_tokens: usize,
}

pub(crate) struct LifecycleController<E: InferenceEngine> {
    engine: E,
    handle: Option<E::Handle>,
    stager: AssetStager,
    settings: LoadSettings,
    state: Arc<SharedState>,
}

impl<E: InferenceEngine> LifecycleController<E> {
    pub fn new(
        engine: E,
        stager: AssetStager,
        settings: LoadSettings,
        state: Arc<SharedState>,
    ) -> Self {
        Self {
            engine,
            handle: None,
            stager,
            settings,
            state,
        }
    }

    /// Main worker loop - processes requests until shutdown or every sender is gone.
    pub fn run(mut self, mut requests: mpsc::UnboundedReceiver<LifecycleRequest>) {
        debug!("Lifecycle worker started");
        while let Some(request) = requests.blocking_recv() {
            debug!(?request, "Processing request");
            match request {
                LifecycleRequest::Load { reply } => {
                    let result = self.handle_load();
                    let _ = reply.send(result);
                }
                LifecycleRequest::Generate { request, reply } => {
                    let result = self.handle_generate(request);
                    let _ = reply.send(result);
                }
                LifecycleRequest::Unload { reply } => {
                    let result = self.handle_unload();
                    let _ = reply.send(result);
                }
                LifecycleRequest::Shutdown { reply } => {
                    info!("Shutdown requested");
                    self.teardown();
                    if let Some(reply) = reply {
                        let _ = reply.send(());
                    }
                    break;
                }
            }
        }
        requests.close();
        self.teardown();
        info!("Lifecycle worker stopped");
    }

    fn handle_load(&mut self) -> Result<String, BridgeError> {
        // Queued behind work that left the model loaded.
        if self.handle.is_some() {
            debug!("Model already loaded when the load was dequeued");
            self.state.set(LifecycleState::Ready);
            return Ok(ALREADY_LOADED_MESSAGE.to_string());
        }

        self.state.set(LifecycleState::Preparing);
        let started = Instant::now();
        match self.stage_and_load() {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state.set(LifecycleState::Ready);
                info!(
                    asset = %self.settings.asset_name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model loaded"
                );
                Ok(LOADED_MESSAGE.to_string())
            }
            Err(err) => {
                error!(kind = %err.kind, error = %err.message, "Model preparation failed");
                self.state.set(LifecycleState::Error(err.message.clone()));
                Err(err)
            }
        }
    }

    fn stage_and_load(&mut self) -> Result<E::Handle, BridgeError> {
        let path = self.stager.ensure_staged(&self.settings.asset_name)?;

        info!(path = %path.display(), max_tokens = self.settings.max_tokens, "Loading model");
        self.engine
            .load(&path, self.settings.max_tokens)
            .map_err(|e| BridgeError::new(ErrorKind::LoadError, e.to_string()))
    }

    fn handle_generate(&mut self, request: GenerationRequest) -> Result<GenerationResult, BridgeError> {
        // Accepted while loaded, but an unload may have run since.
        let Some(handle) = self.handle.as_mut() else {
            return Err(BridgeError::model_not_loaded());
        };

        self.state.set(LifecycleState::Generating);
        let started = Instant::now();
        let outcome = self.engine.generate(handle, request.prompt());
        let inference_time_ms = started.elapsed().as_millis() as u64;
        self.state.set(LifecycleState::Ready);

        match outcome {
            Ok(text) if text.is_empty() => {
                warn!(inference_time_ms, "Engine returned no text");
                Err(BridgeError::new(
                    ErrorKind::GenerationError,
                    "generation failed: engine returned no text",
                ))
            }
            Ok(text) => {
                info!(inference_time_ms, chars = text.chars().count(), "Generation complete");
                Ok(GenerationResult {
                    text,
                    inference_time_ms,
                })
            }
            Err(e) => {
                warn!(error = %e, inference_time_ms, "Generation failed, model stays loaded");
                Err(BridgeError::new(ErrorKind::GenerationError, e.to_string()))
            }
        }
    }

    fn handle_unload(&mut self) -> Result<String, BridgeError> {
        let Some(handle) = self.handle.take() else {
            self.state.finish_unload(false);
            return Err(BridgeError::model_not_loaded());
        };

        let released = self.engine.release(handle);
        self.state.finish_unload(true);

        match released {
            Ok(()) => {
                info!("Model unloaded");
                Ok(UNLOADED_MESSAGE.to_string())
            }
            Err(e) => {
                warn!(error = %e, "Release failed, handle dropped anyway");
                Err(BridgeError::new(ErrorKind::UnloadError, e.to_string()))
            }
        }
    }

    /// Best-effort release of a held handle.
    fn teardown(&mut self) {
        if let Some(handle) = self.handle.take() {
            match self.engine.release(handle) {
                Ok(()) => info!("Released model on teardown"),
                Err(e) => warn!(error = %e, "Failed to release model on teardown"),
            }
            self.state.set(LifecycleState::Unloaded);
        }
    }
}
