//! In-process bridge client using channels.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use super::ModelBridge;
use crate::error::{BridgeError, ErrorKind};
use crate::generation::{GenerationRequest, GenerationResult};
use crate::lifecycle::{
    LifecycleRequest, LifecycleState, LoadAdmission, SharedState, ALREADY_LOADED_MESSAGE,
};

const WORKER_GONE: &str = "lifecycle worker is not running";

/// Lightweight, cloneable client handle for the lifecycle worker.
///
/// All clones talk to the same worker; requests from every clone are
/// executed in the order they were submitted.
#[derive(Clone)]
pub struct LocalModelBridge {
    sender: mpsc::UnboundedSender<LifecycleRequest>,
    state: Arc<SharedState>,
    observer: watch::Receiver<LifecycleState>,
}

impl LocalModelBridge {
    pub(crate) fn new(
        sender: mpsc::UnboundedSender<LifecycleRequest>,
        state: Arc<SharedState>,
    ) -> Self {
        let observer = state.subscribe();
        Self {
            sender,
            state,
            observer,
        }
    }

    pub(crate) fn request_shutdown(&self, reply: Option<oneshot::Sender<()>>) -> bool {
        self.sender
            .send(LifecycleRequest::Shutdown { reply })
            .is_ok()
    }

    async fn submit<T, F>(&self, make: F) -> Result<T, BridgeError>
    where
        T: Send,
        F: FnOnce(oneshot::Sender<Result<T, BridgeError>>) -> LifecycleRequest + Send,
    {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .map_err(|_| BridgeError::unavailable(WORKER_GONE))?;
        rx.await
            .map_err(|_| BridgeError::unavailable("lifecycle worker dropped the request"))?
    }
}

#[async_trait]
impl ModelBridge for LocalModelBridge {
    async fn load_model(&self) -> Result<String, BridgeError> {
        match self.state.admit_load() {
            LoadAdmission::Enqueue => {}
            LoadAdmission::AlreadyLoaded => {
                debug!("Load coalesced, model already loaded");
                return Ok(ALREADY_LOADED_MESSAGE.to_string());
            }
            LoadAdmission::Rejected(err) => return Err(err),
        }

        let result = self
            .submit(|reply| LifecycleRequest::Load { reply })
            .await;

        if let Err(err) = &result {
            if err.kind == ErrorKind::Unavailable {
                warn!("Load admitted but the worker is gone");
                self.state.abandon_preparing(WORKER_GONE);
            }
        }
        result
    }

    async fn generate_text(&self, prompt: &str) -> Result<GenerationResult, BridgeError> {
        let request = GenerationRequest::new(prompt)?;
        self.state.admit_loaded_operation()?;

        self.submit(|reply| LifecycleRequest::Generate { request, reply })
            .await
    }

    async fn unload_model(&self) -> Result<String, BridgeError> {
        self.state.admit_unload()?;

        self.submit(|reply| LifecycleRequest::Unload { reply }).await
    }

    fn state(&self) -> LifecycleState {
        self.observer.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.observer.clone()
    }
}
