//! Owner of the lifecycle worker thread.

use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

use super::LocalModelBridge;
use crate::config::BridgeConfig;
use crate::engine::InferenceEngine;
use crate::lifecycle::{LifecycleController, LoadSettings, SharedState};
use crate::staging::{AssetStager, DirectoryBundle};

const WORKER_THREAD_NAME: &str = "llm-bridge-worker";

/// Runs the lifecycle controller on a dedicated thread.
///
/// Engine handles are created, used and released on that thread only, so
/// backends with non-`Send` handles work unchanged. Hand out clients with
/// [`ModelService::bridge`]; dropping the service releases any loaded model
/// and joins the worker.
pub struct ModelService {
    bridge: LocalModelBridge,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ModelService {
    /// Spawn the worker with an engine and a stager.
    #[instrument(skip_all, fields(asset = %settings.asset_name, max_tokens = settings.max_tokens))]
    pub fn start<E: InferenceEngine>(
        engine: E,
        stager: AssetStager,
        settings: LoadSettings,
    ) -> io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(SharedState::new());

        let worker_state = state.clone();
        let worker = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                LifecycleController::new(engine, stager, settings, worker_state).run(rx);
            })?;

        info!("Model service started");
        Ok(Self {
            bridge: LocalModelBridge::new(tx, state),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Spawn the worker with a directory bundle and storage root taken from
    /// configuration.
    pub fn from_config<E: InferenceEngine>(engine: E, config: &BridgeConfig) -> io::Result<Self> {
        let bundle = Arc::new(DirectoryBundle::new(&config.storage.bundle_dir));
        let stager = AssetStager::new(bundle, config.storage.data_dir())
            .with_size_verification(config.storage.verify_size);
        let settings = LoadSettings {
            asset_name: config.model.asset_name.clone(),
            max_tokens: config.model.max_tokens,
        };
        Self::start(engine, stager, settings)
    }

    /// A client for the worker. Clones share the same queue.
    pub fn bridge(&self) -> LocalModelBridge {
        self.bridge.clone()
    }

    /// Release any loaded model and wait for the worker to exit.
    ///
    /// Requests already queued ahead of the shutdown still run first.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.bridge.request_shutdown(Some(tx)) {
            let _ = rx.await;
        }

        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        match tokio::task::spawn_blocking(move || worker.join()).await {
            Ok(Ok(())) => info!("Model service stopped"),
            Ok(Err(_)) => warn!("Lifecycle worker panicked"),
            Err(e) => warn!(error = %e, "Failed to join lifecycle worker"),
        }
    }
}

impl Drop for ModelService {
    fn drop(&mut self) {
        let Some(worker) = self.worker.get_mut().take() else {
            return;
        };
        debug!("Dropping model service, stopping worker");
        self.bridge.request_shutdown(None);
        if worker.join().is_err() {
            warn!("Lifecycle worker panicked");
        }
    }
}
