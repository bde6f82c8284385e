//! Shared fixtures: a scriptable engine and an in-memory bundle.

#![allow(dead_code)]

use llm_bridge::{
    AssetBundle, AssetStager, EngineError, InferenceEngine, LoadSettings, ModelService,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tempfile::TempDir;

pub const ASSET: &str = "model.task";
pub const PAYLOAD: &[u8] = b"not really model weights";

/// Counters shared between a test and the engine on the worker thread.
#[derive(Clone, Default)]
pub struct EngineProbe {
    pub loads: Arc<AtomicUsize>,
    pub generates: Arc<AtomicUsize>,
    pub releases: Arc<AtomicUsize>,
    pub overlaps: Arc<AtomicUsize>,
    pub loaded_paths: Arc<Mutex<Vec<PathBuf>>>,
    busy: Arc<AtomicBool>,
}

impl EngineProbe {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn generates(&self) -> usize {
        self.generates.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Live handles: loads that were not released.
    pub fn live(&self) -> usize {
        self.loads() - self.releases()
    }

    fn enter(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn exit(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

pub struct FakeHandle {
    max_tokens: usize,
}

/// Engine whose behavior each test scripts.
#[derive(Default)]
pub struct FakeEngine {
    pub probe: EngineProbe,
    /// Blocks `load` until the test sends on the paired sender.
    pub load_gate: Option<mpsc::Receiver<()>>,
    /// Number of leading `load` calls that fail.
    pub failing_loads: usize,
    pub fail_generate: bool,
    pub fail_release: bool,
    pub empty_output: bool,
    pub generate_delay: Duration,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a gate and return the sender that opens it.
    pub fn gated(mut self) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        self.load_gate = Some(rx);
        (self, tx)
    }

    pub fn with_generate_delay(mut self, delay: Duration) -> Self {
        self.generate_delay = delay;
        self
    }
}

impl InferenceEngine for FakeEngine {
    type Handle = FakeHandle;

    fn load(&mut self, path: &Path, max_tokens: usize) -> Result<FakeHandle, EngineError> {
        self.probe.enter();
        if let Some(gate) = &self.load_gate {
            let _ = gate.recv();
        }
        self.probe.exit();

        if self.failing_loads > 0 {
            self.failing_loads -= 1;
            return Err(EngineError::Load("insufficient memory".into()));
        }
        self.probe.loaded_paths.lock().push(path.to_path_buf());
        self.probe.loads.fetch_add(1, Ordering::SeqCst);
        Ok(FakeHandle { max_tokens })
    }

    fn generate(&mut self, handle: &mut FakeHandle, prompt: &str) -> Result<String, EngineError> {
        self.probe.enter();
        std::thread::sleep(self.generate_delay);
        self.probe.generates.fetch_add(1, Ordering::SeqCst);
        self.probe.exit();

        if self.fail_generate {
            return Err(EngineError::Generation("decode failed".into()));
        }
        if self.empty_output {
            return Ok(String::new());
        }
        Ok(format!("echo: {prompt} [{}]", handle.max_tokens))
    }

    fn release(&mut self, _handle: FakeHandle) -> Result<(), EngineError> {
        self.probe.releases.fetch_add(1, Ordering::SeqCst);
        if self.fail_release {
            return Err(EngineError::Release("device busy".into()));
        }
        Ok(())
    }
}

/// Bundle held in memory, counting every open.
#[derive(Clone, Default)]
pub struct MemoryBundle {
    assets: HashMap<String, Vec<u8>>,
    /// Readers fail after yielding this many bytes.
    fail_after: Option<usize>,
    pub opens: Arc<AtomicUsize>,
}

impl MemoryBundle {
    pub fn with_asset(name: &str, bytes: &[u8]) -> Self {
        let mut bundle = Self::default();
        bundle.assets.insert(name.to_string(), bytes.to_vec());
        bundle
    }

    pub fn failing_after(mut self, bytes: usize) -> Self {
        self.fail_after = Some(bytes);
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl AssetBundle for MemoryBundle {
    fn contains(&self, name: &str) -> bool {
        self.assets.contains_key(name)
    }

    fn asset_len(&self, name: &str) -> Option<u64> {
        self.assets.get(name).map(|bytes| bytes.len() as u64)
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        let bytes = self
            .assets
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string()))?;
        self.opens.fetch_add(1, Ordering::SeqCst);

        Ok(match self.fail_after {
            Some(limit) => Box::new(FailingReader {
                inner: Cursor::new(bytes),
                remaining: limit,
            }),
            None => Box::new(Cursor::new(bytes)),
        })
    }
}

/// Yields `remaining` bytes, then an I/O error.
struct FailingReader {
    inner: Cursor<Vec<u8>>,
    remaining: usize,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
        }
        let len = buf.len().min(self.remaining);
        let read = self.inner.read(&mut buf[..len])?;
        self.remaining -= read;
        Ok(read)
    }
}

pub fn settings() -> LoadSettings {
    LoadSettings {
        asset_name: ASSET.to_string(),
        max_tokens: 64,
    }
}

/// A running service over a fake engine, staging into a temp directory.
pub struct Harness {
    pub service: ModelService,
    pub probe: EngineProbe,
    pub bundle: MemoryBundle,
    pub data: TempDir,
}

pub fn start(engine: FakeEngine, bundle: MemoryBundle) -> Harness {
    let data = TempDir::new().unwrap();
    start_in(engine, bundle, data)
}

pub fn start_in(engine: FakeEngine, bundle: MemoryBundle, data: TempDir) -> Harness {
    let probe = engine.probe.clone();
    let stager = AssetStager::new(Arc::new(bundle.clone()), data.path());
    let service = ModelService::start(engine, stager, settings()).unwrap();
    Harness {
        service,
        probe,
        bundle,
        data,
    }
}

pub fn default_harness() -> Harness {
    start(FakeEngine::new(), MemoryBundle::with_asset(ASSET, PAYLOAD))
}
