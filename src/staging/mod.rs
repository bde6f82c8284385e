//! Staging of bundled model payloads into writable storage.
//!
//! A native engine can only open regular files, so the packaged model is
//! copied once into the application's data directory. The copy lands in a
//! `<name>.part` sibling first and is renamed into place after it has been
//! flushed, so the destination is either absent or complete.

mod bundle;

pub use bundle::{AssetBundle, DirectoryBundle};

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::StagingError;

const PART_SUFFIX: &str = ".part";

/// A packaged model and the path it is staged to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAsset {
    name: String,
    staged_path: PathBuf,
}

impl ModelAsset {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn staged_path(&self) -> &Path {
        &self.staged_path
    }

    fn part_path(&self) -> PathBuf {
        let mut part = self.staged_path.clone().into_os_string();
        part.push(PART_SUFFIX);
        PathBuf::from(part)
    }
}

/// Copies bundled assets into a writable storage root, at most once.
pub struct AssetStager {
    bundle: Arc<dyn AssetBundle>,
    storage_root: PathBuf,
    verify_size: bool,
}

impl AssetStager {
    pub fn new(bundle: Arc<dyn AssetBundle>, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            bundle,
            storage_root: storage_root.into(),
            verify_size: true,
        }
    }

    /// Compare an already-staged file's size against the bundled asset.
    pub fn with_size_verification(mut self, verify: bool) -> Self {
        self.verify_size = verify;
        self
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Resolve the deterministic staged path for an asset name.
    ///
    /// Names must be a single path component; anything else cannot name a
    /// bundled asset.
    pub fn resolve(&self, name: &str) -> Result<ModelAsset, StagingError> {
        let is_plain = !name.is_empty()
            && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name);
        if !is_plain {
            return Err(StagingError::AssetMissing {
                name: name.to_string(),
            });
        }

        Ok(ModelAsset {
            name: name.to_string(),
            staged_path: self.storage_root.join(name),
        })
    }

    /// Make sure the named asset exists in writable storage and return its path.
    pub fn ensure_staged(&self, name: &str) -> Result<PathBuf, StagingError> {
        let asset = self.resolve(name)?;

        if !self.bundle.contains(asset.name()) {
            return Err(StagingError::AssetMissing {
                name: asset.name().to_string(),
            });
        }

        if self.is_staged(&asset)? {
            debug!(path = %asset.staged_path().display(), "Asset already staged");
            return Ok(asset.staged_path().to_path_buf());
        }

        fs::create_dir_all(&self.storage_root)
            .map_err(|e| StagingError::storage(&self.storage_root, e))?;

        let part = asset.part_path();
        match self.copy_to(&asset, &part) {
            Ok(bytes) => {
                info!(
                    asset = asset.name(),
                    bytes,
                    path = %asset.staged_path().display(),
                    "Staged model asset"
                );
                Ok(asset.staged_path().to_path_buf())
            }
            Err(e) => {
                remove_if_present(&part);
                remove_if_present(asset.staged_path());
                warn!(asset = asset.name(), error = %e, "Staging failed, partial output removed");
                Err(e)
            }
        }
    }

    /// Existence fast path, plus a length check when enabled and available.
    fn is_staged(&self, asset: &ModelAsset) -> Result<bool, StagingError> {
        let metadata = match fs::metadata(asset.staged_path()) {
            Ok(m) if m.is_file() => m,
            Ok(_) => {
                return Err(StagingError::storage(
                    asset.staged_path(),
                    io::Error::new(io::ErrorKind::AlreadyExists, "destination is not a regular file"),
                ))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StagingError::storage(asset.staged_path(), e)),
        };

        if !self.verify_size {
            return Ok(true);
        }

        match self.bundle.asset_len(asset.name()) {
            Some(expected) if expected != metadata.len() => {
                warn!(
                    asset = asset.name(),
                    expected,
                    found = metadata.len(),
                    "Staged asset size mismatch, staging again"
                );
                fs::remove_file(asset.staged_path())
                    .map_err(|e| StagingError::storage(asset.staged_path(), e))?;
                Ok(false)
            }
            _ => Ok(true),
        }
    }

    fn copy_to(&self, asset: &ModelAsset, part: &Path) -> Result<u64, StagingError> {
        remove_if_present(part);

        let mut reader = self.bundle.open(asset.name()).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StagingError::AssetMissing {
                    name: asset.name().to_string(),
                }
            } else {
                StagingError::storage(part, e)
            }
        })?;

        debug!(asset = asset.name(), part = %part.display(), "Copying bundled asset");

        let file = File::create(part).map_err(|e| StagingError::storage(part, e))?;
        let mut writer = BufWriter::new(file);
        let bytes = io::copy(&mut reader, &mut writer).map_err(|e| StagingError::storage(part, e))?;
        let file = writer
            .into_inner()
            .map_err(|e| StagingError::storage(part, e.into_error()))?;
        file.sync_all().map_err(|e| StagingError::storage(part, e))?;
        drop(file);

        fs::rename(part, asset.staged_path())
            .map_err(|e| StagingError::storage(asset.staged_path(), e))?;
        Ok(bytes)
    }
}

fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed partial file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial file"),
    }
}
