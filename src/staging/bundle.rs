//! Bundled asset namespaces.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Read-only namespace of assets shipped with the application.
///
/// Implementations only need to answer existence, optionally report the
/// payload length, and hand out a byte reader.
pub trait AssetBundle: Send + Sync {
    /// Whether the bundle contains an asset with this name.
    fn contains(&self, name: &str) -> bool;

    /// Payload length in bytes, if the bundle can tell without reading it.
    fn asset_len(&self, name: &str) -> Option<u64>;

    /// Open the asset for a byte-for-byte copy.
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>>;
}

/// Bundle backed by a plain directory, one file per asset.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn asset_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl AssetBundle for DirectoryBundle {
    fn contains(&self, name: &str) -> bool {
        self.asset_path(name).is_file()
    }

    fn asset_len(&self, name: &str) -> Option<u64> {
        std::fs::metadata(self.asset_path(name)).ok().map(|m| m.len())
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        let file = File::open(self.asset_path(name))?;
        Ok(Box::new(file))
    }
}
