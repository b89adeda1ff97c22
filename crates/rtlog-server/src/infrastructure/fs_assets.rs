//! Serves the viewer bundle from a directory on disk.

use std::io;
use std::path::PathBuf;

use crate::application::static_responder::AssetSource;

/// An [`AssetSource`] rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsAssets {
    root: PathBuf,
}

impl FsAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for FsAssets {
    fn load(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        let full = self.root.join(path.trim_start_matches('/'));
        match std::fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
