// Path-addressed artifact store with an index-based visibility model.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::ARTIFACT_EXT;
use crate::error::Result;

/// Persistent store for downloaded mesh artifacts.
///
/// Artifacts are addressed by canonical path: `<root>/<group>/<code>.glb`,
/// where group is the map or map-set code. Visibility is index-based: a
/// freshly written file only answers `exists` after `refresh()` reindexes
/// the root, mirroring an importer's view of the store.
pub struct ArtifactStore {
    root: PathBuf,
    index: RwLock<HashSet<PathBuf>>,
}

impl ArtifactStore {
    pub fn new(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        let index = Self::scan(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            index: RwLock::new(index),
        })
    }

    /// Walk `<root>/<group>/` and collect every artifact file.
    fn scan(root: &Path) -> io::Result<HashSet<PathBuf>> {
        let mut index = HashSet::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            for file in fs::read_dir(entry.path())? {
                let file = file?;
                if file.file_type()?.is_file() {
                    index.insert(file.path());
                }
            }
        }
        Ok(index)
    }

    /// Canonical artifact path for (group, code).
    pub fn artifact_path(&self, group: &str, code: &str) -> PathBuf {
        self.root
            .join(group)
            .join(format!("{}.{}", code, ARTIFACT_EXT))
    }

    /// Existence check against the store's index. No content verification;
    /// identifiers are assumed content-stable and entries are never
    /// invalidated.
    pub fn exists(&self, path: &Path) -> bool {
        self.index.read().contains(path)
    }

    /// Persist a full artifact. The write is atomic from the caller's point
    /// of view (temp file + rename), and existence is re-verified against
    /// the filesystem immediately before writing so a racing sibling never
    /// writes the same path twice.
    pub fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        if path.is_file() {
            debug!("artifact already on disk, skipping write: {}", path.display());
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("part");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)?;
        debug!("persisted {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    /// Read a previously persisted artifact.
    pub fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    /// Reindex the store so newly written files become visible to
    /// subsequent existence checks and importers in the same run.
    pub fn refresh(&self) {
        match Self::scan(&self.root) {
            Ok(index) => *self.index.write() = index,
            Err(e) => warn!("store refresh failed: {}", e),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
