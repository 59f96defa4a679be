use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use mediasync_fs::{AtomicWriteOptions, atomic_write};
use serde::{Deserialize, Serialize};

use crate::entry::Entries;
use crate::error::Result;

const MANIFEST_VERSION: u32 = 1;

/// Load/save contract for the cache manifest.
///
/// The store owns the in-memory map between `load` and `save`. Callers never
/// mutate it directly: deltas are collected during a build and applied once
/// with `save`.
pub trait ManifestStore {
    /// Populate the in-memory map from the backing storage.
    ///
    /// Never fails: unreadable or corrupt storage yields an empty map.
    fn load(&mut self) -> &Entries;

    /// The current in-memory map.
    fn entries(&self) -> &Entries;

    /// Apply `upserts` then `removals`, persisting only if something changed.
    ///
    /// Returns whether the backing storage was written.
    fn save(&mut self, upserts: Entries, removals: &BTreeSet<String>) -> Result<bool>;
}

/// Apply deltas to `entries`, reporting whether the map changed.
pub fn merge(entries: &mut Entries, upserts: Entries, removals: &BTreeSet<String>) -> bool {
    let mut changed = false;

    for (key, entry) in upserts {
        if entries.get(&key) != Some(&entry) {
            entries.insert(key, entry);
            changed = true;
        }
    }

    for key in removals {
        changed |= entries.remove(key).is_some();
    }

    changed
}

#[derive(Serialize)]
struct ManifestFileRef<'a> {
    version: u32,
    entries: &'a Entries,
}

#[derive(Deserialize)]
struct ManifestFile {
    version: u32,
    #[serde(default)]
    entries: Entries,
}

/// Manifest persisted as a pretty-printed JSON file.
#[derive(Debug)]
pub struct JsonManifestStore {
    path:    PathBuf,
    entries: Entries,
}

impl JsonManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path:    path.into(),
            entries: Entries::new(),
        }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn read(&self) -> Option<Entries> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No cache manifest yet");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Cache manifest unreadable; starting empty");
                return None;
            }
        };

        match serde_json::from_slice::<ManifestFile>(&bytes) {
            Ok(file) if file.version == MANIFEST_VERSION => Some(file.entries),
            Ok(file) => {
                tracing::warn!(
                    path = %self.path.display(),
                    version = file.version,
                    "Unsupported cache manifest version; starting empty"
                );
                None
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Cache manifest corrupt; starting empty");
                None
            }
        }
    }
}

impl ManifestStore for JsonManifestStore {
    fn load(&mut self) -> &Entries {
        self.entries = self.read().unwrap_or_default();
        tracing::debug!(path = %self.path.display(), entries = self.entries.len(), "Loaded cache manifest");
        &self.entries
    }

    fn entries(&self) -> &Entries { &self.entries }

    fn save(&mut self, upserts: Entries, removals: &BTreeSet<String>) -> Result<bool> {
        if !merge(&mut self.entries, upserts, removals) {
            return Ok(false);
        }

        let file = ManifestFileRef {
            version: MANIFEST_VERSION,
            entries: &self.entries,
        };
        let mut bytes = serde_json::to_vec_pretty(&file)?;
        bytes.push(b'\n');
        atomic_write(&self.path, &bytes, AtomicWriteOptions::new().sync(true))?;

        tracing::debug!(path = %self.path.display(), entries = self.entries.len(), "Saved cache manifest");
        Ok(true)
    }
}

/// Manifest held only in memory.
#[derive(Debug, Default)]
pub struct MemoryManifestStore {
    entries: Entries,
    writes:  usize,
}

impl MemoryManifestStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_entries(entries: Entries) -> Self { Self { entries, writes: 0 } }

    /// Number of `save` calls that changed the map.
    pub fn writes(&self) -> usize { self.writes }
}

impl ManifestStore for MemoryManifestStore {
    fn load(&mut self) -> &Entries { &self.entries }

    fn entries(&self) -> &Entries { &self.entries }

    fn save(&mut self, upserts: Entries, removals: &BTreeSet<String>) -> Result<bool> {
        let changed = merge(&mut self.entries, upserts, removals);
        if changed {
            self.writes += 1;
        }
        Ok(changed)
    }
}
