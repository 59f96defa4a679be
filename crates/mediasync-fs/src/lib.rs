//! Filesystem primitives shared by the mediasync crates.
//!
//! Every write goes through a sibling temporary file followed by a rename, so
//! readers never observe a half-written asset, document or manifest.

mod error;

pub use error::{Error, Result};

use std::fs;
use std::path::Path;

const TMP_PREFIX: &str = ".";
const TMP_SUFFIX: &str = ".mediasync.tmp";

#[derive(Clone, Copy, Debug)]
pub struct AtomicWriteOptions {
    sync: bool,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self { Self::new() }
}

impl AtomicWriteOptions {
    pub fn new() -> Self {
        Self { sync: false }
    }

    /// Flush the temporary file to disk before it is renamed into place.
    #[must_use]
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}

/// Create `path` and all of its parents.
///
/// Succeeds when the directory already exists, including when another worker
/// created it concurrently.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(_) if path.is_dir() => Ok(()),
        Err(source) => Err(Error::CreateDir {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Replace the contents of `path` with `content`, creating parent directories.
pub fn atomic_write(
    path: impl AsRef<Path>,
    content: &[u8],
    options: AtomicWriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::NoFileName(path.to_path_buf()))?
        .to_string_lossy();
    let parent = path.parent().unwrap_or(Path::new(""));
    if !parent.as_os_str().is_empty() {
        ensure_dir(parent)?;
    }

    let tmp_path = parent.join(format!("{TMP_PREFIX}{file_name}{TMP_SUFFIX}"));

    fs::write(&tmp_path, content).map_err(|source| Error::Write {
        path: tmp_path.clone(),
        source,
    })?;

    if options.sync {
        let synced = fs::File::open(&tmp_path).and_then(|file| file.sync_all());
        if let Err(source) = synced {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::Write {
                path: tmp_path,
                source,
            });
        }
    }

    fs::rename(&tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        Error::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

pub fn read(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}
