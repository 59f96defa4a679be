use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::resolver::{MediaResolver, ResolvedAsset};
use crate::visit::visit_strings;

/// A parsed content file, kept around for the rewrite pass.
#[derive(Clone, Debug)]
pub struct ContentDocument {
    pub path:  PathBuf,
    pub value: Value,
}

/// A file that was found but could not be read or parsed.
#[derive(Clone, Debug)]
pub struct SkippedFile {
    pub path:   PathBuf,
    pub reason: String,
}

/// Result of walking a content tree.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Distinct assets keyed by cache key. The first reference seen wins.
    pub assets:             BTreeMap<String, ResolvedAsset>,
    /// Every successfully parsed document, whether or not it references media.
    pub documents:          Vec<ContentDocument>,
    /// Number of `.json` files encountered, including skipped ones.
    pub files_seen:         usize,
    /// Documents holding at least one resolvable reference.
    pub matching_documents: usize,
    pub skipped:            Vec<SkippedFile>,
}

impl ScanReport {
    pub fn references_media(&self) -> bool { !self.assets.is_empty() }
}

/// Walk `root` and collect every remote media reference found in `.json` files.
///
/// Unreadable or malformed files are logged and skipped; they never fail the
/// scan. The only error is a missing root.
pub fn scan(root: impl AsRef<Path>, resolver: &MediaResolver) -> Result<ScanReport> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::MissingRoot(root.to_path_buf()));
    }

    let mut report = ScanReport::default();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable content entry");
                report.skipped.push(SkippedFile {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_json(entry.path()) {
            continue;
        }
        report.files_seen += 1;

        let path = entry.into_path();
        let value = match read_document(&path) {
            Ok(value) => value,
            Err(reason) => {
                tracing::warn!(path = %path.display(), %reason, "Skipping malformed content file");
                report.skipped.push(SkippedFile { path, reason });
                continue;
            }
        };

        let before = report.assets.len();
        let mut matched = false;
        visit_strings(&value, &mut |s| {
            if let Some(asset) = resolver.resolve(s) {
                matched = true;
                report.assets.entry(asset.cache_key.clone()).or_insert(asset);
            }
        });
        if matched {
            report.matching_documents += 1;
            tracing::trace!(
                path = %path.display(),
                new_assets = report.assets.len() - before,
                "Found media references"
            );
        }

        report.documents.push(ContentDocument { path, value });
    }

    Ok(report)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn read_document(path: &Path) -> std::result::Result<Value, String> {
    let bytes = mediasync_fs::read(path).map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}
