use mediasync_fs::{AtomicWriteOptions, atomic_write};

use crate::error::{Error, Result};
use crate::resolver::MediaResolver;
use crate::scan::ContentDocument;
use crate::visit::rewrite_strings;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RewriteReport {
    pub documents_written: usize,
    pub substitutions:     usize,
}

/// Point every resolvable reference in `document` at its public path.
///
/// Returns the number of substitutions; the document is only modified in
/// memory.
pub fn rewrite_document(document: &mut ContentDocument, resolver: &MediaResolver) -> usize {
    rewrite_strings(&mut document.value, &mut |s| {
        resolver.resolve(s).map(|asset| asset.public_path)
    })
}

/// Rewrite all `documents` and persist the ones that changed.
///
/// Untouched documents are never written, so files without media references
/// keep their original bytes and modification time.
pub fn rewrite(documents: &mut [ContentDocument], resolver: &MediaResolver) -> Result<RewriteReport> {
    let mut report = RewriteReport::default();

    for document in documents.iter_mut() {
        let substitutions = rewrite_document(document, resolver);
        if substitutions == 0 {
            continue;
        }

        let mut bytes = serde_json::to_vec_pretty(&document.value).map_err(|source| Error::Serialize {
            path: document.path.clone(),
            source,
        })?;
        bytes.push(b'\n');
        atomic_write(&document.path, &bytes, AtomicWriteOptions::new())?;

        tracing::debug!(path = %document.path.display(), substitutions, "Rewrote content document");
        report.documents_written += 1;
        report.substitutions += substitutions;
    }

    Ok(report)
}
