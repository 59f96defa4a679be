//! Discovery and rewriting of remote media references in JSON content.
//!
//! # Architecture
//!
//! - `resolver.rs` - Pure URL to cache key / destination / public path mapping
//! - `visit.rs` - Schema-agnostic traversal of JSON values
//! - `scan.rs` - Content tree walk producing the deduplicated asset set
//! - `rewrite.rs` - Substitution of public paths and write-back of changed files

mod error;
mod resolver;
mod rewrite;
mod scan;
pub mod visit;

pub use error::{Error, Result};
pub use resolver::{MediaResolver, ResolvedAsset};
pub use rewrite::{RewriteReport, rewrite, rewrite_document};
pub use scan::{ContentDocument, ScanReport, SkippedFile, scan};
