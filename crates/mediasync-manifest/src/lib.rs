//! Cache manifest: validators remembered between builds.
//!
//! The manifest maps cache keys to the ETag / Last-Modified pair last seen for
//! an asset so the next build can issue conditional requests. It is build
//! metadata and must live outside the publishable output tree.

mod entry;
mod error;
mod store;

pub use entry::{CacheEntry, Entries};
pub use error::{Error, Result};
pub use store::{JsonManifestStore, ManifestStore, MemoryManifestStore, merge};
