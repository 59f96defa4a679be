//! Build-time localization of remote CMS media.
//!
//! Content files are scanned for URLs under a configured origin, every
//! referenced asset is downloaded once into the publishable output directory,
//! and on success the content is rewritten to point at the local copies.
//! Validators from previous builds live in a cache manifest so unchanged
//! assets cost a single conditional request.
//!
//! # Architecture
//!
//! - [`config`] - Layered configuration and validation into [`Settings`]
//! - [`policy`] - Whether a failed run fails the build
//! - [`sync`] - The [`MediaSync`] pipeline
//!
//! The building blocks live in their own crates: `mediasync-content`
//! (resolver, scanner, rewriter), `mediasync-manifest` (cache manifest),
//! `mediasync-fetch` (downloads) and `mediasync-fs` (atomic writes).

pub mod config;
mod error;
pub mod policy;
pub mod sync;

pub use config::{ConfigError, Settings, SyncConfig};
pub use error::{Error, Result};
pub use policy::ErrorPolicy;
pub use sync::{MediaSync, Phase, SyncOutcome, SyncSummary};

pub use mediasync_content as content;
pub use mediasync_fetch as fetch;
pub use mediasync_manifest as manifest;
