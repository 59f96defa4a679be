//! Layered configuration: built-in defaults, then `mediasync.toml`, then
//! `MEDIASYNC_*` environment variables.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use mediasync_content::MediaResolver;
use mediasync_fetch::{Backoff, FetchOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::ErrorPolicy;

pub const CONFIG_FILE: &str = "mediasync.toml";
pub const ENV_PREFIX: &str = "MEDIASYNC_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] figment::Error),

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("retry_base_delay_ms must be at least 1")]
    ZeroRetryDelay,

    #[error("timeout_ms must be at least 1")]
    ZeroTimeout,

    #[error("media_dir must be a single path segment, got '{0}'")]
    InvalidMediaDir(String),

    #[error("origin must be an http(s) URL, got '{0}'")]
    InvalidOrigin(String),

    #[error("manifest '{manifest}' must not live inside the output directory '{output}'")]
    ManifestInOutput { manifest: PathBuf, output: PathBuf },
}

/// Raw user configuration. Every field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled:             bool,
    /// Scheme and host of the CMS, e.g. `https://cms.example`. Unset disables syncing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin:              Option<String>,
    pub remote_media_path:   String,
    pub content_dir:         PathBuf,
    pub output_dir:          PathBuf,
    pub media_dir:           String,
    pub manifest_path:       PathBuf,
    pub concurrency:         usize,
    pub max_retries:         u32,
    pub retry_base_delay_ms: u64,
    pub timeout_ms:          u64,
    pub backoff:             Backoff,
    pub max_retry_after_ms:  u64,
    pub skip_unchanged:      bool,
    pub rewrite_content:     bool,
    /// Force the error policy; unset means detect from the environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict:              Option<bool>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled:             true,
            origin:              None,
            remote_media_path:   "media".into(),
            content_dir:         "src/content".into(),
            output_dir:          "public".into(),
            media_dir:           "media".into(),
            manifest_path:       ".mediasync/manifest.json".into(),
            concurrency:         6,
            max_retries:         3,
            retry_base_delay_ms: 500,
            timeout_ms:          30_000,
            backoff:             Backoff::Linear,
            max_retry_after_ms:  30_000,
            skip_unchanged:      true,
            rewrite_content:     true,
            strict:              None,
        }
    }
}

impl SyncConfig {
    /// The provider stack; a missing file is not an error.
    pub fn figment(file: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn load(file: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment(file).extract()?)
    }

    /// Validate and resolve relative paths against `root`.
    pub fn settings(&self, root: impl AsRef<Path>) -> Result<Settings, ConfigError> {
        let root = root.as_ref();

        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.retry_base_delay_ms == 0 {
            return Err(ConfigError::ZeroRetryDelay);
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let media_dir = self.media_dir.trim_matches('/');
        if media_dir.is_empty() || media_dir.contains(['/', '\\']) || matches!(media_dir, "." | "..") {
            return Err(ConfigError::InvalidMediaDir(self.media_dir.clone()));
        }

        let origin_prefix = match self.origin.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(origin) => Some(origin_prefix(origin, &self.remote_media_path)?),
        };

        let output_dir = lexical(&root.join(&self.output_dir));
        let manifest_path = lexical(&root.join(&self.manifest_path));
        if manifest_path.starts_with(&output_dir) {
            return Err(ConfigError::ManifestInOutput {
                manifest: manifest_path,
                output:   output_dir,
            });
        }

        Ok(Settings {
            enabled: self.enabled,
            origin_prefix,
            content_dir: lexical(&root.join(&self.content_dir)),
            output_dir,
            media_dir: media_dir.to_owned(),
            manifest_path,
            concurrency: self.concurrency,
            fetch: FetchOptions::default()
                .max_retries(self.max_retries)
                .base_delay(Duration::from_millis(self.retry_base_delay_ms))
                .timeout(Duration::from_millis(self.timeout_ms))
                .backoff(self.backoff)
                .max_retry_after(Duration::from_millis(self.max_retry_after_ms))
                .skip_unchanged(self.skip_unchanged),
            rewrite_content: self.rewrite_content,
            strict: self.strict,
        })
    }
}

/// Validated configuration with absolute paths.
#[derive(Clone, Debug)]
pub struct Settings {
    pub enabled:         bool,
    /// `origin/remote_media_path/`, or `None` when no origin is configured.
    pub origin_prefix:   Option<String>,
    pub content_dir:     PathBuf,
    pub output_dir:      PathBuf,
    pub media_dir:       String,
    pub manifest_path:   PathBuf,
    pub concurrency:     usize,
    pub fetch:           FetchOptions,
    pub rewrite_content: bool,
    pub strict:          Option<bool>,
}

impl Settings {
    /// `None` when syncing is disabled or no origin is configured.
    pub fn resolver(&self) -> Option<MediaResolver> {
        if !self.enabled {
            return None;
        }
        let prefix = self.origin_prefix.as_deref()?;
        Some(MediaResolver::new(prefix, self.media_dir.as_str(), &self.output_dir))
    }

    pub fn policy(&self) -> ErrorPolicy { ErrorPolicy::from_flag(self.strict) }
}

fn origin_prefix(origin: &str, remote_media_path: &str) -> Result<String, ConfigError> {
    let host = origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"))
        .map(|rest| rest.trim_end_matches('/'));
    match host {
        Some(host) if !host.is_empty() && !host.contains(['?', '#']) => {}
        _ => return Err(ConfigError::InvalidOrigin(origin.to_owned())),
    }

    let origin = origin.trim_end_matches('/');
    let remote = remote_media_path.trim_matches('/');
    Ok(if remote.is_empty() {
        format!("{origin}/")
    } else {
        format!("{origin}/{remote}/")
    })
}

/// Collapse `.` and `..` without touching the filesystem.
fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
