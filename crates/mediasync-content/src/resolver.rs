use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Bytes that cannot appear raw in a URL path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A remote media reference mapped onto the local site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAsset {
    /// The reference exactly as it appeared in content.
    pub remote_url:   String,
    /// Origin prefix plus the undecoded path, without the query string.
    pub download_url: String,
    /// `<media_dir>/<segments...>`, identical for every spelling of the same path.
    pub cache_key:    String,
    /// Destination of the downloaded bytes.
    pub local_path:   PathBuf,
    /// Site-relative URL written back into content: segments re-encoded, query preserved.
    pub public_path:  String,
}

/// Maps remote URLs under a single origin prefix onto the local media directory.
///
/// Resolution is pure: it never touches the filesystem or the network, which
/// keeps traversal checks and key derivation testable in isolation.
#[derive(Clone, Debug)]
pub struct MediaResolver {
    origin_prefix: String,
    media_dir:     String,
    media_root:    PathBuf,
}

impl MediaResolver {
    /// Create a resolver.
    ///
    /// * `origin_prefix` - e.g. `https://cms.example/media/`
    /// * `media_dir` - local directory name, also the first public path segment
    /// * `output_root` - the publishable output directory
    pub fn new(
        origin_prefix: impl Into<String>,
        media_dir: impl Into<String>,
        output_root: impl AsRef<Path>,
    ) -> Self {
        let media_dir = media_dir.into();
        let media_root = output_root.as_ref().join(&media_dir);
        Self {
            origin_prefix: origin_prefix.into(),
            media_dir,
            media_root,
        }
    }

    pub fn origin_prefix(&self) -> &str { &self.origin_prefix }

    pub fn media_dir(&self) -> &str { &self.media_dir }

    /// Directory every resolved `local_path` lives under.
    pub fn media_root(&self) -> &Path { &self.media_root }

    /// Resolve `url`, or `None` if it is foreign to the origin or unsafe.
    pub fn resolve(&self, url: &str) -> Option<ResolvedAsset> {
        let rest = url.strip_prefix(self.origin_prefix.as_str())?;
        let (raw_path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query).filter(|q| !q.is_empty())),
            None => (rest, None),
        };

        let segments = normalize(raw_path)?;
        let relative = segments.join("/");
        let cache_key = format!("{}/{}", self.media_dir, relative);

        let mut local_path = self.media_root.clone();
        local_path.extend(&segments);

        let mut public_path = format!("/{}", utf8_percent_encode(&self.media_dir, SEGMENT));
        for segment in &segments {
            public_path.push('/');
            public_path.extend(utf8_percent_encode(segment, SEGMENT));
        }
        if let Some(query) = query {
            public_path.push('?');
            public_path.push_str(query);
        }

        Some(ResolvedAsset {
            remote_url: url.to_owned(),
            download_url: format!("{}{}", self.origin_prefix, raw_path),
            cache_key,
            local_path,
            public_path,
        })
    }
}

/// Decode and collapse a URL path into plain segments.
///
/// Returns `None` when the path escapes its root, is empty, is not valid
/// UTF-8 once decoded, or carries a segment that is not a plain file name.
fn normalize(raw_path: &str) -> Option<Vec<String>> {
    let decoded = percent_decode_str(raw_path).decode_utf8().ok()?;
    let mut segments: Vec<String> = Vec::new();

    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s if !is_plain_segment(s) => return None,
            s => segments.push(s.to_owned()),
        }
    }

    (!segments.is_empty()).then_some(segments)
}

fn is_plain_segment(segment: &str) -> bool {
    if segment.contains(['\\', '\0']) {
        return false;
    }
    !(cfg!(windows) && segment.contains(':'))
}
