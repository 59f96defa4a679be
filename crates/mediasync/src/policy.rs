use std::ffi::OsString;

/// Variables whose presence marks a hosted build.
const HOSTED_BUILD_VARS: [&str; 4] = ["CI", "NETLIFY", "VERCEL", "CF_PAGES"];

/// What to do when a sync run fails outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Log and let the build continue with remote URLs in place.
    Lenient,
    /// Propagate the error and fail the build.
    Strict,
}

impl ErrorPolicy {
    /// An explicit `strict` setting wins; otherwise detect from the environment.
    pub fn from_flag(strict: Option<bool>) -> Self {
        match strict {
            Some(true) => Self::Strict,
            Some(false) => Self::Lenient,
            None => Self::detect(),
        }
    }

    pub fn detect() -> Self { Self::detect_with(|name| std::env::var_os(name)) }

    /// Hosted builds are lenient, local builds strict.
    pub fn detect_with(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let hosted = HOSTED_BUILD_VARS
            .iter()
            .any(|name| lookup(name).is_some_and(|value| !value.is_empty()));
        if hosted { Self::Lenient } else { Self::Strict }
    }
}
