//! Credential supply for the retrieval tool.

use std::path::PathBuf;

/// Optional credentials handed to the retrieval tool on every invocation.
pub trait CredentialSource: Send + Sync {
    /// Netscape cookies file to pass with `--cookies`, if one is usable.
    fn cookies_file(&self) -> Option<PathBuf>;
}

/// Cookies file from config; used only while the file exists.
#[derive(Debug, Clone, Default)]
pub struct CookieFile {
    path: Option<PathBuf>,
}

impl CookieFile {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl CredentialSource for CookieFile {
    fn cookies_file(&self) -> Option<PathBuf> {
        let path = self.path.as_ref()?;
        if path.is_file() {
            Some(path.clone())
        } else {
            tracing::debug!(path = %path.display(), "cookies file not found, fetching without");
            None
        }
    }
}
