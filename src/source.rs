use log::{debug, warn};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::data::ResumeData;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read resume data: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse JSON resume data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to parse YAML resume data: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A bearer token identifying the signed-in user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for an empty token, which counts as signed out.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let token = token.trim();
        (!token.is_empty()).then(|| Self(token.to_string()))
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

// Keeps tokens out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Where resume data comes from.
///
/// `Ok(None)` means there is no data for this user; callers fall back to the
/// default-content path.
pub trait ResumeSource {
    fn fetch(&self, credential: Option<&Credential>) -> Result<Option<ResumeData>, SourceError>;
}

/// Fetches and collapses every failure into "no data".
pub fn fetch_or_none(source: &dyn ResumeSource, credential: Option<&Credential>) -> Option<ResumeData> {
    match source.fetch(credential) {
        Ok(data) => data,
        Err(e) => {
            warn!("Treating resume data as absent: {}", e);
            None
        }
    }
}

/// Parses resume data, choosing YAML or JSON by file extension.
pub fn load_resume_data(path: &Path) -> Result<Option<ResumeData>, SourceError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No resume data at {:?}", path);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    let data = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(Some(data))
}

/// A single local resume file. The file belongs to whoever runs the command,
/// so it is read whether or not a credential is given.
#[derive(Debug, Clone)]
pub struct FileResumeSource {
    path: PathBuf,
}

impl FileResumeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResumeSource for FileResumeSource {
    fn fetch(&self, _credential: Option<&Credential>) -> Result<Option<ResumeData>, SourceError> {
        load_resume_data(&self.path)
    }
}

/// One resume file per user, named after the user's token
/// (`<dir>/<token>.json` or `<dir>/<token>.yaml`).
#[derive(Debug, Clone)]
pub struct TokenDirectorySource {
    dir: PathBuf,
}

impl TokenDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ResumeSource for TokenDirectorySource {
    fn fetch(&self, credential: Option<&Credential>) -> Result<Option<ResumeData>, SourceError> {
        let Some(credential) = credential else {
            debug!("No credential, no resume data");
            return Ok(None);
        };
        let token = credential.token();
        if !token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            || token.starts_with('.')
        {
            warn!("Rejecting credential that is not a plain token");
            return Ok(None);
        }
        for ext in ["json", "yaml", "yml"] {
            let path = self.dir.join(format!("{}.{}", token, ext));
            if path.exists() {
                return load_resume_data(&path);
            }
        }
        Ok(None)
    }
}
