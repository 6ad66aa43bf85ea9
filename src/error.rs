use thiserror::Error;

/// Failure of a single page request attempt.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),
    #[error("response body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Transport(e) if e.is_timeout())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("vacancy has no title")]
    MissingTitle,
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("failed to read classifier artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode classifier artifact {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("classifier artifacts are inconsistent: {0}")]
    Shape(String),
}
