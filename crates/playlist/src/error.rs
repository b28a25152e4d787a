use std::path::PathBuf;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum PlaylistError {
    #[error("manifest directory `{}` does not exist", path.display())]
    MissingDirectory { path: PathBuf },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid download settings: {reason}")]
    Settings { reason: String },
}

impl PlaylistError {
    pub fn settings(reason: impl Into<String>) -> Self {
        Self::Settings {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlaylistError>;
