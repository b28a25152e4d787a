use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum SnifferError {
    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

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

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("browser protocol error: {source}")]
    Cdp {
        #[from]
        source: chromiumoxide::error::CdpError,
    },

    #[error("browser error: {reason}")]
    Browser { reason: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("event bridge closed")]
    BridgeClosed,
}

impl SnifferError {
    pub fn browser(reason: impl Into<String>) -> Self {
        Self::Browser {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether the failure happened on the wire rather than locally.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::HttpStatus { .. })
    }
}

pub type Result<T> = std::result::Result<T, SnifferError>;
