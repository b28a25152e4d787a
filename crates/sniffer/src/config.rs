use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};

use crate::error::{Result, SnifferError};
use crate::event::DEFAULT_PREVIEW_LIMIT;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";
pub const DEFAULT_REFERER: &str = "https://n.dingtalk.com/";
pub const DEFAULT_MANIFEST_DIR: &str = "downloaded_m3u8";
pub const DEFAULT_BINDING_NAME: &str = "__snifferEmit";
pub const DEFAULT_INSTALL_FLAG: &str = "__SNIFFER_TAP_INSTALLED__";

/// How manifests are requested and where they land.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Directory receiving the raw manifest bytes
    pub manifest_dir: PathBuf,

    /// Overall timeout of one manifest request
    pub timeout: Duration,

    pub user_agent: String,

    pub accept: String,

    pub accept_language: String,

    /// Fixed origin sent as `Referer` with every manifest request
    pub referer: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            manifest_dir: PathBuf::from(DEFAULT_MANIFEST_DIR),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            accept: "*/*".to_owned(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_owned(),
            referer: DEFAULT_REFERER.to_owned(),
        }
    }
}

impl FetchConfig {
    /// Browser-like headers sent with every manifest request.
    ///
    /// The user agent is set on the client itself.
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, header_value("accept", &self.accept)?);
        headers.insert(
            ACCEPT_LANGUAGE,
            header_value("accept_language", &self.accept_language)?,
        );
        headers.insert(REFERER, header_value("referer", &self.referer)?);
        Ok(headers)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| SnifferError::configuration(format!("invalid {name} header `{value}`: {e}")))
}

/// Longest accepted heartbeat interval.
pub const MAX_HEARTBEAT: Duration = Duration::from_secs(24 * 60 * 60);

/// Parameters baked into the in-page tap script.
#[derive(Debug, Clone)]
pub struct TapOptions {
    /// Name of the host callback the page calls with each serialized event
    pub binding_name: String,

    /// Page-global flag guarding against double installation
    pub install_flag: String,

    /// Maximum characters kept in any payload preview
    pub preview_limit: usize,

    /// Interval between `ping` events
    pub heartbeat: Duration,
}

impl Default for TapOptions {
    fn default() -> Self {
        Self {
            binding_name: DEFAULT_BINDING_NAME.to_owned(),
            install_flag: DEFAULT_INSTALL_FLAG.to_owned(),
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            heartbeat: Duration::from_secs(30),
        }
    }
}

/// Everything a capture session needs besides the browser itself.
#[derive(Debug, Clone)]
pub struct SnifferConfig {
    /// Live-room page to open
    pub room_url: String,

    pub fetch: FetchConfig,

    pub tap: TapOptions,

    /// Capacity of the bridge channel between the page and the dispatcher
    pub bridge_capacity: usize,
}

impl SnifferConfig {
    pub fn new(room_url: impl Into<String>) -> Self {
        Self {
            room_url: room_url.into(),
            fetch: FetchConfig::default(),
            tap: TapOptions::default(),
            bridge_capacity: 1024,
        }
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.room_url).map_err(|e| SnifferError::InvalidUrl {
            input: self.room_url.clone(),
            reason: e.to_string(),
        })?;
        if self.tap.binding_name.is_empty()
            || !self
                .tap
                .binding_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        {
            return Err(SnifferError::configuration(format!(
                "binding name `{}` is not a valid identifier",
                self.tap.binding_name
            )));
        }
        if self.tap.preview_limit == 0 {
            return Err(SnifferError::configuration("preview limit must be positive"));
        }
        if self.tap.heartbeat.is_zero() {
            return Err(SnifferError::configuration("heartbeat must be positive"));
        }
        if self.tap.heartbeat > MAX_HEARTBEAT {
            return Err(SnifferError::configuration(format!(
                "heartbeat must not exceed {}s",
                MAX_HEARTBEAT.as_secs()
            )));
        }
        if self.bridge_capacity == 0 {
            return Err(SnifferError::configuration(
                "bridge capacity must be positive",
            ));
        }
        self.fetch.headers()?;
        Ok(())
    }
}
