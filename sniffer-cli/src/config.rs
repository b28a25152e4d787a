use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use sniffer::SnifferConfig;
use sniffer::browser::LaunchOptions;
use sniffer::browser::chromium::{
    DEFAULT_CDP_ENDPOINT, RELAXED_ISOLATION_ARGS, default_executable_candidates,
};
use sniffer::config::{
    DEFAULT_ACCEPT_LANGUAGE, DEFAULT_BINDING_NAME, DEFAULT_MANIFEST_DIR, DEFAULT_REFERER,
    DEFAULT_USER_AGENT,
};
use sniffer::event::DEFAULT_PREVIEW_LIMIT;
use tracing::debug;

use crate::cli::Args;
use crate::error::{AppError, Result};

const CONFIG_DIR_NAME: &str = "m3u8-sniffer";
const CONFIG_FILE_NAME: &str = "config.toml";

/// File-backed settings. Every key is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub room_url: Option<String>,
    pub manifest_dir: PathBuf,
    pub referer: String,
    pub user_agent: String,
    pub accept_language: String,
    pub fetch_timeout_secs: u64,
    pub cdp_endpoint: Option<String>,
    pub browser_paths: Vec<PathBuf>,
    pub headless: bool,
    pub user_data_dir: Option<PathBuf>,
    pub binding_name: String,
    pub preview_limit: usize,
    pub heartbeat_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            room_url: None,
            manifest_dir: PathBuf::from(DEFAULT_MANIFEST_DIR),
            referer: DEFAULT_REFERER.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_owned(),
            fetch_timeout_secs: 30,
            cdp_endpoint: Some(DEFAULT_CDP_ENDPOINT.to_owned()),
            browser_paths: default_executable_candidates(),
            headless: false,
            user_data_dir: None,
            binding_name: DEFAULT_BINDING_NAME.to_owned(),
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            heartbeat_secs: 30,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads `path`, or the default location when it exists, or built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => path,
                None => {
                    debug!("no config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };
        let text = std::fs::read_to_string(&path).map_err(|source| AppError::ConfigRead {
            path: path.clone(),
            source,
        })?;
        Self::parse(&text).map_err(|source| AppError::ConfigParse { path, source })
    }

    pub fn parse(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Applies command-line overrides on top of the file values.
    pub fn merge_args(mut self, args: &Args) -> Self {
        if let Some(url) = &args.room_url {
            self.room_url = Some(url.clone());
        }
        if let Some(dir) = &args.manifest_dir {
            self.manifest_dir = dir.clone();
        }
        if let Some(endpoint) = &args.cdp_endpoint {
            self.cdp_endpoint = Some(endpoint.clone());
        }
        if !args.browser_paths.is_empty() {
            self.browser_paths = args.browser_paths.clone();
        }
        if args.headless {
            self.headless = true;
        }
        if let Some(dir) = &args.user_data_dir {
            self.user_data_dir = Some(dir.clone());
        }
        if let Some(timeout) = args.timeout {
            self.fetch_timeout_secs = timeout;
        }
        self
    }

    pub fn sniffer_config(&self) -> Result<SnifferConfig> {
        let room_url = self.room_url.clone().ok_or(AppError::MissingRoomUrl)?;
        let mut config = SnifferConfig::new(room_url);
        config.fetch.manifest_dir = self.manifest_dir.clone();
        config.fetch.timeout = Duration::from_secs(self.fetch_timeout_secs);
        config.fetch.user_agent = self.user_agent.clone();
        config.fetch.accept_language = self.accept_language.clone();
        config.fetch.referer = self.referer.clone();
        config.tap.binding_name = self.binding_name.clone();
        config.tap.preview_limit = self.preview_limit;
        config.tap.heartbeat = Duration::from_secs(self.heartbeat_secs);
        config.validate()?;
        Ok(config)
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            cdp_endpoint: self.cdp_endpoint.clone(),
            executable_candidates: self.browser_paths.clone(),
            headless: self.headless,
            user_data_dir: self.user_data_dir.clone(),
            args: RELAXED_ISOLATION_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn partial_files_keep_defaults() {
        let config = AppConfig::parse(
            r#"
            room_url = "https://live.example.com/room?id=7"
            headless = true
            heartbeat_secs = 10
            "#,
        )
        .unwrap();
        assert!(config.headless);
        assert_eq!(config.manifest_dir, PathBuf::from(DEFAULT_MANIFEST_DIR));
        assert_eq!(config.fetch_timeout_secs, 30);

        let sniffer = config.sniffer_config().unwrap();
        assert_eq!(sniffer.tap.heartbeat, Duration::from_secs(10));
        assert_eq!(sniffer.fetch.referer, DEFAULT_REFERER);
    }

    #[test]
    fn flags_override_file_values() {
        let file = AppConfig::parse(
            r#"
            room_url = "https://live.example.com/a"
            manifest_dir = "from_file"
            "#,
        )
        .unwrap();
        let args = Args::parse_from([
            "sniffer",
            "https://live.example.com/b",
            "--manifest-dir",
            "from_flag",
            "--timeout",
            "5",
        ]);
        let merged = file.merge_args(&args);
        assert_eq!(merged.room_url.as_deref(), Some("https://live.example.com/b"));
        assert_eq!(merged.manifest_dir, PathBuf::from("from_flag"));
        assert_eq!(merged.fetch_timeout_secs, 5);
    }

    #[test]
    fn room_url_is_required() {
        assert!(matches!(
            AppConfig::default().sniffer_config(),
            Err(AppError::MissingRoomUrl)
        ));
    }

    #[test]
    fn oversized_heartbeat_is_rejected() {
        let config = AppConfig::parse(
            r#"
            room_url = "https://live.example.com/a"
            heartbeat_secs = 9223372036854775807
            "#,
        )
        .unwrap();
        assert!(matches!(config.sniffer_config(), Err(AppError::Sniffer(_))));
    }

    #[test]
    fn reads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sniffer.toml");
        std::fs::write(&path, "cdp_endpoint = \"http://127.0.0.1:9333\"\n").unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.cdp_endpoint.as_deref(), Some("http://127.0.0.1:9333"));

        std::fs::write(&path, "headless = \"yes\"\n").unwrap();
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(AppError::ConfigParse { .. })
        ));
    }
}
