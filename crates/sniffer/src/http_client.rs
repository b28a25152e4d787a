use playlist::install_rustls_provider;
use reqwest::Client;

use crate::config::FetchConfig;
use crate::error::Result;

/// Client used for manifest fetches: browser-like headers and a bounded timeout.
pub fn build_manifest_client(config: &FetchConfig) -> Result<Client> {
    install_rustls_provider();

    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(config.headers()?)
        .timeout(config.timeout)
        .build()?;
    Ok(client)
}
