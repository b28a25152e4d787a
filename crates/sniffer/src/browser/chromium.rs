//! Chromium over the DevTools protocol.
//!
//! Attaching prefers a browser already listening for remote debugging, then
//! launches one of the configured executables, then whatever chromiumoxide
//! finds on its own. The session always works in a fresh browser context.

use std::path::PathBuf;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventResponseReceived,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use chromiumoxide::page::Page;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrowserControl, HostResponse};
use crate::error::{Result, SnifferError};

/// Remote debugging endpoint tried before launching anything.
pub const DEFAULT_CDP_ENDPOINT: &str = "http://localhost:9222";

/// Flags relaxing cross-origin isolation so the tap sees every frame's traffic.
pub const RELAXED_ISOLATION_ARGS: &[&str] = &[
    "--disable-features=IsolateOrigins,site-per-process",
    "--disable-web-security",
    "--allow-running-insecure-content",
];

/// Common Microsoft Edge install locations.
pub fn default_executable_candidates() -> Vec<PathBuf> {
    [
        r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
        "/usr/bin/microsoft-edge",
        "/usr/bin/microsoft-edge-stable",
        "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Endpoint of an already running browser; `None` skips the attach attempt
    pub cdp_endpoint: Option<String>,

    /// Executables tried in order when attaching fails
    pub executable_candidates: Vec<PathBuf>,

    pub headless: bool,

    pub user_data_dir: Option<PathBuf>,

    pub args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            cdp_endpoint: Some(DEFAULT_CDP_ENDPOINT.to_owned()),
            executable_candidates: default_executable_candidates(),
            headless: false,
            user_data_dir: None,
            args: RELAXED_ISOLATION_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl LaunchOptions {
    fn config(&self, executable: Option<&PathBuf>) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder().args(self.args.iter());
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(dir) = &self.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(SnifferError::browser)
    }
}

/// How the browser was obtained; decides what closing means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Attached,
    Launched,
}

/// A page in an isolated context of an attached or launched browser.
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    context: Option<BrowserContextId>,
    page: Page,
    ownership: Ownership,
}

impl ChromiumSession {
    pub async fn attach(options: &LaunchOptions) -> Result<Self> {
        let (mut browser, handler, ownership) = connect_or_launch(options).await?;

        let context = match browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await
        {
            Ok(id) => id,
            Err(e) => {
                shut_down(&mut browser, handler, ownership).await;
                return Err(e.into());
            }
        };

        let page = match open_page(&browser, &context).await {
            Ok(page) => page,
            Err(e) => {
                if let Err(err) = browser.dispose_browser_context(context).await {
                    debug!(error = %err, "failed to dispose browser context");
                }
                shut_down(&mut browser, handler, ownership).await;
                return Err(e);
            }
        };

        Ok(Self {
            browser,
            handler,
            context: Some(context),
            page,
            ownership,
        })
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Disposes the isolated context and, for a launched browser, the
    /// browser itself. Errors are logged; closing always completes.
    pub async fn close(mut self) {
        if let Some(context) = self.context.take() {
            if let Err(e) = self.browser.dispose_browser_context(context).await {
                debug!(error = %e, "failed to dispose browser context");
            }
        }
        shut_down(&mut self.browser, self.handler, self.ownership).await;
        info!("browser session closed");
    }
}

async fn connect_or_launch(
    options: &LaunchOptions,
) -> Result<(Browser, JoinHandle<()>, Ownership)> {
    if let Some(endpoint) = &options.cdp_endpoint {
        match Browser::connect(endpoint.as_str()).await {
            Ok((browser, handler)) => {
                info!(endpoint = %endpoint, "attached to running browser");
                return Ok((browser, spawn_handler(handler), Ownership::Attached));
            }
            Err(e) => debug!(endpoint = %endpoint, error = %e, "no browser to attach to"),
        }
    }

    for path in options
        .executable_candidates
        .iter()
        .filter(|path| path.exists())
    {
        match Browser::launch(options.config(Some(path))?).await {
            Ok((browser, handler)) => {
                info!(executable = %path.display(), "launched browser");
                return Ok((browser, spawn_handler(handler), Ownership::Launched));
            }
            Err(e) => warn!(executable = %path.display(), error = %e, "failed to launch browser"),
        }
    }

    let (browser, handler) = Browser::launch(options.config(None)?).await?;
    info!("launched default browser");
    Ok((browser, spawn_handler(handler), Ownership::Launched))
}

fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
    tokio::spawn(async move { while handler.next().await.is_some() {} })
}

async fn open_page(browser: &Browser, context: &BrowserContextId) -> Result<Page> {
    let params = CreateTargetParams::builder()
        .url("about:blank")
        .browser_context_id(context.clone())
        .build()
        .map_err(SnifferError::browser)?;
    Ok(browser.new_page(params).await?)
}

async fn shut_down(browser: &mut Browser, handler: JoinHandle<()>, ownership: Ownership) {
    if ownership == Ownership::Launched {
        if let Err(e) = browser.close().await {
            debug!(error = %e, "failed to close browser");
        }
        if let Err(e) = browser.wait().await {
            debug!(error = %e, "failed to wait for browser exit");
        }
    }
    handler.abort();
}

#[async_trait]
impl BrowserControl for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page.goto(url).await?;
        Ok(())
    }

    async fn add_init_script(&self, source: &str) -> Result<()> {
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(source))
            .await?;
        Ok(())
    }

    async fn evaluate(&self, source: &str) -> Result<()> {
        self.page.evaluate(source).await?;
        Ok(())
    }

    async fn expose_binding(&self, name: &str) -> Result<BoxStream<'static, String>> {
        let calls = self.page.event_listener::<EventBindingCalled>().await?;
        self.page.execute(AddBindingParams::new(name)).await?;
        let name = name.to_owned();
        Ok(calls
            .filter_map(move |call| {
                let payload = (call.name == name).then(|| call.payload.clone());
                async move { payload }
            })
            .boxed())
    }

    async fn responses(&self) -> Result<BoxStream<'static, HostResponse>> {
        let received = self.page.event_listener::<EventResponseReceived>().await?;
        self.page.execute(NetworkEnableParams::default()).await?;
        Ok(received
            .map(|event| HostResponse {
                url: event.response.url.clone(),
                status: u16::try_from(event.response.status).unwrap_or_default(),
            })
            .boxed())
    }
}
