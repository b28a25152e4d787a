//! The narrow slice of a browser the capture session drives.

pub mod chromium;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

pub use chromium::{ChromiumSession, LaunchOptions};

/// A network response observed by the browser itself, outside the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResponse {
    pub url: String,
    pub status: u16,
}

/// One controllable page inside an isolated browsing context.
#[async_trait]
pub trait BrowserControl: Send + Sync {
    /// Navigates the page and waits for the load to commit.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Registers `source` to run at the start of every new document.
    async fn add_init_script(&self, source: &str) -> Result<()>;

    /// Runs `source` in the current document.
    async fn evaluate(&self, source: &str) -> Result<()>;

    /// Exposes a page global named `name` taking one string; every call
    /// surfaces as one item of the returned stream, in call order.
    async fn expose_binding(&self, name: &str) -> Result<BoxStream<'static, String>>;

    /// Responses received by the page, as seen by the browser's network layer.
    async fn responses(&self) -> Result<BoxStream<'static, HostResponse>>;
}
