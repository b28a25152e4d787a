//! The traffic tap: observes every call to the page's network primitives.
//!
//! Inside the browser the tap is [`TapScript`], a document-start script that
//! wraps XHR, `fetch` and `WebSocket` and reports through the page binding.
//! [`Tap`] and the decorators in [`ws`] are the same contract for
//! connections driven from Rust: they forward to the real implementation and
//! fan observed events out onto the bridge.

pub mod ws;

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

use crate::bridge::BridgeSender;
use crate::browser::BrowserControl;
use crate::config::TapOptions;
use crate::error::Result;
use crate::event::NetworkEvent;

pub use ws::{TappedSink, TappedStream, tap_websocket};

const SCRIPT_TEMPLATE: &str = include_str!("tap.js");

/// The in-page instrumentation, rendered for one set of [`TapOptions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapScript {
    source: String,
}

impl TapScript {
    pub fn render(options: &TapOptions) -> Self {
        let source = SCRIPT_TEMPLATE
            .replace("__SNIFFER_GUARD__", &js_string(&options.install_flag))
            .replace("__SNIFFER_BINDING__", &js_string(&options.binding_name))
            .replace(
                "__SNIFFER_PREVIEW_LIMIT__",
                &options.preview_limit.to_string(),
            )
            .replace(
                "__SNIFFER_HEARTBEAT_MS__",
                &options.heartbeat.as_millis().to_string(),
            );
        Self { source }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

fn js_string(value: &str) -> String {
    // A JSON string literal is a valid JavaScript string literal.
    serde_json::Value::String(value.to_owned()).to_string()
}

/// Installs a [`TapScript`] into one page at most once.
///
/// The script carries its own page-global guard as well, so evaluating it
/// into a document that already ran it at document start does nothing.
#[derive(Debug, Default)]
pub struct TapInstaller {
    registered: AtomicBool,
}

impl TapInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the script to run at the start of every new document.
    ///
    /// Returns `false` without touching the page when already registered.
    pub async fn register<B>(&self, page: &B, script: &TapScript) -> Result<bool>
    where
        B: BrowserControl + ?Sized,
    {
        if self.registered.swap(true, Ordering::AcqRel) {
            debug!("tap already registered for this page");
            return Ok(false);
        }
        if let Err(e) = page.add_init_script(script.source()).await {
            self.registered.store(false, Ordering::Release);
            return Err(e);
        }
        Ok(true)
    }

    /// Runs the script in the current document; a no-op where it already ran.
    pub async fn apply_live<B>(&self, page: &B, script: &TapScript) -> Result<()>
    where
        B: BrowserControl + ?Sized,
    {
        page.evaluate(script.source()).await
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }
}

/// Best-effort event emitter for connections observed from Rust.
///
/// Events are serialized and pushed onto the bridge exactly like the page's
/// events. Emitting never blocks and never fails: a full or closed bridge
/// drops the event.
#[derive(Debug, Clone)]
pub struct Tap {
    bridge: BridgeSender,
    preview_limit: usize,
}

impl Tap {
    pub fn new(bridge: BridgeSender, preview_limit: usize) -> Self {
        Self {
            bridge,
            preview_limit,
        }
    }

    pub fn preview_limit(&self) -> usize {
        self.preview_limit
    }

    pub fn emit(&self, event: &NetworkEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => {
                if !self.bridge.try_deliver(&payload) {
                    trace!(kind = %event.kind(), "tap event dropped");
                }
            }
            Err(e) => trace!(error = %e, "tap event not serializable"),
        }
    }
}
