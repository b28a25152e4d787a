//! Drives one capture: installs the tap, opens the room, and dispatches every
//! detected manifest to the scheduler until cancelled.

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::bridge::{self, BridgeMessage};
use crate::browser::{BrowserControl, HostResponse};
use crate::config::SnifferConfig;
use crate::error::{Result, SnifferError};
use crate::event::NetworkEvent;
use crate::extractor::{Candidate, HostResponseKind, ManifestExtractor, classify_host_response};
use crate::scheduler::FetchScheduler;
use crate::tap::{TapInstaller, TapScript};

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub events: usize,
    pub raw_payloads: usize,
    pub host_responses: usize,
    pub candidates: usize,
    pub dispatched: usize,
}

pub struct CaptureSession {
    config: SnifferConfig,
    room: Url,
    script: TapScript,
    installer: TapInstaller,
    extractor: ManifestExtractor,
    scheduler: FetchScheduler,
}

impl CaptureSession {
    pub fn new(config: SnifferConfig) -> Result<Self> {
        let scheduler = FetchScheduler::new(config.fetch.clone())?;
        Self::with_scheduler(config, scheduler)
    }

    pub fn with_scheduler(config: SnifferConfig, scheduler: FetchScheduler) -> Result<Self> {
        config.validate()?;
        let room = Url::parse(&config.room_url).map_err(|e| SnifferError::InvalidUrl {
            input: config.room_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            script: TapScript::render(&config.tap),
            installer: TapInstaller::new(),
            extractor: ManifestExtractor::with_base(room.clone()),
            scheduler,
            room,
            config,
        })
    }

    pub fn scheduler(&self) -> &FetchScheduler {
        &self.scheduler
    }

    /// Runs until `cancel` fires or the page side of the bridge goes away.
    ///
    /// The binding and document-start script are in place before the first
    /// navigation so the room's own traffic is tapped from its first request.
    pub async fn run<B>(&self, browser: &B, cancel: CancellationToken) -> Result<SessionStats>
    where
        B: BrowserControl + ?Sized,
    {
        let payloads = browser.expose_binding(&self.config.tap.binding_name).await?;
        self.installer.register(browser, &self.script).await?;
        let mut responses = browser.responses().await?;

        let (sender, mut receiver) = bridge::bridge(self.config.bridge_capacity);
        let forwarder = tokio::spawn(bridge::forward(sender, payloads));

        info!(url = %self.room, "opening live room");
        if let Err(e) = browser.navigate(self.room.as_str()).await {
            forwarder.abort();
            return Err(e);
        }
        if let Err(e) = self.installer.apply_live(browser, &self.script).await {
            debug!(error = %e, "live tap evaluation failed");
        }
        info!("tap installed, waiting for manifests");

        let stats = self
            .dispatch(&mut receiver, &mut responses, &cancel)
            .await;

        forwarder.abort();
        if !cancel.is_cancelled() {
            // The page went away on its own; let started fetches land.
            self.scheduler.wait_idle().await;
        }
        self.scheduler.shutdown().await;
        info!(
            events = stats.events,
            candidates = stats.candidates,
            dispatched = stats.dispatched,
            "capture finished"
        );
        Ok(stats)
    }

    async fn dispatch(
        &self,
        receiver: &mut bridge::BridgeReceiver,
        responses: &mut BoxStream<'static, HostResponse>,
        cancel: &CancellationToken,
    ) -> SessionStats {
        let mut stats = SessionStats::default();
        let stall_after = self.config.tap.heartbeat.saturating_mul(2);
        let mut watchdog = tokio::time::interval(self.config.tap.heartbeat);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_seen = Instant::now();
        let mut stalled = false;
        let mut responses_open = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("capture cancelled");
                    break;
                }
                message = receiver.recv() => {
                    let Some(message) = message else {
                        warn!("page bridge closed");
                        break;
                    };
                    last_seen = Instant::now();
                    stalled = false;
                    self.on_message(&message, &mut stats);
                }
                response = responses.next(), if responses_open => {
                    match response {
                        Some(response) => self.on_host_response(&response, &mut stats),
                        None => {
                            debug!("host response stream ended");
                            responses_open = false;
                        }
                    }
                }
                _ = watchdog.tick() => {
                    if !stalled && last_seen.elapsed() >= stall_after {
                        warn!(
                            silent_secs = last_seen.elapsed().as_secs(),
                            "no tap events received; the page may have navigated away"
                        );
                        stalled = true;
                    }
                }
            }
        }
        stats
    }

    fn on_message(&self, message: &BridgeMessage, stats: &mut SessionStats) {
        match message {
            BridgeMessage::Event(event) => {
                stats.events += 1;
                log_event(event);
            }
            BridgeMessage::Raw(text) => {
                stats.raw_payloads += 1;
                debug!(len = text.len(), "raw bridge payload");
            }
        }
        for candidate in self.extractor.extract(message) {
            self.dispatch_candidate(candidate, stats);
        }
    }

    fn on_host_response(&self, response: &HostResponse, stats: &mut SessionStats) {
        stats.host_responses += 1;
        match classify_host_response(&response.url) {
            HostResponseKind::Manifest => {
                if let Some(candidate) = self.extractor.from_host_response(response) {
                    self.dispatch_candidate(candidate, stats);
                }
            }
            HostResponseKind::Media => {
                debug!(url = %response.url, status = response.status, "media response");
            }
            HostResponseKind::Other => {}
        }
    }

    fn dispatch_candidate(&self, candidate: Candidate, stats: &mut SessionStats) {
        stats.candidates += 1;
        info!(url = %candidate.url, path = %candidate.path, "manifest detected");
        if self.scheduler.download(&candidate.url) {
            stats.dispatched += 1;
        }
    }
}

fn log_event(event: &NetworkEvent) {
    match event {
        NetworkEvent::WsCreated(created) => info!(url = %created.url, "websocket opened"),
        NetworkEvent::WsClose(close) => {
            info!(url = %close.url, code = ?close.code, "websocket closed")
        }
        NetworkEvent::Ping(_) => debug!("tap heartbeat"),
        other => debug!(kind = %other.kind(), url = other.url().unwrap_or_default(), "tap event"),
    }
}
