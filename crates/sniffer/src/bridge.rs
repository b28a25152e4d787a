//! One-way channel carrying serialized tap events from the page to the host.
//!
//! Each payload is decoded once on entry. Text that does not parse as a
//! [`NetworkEvent`] is kept as [`BridgeMessage::Raw`] so it can still be
//! scanned for manifest links. Messages leave the bridge in the order they
//! entered it.

use futures::{Stream, StreamExt};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, trace};

use crate::error::{Result, SnifferError};
use crate::event::NetworkEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeMessage {
    Event(NetworkEvent),
    Raw(String),
}

impl BridgeMessage {
    pub fn decode(payload: &str) -> Self {
        match serde_json::from_str::<NetworkEvent>(payload) {
            Ok(event) => BridgeMessage::Event(event),
            Err(e) => {
                trace!(error = %e, "bridge payload kept as raw text");
                BridgeMessage::Raw(payload.to_owned())
            }
        }
    }

    pub fn as_event(&self) -> Option<&NetworkEvent> {
        match self {
            BridgeMessage::Event(event) => Some(event),
            BridgeMessage::Raw(_) => None,
        }
    }
}

/// Creates a bridge holding at most `capacity` undelivered messages.
pub fn bridge(capacity: usize) -> (BridgeSender, BridgeReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (BridgeSender { tx }, BridgeReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct BridgeSender {
    tx: mpsc::Sender<BridgeMessage>,
}

impl BridgeSender {
    /// Decodes and enqueues `payload`, waiting for room if the bridge is full.
    pub async fn deliver(&self, payload: &str) -> Result<()> {
        self.tx
            .send(BridgeMessage::decode(payload))
            .await
            .map_err(|_| SnifferError::BridgeClosed)
    }

    /// Decodes and enqueues `payload` without waiting. Returns whether it was accepted.
    pub fn try_deliver(&self, payload: &str) -> bool {
        self.tx.try_send(BridgeMessage::decode(payload)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct BridgeReceiver {
    rx: mpsc::Receiver<BridgeMessage>,
}

impl BridgeReceiver {
    /// Next message, or `None` once every sender is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<BridgeMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BridgeMessage> {
        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

/// Pumps raw page payloads into the bridge until the source ends or the
/// receiving side goes away. Returns the number of payloads delivered.
pub async fn forward<S>(sender: BridgeSender, payloads: S) -> usize
where
    S: Stream<Item = String>,
{
    let mut payloads = std::pin::pin!(payloads);
    let mut delivered = 0usize;
    while let Some(payload) = payloads.next().await {
        if sender.deliver(&payload).await.is_err() {
            debug!(delivered, "bridge receiver dropped, stopping forwarder");
            break;
        }
        delivered += 1;
    }
    delivered
}
