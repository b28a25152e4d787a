//! Capture HLS manifests announced to a live-room page.
//!
//! The page's network primitives (XHR, `fetch`, `WebSocket`) are wrapped by an
//! in-page [`tap`] script that forwards one [`NetworkEvent`] per observed call
//! over the [`bridge`]. The [`extractor`] scans every bridged event, plus every
//! response the host's own network listener sees, for manifest URLs, and the
//! [`scheduler`] fetches each distinct manifest exactly once and saves it.
//!
//! ```text
//! page ──tap──▶ bridge ──▶ extractor ──▶ scheduler ──▶ manifest dir
//!   └── host response listener ─┘
//! ```

pub mod bridge;
pub mod browser;
pub mod config;
pub mod error;
pub mod event;
pub mod extractor;
pub mod http_client;
pub mod scheduler;
pub mod session;
pub mod tap;
pub mod utils;

pub use bridge::{BridgeMessage, BridgeReceiver, BridgeSender};
pub use browser::{BrowserControl, HostResponse};
pub use config::{FetchConfig, SnifferConfig, TapOptions};
pub use error::{Result, SnifferError};
pub use event::{EventKind, NetworkEvent};
pub use extractor::{Candidate, DetectionPath, ManifestExtractor};
pub use scheduler::{FetchScheduler, ManifestSet, SavedManifest};
pub use session::{CaptureSession, SessionStats};
pub use tap::{Tap, TapInstaller, TapScript};
