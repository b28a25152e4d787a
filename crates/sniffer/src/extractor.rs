//! Manifest link detection across the three observation paths.
//!
//! 1. Text carried by inbound WebSocket messages (and unparseable bridge
//!    payloads) is scanned with URL patterns tuned for manifest links.
//! 2. Completed XHR/fetch calls whose URL carries the manifest extension.
//! 3. Responses seen by the host's own network listener.
//!
//! The paths overlap on purpose; duplicates are resolved by the scheduler.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::bridge::BridgeMessage;
use crate::browser::HostResponse;
use crate::event::NetworkEvent;

pub const MANIFEST_EXTENSION: &str = ".m3u8";

/// Streaming containers the scheduler accepts besides manifests.
pub const MEDIA_EXTENSIONS: &[&str] = &[".ts", ".m4s", ".mp4", ".flv"];

/// Media extensions logged when seen by the host listener.
const OBSERVED_MEDIA_EXTENSIONS: &[&str] = &[".ts", ".m4s", ".mp4"];

/// Ordered manifest link patterns: any manifest link, then links nested under `/live/`.
static MANIFEST_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)https?://[^\s<>"'{}|\\^`]+?\.m3u8[^\s<>"'{}|\\^`]*"#,
        r#"(?i)https?://[^\s<>"'{}|\\^`]*?/live/[^\s<>"'{}|\\^`]*\.m3u8[^\s<>"'{}|\\^`]*"#,
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Which observation path produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionPath {
    WebSocketPayload,
    RawPayload,
    PrimitiveResponse,
    HostResponse,
}

impl DetectionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionPath::WebSocketPayload => "ws_payload",
            DetectionPath::RawPayload => "raw_payload",
            DetectionPath::PrimitiveResponse => "primitive_response",
            DetectionPath::HostResponse => "host_response",
        }
    }
}

impl std::fmt::Display for DetectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub path: DetectionPath,
}

/// Classification of a response seen by the host listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostResponseKind {
    Manifest,
    /// A media segment. Logged only; never queued for fetch.
    Media,
    Other,
}

pub fn is_manifest_url(url: &str) -> bool {
    url.contains(MANIFEST_EXTENSION)
}

pub fn is_media_url(url: &str) -> bool {
    MEDIA_EXTENSIONS.iter().any(|ext| url.contains(ext))
}

/// Finds every manifest link in `text`, first-seen order, without duplicates.
///
/// JSON-escaped slashes and ampersands are unescaped before a second pass so
/// links serialized inside JSON strings are found too.
pub fn scan_payload(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut collect = |haystack: &str| {
        for pattern in MANIFEST_PATTERNS.iter() {
            for m in pattern.find_iter(haystack) {
                let url = m.as_str();
                if !found.iter().any(|seen| seen == url) {
                    found.push(url.to_owned());
                }
            }
        }
    };

    collect(text);
    if text.contains("\\/") || text.contains("\\u0026") {
        let unescaped = text.replace("\\/", "/").replace("\\u0026", "&");
        collect(&unescaped);
    }
    found
}

/// Stateless matcher applying the detection rules to bridged messages and
/// host responses.
#[derive(Debug, Clone, Default)]
pub struct ManifestExtractor {
    /// Page URL used to resolve relative request URLs.
    base: Option<Url>,
}

impl ManifestExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: Url) -> Self {
        Self { base: Some(base) }
    }

    pub fn extract(&self, message: &BridgeMessage) -> Vec<Candidate> {
        match message {
            BridgeMessage::Event(event) => self.from_event(event),
            BridgeMessage::Raw(text) => tag(scan_payload(text), DetectionPath::RawPayload),
        }
    }

    /// Applies the event rules in order; the first rule that applies decides.
    pub fn from_event(&self, event: &NetworkEvent) -> Vec<Candidate> {
        match event {
            NetworkEvent::WsMessage(msg) if msg.data_length > 0 => {
                tag(scan_payload(&msg.data_preview), DetectionPath::WebSocketPayload)
            }
            NetworkEvent::XhrResponse(resp) | NetworkEvent::FetchResponse(resp)
                if is_manifest_url(&resp.url) =>
            {
                vec![Candidate {
                    url: self.resolve(&resp.url),
                    path: DetectionPath::PrimitiveResponse,
                }]
            }
            _ => Vec::new(),
        }
    }

    pub fn from_host_response(&self, response: &HostResponse) -> Option<Candidate> {
        match classify_host_response(&response.url) {
            HostResponseKind::Manifest => Some(Candidate {
                url: response.url.clone(),
                path: DetectionPath::HostResponse,
            }),
            HostResponseKind::Media | HostResponseKind::Other => None,
        }
    }

    fn resolve(&self, url: &str) -> String {
        if Url::parse(url).is_ok() {
            return url.to_owned();
        }
        self.base
            .as_ref()
            .and_then(|base| base.join(url).ok())
            .map(String::from)
            .unwrap_or_else(|| url.to_owned())
    }
}

pub fn classify_host_response(url: &str) -> HostResponseKind {
    if is_manifest_url(url) {
        HostResponseKind::Manifest
    } else if OBSERVED_MEDIA_EXTENSIONS.iter().any(|ext| url.contains(ext)) {
        HostResponseKind::Media
    } else {
        HostResponseKind::Other
    }
}

fn tag(urls: Vec<String>, path: DetectionPath) -> Vec<Candidate> {
    urls.into_iter().map(|url| Candidate { url, path }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ResponseEvent, WsMessage};

    fn ws_message(preview: &str, length: usize) -> NetworkEvent {
        NetworkEvent::WsMessage(WsMessage {
            url: "wss://im.example.com/ws".to_owned(),
            data_preview: preview.to_owned(),
            data_length: length,
            direction: Some("recv".to_owned()),
            ts: 0,
        })
    }

    fn response(kind: &str, url: &str) -> NetworkEvent {
        let resp = ResponseEvent {
            method: Some("GET".to_owned()),
            url: url.to_owned(),
            status: Some(200),
            text_preview: None,
            duration_ms: Some(5),
            ts: 0,
        };
        match kind {
            "xhr" => NetworkEvent::XhrResponse(resp),
            _ => NetworkEvent::FetchResponse(resp),
        }
    }

    #[test]
    fn finds_exactly_one_signed_link() {
        let payload =
            r#"{"type":"play","data":{"url":"https://host/live/abc123.m3u8?token=xyz","x":1}}"#;
        let candidates = ManifestExtractor::new().from_event(&ws_message(payload, payload.len()));
        assert_eq!(
            candidates,
            vec![Candidate {
                url: "https://host/live/abc123.m3u8?token=xyz".to_owned(),
                path: DetectionPath::WebSocketPayload,
            }]
        );
    }

    #[test]
    fn matches_case_insensitively() {
        let urls = scan_payload("stream=HTTPS://CDN.EXAMPLE.COM/Live/Room.M3U8 end");
        assert_eq!(urls, vec!["HTTPS://CDN.EXAMPLE.COM/Live/Room.M3U8".to_owned()]);
    }

    #[test]
    fn collects_every_link_in_order() {
        let urls = scan_payload(
            "a http://a.example.com/x.m3u8 b https://b.example.com/live/y.m3u8?k=v c",
        );
        assert_eq!(
            urls,
            vec![
                "http://a.example.com/x.m3u8".to_owned(),
                "https://b.example.com/live/y.m3u8?k=v".to_owned(),
            ]
        );
    }

    #[test]
    fn unescapes_json_encoded_links() {
        let urls = scan_payload(r#"{"u":"https:\/\/cdn.example.com\/live\/a.m3u8?a=1&b=2"}"#);
        assert_eq!(
            urls,
            vec!["https://cdn.example.com/live/a.m3u8?a=1&b=2".to_owned()]
        );
    }

    #[test]
    fn ignores_empty_messages() {
        let event = ws_message("https://host/live/a.m3u8", 0);
        assert!(ManifestExtractor::new().from_event(&event).is_empty());
    }

    #[test]
    fn segment_links_are_not_manifest_matches() {
        let urls = scan_payload("https://host/live/seg_001.ts?token=1 https://host/v.mp4");
        assert!(urls.is_empty());
    }

    #[test]
    fn response_urls_match_directly() {
        let extractor = ManifestExtractor::new();
        let xhr = extractor.from_event(&response("xhr", "https://cdn.example.com/a.m3u8?t=1"));
        assert_eq!(xhr.len(), 1);
        assert_eq!(xhr[0].path, DetectionPath::PrimitiveResponse);

        let other = extractor.from_event(&response("fetch", "https://api.example.com/room"));
        assert!(other.is_empty());
    }

    #[test]
    fn request_events_never_match() {
        let event = NetworkEvent::FetchRequest(crate::event::RequestEvent {
            method: Some("GET".to_owned()),
            url: "https://cdn.example.com/a.m3u8".to_owned(),
            body_preview: None,
            ts: 0,
        });
        assert!(ManifestExtractor::new().from_event(&event).is_empty());
    }

    #[test]
    fn relative_response_urls_resolve_against_page() {
        let base = Url::parse("https://live.example.com/room/index.html").unwrap();
        let extractor = ManifestExtractor::with_base(base);
        let candidates = extractor.from_event(&response("xhr", "/live/a.m3u8"));
        assert_eq!(candidates[0].url, "https://live.example.com/live/a.m3u8");
    }

    #[test]
    fn raw_payloads_are_scanned() {
        let message = BridgeMessage::Raw("oops {https://cdn.example.com/b.m3u8".to_owned());
        let candidates = ManifestExtractor::new().extract(&message);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].path, DetectionPath::RawPayload);
    }

    #[test]
    fn classifies_host_responses() {
        assert_eq!(
            classify_host_response("https://cdn.example.com/a.m3u8"),
            HostResponseKind::Manifest
        );
        assert_eq!(
            classify_host_response("https://cdn.example.com/seg1.ts?x=1"),
            HostResponseKind::Media
        );
        assert_eq!(
            classify_host_response("https://cdn.example.com/app.js"),
            HostResponseKind::Other
        );

        let extractor = ManifestExtractor::new();
        let media = HostResponse {
            url: "https://cdn.example.com/seg1.ts".to_owned(),
            status: 200,
        };
        assert_eq!(extractor.from_host_response(&media), None);
    }
}
