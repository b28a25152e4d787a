//! Events emitted by the traffic tap, one per observed network occurrence.
//!
//! The wire form is a JSON object tagged by `kind`. Fields that do not apply
//! to a kind are omitted rather than filled with placeholders.

use serde::{Deserialize, Serialize};

/// Upper bound, in characters, of every payload preview.
pub const DEFAULT_PREVIEW_LIMIT: usize = 10_000;

/// Preview text used for payloads that are not strings.
pub const NON_STRING_MARKER: &str = "[non-string]";

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Returns at most `limit` characters of `text`.
pub fn preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_owned(),
        None => text.to_owned(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    XhrRequest,
    XhrResponse,
    FetchRequest,
    FetchResponse,
    WsCreated,
    WsSend,
    WsMessage,
    WsClose,
    WsError,
    Ping,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::XhrRequest => "xhr_request",
            EventKind::XhrResponse => "xhr_response",
            EventKind::FetchRequest => "fetch_request",
            EventKind::FetchResponse => "fetch_response",
            EventKind::WsCreated => "ws_created",
            EventKind::WsSend => "ws_send",
            EventKind::WsMessage => "ws_message",
            EventKind::WsClose => "ws_close",
            EventKind::WsError => "ws_error",
            EventKind::Ping => "ping",
        }
    }

    /// Completion of a request/response primitive.
    pub fn is_response(&self) -> bool {
        matches!(self, EventKind::XhrResponse | EventKind::FetchResponse)
    }

    pub fn is_websocket(&self) -> bool {
        matches!(
            self,
            EventKind::WsCreated
                | EventKind::WsSend
                | EventKind::WsMessage
                | EventKind::WsClose
                | EventKind::WsError
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_preview: Option<String>,
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub ts: i64,
}

/// Sub-protocols passed to a WebSocket constructor: a single name or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Protocols {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsCreated {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Protocols>,
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsSend {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_preview: Option<String>,
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsMessage {
    pub url: String,
    #[serde(default)]
    pub data_preview: String,
    /// Size of the whole payload, independent of how much the preview kept.
    #[serde(default)]
    pub data_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsClose {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsError {
    pub url: String,
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ping {
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetworkEvent {
    XhrRequest(RequestEvent),
    XhrResponse(ResponseEvent),
    FetchRequest(RequestEvent),
    FetchResponse(ResponseEvent),
    WsCreated(WsCreated),
    WsSend(WsSend),
    WsMessage(WsMessage),
    WsClose(WsClose),
    WsError(WsError),
    Ping(Ping),
}

impl NetworkEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            NetworkEvent::XhrRequest(_) => EventKind::XhrRequest,
            NetworkEvent::XhrResponse(_) => EventKind::XhrResponse,
            NetworkEvent::FetchRequest(_) => EventKind::FetchRequest,
            NetworkEvent::FetchResponse(_) => EventKind::FetchResponse,
            NetworkEvent::WsCreated(_) => EventKind::WsCreated,
            NetworkEvent::WsSend(_) => EventKind::WsSend,
            NetworkEvent::WsMessage(_) => EventKind::WsMessage,
            NetworkEvent::WsClose(_) => EventKind::WsClose,
            NetworkEvent::WsError(_) => EventKind::WsError,
            NetworkEvent::Ping(_) => EventKind::Ping,
        }
    }

    /// Target URL; `None` only for heartbeats.
    pub fn url(&self) -> Option<&str> {
        match self {
            NetworkEvent::XhrRequest(e) | NetworkEvent::FetchRequest(e) => Some(&e.url),
            NetworkEvent::XhrResponse(e) | NetworkEvent::FetchResponse(e) => Some(&e.url),
            NetworkEvent::WsCreated(e) => Some(&e.url),
            NetworkEvent::WsSend(e) => Some(&e.url),
            NetworkEvent::WsMessage(e) => Some(&e.url),
            NetworkEvent::WsClose(e) => Some(&e.url),
            NetworkEvent::WsError(e) => Some(&e.url),
            NetworkEvent::Ping(_) => None,
        }
    }

    pub fn ts(&self) -> i64 {
        match self {
            NetworkEvent::XhrRequest(e) | NetworkEvent::FetchRequest(e) => e.ts,
            NetworkEvent::XhrResponse(e) | NetworkEvent::FetchResponse(e) => e.ts,
            NetworkEvent::WsCreated(e) => e.ts,
            NetworkEvent::WsSend(e) => e.ts,
            NetworkEvent::WsMessage(e) => e.ts,
            NetworkEvent::WsClose(e) => e.ts,
            NetworkEvent::WsError(e) => e.ts,
            NetworkEvent::Ping(e) => e.ts,
        }
    }

    pub fn ws_created(url: impl Into<String>, protocols: Option<Protocols>) -> Self {
        NetworkEvent::WsCreated(WsCreated {
            url: url.into(),
            protocols,
            ts: now_millis(),
        })
    }

    /// Outbound frame. `data` is `None` for binary payloads.
    pub fn ws_send(url: impl Into<String>, data: Option<&str>, limit: usize) -> Self {
        let data_preview = match data {
            Some(text) => preview(text, limit),
            None => NON_STRING_MARKER.to_owned(),
        };
        NetworkEvent::WsSend(WsSend {
            url: url.into(),
            data_preview: Some(data_preview),
            ts: now_millis(),
        })
    }

    /// Inbound text frame; `data_length` counts every character of `data`.
    pub fn ws_message(url: impl Into<String>, data: &str, limit: usize) -> Self {
        NetworkEvent::WsMessage(WsMessage {
            url: url.into(),
            data_preview: preview(data, limit),
            data_length: data.chars().count(),
            direction: Some("recv".to_owned()),
            ts: now_millis(),
        })
    }

    /// Inbound binary frame of `len` bytes.
    pub fn ws_binary_message(url: impl Into<String>, len: usize) -> Self {
        NetworkEvent::WsMessage(WsMessage {
            url: url.into(),
            data_preview: NON_STRING_MARKER.to_owned(),
            data_length: len,
            direction: Some("recv".to_owned()),
            ts: now_millis(),
        })
    }

    pub fn ws_close(url: impl Into<String>, code: Option<u16>, reason: Option<String>) -> Self {
        NetworkEvent::WsClose(WsClose {
            url: url.into(),
            code,
            reason,
            ts: now_millis(),
        })
    }

    pub fn ws_error(url: impl Into<String>) -> Self {
        NetworkEvent::WsError(WsError {
            url: url.into(),
            ts: now_millis(),
        })
    }

    pub fn ping() -> Self {
        NetworkEvent::Ping(Ping { ts: now_millis() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_keeps_short_text() {
        assert_eq!(preview("abc", 10), "abc");
        assert_eq!(preview("", 10), "");
    }

    #[test]
    fn preview_cuts_on_char_boundary() {
        assert_eq!(preview("直播间地址", 2), "直播");
        assert_eq!(preview("abcdef", 3), "abc");
    }

    #[test]
    fn ws_message_reports_full_length() {
        let payload = "x".repeat(50_000);
        let event = NetworkEvent::ws_message("wss://im.example.com/ws", &payload, 10_000);
        match event {
            NetworkEvent::WsMessage(msg) => {
                assert_eq!(msg.data_length, 50_000);
                assert_eq!(msg.data_preview.len(), 10_000);
                assert_eq!(msg.direction.as_deref(), Some("recv"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn ws_send_marks_binary_payloads() {
        let event = NetworkEvent::ws_send("wss://im.example.com/ws", None, 10);
        match event {
            NetworkEvent::WsSend(send) => {
                assert_eq!(send.data_preview.as_deref(), Some(NON_STRING_MARKER))
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn parses_tap_payloads() {
        let raw = r##"{"kind":"fetch_response","method":"GET","url":"https://cdn.example.com/live/a.m3u8","status":200,"textPreview":"#EXTM3U","durationMs":12,"ts":1700000000000}"##;
        let event: NetworkEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.kind(), EventKind::FetchResponse);
        assert_eq!(event.url(), Some("https://cdn.example.com/live/a.m3u8"));

        let ping: NetworkEvent = serde_json::from_str(r#"{"kind":"ping","ts":1}"#).unwrap();
        assert_eq!(ping.kind(), EventKind::Ping);
        assert_eq!(ping.url(), None);
    }

    #[test]
    fn parses_protocol_variants() {
        let single: NetworkEvent = serde_json::from_str(
            r#"{"kind":"ws_created","url":"wss://a","protocols":"chat","ts":1}"#,
        )
        .unwrap();
        let many: NetworkEvent = serde_json::from_str(
            r#"{"kind":"ws_created","url":"wss://a","protocols":["chat","json"],"ts":1}"#,
        )
        .unwrap();
        let none: NetworkEvent = serde_json::from_str(
            r#"{"kind":"ws_created","url":"wss://a","protocols":null,"ts":1}"#,
        )
        .unwrap();

        assert!(matches!(
            single,
            NetworkEvent::WsCreated(WsCreated { protocols: Some(Protocols::One(_)), .. })
        ));
        assert!(matches!(
            many,
            NetworkEvent::WsCreated(WsCreated { protocols: Some(Protocols::Many(ref p)), .. }) if p.len() == 2
        ));
        assert!(matches!(
            none,
            NetworkEvent::WsCreated(WsCreated { protocols: None, .. })
        ));
    }

    #[test]
    fn omits_fields_that_do_not_apply() {
        let json = serde_json::to_value(NetworkEvent::ws_error("wss://a")).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.get("kind").and_then(|v| v.as_str()), Some("ws_error"));
        assert!(!obj.contains_key("status"));
        assert!(!obj.contains_key("dataPreview"));
    }

    #[test]
    fn rejects_events_without_url() {
        let result =
            serde_json::from_str::<NetworkEvent>(r#"{"kind":"ws_message","dataLength":3,"ts":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn timestamps_are_required() {
        let missing = serde_json::from_str::<NetworkEvent>(r#"{"kind":"ws_error","url":"wss://a"}"#);
        assert!(missing.is_err());
        assert!(serde_json::from_str::<NetworkEvent>(r#"{"kind":"ping"}"#).is_err());

        let event: NetworkEvent =
            serde_json::from_str(r#"{"kind":"ws_error","url":"wss://a","ts":42}"#).unwrap();
        assert_eq!(event.ts(), 42);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json.get("ts").and_then(|v| v.as_i64()), Some(42));
    }
}
