//! WebSocket decorators: the full-duplex half of the tap.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Sink, Stream, StreamExt};
use futures::stream::{SplitSink, SplitStream};
use tokio_tungstenite::tungstenite::protocol::Message;

use super::Tap;
use crate::event::{NetworkEvent, Protocols};

/// Splits a WebSocket into tapped halves, reporting `ws_created` first.
pub fn tap_websocket<S, E>(
    socket: S,
    tap: Tap,
    url: impl Into<String>,
    protocols: Option<Protocols>,
) -> (
    TappedSink<SplitSink<S, Message>>,
    TappedStream<SplitStream<S>>,
)
where
    S: Stream<Item = Result<Message, E>> + Sink<Message>,
{
    let url = url.into();
    tap.emit(&NetworkEvent::ws_created(url.clone(), protocols));
    let (sink, stream) = socket.split();
    (
        TappedSink::new(sink, tap.clone(), url.clone()),
        TappedStream::new(stream, tap, url),
    )
}

/// Outbound half. Every data frame is reported as `ws_send` before it is
/// handed to the inner sink unchanged.
#[derive(Debug)]
pub struct TappedSink<S> {
    inner: S,
    tap: Tap,
    url: String,
}

impl<S> TappedSink<S> {
    pub fn new(inner: S, tap: Tap, url: impl Into<String>) -> Self {
        Self {
            inner,
            tap,
            url: url.into(),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S> Sink<Message> for TappedSink<S>
where
    S: Sink<Message> + Unpin,
{
    type Error = S::Error;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        let this = self.get_mut();
        let limit = this.tap.preview_limit();
        match &item {
            Message::Text(text) => this
                .tap
                .emit(&NetworkEvent::ws_send(&this.url, Some(text.as_str()), limit)),
            Message::Binary(_) => this
                .tap
                .emit(&NetworkEvent::ws_send(&this.url, None, limit)),
            _ => {}
        }
        Pin::new(&mut this.inner).start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_close(cx)
    }
}

/// Inbound half. Messages, close frames and errors are reported and then
/// yielded to the caller exactly as the inner stream produced them.
#[derive(Debug)]
pub struct TappedStream<S> {
    inner: S,
    tap: Tap,
    url: String,
}

impl<S> TappedStream<S> {
    pub fn new(inner: S, tap: Tap, url: impl Into<String>) -> Self {
        Self {
            inner,
            tap,
            url: url.into(),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn observe<E>(&self, item: &Result<Message, E>) {
        let event = match item {
            Ok(Message::Text(text)) => {
                NetworkEvent::ws_message(&self.url, text.as_str(), self.tap.preview_limit())
            }
            Ok(Message::Binary(data)) => NetworkEvent::ws_binary_message(&self.url, data.len()),
            Ok(Message::Close(frame)) => NetworkEvent::ws_close(
                &self.url,
                frame.as_ref().map(|f| u16::from(f.code)),
                frame.as_ref().map(|f| f.reason.as_str().to_owned()),
            ),
            Ok(_) => return,
            Err(_) => NetworkEvent::ws_error(&self.url),
        };
        self.tap.emit(&event);
    }
}

impl<S, E> Stream for TappedStream<S>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
{
    type Item = Result<Message, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_next(cx);
        if let Poll::Ready(Some(item)) = &polled {
            this.observe(item);
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use futures::SinkExt;
    use tokio_tungstenite::tungstenite::Utf8Bytes;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    use super::*;
    use crate::bridge::{BridgeMessage, BridgeReceiver, bridge};

    fn next_event(receiver: &mut BridgeReceiver) -> NetworkEvent {
        match receiver.try_recv() {
            Some(BridgeMessage::Event(event)) => event,
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_reports_untruncated_length() {
        let (sender, mut receiver) = bridge(8);
        let tap = Tap::new(sender, 10_000);
        let payload = "a".repeat(50_000);
        let inner = futures::stream::iter(vec![Ok::<_, std::io::Error>(Message::text(
            payload.clone(),
        ))]);
        let mut stream = TappedStream::new(inner, tap, "wss://im.example.com/ws");

        let item = stream.next().await.unwrap().unwrap();
        assert_eq!(item, Message::text(payload));

        match next_event(&mut receiver) {
            NetworkEvent::WsMessage(msg) => {
                assert_eq!(msg.data_length, 50_000);
                assert_eq!(msg.data_preview.len(), 10_000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_reports_close_and_errors() {
        let (sender, mut receiver) = bridge(8);
        let tap = Tap::new(sender, 64);
        let inner = futures::stream::iter(vec![
            Ok(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: Utf8Bytes::from_static("bye"),
            }))),
            Err(std::io::Error::other("reset")),
        ]);
        let mut stream = TappedStream::new(inner, tap, "wss://im.example.com/ws");

        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());

        match next_event(&mut receiver) {
            NetworkEvent::WsClose(close) => {
                assert_eq!(close.code, Some(1000));
                assert_eq!(close.reason.as_deref(), Some("bye"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            next_event(&mut receiver),
            NetworkEvent::WsError(_)
        ));
    }

    #[tokio::test]
    async fn sink_reports_then_forwards() {
        let (sender, mut receiver) = bridge(8);
        let tap = Tap::new(sender, 4);
        let (tx, mut rx) = futures::channel::mpsc::unbounded::<Message>();
        let mut sink = TappedSink::new(tx, tap, "wss://im.example.com/ws");

        sink.send(Message::text("subscribe:room")).await.unwrap();
        sink.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();

        assert_eq!(rx.next().await, Some(Message::text("subscribe:room")));
        assert_eq!(rx.next().await, Some(Message::binary(vec![1u8, 2, 3])));

        match next_event(&mut receiver) {
            NetworkEvent::WsSend(send) => assert_eq!(send.data_preview.as_deref(), Some("subs")),
            other => panic!("unexpected {other:?}"),
        }
        match next_event(&mut receiver) {
            NetworkEvent::WsSend(send) => {
                assert_eq!(send.data_preview.as_deref(), Some("[non-string]"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
