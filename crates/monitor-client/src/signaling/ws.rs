//! WebSocket signaling transport.
//!
//! Each frame is one text message holding `{"event": ..., "data": ...}`.
//! Ping/pong and binary messages are ignored.

use async_trait::async_trait;
use common::signaling::{SignalingConnection, SignalingError, SignalingFrame, SignalingTransport};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to the signaling server over WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl SignalingTransport for WebSocketTransport {
    async fn connect(&self) -> Result<Box<dyn SignalingConnection>, SignalingError> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| SignalingError::Transport(e.to_string()))?;

        debug!(target: "monitor.signaling.ws", url = %self.url, "WebSocket connected");

        let (sink, stream) = stream.split();
        Ok(Box::new(WebSocketConnection { sink, stream }))
    }
}

struct WebSocketConnection {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl SignalingConnection for WebSocketConnection {
    async fn send(&mut self, frame: SignalingFrame) -> Result<(), SignalingError> {
        let text = frame.to_text()?;
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| SignalingError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<SignalingFrame, SignalingError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(SignalingFrame::from_text(&text)),
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(SignalingError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    /// Accept one WebSocket client, echo the first text frame back with its
    /// event renamed to `echo`, then close.
    async fn echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    let mut frame = SignalingFrame::from_text(&text).unwrap();
                    frame.event = "echo".to_string();
                    ws.send(Message::Text(frame.to_text().unwrap())).await.unwrap();
                    ws.send(Message::Text("not a frame".to_string())).await.unwrap();
                    ws.close(None).await.unwrap();
                    break;
                }
            }
        });

        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn test_round_trip_over_websocket() {
        let url = echo_server().await;
        let transport = WebSocketTransport::new(url);
        let mut connection = transport.connect().await.unwrap();

        connection
            .send(SignalingFrame::new("join-room", json!({ "group": "g1" })))
            .await
            .unwrap();

        let echoed = connection.recv().await.unwrap().unwrap();
        assert_eq!(echoed.event, "echo");
        assert_eq!(echoed.data["group"], "g1");

        let garbage = connection.recv().await.unwrap();
        assert!(matches!(garbage, Err(SignalingError::Encode(_))));

        assert!(connection.recv().await.is_none());
        connection.close().await;
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = WebSocketTransport::new(format!("ws://{addr}")).connect().await;
        assert!(matches!(result, Err(SignalingError::Transport(_))));
    }
}
