//! In-memory signaling server.
//!
//! Accepts connections through [`MockSignalingServer::transport`], records
//! every frame clients send, and routes camera commands the way the real
//! server does: a `play-audio` / `stop-audio` / `rotate-camera` frame is
//! delivered to the connection that joined the same group as a camera with a
//! matching `cameraIdentity`.
//!
//! Tests drive connection loss with [`MockSignalingServer::drop_connections`]
//! and refusal with [`MockSignalingServer::refuse_connections`].

use async_trait::async_trait;
use common::signaling::{SignalingConnection, SignalingError, SignalingFrame, SignalingTransport};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CameraKey {
    group: String,
    camera: String,
}

#[derive(Debug)]
struct ConnectionEntry {
    outbox: mpsc::UnboundedSender<SignalingFrame>,
    camera: Option<CameraKey>,
}

#[derive(Debug, Default)]
struct ServerState {
    next_id: u64,
    connections: HashMap<u64, ConnectionEntry>,
    received: Vec<SignalingFrame>,
    refuse: bool,
    connect_attempts: usize,
}

impl ServerState {
    fn route(&mut self, from: u64, frame: SignalingFrame) {
        self.received.push(frame.clone());

        match frame.event.as_str() {
            "join-room" => {
                if frame.data["role"] == "camera" {
                    let key = camera_key(&frame.data);
                    if let Some(entry) = self.connections.get_mut(&from) {
                        entry.camera = key;
                    }
                }
            }
            "play-audio" => {
                let forwarded = json!({ "audioUrl": frame.data["audioUrl"] });
                self.forward_to_camera(&frame.data, SignalingFrame::new("play-audio", forwarded));
            }
            "stop-audio" => {
                self.forward_to_camera(&frame.data, SignalingFrame::new("stop-audio", json!({})));
            }
            "rotate-camera" => {
                self.forward_to_camera(&frame.data, SignalingFrame::new("rotate-camera", Value::Null));
            }
            _ => {}
        }
    }

    fn forward_to_camera(&self, data: &Value, frame: SignalingFrame) {
        let Some(key) = camera_key(data) else {
            return;
        };
        for entry in self.connections.values() {
            if entry.camera.as_ref() == Some(&key) {
                let _ = entry.outbox.send(frame.clone());
            }
        }
    }
}

fn camera_key(data: &Value) -> Option<CameraKey> {
    let group = data["group"]
        .as_str()
        .or_else(|| data["groupId"].as_str())?
        .to_string();
    let camera = data["cameraIdentity"].as_str()?.to_string();
    Some(CameraKey { group, camera })
}

/// In-memory signaling server.
#[derive(Debug, Clone, Default)]
pub struct MockSignalingServer {
    inner: Arc<Mutex<ServerState>>,
}

impl MockSignalingServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport connecting to this server.
    #[must_use]
    pub fn transport(&self) -> Arc<dyn SignalingTransport> {
        Arc::new(MockSignalingTransport {
            inner: self.inner.clone(),
        })
    }

    /// Every frame received from clients, in order.
    #[must_use]
    pub fn received_frames(&self) -> Vec<SignalingFrame> {
        self.inner.lock().unwrap().received.clone()
    }

    /// Payloads of received frames named `event`.
    #[must_use]
    pub fn received(&self, event: &str) -> Vec<Value> {
        self.inner
            .lock()
            .unwrap()
            .received
            .iter()
            .filter(|f| f.event == event)
            .map(|f| f.data.clone())
            .collect()
    }

    /// Close every open connection from the server side.
    pub fn drop_connections(&self) {
        self.inner.lock().unwrap().connections.clear();
    }

    /// Refuse (or accept again) new connections.
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.lock().unwrap().refuse = refuse;
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.lock().unwrap().connections.len()
    }

    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.inner.lock().unwrap().connect_attempts
    }

    /// Send `frame` to every open connection.
    pub fn broadcast(&self, frame: SignalingFrame) {
        for entry in self.inner.lock().unwrap().connections.values() {
            let _ = entry.outbox.send(frame.clone());
        }
    }
}

struct MockSignalingTransport {
    inner: Arc<Mutex<ServerState>>,
}

#[async_trait]
impl SignalingTransport for MockSignalingTransport {
    async fn connect(&self) -> Result<Box<dyn SignalingConnection>, SignalingError> {
        let mut state = self.inner.lock().unwrap();
        state.connect_attempts += 1;
        if state.refuse {
            return Err(SignalingError::Transport("connection refused".to_string()));
        }

        let id = state.next_id;
        state.next_id += 1;
        let (outbox, inbox) = mpsc::unbounded_channel();
        state.connections.insert(
            id,
            ConnectionEntry {
                outbox,
                camera: None,
            },
        );

        Ok(Box::new(MockSignalingConnection {
            id,
            inner: self.inner.clone(),
            inbox,
        }))
    }
}

struct MockSignalingConnection {
    id: u64,
    inner: Arc<Mutex<ServerState>>,
    inbox: mpsc::UnboundedReceiver<SignalingFrame>,
}

#[async_trait]
impl SignalingConnection for MockSignalingConnection {
    async fn send(&mut self, frame: SignalingFrame) -> Result<(), SignalingError> {
        let mut state = self.inner.lock().unwrap();
        if !state.connections.contains_key(&self.id) {
            return Err(SignalingError::Transport("connection closed".to_string()));
        }
        state.route(self.id, frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<SignalingFrame, SignalingError>> {
        self.inbox.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.inner.lock().unwrap().connections.remove(&self.id);
    }
}
