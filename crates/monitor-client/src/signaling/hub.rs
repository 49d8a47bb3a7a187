//! `SignalingHub` - the one process-wide signaling connection.
//!
//! The hub is constructed once by the top-level owner and shared by `Arc`
//! with every view that relays commands. It:
//!
//! - Keeps a single connection open through the [`SignalingTransport`],
//!   reconnecting with exponential backoff after a drop or a failed connect
//! - Numbers every successful connect (its *generation*) and publishes the
//!   connection state on a watch channel, so consumers can re-join on every
//!   connect
//! - Fans received camera commands out on a broadcast channel
//! - Disconnects only when the owner shuts it down (or cancels its token)
//!
//! Views never close the connection; they drop their receivers.
//!
//! # Ordering
//!
//! Outbound frames are tagged with the generation they were emitted for. A
//! frame whose connection is already gone is dropped instead of being sent
//! on the next one, so a `join-room` emitted for generation N never lands on
//! generation N+1.

use crate::config::ReconnectPolicy;
use crate::observability::metrics;
use crate::signaling::commands::{InboundCommand, OutboundCommand};

use common::signaling::{SignalingConnection, SignalingError, SignalingFrame, SignalingTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Capacity of the event broadcast.
const EVENT_BUFFER: usize = 64;

/// Connection state published by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub connected: bool,
    /// Number of successful connects so far. Changes on every connect.
    pub generation: u64,
}

/// Events fanned out to hub subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingEvent {
    Connected { generation: u64 },
    Disconnected,
    Command(InboundCommand),
}

/// Tracks which connect a consumer has already joined.
///
/// Every connect yields exactly one pending join.
#[derive(Debug)]
pub struct JoinTracker {
    state: watch::Receiver<ConnectionState>,
    joined: Option<u64>,
}

impl JoinTracker {
    /// Generation that still needs a `join-room`, if connected.
    pub fn pending(&mut self) -> Option<u64> {
        let state = *self.state.borrow_and_update();
        (state.connected && self.joined != Some(state.generation)).then_some(state.generation)
    }

    pub fn mark_joined(&mut self, generation: u64) {
        self.joined = Some(generation);
    }

    /// Wait for the connection state to change.
    ///
    /// Returns `false` once the hub is gone.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }
}

/// The process-wide signaling connection.
pub struct SignalingHub {
    outbound: mpsc::UnboundedSender<(u64, SignalingFrame)>,
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<SignalingEvent>,
    cancel_token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SignalingHub {
    /// Start the hub. It connects in the background.
    #[must_use]
    pub fn start(
        transport: Arc<dyn SignalingTransport>,
        policy: ReconnectPolicy,
        cancel_token: CancellationToken,
    ) -> Arc<Self> {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::default());
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let supervisor = Supervisor {
            transport,
            policy,
            outbound: outbound_rx,
            state: state_tx,
            events: events.clone(),
            cancel_token: cancel_token.clone(),
            generation: 0,
        };
        let task = tokio::spawn(supervisor.run());

        Arc::new(Self {
            outbound,
            state,
            events,
            cancel_token,
            task: Mutex::new(Some(task)),
        })
    }

    /// Send `command` on the current connection.
    ///
    /// # Errors
    ///
    /// - `SignalingError::NotConnected` - no connection right now
    /// - `SignalingError::Closed` - the hub was shut down
    /// - `SignalingError::Encode` - the payload could not be serialized
    pub fn emit(&self, command: &OutboundCommand) -> Result<(), SignalingError> {
        let state = *self.state.borrow();
        self.emit_on(state.generation, command)
    }

    /// Send `command` on connection `generation` only.
    ///
    /// # Errors
    ///
    /// As [`SignalingHub::emit`]; `NotConnected` also when `generation` is no
    /// longer the current connection.
    pub fn emit_on(&self, generation: u64, command: &OutboundCommand) -> Result<(), SignalingError> {
        if self.cancel_token.is_cancelled() {
            return Err(SignalingError::Closed);
        }
        let state = *self.state.borrow();
        if !state.connected || state.generation != generation {
            return Err(SignalingError::NotConnected);
        }

        let frame = command.to_frame()?;
        self.outbound
            .send((generation, frame))
            .map_err(|_| SignalingError::Closed)?;
        metrics::record_command("sent", command.event_name());
        debug!(
            target: "monitor.signaling.hub",
            event = command.event_name(),
            generation,
            "Command queued"
        );
        Ok(())
    }

    /// Receive connection events and camera commands.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SignalingEvent> {
        self.events.subscribe()
    }

    /// A fresh join tracker that has joined nothing yet.
    #[must_use]
    pub fn join_tracker(&self) -> JoinTracker {
        JoinTracker {
            state: self.state.clone(),
            joined: None,
        }
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Frames already queued for the current connection are flushed first.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(
                    target: "monitor.signaling.hub",
                    error = %e,
                    "Signaling supervisor ended abnormally"
                );
            }
        }
    }
}

impl Drop for SignalingHub {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    Lost,
    Shutdown,
}

struct Supervisor {
    transport: Arc<dyn SignalingTransport>,
    policy: ReconnectPolicy,
    outbound: mpsc::UnboundedReceiver<(u64, SignalingFrame)>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<SignalingEvent>,
    cancel_token: CancellationToken,
    generation: u64,
}

impl Supervisor {
    #[instrument(skip_all, name = "monitor.signaling.hub")]
    async fn run(mut self) {
        info!(target: "monitor.signaling.hub", "Signaling hub started");

        let mut backoff = self.policy.initial_backoff;

        loop {
            let connected = tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => break,
                result = self.transport.connect() => result,
            };

            match connected {
                Ok(mut connection) => {
                    backoff = self.policy.initial_backoff;
                    self.on_connected();

                    let end = self.pump(connection.as_mut()).await;
                    connection.close().await;
                    self.on_disconnected();

                    if end == ConnectionEnd::Shutdown {
                        break;
                    }
                }
                Err(e) => {
                    metrics::record_signaling_reconnect("error");
                    warn!(
                        target: "monitor.signaling.hub",
                        error = %e,
                        retry_in_ms = millis(backoff),
                        "Signaling connect failed"
                    );
                }
            }

            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => break,
                () = tokio::time::sleep(backoff) => {}
            }
            backoff = self.policy.next(backoff);
        }

        info!(
            target: "monitor.signaling.hub",
            connects = self.generation,
            "Signaling hub stopped"
        );
    }

    fn on_connected(&mut self) {
        self.generation += 1;
        metrics::record_signaling_reconnect("success");
        metrics::set_signaling_connected(true);
        self.state.send_replace(ConnectionState {
            connected: true,
            generation: self.generation,
        });
        let _ = self.events.send(SignalingEvent::Connected {
            generation: self.generation,
        });
        info!(
            target: "monitor.signaling.hub",
            generation = self.generation,
            "Signaling connected"
        );
    }

    fn on_disconnected(&mut self) {
        metrics::set_signaling_connected(false);
        self.state.send_replace(ConnectionState {
            connected: false,
            generation: self.generation,
        });
        let _ = self.events.send(SignalingEvent::Disconnected);
        info!(
            target: "monitor.signaling.hub",
            generation = self.generation,
            "Signaling disconnected"
        );
    }

    /// Shuttle frames until the connection ends.
    async fn pump(&mut self, connection: &mut dyn SignalingConnection) -> ConnectionEnd {
        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    self.flush(connection).await;
                    return ConnectionEnd::Shutdown;
                }

                queued = self.outbound.recv() => {
                    let Some((generation, frame)) = queued else {
                        return ConnectionEnd::Shutdown;
                    };
                    if generation != self.generation {
                        debug!(
                            target: "monitor.signaling.hub",
                            event = %frame.event,
                            generation,
                            "Dropping frame for a previous connection"
                        );
                        continue;
                    }
                    if let Err(e) = connection.send(frame).await {
                        warn!(
                            target: "monitor.signaling.hub",
                            error = %e,
                            "Signaling send failed"
                        );
                        return ConnectionEnd::Lost;
                    }
                }

                inbound = connection.recv() => {
                    match inbound {
                        Some(Ok(frame)) => self.dispatch(&frame),
                        Some(Err(SignalingError::Encode(e))) => {
                            warn!(
                                target: "monitor.signaling.hub",
                                error = %e,
                                "Dropping undecodable frame"
                            );
                        }
                        Some(Err(e)) => {
                            warn!(
                                target: "monitor.signaling.hub",
                                error = %e,
                                "Signaling connection failed"
                            );
                            return ConnectionEnd::Lost;
                        }
                        None => return ConnectionEnd::Lost,
                    }
                }
            }
        }
    }

    /// Send whatever is still queued for the current connection.
    async fn flush(&mut self, connection: &mut dyn SignalingConnection) {
        while let Ok((generation, frame)) = self.outbound.try_recv() {
            if generation != self.generation {
                continue;
            }
            if let Err(e) = connection.send(frame).await {
                debug!(
                    target: "monitor.signaling.hub",
                    error = %e,
                    "Flush on shutdown failed"
                );
                return;
            }
        }
    }

    fn dispatch(&self, frame: &SignalingFrame) {
        if let Some(command) = InboundCommand::decode(frame) {
            metrics::record_command("received", command.event_name());
            debug!(
                target: "monitor.signaling.hub",
                event = command.event_name(),
                "Command received"
            );
            let _ = self.events.send(SignalingEvent::Command(command));
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
