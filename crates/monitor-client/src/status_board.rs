//! Camera status reconciliation.
//!
//! The backend reports a status per camera when the group list is fetched;
//! presence actors observe the real thing at runtime. The board merges both:
//! a runtime observation wins over the polled status and survives list
//! refreshes until it is cleared or replaced by a newer observation.
//!
//! `CameraStatusMonitor` keeps one board per group and feeds it from a
//! preview of every listed camera.

use crate::actors::presence::{OfflineReason, PresenceChange, PresenceSignal};
use crate::errors::SessionError;
use crate::sessions::{PreviewHandle, PreviewSession, SessionContext};

use common::api::models::{CameraRecord, CameraStatus};
use common::types::{CameraName, RoomId};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument};

/// Where a reported status comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    /// Observed in a media session.
    Observed,
    /// Last list fetched from the backend.
    Polled,
}

/// Status of one camera as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraStatusEntry {
    pub status: CameraStatus,
    pub source: StatusSource,
    /// Why an observed camera went offline.
    pub offline_reason: Option<OfflineReason>,
}

#[derive(Debug, Clone, Copy)]
struct Observation {
    status: CameraStatus,
    offline_reason: Option<OfflineReason>,
}

/// Camera statuses of one group.
#[derive(Debug, Clone, Default)]
pub struct CameraStatusBoard {
    /// Cameras of the last fetched list, in backend order.
    listed: Vec<CameraName>,
    polled: BTreeMap<CameraName, CameraStatus>,
    observed: BTreeMap<CameraName, Observation>,
}

impl CameraStatusBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the polled statuses with a freshly fetched camera list.
    ///
    /// Observations of cameras no longer listed are dropped. A camera
    /// without a reported status counts as offline.
    pub fn refresh(&mut self, cameras: &[CameraRecord]) {
        self.listed = cameras.iter().map(|c| c.name.clone()).collect();
        self.polled = cameras
            .iter()
            .map(|c| (c.name.clone(), c.status.unwrap_or(CameraStatus::Offline)))
            .collect();
        self.observed
            .retain(|camera, _| self.polled.contains_key(camera));
    }

    /// Record a presence transition.
    pub fn observe(&mut self, signal: &PresenceSignal) {
        let observation = match signal.change {
            PresenceChange::Live | PresenceChange::Reconnected => Observation {
                status: CameraStatus::Online,
                offline_reason: None,
            },
            PresenceChange::Offline(reason) => Observation {
                status: CameraStatus::Offline,
                offline_reason: Some(reason),
            },
        };
        debug!(
            target: "monitor.status_board",
            camera = %signal.camera,
            online = observation.status.is_online(),
            "Camera status observed"
        );
        self.observed.insert(signal.camera.clone(), observation);
    }

    /// Forget the observation for `camera`; the polled status shows again.
    pub fn clear(&mut self, camera: &CameraName) {
        self.observed.remove(camera);
    }

    #[must_use]
    pub fn status(&self, camera: &CameraName) -> Option<CameraStatusEntry> {
        if let Some(observed) = self.observed.get(camera) {
            return Some(CameraStatusEntry {
                status: observed.status,
                source: StatusSource::Observed,
                offline_reason: observed.offline_reason,
            });
        }
        self.polled.get(camera).map(|status| CameraStatusEntry {
            status: *status,
            source: StatusSource::Polled,
            offline_reason: None,
        })
    }

    /// Listed cameras with their status, in list order.
    #[must_use]
    pub fn entries(&self) -> Vec<(CameraName, CameraStatusEntry)> {
        self.listed
            .iter()
            .filter_map(|camera| self.status(camera).map(|entry| (camera.clone(), entry)))
            .collect()
    }

    /// Listed cameras currently online.
    #[must_use]
    pub fn online(&self) -> Vec<CameraName> {
        self.entries()
            .into_iter()
            .filter(|(_, entry)| entry.status.is_online())
            .map(|(camera, _)| camera)
            .collect()
    }
}

/// Handle to a running [`CameraStatusMonitor`]. Dropping it stops every
/// preview.
pub struct CameraStatusMonitorHandle {
    board: watch::Receiver<CameraStatusBoard>,
    refresh_tx: mpsc::Sender<Vec<CameraRecord>>,
    cancel_token: CancellationToken,
    _detach_on_drop: DropGuard,
}

impl CameraStatusMonitorHandle {
    /// Current board.
    #[must_use]
    pub fn board(&self) -> CameraStatusBoard {
        self.board.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CameraStatusBoard> {
        self.board.clone()
    }

    /// Hand a freshly fetched camera list to the monitor.
    ///
    /// # Errors
    ///
    /// `SessionError::Cancelled` once the monitor has stopped.
    pub async fn refresh(&self, cameras: Vec<CameraRecord>) -> Result<(), SessionError> {
        self.refresh_tx
            .send(cameras)
            .await
            .map_err(|_| SessionError::Cancelled)
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

/// Keeps a [`CameraStatusBoard`] current for one group.
///
/// Every listed camera gets a preview; its presence signals are recorded as
/// observations. A preview that ended is reopened on the next refresh, and
/// previews of cameras no longer listed are dropped.
pub struct CameraStatusMonitor {
    context: SessionContext,
    room: RoomId,
    board: watch::Sender<CameraStatusBoard>,
    refresh_rx: mpsc::Receiver<Vec<CameraRecord>>,
    previews: HashMap<CameraName, PreviewHandle>,
    signals_tx: mpsc::Sender<PresenceSignal>,
    signals: mpsc::Receiver<PresenceSignal>,
    cancel_token: CancellationToken,
}

impl CameraStatusMonitor {
    pub fn spawn(
        context: SessionContext,
        room: RoomId,
        cancel_token: CancellationToken,
    ) -> (CameraStatusMonitorHandle, JoinHandle<()>) {
        let (board_tx, board_rx) = watch::channel(CameraStatusBoard::new());
        let (refresh_tx, refresh_rx) = mpsc::channel(4);
        let (signals_tx, signals) = mpsc::channel(32);

        let monitor = Self {
            context,
            room,
            board: board_tx,
            refresh_rx,
            previews: HashMap::new(),
            signals_tx,
            signals,
            cancel_token: cancel_token.clone(),
        };
        let task = tokio::spawn(monitor.run());

        let handle = CameraStatusMonitorHandle {
            board: board_rx,
            refresh_tx,
            _detach_on_drop: cancel_token.clone().drop_guard(),
            cancel_token,
        };
        (handle, task)
    }

    #[instrument(skip_all, name = "monitor.status_board", fields(room = %self.room))]
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => break,

                Some(signal) = self.signals.recv() => {
                    self.board.send_modify(|board| board.observe(&signal));
                }

                refreshed = self.refresh_rx.recv() => {
                    let Some(cameras) = refreshed else { break };
                    self.on_refresh(&cameras);
                }
            }
        }

        self.previews.clear();
        info!(target: "monitor.status_board", room = %self.room, "Status monitor stopped");
    }

    fn on_refresh(&mut self, cameras: &[CameraRecord]) {
        self.board.send_modify(|board| board.refresh(cameras));

        self.previews.retain(|camera, preview| {
            cameras.iter().any(|c| &c.name == camera) && !preview.state().is_terminal()
        });
        for record in cameras {
            if self.previews.contains_key(&record.name) {
                continue;
            }
            let (preview, _task) = PreviewSession::open_observed(
                self.context.clone(),
                self.room.clone(),
                record.name.clone(),
                self.signals_tx.clone(),
                self.cancel_token.child_token(),
            );
            self.previews.insert(record.name.clone(), preview);
        }
        debug!(
            target: "monitor.status_board",
            cameras = cameras.len(),
            previews = self.previews.len(),
            "Camera list refreshed"
        );
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::PresenceTiming;
    use monitor_test_utils::{
        camera_participant, test_room, MockMediaConnector, MockMediaSession, StaticTokenSource,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn record(name: &str, status: Option<CameraStatus>) -> CameraRecord {
        CameraRecord {
            id: None,
            name: CameraName::new(name),
            status,
            user: None,
        }
    }

    fn signal(name: &str, change: PresenceChange) -> PresenceSignal {
        PresenceSignal {
            camera: CameraName::new(name),
            change,
        }
    }

    #[test]
    fn test_polled_status_is_reported() {
        let mut board = CameraStatusBoard::new();
        board.refresh(&[
            record("Luna", Some(CameraStatus::Online)),
            record("Max", None),
        ]);

        let luna = board.status(&CameraName::new("Luna")).unwrap();
        assert_eq!(luna.status, CameraStatus::Online);
        assert_eq!(luna.source, StatusSource::Polled);

        let max = board.status(&CameraName::new("Max")).unwrap();
        assert_eq!(max.status, CameraStatus::Offline);
        assert!(board.status(&CameraName::new("Sol")).is_none());
    }

    #[test]
    fn test_observation_wins_and_survives_refresh() {
        let mut board = CameraStatusBoard::new();
        board.refresh(&[record("Luna", Some(CameraStatus::Online))]);

        board.observe(&signal("Luna", PresenceChange::Offline(OfflineReason::Departed)));
        board.refresh(&[record("Luna", Some(CameraStatus::Online))]);

        let luna = board.status(&CameraName::new("Luna")).unwrap();
        assert_eq!(luna.status, CameraStatus::Offline);
        assert_eq!(luna.source, StatusSource::Observed);
        assert_eq!(luna.offline_reason, Some(OfflineReason::Departed));
        assert!(board.online().is_empty());
    }

    #[test]
    fn test_newer_observation_replaces_older() {
        let mut board = CameraStatusBoard::new();
        board.refresh(&[record("Sol", Some(CameraStatus::Offline))]);

        board.observe(&signal("Sol", PresenceChange::Offline(OfflineReason::NeverSighted)));
        board.observe(&signal("Sol", PresenceChange::Live));

        let sol = board.status(&CameraName::new("Sol")).unwrap();
        assert_eq!(sol.status, CameraStatus::Online);
        assert_eq!(sol.offline_reason, None);
        assert_eq!(board.online(), vec![CameraName::new("Sol")]);
    }

    #[test]
    fn test_clear_restores_polled_status() {
        let mut board = CameraStatusBoard::new();
        board.refresh(&[record("Luna", Some(CameraStatus::Online))]);
        board.observe(&signal("Luna", PresenceChange::Offline(OfflineReason::SessionFailed)));

        board.clear(&CameraName::new("Luna"));

        let luna = board.status(&CameraName::new("Luna")).unwrap();
        assert_eq!(luna.status, CameraStatus::Online);
        assert_eq!(luna.source, StatusSource::Polled);
    }

    #[test]
    fn test_unlisted_camera_observation_dropped_on_refresh() {
        let mut board = CameraStatusBoard::new();
        board.refresh(&[record("Luna", None), record("Max", None)]);
        board.observe(&signal("Max", PresenceChange::Live));

        board.refresh(&[record("Luna", None)]);

        assert!(board.status(&CameraName::new("Max")).is_none());
        let names: Vec<_> = board.entries().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec![CameraName::new("Luna")]);
    }

    fn context(media: Arc<MockMediaConnector>) -> SessionContext {
        SessionContext::new(
            Arc::new(StaticTokenSource::new("tok")),
            media,
            "wss://media.example.com",
            PresenceTiming::default(),
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_offline_overrides_polled_online() {
        // Luna is reported online but never shows up in the room.
        let media = Arc::new(MockMediaConnector::new().with_session(Arc::new(MockMediaSession::new())));
        let (monitor, _task) =
            CameraStatusMonitor::spawn(context(media), test_room(), CancellationToken::new());

        monitor
            .refresh(vec![record("Luna", Some(CameraStatus::Online))])
            .await
            .unwrap();
        settle().await;
        let luna = monitor.board().status(&CameraName::new("Luna")).unwrap();
        assert_eq!(luna.source, StatusSource::Polled);
        assert!(luna.status.is_online());

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;

        let luna = monitor.board().status(&CameraName::new("Luna")).unwrap();
        assert_eq!(luna.status, CameraStatus::Offline);
        assert_eq!(luna.source, StatusSource::Observed);
        assert_eq!(luna.offline_reason, Some(OfflineReason::NeverSighted));

        // Another poll still says online; the observation stands.
        monitor
            .refresh(vec![record("Luna", Some(CameraStatus::Online))])
            .await
            .unwrap();
        settle().await;
        assert!(monitor.board().online().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_live_overrides_polled_offline() {
        let session = Arc::new(MockMediaSession::new());
        session.add_participant(camera_participant("Max"));
        let media = Arc::new(MockMediaConnector::new().with_session(session));
        let (monitor, _task) =
            CameraStatusMonitor::spawn(context(media.clone()), test_room(), CancellationToken::new());

        monitor
            .refresh(vec![record("Max", Some(CameraStatus::Offline))])
            .await
            .unwrap();
        settle().await;

        assert_eq!(monitor.board().online(), vec![CameraName::new("Max")]);
        assert_eq!(media.connect_count(), 1);

        // A running preview is not reopened.
        monitor
            .refresh(vec![record("Max", Some(CameraStatus::Offline))])
            .await
            .unwrap();
        settle().await;
        assert_eq!(media.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlisted_camera_preview_is_dropped() {
        let session = Arc::new(MockMediaSession::new());
        session.add_participant(camera_participant("Max"));
        let media = Arc::new(MockMediaConnector::new().with_session(session.clone()));
        let (monitor, _task) =
            CameraStatusMonitor::spawn(context(media), test_room(), CancellationToken::new());

        monitor.refresh(vec![record("Max", None)]).await.unwrap();
        settle().await;
        monitor.refresh(Vec::new()).await.unwrap();
        settle().await;

        assert!(session.is_disconnected());
        assert!(monitor.board().entries().is_empty());
    }
}
