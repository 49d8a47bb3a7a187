//! Views fetching their media token from a live HTTP backend.
//!
//! Uses `wiremock` for the token endpoint and the in-memory media connector
//! for the session, so these run on the real clock.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use common::media_token::{MediaTokenClient, TokenError, DEFAULT_HTTP_TIMEOUT};
use common::secret::ExposeSecret;
use common::types::{CameraName, ParticipantRole};
use monitor_client::config::PresenceTiming;
use monitor_client::errors::SessionError;
use monitor_client::sessions::{PreviewSession, PreviewState, SessionContext, ViewerSession};
use monitor_test_utils::{camera_participant, test_identity, test_room, MockMediaConnector, MockMediaSession};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn context(server: &MockServer, media: Arc<MockMediaConnector>) -> SessionContext {
    let tokens = MediaTokenClient::new(server.uri(), DEFAULT_HTTP_TIMEOUT).unwrap();
    SessionContext::new(
        Arc::new(tokens),
        media,
        "wss://media.example.com",
        PresenceTiming::default(),
    )
}

async fn wait_for(
    state: &mut watch::Receiver<PreviewState>,
    done: impl Fn(&PreviewState) -> bool,
) -> PreviewState {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let current = state.borrow_and_update().clone();
            if done(&current) {
                return current;
            }
            state.changed().await.unwrap();
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_preview_uses_issued_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getToken"))
        .and(query_param("roomName", "group-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "media-jwt" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = Arc::new(MockMediaSession::new());
    session.add_participant(camera_participant("Luna"));
    let media = Arc::new(MockMediaConnector::new().with_session(session));

    let (handle, _task) = PreviewSession::open(
        context(&server, media.clone()),
        test_room(),
        CameraName::new("Luna"),
        CancellationToken::new(),
    );
    let mut state = handle.subscribe();
    let state = wait_for(&mut state, |s| matches!(s, PreviewState::Live) || s.is_terminal()).await;
    assert!(matches!(state, PreviewState::Live));

    let options = media.connect_options();
    assert_eq!(options[0].token.expose_secret(), "media-jwt");

    let requests = server.received_requests().await.unwrap();
    let participant = requests[0]
        .url
        .query_pairs()
        .find(|(key, _)| key == "participantName")
        .map(|(_, value)| value.into_owned())
        .unwrap();
    assert!(participant.starts_with("thumbnail-viewer-Luna-"));
    assert_eq!(options[0].identity.role(), ParticipantRole::Preview);
}

#[tokio::test]
async fn test_rejected_token_fails_preview_without_connecting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getToken"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let media = Arc::new(MockMediaConnector::new());
    let (handle, _task) = PreviewSession::open(
        context(&server, media.clone()),
        test_room(),
        CameraName::new("Luna"),
        CancellationToken::new(),
    );
    let mut state = handle.subscribe();
    let state = wait_for(&mut state, PreviewState::is_terminal).await;

    assert!(matches!(
        state,
        PreviewState::Failed(SessionError::Token(TokenError::Rejected(_)))
    ));
    assert_eq!(media.connect_count(), 0);
}

#[tokio::test]
async fn test_viewer_requests_token_for_viewer_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getToken"))
        .and(query_param("roomName", "group-1"))
        .and(query_param("participantName", "viewer-parent"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "viewer-jwt" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let media = Arc::new(MockMediaConnector::new());
    let viewer = ViewerSession::open(
        &context(&server, media.clone()),
        &test_identity(),
        test_room(),
        None,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(media.connect_options()[0].token.expose_secret(), "viewer-jwt");
    viewer.close().await;
    assert!(media.opened_sessions()[0].is_disconnected());
}
