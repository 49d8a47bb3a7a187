//! Backend REST client.
//!
//! Covers group, member, camera, settings, audio asset and recording
//! endpoints. Requests carry `Authorization: Bearer <id token>` taken from the
//! identity session at call time, so a token refresh is picked up without
//! rebuilding the client.
//!
//! Inputs that the backend would reject anyway (empty group names, empty
//! invite codes, non-audio uploads) are rejected locally with
//! [`ApiError::Validation`] before any network call.

pub mod models;

use crate::identity::{AuthenticatedUser, IdentityHandle};
use crate::secret::ExposeSecret;
use crate::types::{CameraName, RoomId};
use models::{
    AudioAsset, CameraEvent, Group, GroupSettings, ParticipantRecordings, UserSettings,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend reply to `is-admin-member` for an admin.
const IS_ADMIN_MESSAGE: &str = "Is admin";

// =============================================================================
// Error Types
// =============================================================================

/// Errors returned by [`ApiClient`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Input rejected before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No signed-in user, or the backend rejected the ID token (401).
    #[error("Not authenticated")]
    Unauthenticated,

    /// Backend refused the operation for this user (403).
    #[error("Forbidden")]
    Forbidden,

    /// Transport failure (unreachable, timeout).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Any other non-success status.
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Message safe to show to an end user.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Validation(msg) => msg.clone(),
            ApiError::Unauthenticated => "Please sign in again".to_string(),
            ApiError::Forbidden => "Only group admins can do this".to_string(),
            ApiError::Http(_) => "The service is unreachable".to_string(),
            ApiError::Status { .. } | ApiError::InvalidResponse(_) => {
                "The service returned an error".to_string()
            }
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InvitationCodeResponse {
    Plain(String),
    Wrapped {
        #[serde(alias = "code")]
        #[serde(rename = "inviteCode")]
        invite_code: String,
    },
}

#[derive(Deserialize)]
struct AudiosResponse {
    #[serde(default)]
    audios: Option<Vec<AudioAsset>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordingsResponse {
    #[serde(default)]
    recordings_by_participant: Vec<ParticipantRecordings>,
}

#[derive(Serialize)]
struct NewUser<'a> {
    user: NewUserBody<'a>,
}

#[derive(Serialize)]
struct NewUserBody<'a> {
    email: Option<&'a str>,
    #[serde(rename = "UID")]
    uid: &'a str,
}

// =============================================================================
// Client
// =============================================================================

/// Client for the monitor backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    api_url: String,
    identity: IdentityHandle,
}

impl ApiClient {
    /// Create a client against `api_url`, authenticating as whoever is signed
    /// in on `identity`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(
        api_url: impl Into<String>,
        http_timeout: Duration,
        identity: IdentityHandle,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(http_timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            identity,
        })
    }

    // -------------------------------------------------------------------------
    // Groups and members
    // -------------------------------------------------------------------------

    /// Groups the signed-in user belongs to.
    #[instrument(skip_all)]
    pub async fn groups_for_user(&self) -> Result<Vec<Group>, ApiError> {
        let user = self.require_user()?;
        self.post("/secure/groups-for-user", &serde_json::json!({ "UID": user.uid }))
            .await
    }

    /// Create a group owned by the signed-in user.
    #[instrument(skip_all, fields(name = %name))]
    pub async fn create_group(&self, name: &str) -> Result<(), ApiError> {
        let name = non_empty(name, "Group name is required")?;
        let user = self.require_user()?;
        self.post_unit(
            "/secure/new-group",
            &serde_json::json!({ "UID": user.uid, "name": name }),
        )
        .await
    }

    /// Join a group with an invite code.
    #[instrument(skip_all)]
    pub async fn add_member(&self, invite_code: &str) -> Result<(), ApiError> {
        let code = non_empty(invite_code, "Invite code is required")?;
        let user = self.require_user()?;
        self.post_unit(
            "/secure/add-member",
            &serde_json::json!({ "UID": user.uid, "inviteCode": code }),
        )
        .await
    }

    /// Remove a member from a group. Only admins may remove others.
    #[instrument(skip_all, fields(group = %group))]
    pub async fn remove_member(&self, group: &RoomId, member_uid: &str) -> Result<(), ApiError> {
        let member = non_empty(member_uid, "Member is required")?;
        self.require_user()?;
        self.post_unit(
            "/secure/remove-member",
            &serde_json::json!({ "UID": member, "groupId": group.as_str() }),
        )
        .await
    }

    /// Whether the signed-in user administers `group`.
    ///
    /// A 403 means "not an admin" and maps to `Ok(false)`.
    #[instrument(skip_all, fields(group = %group))]
    pub async fn is_admin(&self, group: &RoomId) -> Result<bool, ApiError> {
        let user = self.require_user()?;
        let result: Result<MessageResponse, ApiError> = self
            .post(
                "/secure/is-admin-member",
                &serde_json::json!({ "UID": user.uid, "groupId": group.as_str() }),
            )
            .await;

        match result {
            Ok(body) => Ok(body.message == IS_ADMIN_MESSAGE),
            Err(ApiError::Forbidden) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Invitation code for `group`.
    #[instrument(skip_all, fields(group = %group))]
    pub async fn invitation_code(&self, group: &RoomId) -> Result<String, ApiError> {
        self.require_user()?;
        let body: InvitationCodeResponse = self
            .post(
                "/secure/invitation-code",
                &serde_json::json!({ "groupId": group.as_str() }),
            )
            .await?;

        let code = match body {
            InvitationCodeResponse::Plain(code) | InvitationCodeResponse::Wrapped { invite_code: code } => code,
        };
        if code.is_empty() {
            return Err(ApiError::InvalidResponse("empty invitation code".into()));
        }
        Ok(code)
    }

    /// Register a camera in `group`.
    #[instrument(skip_all, fields(group = %group, camera = %camera))]
    pub async fn add_camera(&self, group: &RoomId, camera: &CameraName) -> Result<(), ApiError> {
        let name = non_empty(camera.as_str(), "Camera name is required")?;
        self.require_user()?;
        self.post_unit(
            "/secure/add-camera",
            &serde_json::json!({ "groupId": group.as_str(), "name": name }),
        )
        .await
    }

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    /// Detection and recording settings of `group`.
    #[instrument(skip_all, fields(group = %group))]
    pub async fn group_settings(&self, group: &RoomId) -> Result<GroupSettings, ApiError> {
        self.require_user()?;
        self.get_url(self.path_url(&["secure", "group-settings", group.as_str()])?, &[])
            .await
    }

    /// Replace the settings of `group`. Admin only.
    #[instrument(skip_all, fields(group = %group))]
    pub async fn update_group_settings(
        &self,
        group: &RoomId,
        settings: GroupSettings,
    ) -> Result<(), ApiError> {
        let user = self.require_user()?;
        self.post_unit(
            "/secure/update-group-settings",
            &serde_json::json!({
                "groupId": group.as_str(),
                "settings": settings,
                "UID": user.uid,
            }),
        )
        .await
    }

    /// Create the backend record of the signed-in user.
    ///
    /// An already existing record (409) counts as success.
    #[instrument(skip_all)]
    pub async fn ensure_user(&self) -> Result<(), ApiError> {
        let user = self.require_user()?;
        let body = NewUser {
            user: NewUserBody {
                email: user.email.as_deref(),
                uid: &user.uid,
            },
        };

        match self.post_unit("/secure/new-user", &body).await {
            Err(ApiError::Status { status: 409, .. }) => {
                debug!(target: "common.api", "User already registered");
                Ok(())
            }
            other => other,
        }
    }

    /// Preferences of the signed-in user.
    #[instrument(skip_all)]
    pub async fn user_settings(&self) -> Result<UserSettings, ApiError> {
        let user = self.require_user()?;
        self.get_url(self.path_url(&["secure", "user-settings", user.uid.as_str()])?, &[])
            .await
    }

    /// Replace the preferences of the signed-in user.
    #[instrument(skip_all)]
    pub async fn update_user_settings(&self, settings: UserSettings) -> Result<(), ApiError> {
        let user = self.require_user()?;
        self.post_unit(
            "/secure/update-user-settings",
            &serde_json::json!({ "UID": user.uid, "settings": settings }),
        )
        .await
    }

    // -------------------------------------------------------------------------
    // Events, audio and recordings
    // -------------------------------------------------------------------------

    /// Detection events recorded for one camera.
    #[instrument(skip_all, fields(group = %group, camera = %camera))]
    pub async fn camera_events(
        &self,
        group: &RoomId,
        camera: &CameraName,
    ) -> Result<Vec<CameraEvent>, ApiError> {
        let url = self.path_url(&["events", "group", group.as_str(), "camera", camera.as_str()])?;
        self.get_url(url, &[]).await
    }

    /// Audio clips available in `room`.
    #[instrument(skip_all, fields(room = %room))]
    pub async fn audios(&self, room: &RoomId) -> Result<Vec<AudioAsset>, ApiError> {
        let body: AudiosResponse = self.get("/audios", &[("room", room.as_str())]).await?;
        Ok(body.audios.unwrap_or_default())
    }

    /// Upload an audio clip and return the updated list.
    ///
    /// Only `audio/*` content types are accepted.
    #[instrument(skip_all, fields(room = %room, file_name = %file_name))]
    pub async fn upload_audio(
        &self,
        room: &RoomId,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<AudioAsset>, ApiError> {
        let file_name = non_empty(file_name, "File name is required")?;
        if !content_type.starts_with("audio/") {
            return Err(ApiError::Validation("Only audio files are allowed".into()));
        }

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| ApiError::Validation(format!("Invalid content type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("room", room.as_str().to_string())
            .text("fileName", file_name.to_string());

        let request = self
            .authorized(self.http_client.post(self.url("/audios/upload")))
            .multipart(form);
        let body: AudiosResponse = self.send(request).await?;

        match body.audios {
            Some(audios) => Ok(audios),
            None => self.audios(room).await,
        }
    }

    /// Delete an audio clip and return the updated list.
    #[instrument(skip_all, fields(room = %room))]
    pub async fn delete_audio(&self, room: &RoomId, key: &str) -> Result<Vec<AudioAsset>, ApiError> {
        let key = non_empty(key, "Audio key is required")?;
        let body: AudiosResponse = self
            .post(
                "/audios/delete",
                &serde_json::json!({ "key": key, "room": room.as_str() }),
            )
            .await?;

        match body.audios {
            Some(audios) => Ok(audios),
            None => self.audios(room).await,
        }
    }

    /// Recordings in `room`, grouped by camera participant.
    #[instrument(skip_all, fields(room = %room))]
    pub async fn recordings(&self, room: &RoomId) -> Result<Vec<ParticipantRecordings>, ApiError> {
        let body: RecordingsResponse = self
            .get("/recordings", &[("room", room.as_str())])
            .await?;
        Ok(body.recordings_by_participant)
    }

    // -------------------------------------------------------------------------
    // Plumbing
    // -------------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// `api_url` followed by `segments`, each percent-encoded.
    fn path_url(&self, segments: &[&str]) -> Result<reqwest::Url, ApiError> {
        let mut url = reqwest::Url::parse(&self.api_url)
            .map_err(|e| ApiError::Validation(format!("Invalid API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Validation("Invalid API URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn require_user(&self) -> Result<AuthenticatedUser, ApiError> {
        self.identity.current().ok_or(ApiError::Unauthenticated)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.identity.current() {
            Some(user) => request.bearer_auth(user.id_token.expose_secret()),
            None => request,
        }
    }

    async fn get<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<R, ApiError> {
        self.get_url(self.url(path), query).await
    }

    async fn get_url<R: DeserializeOwned, U: reqwest::IntoUrl>(
        &self,
        url: U,
        query: &[(&str, &str)],
    ) -> Result<R, ApiError> {
        let request = self.authorized(self.http_client.get(url)).query(query);
        self.send(request).await
    }

    async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let request = self
            .authorized(self.http_client.post(self.url(path)))
            .json(body);
        self.send(request).await
    }

    async fn post_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let request = self
            .authorized(self.http_client.post(self.url(path)))
            .json(body);
        let response = self.execute(request).await?;
        drop(response);
        Ok(())
    }

    async fn send<R: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<R, ApiError> {
        let response = self.execute(request).await?;
        response.json::<R>().await.map_err(|e| {
            warn!(target: "common.api", error = %e, "Failed to parse backend response");
            ApiError::InvalidResponse(e.to_string())
        })
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await.map_err(|e| {
            debug!(target: "common.api", error = %e, "HTTP request failed");
            ApiError::Http(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<MessageResponse>()
            .await
            .map(|body| body.message)
            .unwrap_or_default();

        warn!(
            target: "common.api",
            status = %status,
            message = %message,
            "Backend request failed"
        );

        Err(match status {
            reqwest::StatusCode::UNAUTHORIZED => ApiError::Unauthenticated,
            reqwest::StatusCode::FORBIDDEN => ApiError::Forbidden,
            _ => ApiError::Status {
                status: status.as_u16(),
                message,
            },
        })
    }
}

fn non_empty<'a>(value: &'a str, message: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ApiError::Validation(message.to_string()))
    } else {
        Ok(trimmed)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::identity::{AuthenticatedUser, IdentityPublisher};
    use crate::secret::SecretString;
    use crate::media_token::DEFAULT_HTTP_TIMEOUT;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn signed_in(uri: &str) -> ApiClient {
        let identity = IdentityHandle::fixed(
            AuthenticatedUser::new("uid-1", SecretString::from("id-token")).with_email("a@b.c"),
        );
        ApiClient::new(uri, DEFAULT_HTTP_TIMEOUT, identity).unwrap()
    }

    #[tokio::test]
    async fn test_groups_for_user_sends_bearer_and_uid() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/secure/groups-for-user"))
            .and(header("authorization", "Bearer id-token"))
            .and(body_json(serde_json::json!({ "UID": "uid-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "_id": "g1", "name": "Casa", "cameras": [ { "name": "Luna", "status": "ONLINE" } ] }
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let groups = signed_in(&mock_server.uri()).groups_for_user().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].cameras[0].name, CameraName::new("Luna"));
    }

    #[tokio::test]
    async fn test_signed_out_is_rejected_locally() {
        let mock_server = MockServer::start().await;
        let (_publisher, identity) = IdentityPublisher::new();
        let client = ApiClient::new(mock_server.uri(), DEFAULT_HTTP_TIMEOUT, identity).unwrap();

        assert_eq!(
            client.groups_for_user().await.unwrap_err(),
            ApiError::Unauthenticated
        );
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_group_name_never_hits_network() {
        let mock_server = MockServer::start().await;
        let client = signed_in(&mock_server.uri());

        let err = client.create_group("   ").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let err = client.add_member("").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let err = client
            .add_camera(&RoomId::new("g1"), &CameraName::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_is_admin() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/secure/is-admin-member"))
            .and(body_json(serde_json::json!({ "UID": "uid-1", "groupId": "g1" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "message": "Is admin" })),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/secure/is-admin-member"))
            .and(body_json(serde_json::json!({ "UID": "uid-1", "groupId": "g2" })))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let client = signed_in(&mock_server.uri());
        assert!(client.is_admin(&RoomId::new("g1")).await.unwrap());
        assert!(!client.is_admin(&RoomId::new("g2")).await.unwrap());
    }

    #[tokio::test]
    async fn test_invitation_code_plain_and_wrapped() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/secure/invitation-code"))
            .and(body_json(serde_json::json!({ "groupId": "g1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!("ABC123")))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/secure/invitation-code"))
            .and(body_json(serde_json::json!({ "groupId": "g2" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "inviteCode": "XYZ" })),
            )
            .mount(&mock_server)
            .await;

        let client = signed_in(&mock_server.uri());
        assert_eq!(client.invitation_code(&RoomId::new("g1")).await.unwrap(), "ABC123");
        assert_eq!(client.invitation_code(&RoomId::new("g2")).await.unwrap(), "XYZ");
    }

    #[tokio::test]
    async fn test_update_group_settings_forbidden() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/secure/update-group-settings"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(serde_json::json!({ "message": "not admin" })),
            )
            .mount(&mock_server)
            .await;

        let err = signed_in(&mock_server.uri())
            .update_group_settings(&RoomId::new("g1"), GroupSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Forbidden);
        assert_eq!(err.client_message(), "Only group admins can do this");
    }

    #[tokio::test]
    async fn test_ensure_user_tolerates_conflict() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/secure/new-user"))
            .and(body_json(serde_json::json!({ "user": { "email": "a@b.c", "UID": "uid-1" } })))
            .respond_with(ResponseTemplate::new(409))
            .expect(1)
            .mount(&mock_server)
            .await;

        signed_in(&mock_server.uri()).ensure_user().await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_keeps_status_and_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/secure/group-settings/g1"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({ "message": "db down" })),
            )
            .mount(&mock_server)
            .await;

        let err = signed_in(&mock_server.uri())
            .group_settings(&RoomId::new("g1"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 500,
                message: "db down".to_string()
            }
        );
        assert_eq!(err.client_message(), "The service returned an error");
    }

    #[tokio::test]
    async fn test_upload_rejects_non_audio() {
        let mock_server = MockServer::start().await;

        let err = signed_in(&mock_server.uri())
            .upload_audio(&RoomId::new("g1"), "photo.png", "image/png", vec![1, 2, 3])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_audio_refetches_when_list_missing() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/audios/delete"))
            .and(body_json(serde_json::json!({ "key": "audio/g1/a.mp3", "room": "g1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/audios"))
            .and(query_param("room", "g1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "audios": [ { "key": "audio/g1/b.mp3", "url": "https://cdn/b.mp3" } ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let audios = signed_in(&mock_server.uri())
            .delete_audio(&RoomId::new("g1"), "audio/g1/a.mp3")
            .await
            .unwrap();
        assert_eq!(audios.len(), 1);
        assert_eq!(audios[0].display_name(&RoomId::new("g1")), "b");
    }

    #[tokio::test]
    async fn test_recordings() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/recordings"))
            .and(query_param("room", "g1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "recordingsByParticipant": [{
                    "participant": "camera-Luna",
                    "recordings": [{
                        "key": "r1",
                        "playlistUrl": "https://cdn/r1.m3u8",
                        "date": "2025-03-04",
                        "time": "10_11_12"
                    }]
                }]
            })))
            .mount(&mock_server)
            .await;

        let recordings = signed_in(&mock_server.uri())
            .recordings(&RoomId::new("g1"))
            .await
            .unwrap();
        assert_eq!(recordings.len(), 1);
        assert_eq!(
            recordings[0].participant.camera_name(),
            Some(CameraName::new("Luna"))
        );
        assert!(recordings[0].recordings[0].started_at().is_some());
    }

    #[tokio::test]
    async fn test_camera_events_encodes_camera_name() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/events/group/g1/camera/Luna%20%231%2F2%3F"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let events = signed_in(&mock_server.uri())
            .camera_events(&RoomId::new("g1"), &CameraName::new("Luna #1/2?"))
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/secure/user-settings/uid-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let err = signed_in(&mock_server.uri()).user_settings().await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }
}
