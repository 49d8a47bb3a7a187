//! Monitor client error types.
//!
//! Views surface `client_message()`; internal details are logged only.

use common::media::MediaError;
use common::media_token::TokenError;
use common::signaling::SignalingError;
use thiserror::Error;

/// Failure of a preview, viewer or capture view.
#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// Access token could not be obtained. Terminal for the view.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Media session could not be opened or failed.
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Signaling command could not be sent.
    #[error("Signaling error: {0}")]
    Signaling(#[from] SignalingError),

    /// Rejected locally before anything was sent.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// No signed-in user.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The view was torn down first.
    #[error("Cancelled")]
    Cancelled,

    /// Actor gone or channel closed.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            SessionError::Token(TokenError::Rejected(_)) => {
                "You do not have access to this camera".to_string()
            }
            SessionError::Token(_) => "Could not get access to the camera".to_string(),
            SessionError::Media(_) => "Connection to the camera failed".to_string(),
            SessionError::Signaling(SignalingError::NotConnected) => {
                "Not connected, please try again".to_string()
            }
            SessionError::Signaling(_) => "Could not reach the camera".to_string(),
            SessionError::Validation(message) => message.clone(),
            SessionError::Unauthenticated => "Please sign in again".to_string(),
            SessionError::Cancelled => "Cancelled".to_string(),
            SessionError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages_hide_internal_details() {
        let err = SessionError::Token(TokenError::Http("connect 10.0.0.3:443 refused".into()));
        assert!(!err.client_message().contains("10.0.0.3"));

        let err = SessionError::Media(MediaError::Connect("ice failed: 192.168.1.9".into()));
        assert!(!err.client_message().contains("192.168"));

        let err = SessionError::Internal("presence actor mailbox closed".into());
        assert_eq!(err.client_message(), "An internal error occurred");
    }

    #[test]
    fn test_rejected_token_message() {
        let err = SessionError::from(TokenError::Rejected("Status 403".into()));
        assert_eq!(err.client_message(), "You do not have access to this camera");
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", SessionError::from(SignalingError::NotConnected)),
            "Signaling error: Signaling channel not connected"
        );
    }
}
