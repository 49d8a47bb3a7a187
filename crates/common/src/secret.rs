//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types. ID tokens from the identity provider and
//! media access tokens from the backend are always held as `SecretString`, so
//! any struct deriving `Debug` around them logs `[REDACTED]`.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct Grant {
//!     room: String,
//!     token: SecretString,
//! }
//!
//! let grant = Grant {
//!     room: "g1".to_string(),
//!     token: SecretString::from("eyJhbGciOi"),
//! };
//!
//! assert!(!format!("{grant:?}").contains("eyJhbGciOi"));
//! assert_eq!(grant.token.expose_secret(), "eyJhbGciOi");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
