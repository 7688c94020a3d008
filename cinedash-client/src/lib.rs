//! cinedash client library
//!
//! Session management and signed-URL media playback for the cinedash admin
//! console. The `cinedash-probe` binary in `src/main.rs` drives these pieces
//! end to end; UI shells embed the library directly.
//!
//! Notes
//! - [`domains::auth::SessionManager`] owns the admin credential and is
//!   injected into [`infrastructure::ApiClient`] as its credential source.
//! - [`domains::player::MediaSessionController`] keeps an expiring media URL
//!   fresh without interrupting playback.

pub mod domains;
pub mod infrastructure;

pub use domains::auth::{AuthError, LoginCredentials, Session, SessionManager, SessionState};
pub use domains::player::{MediaError, MediaSessionController, PlaybackState};
pub use infrastructure::{ApiClient, ApiError};
