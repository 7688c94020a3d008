//! Player domain
//!
//! Keeps a signed, expiring media URL playable across refreshes.

pub mod backend;
pub mod controls;
pub mod errors;
pub mod grant;
pub mod session;
pub mod state;

pub use backend::{MediaBackend, MediaElement, PreloadGuard, PreloadTarget};
pub use errors::{MediaError, MediaResult};
pub use grant::{GrantSource, MediaAccessGrant, signed_url_expiry};
pub use session::MediaSessionController;
pub use state::{
    MediaStatus, PlaybackSnapshot, PlaybackState, RefreshOutcome, RefreshPhase, RefreshTrigger,
};
