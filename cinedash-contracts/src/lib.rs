//! Wire contracts for the cinedash admin REST collaborator.
//!
//! Everything here mirrors the JSON the server emits. Field names are
//! camelCase on the wire and snake_case in Rust.

pub mod api_types;
pub mod auth;
pub mod routes;
pub mod video;

/// Frequently used wire types.
pub mod prelude {
    pub use super::api_types::{ApiErrors, ApiResponse};
    pub use super::auth::{
        AdminName, AdminStats, AdminUser, AuthPayload, LoginRequest,
        RefreshPayload, RefreshRequest,
    };
    pub use super::video::{Video, VideoPage, VideoPayload, VideoStreamPayload};
}
