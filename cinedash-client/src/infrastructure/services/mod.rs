//! Adapters from domain ports to the admin REST API

pub mod auth;
pub mod streaming;

pub use auth::{AuthApi, AuthApiAdapter};
pub use streaming::StreamingApiAdapter;
