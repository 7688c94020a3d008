//! Domain modules
//!
//! `auth` owns the admin session, `player` owns signed media playback. Both
//! reach the network only through traits implemented in
//! [`crate::infrastructure::services`].

pub mod auth;
pub mod player;
