//! Media element seams
//!
//! The controller drives a visible [`MediaElement`] and asks a
//! [`MediaBackend`] for detached preload targets. UI shells implement these
//! over whatever player they embed.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::errors::MediaResult;
use super::state::PlaybackSnapshot;

/// The on-screen element. Methods take `&self`; implementations synchronise
/// internally.
#[async_trait]
pub trait MediaElement: Send + Sync {
    fn source(&self) -> Option<Url>;

    fn set_source(&self, url: &Url) -> MediaResult<()>;

    fn position(&self) -> Duration;

    fn seek(&self, position: Duration) -> MediaResult<()>;

    /// Linear volume in `0.0..=1.0`.
    fn volume(&self) -> f64;

    fn set_volume(&self, volume: f64);

    fn is_muted(&self) -> bool;

    fn set_muted(&self, muted: bool);

    fn is_paused(&self) -> bool;

    /// Resolves once playback has started or was refused.
    async fn play(&self) -> MediaResult<()>;

    fn pause(&self);
}

/// A detached element loading a candidate source off-screen.
#[async_trait]
pub trait PreloadTarget: Send {
    fn apply(&mut self, snapshot: &PlaybackSnapshot);

    /// Resolves on the element's "can play" signal, or with the load error.
    async fn until_ready(&mut self) -> MediaResult<()>;

    /// Detach and free the element. Called exactly once.
    fn release(&mut self);
}

pub trait MediaBackend: Send + Sync {
    fn preload(&self, url: &Url) -> MediaResult<Box<dyn PreloadTarget>>;
}

/// Owns a preload target and releases it when dropped, whichever way the
/// refresh exits.
pub struct PreloadGuard {
    target: Box<dyn PreloadTarget>,
}

impl PreloadGuard {
    pub fn new(target: Box<dyn PreloadTarget>) -> Self {
        Self { target }
    }

    pub fn apply(&mut self, snapshot: &PlaybackSnapshot) {
        self.target.apply(snapshot);
    }

    pub async fn until_ready(&mut self) -> MediaResult<()> {
        self.target.until_ready().await
    }
}

impl Drop for PreloadGuard {
    fn drop(&mut self) {
        self.target.release();
    }
}

impl std::fmt::Debug for PreloadGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadGuard").finish_non_exhaustive()
    }
}
