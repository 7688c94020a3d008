//! User playback controls
//!
//! Every control is rejected with [`MediaError::Busy`] while a refresh is
//! swapping the source underneath it.

use std::time::Duration;

use super::errors::{MediaError, MediaResult};
use super::session::MediaSessionController;

impl MediaSessionController {
    fn ensure_idle(&self) -> MediaResult<()> {
        if self.is_refreshing() {
            return Err(MediaError::Busy);
        }
        if self.current_grant().is_none() {
            return Err(MediaError::NotMounted);
        }
        Ok(())
    }

    /// Returns whether the element is now playing.
    pub async fn toggle_play(&self) -> MediaResult<bool> {
        self.ensure_idle()?;
        let element = self.inner.element.as_ref();
        if element.is_paused() {
            element.play().await?;
            Ok(true)
        } else {
            element.pause();
            Ok(false)
        }
    }

    pub fn seek(&self, position: Duration) -> MediaResult<()> {
        self.ensure_idle()?;
        self.inner.element.seek(position)
    }

    /// Clamped to `0.0..=1.0`; zero mutes, anything else unmutes.
    pub fn set_volume(&self, volume: f64) -> MediaResult<()> {
        self.ensure_idle()?;
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        let element = self.inner.element.as_ref();
        element.set_volume(volume);
        element.set_muted(volume == 0.0);
        Ok(())
    }

    /// Returns the new muted flag.
    pub fn toggle_mute(&self) -> MediaResult<bool> {
        self.ensure_idle()?;
        let element = self.inner.element.as_ref();
        let muted = !element.is_muted();
        element.set_muted(muted);
        Ok(muted)
    }
}
