use std::time::Duration;

use chrono::{DateTime, Utc};

use super::backend::MediaElement;
use super::errors::MediaResult;

/// Playback settings captured before a swap and reapplied after it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSnapshot {
    pub was_playing: bool,
    pub position: Duration,
    pub volume: f64,
    pub muted: bool,
}

impl PlaybackSnapshot {
    pub fn capture(element: &dyn MediaElement) -> Self {
        Self {
            was_playing: !element.is_paused(),
            position: element.position(),
            volume: element.volume(),
            muted: element.is_muted(),
        }
    }

    /// Restore position, volume and mute. Play state is left to the caller.
    pub fn reapply(&self, element: &dyn MediaElement) -> MediaResult<()> {
        element.set_volume(self.volume);
        element.set_muted(self.muted);
        element.seek(self.position)
    }
}

/// What the controls render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_time: Duration,
    pub volume: f64,
    pub is_muted: bool,
    pub is_refreshing: bool,
}

/// Published on the controller's status channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaStatus {
    pub resource_id: Option<String>,
    pub refreshing: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Timer,
    PlaybackError,
    Manual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPhase {
    #[default]
    Idle,
    Refreshing(RefreshTrigger),
}

impl RefreshPhase {
    pub fn is_refreshing(&self) -> bool {
        matches!(self, RefreshPhase::Refreshing(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The source now points at the new URL.
    Swapped { preloaded: bool },
    /// The server returned the URL already bound.
    Unchanged,
    /// Another refresh was already running.
    Skipped,
    /// The resource was unmounted or replaced mid-refresh.
    Abandoned,
}
