//! Media session controller
//!
//! Binds one resource to the visible element and keeps its signed URL
//! fresh. A refresh snapshots playback, fetches a new grant, preloads the
//! new URL off-screen when it changed, then swaps the source and restores
//! the snapshot. Refreshes never overlap: a trigger arriving mid-refresh is
//! skipped. Unmounting bumps a generation counter so any refresh still in
//! flight abandons its swap.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;

use chrono::Utc;
use cinedash_config::MediaConfig;
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::watch;
use url::Url;

use super::backend::{MediaBackend, MediaElement, PreloadGuard};
use super::errors::{MediaError, MediaResult};
use super::grant::{GrantSource, MediaAccessGrant};
use super::state::{
    MediaStatus, PlaybackSnapshot, PlaybackState, RefreshOutcome, RefreshPhase, RefreshTrigger,
};
use crate::infrastructure::scheduler::{ScheduledTask, TaskSlot};

#[derive(Clone)]
pub struct MediaSessionController {
    pub(super) inner: Arc<Inner>,
}

pub(super) struct Inner {
    pub(super) element: Arc<dyn MediaElement>,
    backend: Arc<dyn MediaBackend>,
    grants: Arc<dyn GrantSource>,
    config: MediaConfig,
    binding: Mutex<Option<Binding>>,
    pub(super) phase: Mutex<RefreshPhase>,
    generation: AtomicU64,
    timer: TaskSlot,
    error_refresh: TaskSlot,
    status: watch::Sender<MediaStatus>,
}

struct Binding {
    generation: u64,
    grant: MediaAccessGrant,
}

impl std::fmt::Debug for MediaSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSessionController")
            .field("status", &*self.inner.status.borrow())
            .field("phase", &*self.inner.phase.lock())
            .field("timer_armed", &self.inner.timer.is_armed())
            .finish()
    }
}

impl MediaSessionController {
    pub fn new(
        element: Arc<dyn MediaElement>,
        backend: Arc<dyn MediaBackend>,
        grants: Arc<dyn GrantSource>,
        config: MediaConfig,
    ) -> Self {
        let (status, _) = watch::channel(MediaStatus::default());
        Self {
            inner: Arc::new(Inner {
                element,
                backend,
                grants,
                config,
                binding: Mutex::new(None),
                phase: Mutex::new(RefreshPhase::Idle),
                generation: AtomicU64::new(0),
                timer: TaskSlot::new(),
                error_refresh: TaskSlot::new(),
                status,
            }),
        }
    }

    /// Bind `resource_id`: fetch its first grant, set the source and arm
    /// the refresh timer. Any previous binding is torn down first.
    pub async fn mount(&self, resource_id: &str) -> MediaResult<()> {
        self.inner.mount(resource_id).await
    }

    /// Cancel timers and any pending refresh. Idempotent.
    pub fn unmount(&self) {
        if let (_, Some(resource_id)) = self.inner.teardown() {
            info!("[MediaSession] unmounted {resource_id}");
        }
        self.inner.status.send_replace(MediaStatus::default());
    }

    pub async fn refresh_now(&self) -> MediaResult<RefreshOutcome> {
        self.inner.refresh(RefreshTrigger::Manual).await
    }

    /// Element reported a playback error, typically an expired signature.
    /// Starts a background refresh unless one is already running.
    pub fn handle_playback_error(&self) -> bool {
        if self.is_refreshing() {
            debug!("[MediaSession] playback error during refresh; ignoring");
            return false;
        }
        let Some(generation) = self.inner.mounted_generation() else {
            return false;
        };
        let weak = Arc::downgrade(&self.inner);
        self.inner.error_refresh.replace(ScheduledTask::spawn(
            "media-error-refresh",
            async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.is_current(generation) {
                    return;
                }
                match inner.refresh(RefreshTrigger::PlaybackError).await {
                    Ok(outcome) => debug!("[MediaSession] error-triggered refresh: {outcome:?}"),
                    Err(err) => debug!("[MediaSession] error-triggered refresh failed: {err}"),
                }
            },
        ));
        true
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.phase.lock().is_refreshing()
    }

    pub fn is_timer_armed(&self) -> bool {
        self.inner.timer.is_armed()
    }

    pub fn subscribe(&self) -> watch::Receiver<MediaStatus> {
        self.inner.status.subscribe()
    }

    pub fn status(&self) -> MediaStatus {
        self.inner.status.borrow().clone()
    }

    pub fn playback_state(&self) -> PlaybackState {
        let element = self.inner.element.as_ref();
        PlaybackState {
            is_playing: !element.is_paused(),
            current_time: element.position(),
            volume: element.volume(),
            is_muted: element.is_muted(),
            is_refreshing: self.is_refreshing(),
        }
    }

    pub fn current_grant(&self) -> Option<MediaAccessGrant> {
        self.inner
            .binding
            .lock()
            .as_ref()
            .map(|binding| binding.grant.clone())
    }
}

/// Holds the refresh phase for one refresh and resets it on drop.
struct PhaseGuard<'a> {
    inner: &'a Inner,
}

impl<'a> PhaseGuard<'a> {
    fn try_begin(inner: &'a Inner, trigger: RefreshTrigger) -> Option<Self> {
        let mut phase = inner.phase.lock();
        if phase.is_refreshing() {
            return None;
        }
        *phase = RefreshPhase::Refreshing(trigger);
        inner.status.send_modify(|status| status.refreshing = true);
        Some(Self { inner })
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *self.inner.phase.lock() = RefreshPhase::Idle;
        self.inner
            .status
            .send_modify(|status| status.refreshing = false);
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn mounted_generation(&self) -> Option<u64> {
        self.binding.lock().as_ref().map(|binding| binding.generation)
    }

    /// Drop the binding and everything scheduled for it. Returns the new
    /// generation and the resource that was bound.
    fn teardown(&self) -> (u64, Option<String>) {
        let mut binding = self.binding.lock();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.timer.cancel();
        self.error_refresh.cancel();
        (generation, binding.take().map(|binding| binding.grant.resource_id))
    }

    async fn mount(self: &Arc<Self>, resource_id: &str) -> MediaResult<()> {
        let (generation, previous) = self.teardown();
        if let Some(previous) = previous {
            debug!("[MediaSession] replacing binding for {previous}");
        }
        self.status.send_replace(MediaStatus {
            resource_id: Some(resource_id.to_string()),
            ..MediaStatus::default()
        });

        let grant = match self.grants.fetch_grant(resource_id).await {
            Ok(grant) => grant,
            Err(err) => {
                warn!("[MediaSession] initial grant for {resource_id} failed: {err}");
                let message = grant_failure_message(err);
                self.record_error(generation, &message);
                return Err(MediaError::GrantRefreshFailed(message));
            }
        };
        if !self.is_current(generation) {
            return Err(MediaError::NotMounted);
        }

        self.element.set_source(&grant.url)?;
        let delay = grant.refresh_delay(Utc::now(), &self.config);
        let expires_at = grant.expires_at;
        {
            let mut binding = self.binding.lock();
            if !self.is_current(generation) {
                return Err(MediaError::NotMounted);
            }
            *binding = Some(Binding { generation, grant });
            self.arm_timer(generation, delay);
        }
        self.status.send_modify(|status| status.expires_at = expires_at);
        info!("[MediaSession] mounted {resource_id}; next refresh in {delay:?}");
        Ok(())
    }

    async fn refresh(self: &Arc<Self>, trigger: RefreshTrigger) -> MediaResult<RefreshOutcome> {
        let Some(_phase) = PhaseGuard::try_begin(self, trigger) else {
            debug!("[MediaSession] {trigger:?} refresh skipped; already refreshing");
            return Ok(RefreshOutcome::Skipped);
        };
        let (generation, resource_id, current_url) = {
            let binding = self.binding.lock();
            let Some(binding) = binding.as_ref() else {
                return Err(MediaError::NotMounted);
            };
            (
                binding.generation,
                binding.grant.resource_id.clone(),
                binding.grant.url.clone(),
            )
        };
        debug!("[MediaSession] {trigger:?} refresh for {resource_id}");

        let snapshot = PlaybackSnapshot::capture(self.element.as_ref());
        let grant = match self.grants.fetch_grant(&resource_id).await {
            Ok(grant) => grant,
            Err(err) => {
                warn!("[MediaSession] grant refresh for {resource_id} failed: {err}");
                let message = grant_failure_message(err);
                self.record_error(generation, &message);
                self.rearm(generation, self.config.failure_retry_delay);
                return Err(MediaError::GrantRefreshFailed(message));
            }
        };
        if !self.is_current(generation) {
            return Ok(RefreshOutcome::Abandoned);
        }

        if grant.url == current_url {
            debug!("[MediaSession] grant for {resource_id} unchanged");
            return Ok(if self.commit(generation, grant) {
                RefreshOutcome::Unchanged
            } else {
                RefreshOutcome::Abandoned
            });
        }

        let preload = self.preload(&grant.url, &snapshot).await;
        if !self.is_current(generation) {
            return Ok(RefreshOutcome::Abandoned);
        }
        let preloaded = preload.is_some();

        if let Err(err) = self.swap(&grant.url, &snapshot).await {
            warn!("[MediaSession] source swap for {resource_id} failed: {err}");
            self.record_error(generation, &err.to_string());
            self.rearm(generation, self.config.failure_retry_delay);
            return Err(err);
        }
        drop(preload);

        if !self.commit(generation, grant) {
            return Ok(RefreshOutcome::Abandoned);
        }
        info!("[MediaSession] swapped source for {resource_id} (preloaded: {preloaded})");
        Ok(RefreshOutcome::Swapped { preloaded })
    }

    /// Load `url` on a detached target carrying the snapshot. `None` means
    /// fall back to a direct swap.
    async fn preload(&self, url: &Url, snapshot: &PlaybackSnapshot) -> Option<PreloadGuard> {
        let target = match self.backend.preload(url) {
            Ok(target) => target,
            Err(err) => {
                warn!("[MediaSession] preload unavailable ({err}); swapping directly");
                return None;
            }
        };
        let mut guard = PreloadGuard::new(target);
        guard.apply(snapshot);

        let timeout = self.config.preload_timeout;
        let ready = tokio::time::timeout(timeout, guard.until_ready()).await;
        match ready {
            Ok(Ok(())) => Some(guard),
            Ok(Err(err)) => {
                let err = MediaError::PreloadFailed(err.to_string());
                warn!("[MediaSession] {err}; swapping directly");
                None
            }
            Err(_) => {
                warn!("[MediaSession] {}; swapping directly", MediaError::PreloadTimeout(timeout));
                None
            }
        }
    }

    /// Point the element at `url` and restore the snapshot.
    async fn swap(&self, url: &Url, snapshot: &PlaybackSnapshot) -> MediaResult<()> {
        let element = self.element.as_ref();
        if snapshot.was_playing {
            element.pause();
        }
        element.set_source(url)?;
        if let Err(err) = snapshot.reapply(element) {
            warn!("[MediaSession] could not restore position: {err}");
        }
        if snapshot.was_playing
            && let Err(err) = element.play().await
        {
            warn!("[MediaSession] could not resume playback: {err}");
        }
        Ok(())
    }

    /// Store the new grant and re-arm for it, unless the binding changed.
    fn commit(self: &Arc<Self>, generation: u64, grant: MediaAccessGrant) -> bool {
        let delay = grant.refresh_delay(Utc::now(), &self.config);
        let expires_at = grant.expires_at;
        {
            let mut binding = self.binding.lock();
            match binding.as_mut() {
                Some(binding) if binding.generation == generation && self.is_current(generation) => {
                    binding.grant = grant;
                }
                _ => return false,
            }
            self.arm_timer(generation, delay);
        }
        self.status.send_modify(|status| {
            status.expires_at = expires_at;
            status.last_error = None;
        });
        debug!("[MediaSession] next refresh in {delay:?}");
        true
    }

    fn rearm(self: &Arc<Self>, generation: u64, delay: Duration) {
        let binding = self.binding.lock();
        if binding.as_ref().is_some_and(|b| b.generation == generation) && self.is_current(generation) {
            self.arm_timer(generation, delay);
        }
    }

    fn record_error(&self, generation: u64, message: &str) {
        if self.is_current(generation) {
            self.status
                .send_modify(|status| status.last_error = Some(message.to_string()));
        }
    }

    /// Caller holds the binding lock.
    fn arm_timer(self: &Arc<Self>, generation: u64, delay: Duration) {
        let weak = Arc::downgrade(self);
        self.timer.replace(ScheduledTask::after("media-refresh", delay, async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.is_current(generation) {
                return;
            }
            match inner.refresh(RefreshTrigger::Timer).await {
                Ok(outcome) => debug!("[MediaSession] timed refresh: {outcome:?}"),
                Err(err) => debug!("[MediaSession] timed refresh failed: {err}"),
            }
        }));
    }
}

fn grant_failure_message(err: MediaError) -> String {
    match err {
        MediaError::GrantRefreshFailed(message) => message,
        other => other.to_string(),
    }
}
