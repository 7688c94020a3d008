//! Session lifecycle owner
//!
//! One [`SessionManager`] per profile. It holds the credential, keeps it
//! fresh (proactive timer, periodic verify, refresh after a `401`) and tears
//! everything down on logout or an unrecoverable refresh failure.
//!
//! Refreshes are single-flight: concurrent callers share one in-flight
//! future and observe the same outcome. Every login, restore and session end
//! bumps an epoch so that a late outcome from a superseded session is
//! discarded instead of resurrecting it.

use std::{
    ops::ControlFlow,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use cinedash_config::{ClientConfig, SessionConfig};
use cinedash_contracts::auth::LoginRequest;
use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use super::device::DeviceIdentity;
use super::errors::{AuthError, AuthResult, StorageError};
use super::state_types::{AuthStateStore, SessionState};
use super::storage::{EncryptedFileStore, SessionStore, StoredSession};
use super::token::RefreshSchedule;
use super::types::{LoginCredentials, Session, VerifyOutcome};
use crate::infrastructure::{
    api_client::{ApiClient, CredentialSource},
    query_cache::SessionScopedCache,
    scheduler::{ScheduledTask, TaskSlot},
    services::auth::{AuthApi, AuthApiAdapter},
};

type RefreshFlight = Shared<BoxFuture<'static, AuthResult<Session>>>;

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
    state: AuthStateStore,
    epoch: AtomicU64,
    /// In-flight refresh, tagged so a finishing flight only clears itself.
    refresh_flight: Mutex<Option<(u64, RefreshFlight)>>,
    next_flight_id: AtomicU64,
    /// The immediate refresh for an expired or undecodable token fires at
    /// most once per login.
    immediate_refresh_spent: AtomicBool,
    refresh_timer: TaskSlot,
    verify_timer: TaskSlot,
    device_id: tokio::sync::Mutex<Option<DeviceIdentity>>,
    /// Epoch checks and state writes happen together under this lock.
    transition: Mutex<()>,
    /// Serializes store writes against clears.
    store_lock: tokio::sync::Mutex<()>,
    caches: RwLock<Vec<Arc<dyn SessionScopedCache>>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.inner.state.with_state(SessionState::name))
            .field("store", &self.inner.store)
            .field("refresh_timer_armed", &self.inner.refresh_timer.is_armed())
            .field("verify_timer_armed", &self.inner.verify_timer.is_armed())
            .finish()
    }
}

impl SessionManager {
    pub fn new(
        api: Arc<dyn AuthApi>,
        store: Arc<dyn SessionStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                config,
                state: AuthStateStore::new(),
                epoch: AtomicU64::new(0),
                refresh_flight: Mutex::new(None),
                next_flight_id: AtomicU64::new(0),
                immediate_refresh_spent: AtomicBool::new(false),
                refresh_timer: TaskSlot::new(),
                verify_timer: TaskSlot::new(),
                device_id: tokio::sync::Mutex::new(None),
                transition: Mutex::new(()),
                store_lock: tokio::sync::Mutex::new(()),
                caches: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Manager backed by the HTTP auth endpoints and the encrypted profile
    /// store described by `config`.
    pub fn from_config(client: &ApiClient, config: &ClientConfig) -> AuthResult<Self> {
        let store = EncryptedFileStore::for_profile(
            config.session.storage_dir.as_deref(),
            &config.session.profile,
        )?;
        debug!("[SessionManager] profile store at {}", store.dir().display());
        Ok(Self::new(
            Arc::new(AuthApiAdapter::new(client.clone())),
            Arc::new(store),
            config.session.clone(),
        ))
    }

    /// A client sharing `base`'s connection pool that attaches this
    /// manager's credential and recovers from `401` once.
    pub fn authorized_client(&self, base: &ApiClient) -> ApiClient {
        base.with_credentials(Arc::new(self.clone()))
    }

    /// Cleared whenever the session ends.
    pub fn register_cache(&self, cache: Arc<dyn SessionScopedCache>) {
        self.inner.caches.write().push(cache);
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.is_authenticated()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.state.with_state(|s| s.session().cloned())
    }

    /// `Authorization` header value for callers issuing their own requests.
    pub fn auth_header(&self) -> Option<String> {
        self.inner.state.with_state(|s| s.session().map(Session::bearer))
    }

    pub fn is_refresh_timer_armed(&self) -> bool {
        self.inner.refresh_timer.is_armed()
    }

    pub fn is_verify_timer_armed(&self) -> bool {
        self.inner.verify_timer.is_armed()
    }

    pub async fn login(&self, credentials: LoginCredentials) -> AuthResult<Session> {
        self.inner.login(credentials).await
    }

    /// End the session locally and notify the server best-effort. Safe to
    /// call repeatedly.
    pub async fn logout(&self) -> AuthResult<()> {
        let token = self
            .inner
            .state
            .with_state(|s| s.access_token().map(str::to_owned));
        let cleared = self.inner.end_session("logout", None).await;

        if let Some(token) = token {
            let notify = self.inner.api.logout(&token);
            match tokio::time::timeout(self.inner.config.logout_timeout, notify).await {
                Ok(Ok(())) => debug!("[SessionManager] server acknowledged logout"),
                Ok(Err(err)) => warn!("[SessionManager] logout notification failed: {err}"),
                Err(_) => warn!(
                    "[SessionManager] logout notification timed out after {:?}",
                    self.inner.config.logout_timeout
                ),
            }
        }

        info!("[SessionManager] logged out");
        cleared.map_err(AuthError::from)
    }

    /// Refresh the credential, joining a refresh already in flight.
    pub async fn refresh(&self) -> AuthResult<Session> {
        self.inner.refresh().await
    }

    /// Check the credential with the server; on failure refresh once.
    pub async fn verify(&self) -> AuthResult<VerifyOutcome> {
        self.inner.verify().await
    }

    /// Rehydrate from the profile store. Unreadable data is discarded and
    /// leaves the manager unauthenticated. A no-op while a session is held
    /// or a login is in flight.
    pub async fn restore(&self) -> AuthResult<SessionState> {
        self.inner.restore().await;
        Ok(self.state())
    }
}

#[async_trait]
impl CredentialSource for SessionManager {
    fn bearer_token(&self) -> Option<String> {
        self.inner
            .state
            .with_state(|s| s.access_token().map(str::to_owned))
    }

    async fn refresh_after_rejection(&self, rejected: Option<&str>) -> Result<String, AuthError> {
        self.inner
            .refresh_rejected(rejected)
            .await
            .map(|session| session.access_token)
    }
}

impl Inner {
    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.current_epoch() == epoch
    }

    /// Start a new epoch, invalidating timers and in-flight work.
    fn advance_epoch(&self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.refresh_timer.cancel();
        self.verify_timer.cancel();
        self.refresh_flight.lock().take();
        epoch
    }

    /// Store `session` as authenticated unless `epoch` has been superseded.
    fn commit(&self, epoch: u64, session: Session) -> bool {
        let _guard = self.transition.lock();
        if !self.is_current(epoch) {
            return false;
        }
        self.state.authenticate(session);
        true
    }

    async fn login(self: &Arc<Self>, credentials: LoginCredentials) -> AuthResult<Session> {
        let epoch = {
            let _guard = self.transition.lock();
            let epoch = self.advance_epoch();
            self.state.begin_login();
            epoch
        };
        self.immediate_refresh_spent.store(false, Ordering::SeqCst);
        info!("[SessionManager] logging in as {}", credentials.email);

        let outcome = self.authenticate(credentials).await;
        if !self.is_current(epoch) {
            debug!("[SessionManager] login superseded while in flight");
            return Err(AuthError::SessionEnded);
        }

        match outcome {
            Ok(session) => {
                if !self.commit(epoch, session.clone()) {
                    return Err(AuthError::SessionEnded);
                }
                self.persist(&session, epoch).await;
                self.arm_timers(&session, epoch);
                info!(
                    "[SessionManager] authenticated user {} (session {})",
                    session.user_id, session.session_id
                );
                Ok(session)
            }
            Err(err) => {
                warn!("[SessionManager] login failed: {err}");
                if let Err(store_err) = self.end_session("login failed", Some(epoch)).await {
                    warn!("[SessionManager] could not clear stored session: {store_err}");
                }
                Err(err)
            }
        }
    }

    async fn authenticate(&self, credentials: LoginCredentials) -> AuthResult<Session> {
        let device_id = match credentials.device_id {
            Some(device_id) => device_id,
            None => self.device_id().await?,
        };
        let request = LoginRequest {
            email: credentials.email,
            password: credentials.password,
            device_id: device_id.into_string(),
        };

        let session = Session::from_login(self.api.authenticate(&request).await?);
        if !session.is_authenticated() {
            return Err(AuthError::AuthenticationFailed("Login failed".into()));
        }
        Ok(session)
    }

    /// Stored device id, generating and persisting one on first use.
    async fn device_id(&self) -> AuthResult<DeviceIdentity> {
        let mut cached = self.device_id.lock().await;
        if let Some(device_id) = cached.as_ref() {
            return Ok(device_id.clone());
        }

        let device_id = match self.store.load_device_id().await {
            Ok(Some(device_id)) => device_id,
            Ok(None) => {
                let device_id = DeviceIdentity::generate();
                self.store.save_device_id(&device_id).await?;
                debug!("[SessionManager] generated device id {device_id}");
                device_id
            }
            Err(err) => {
                warn!("[SessionManager] unreadable device id, generating a new one: {err}");
                let device_id = DeviceIdentity::generate();
                self.store.save_device_id(&device_id).await?;
                device_id
            }
        };
        *cached = Some(device_id.clone());
        Ok(device_id)
    }

    async fn refresh(self: &Arc<Self>) -> AuthResult<Session> {
        let flight = self.join_or_start_refresh()?;
        flight.await
    }

    /// Refresh unless the rejected token has already been replaced.
    async fn refresh_rejected(self: &Arc<Self>, rejected: Option<&str>) -> AuthResult<Session> {
        let current = self.state.current();
        if let SessionState::Authenticated(session) = &current
            && Some(session.access_token.as_str()) != rejected
        {
            debug!("[SessionManager] credential already replaced; skipping refresh");
            return Ok(session.clone());
        }
        self.refresh().await
    }

    fn join_or_start_refresh(self: &Arc<Self>) -> AuthResult<RefreshFlight> {
        let mut slot = self.refresh_flight.lock();
        if let Some((_, flight)) = slot.as_ref() {
            return Ok(flight.clone());
        }

        let Some(session) = self.state.start_refresh() else {
            return Err(AuthError::NotAuthenticated);
        };
        let epoch = self.current_epoch();
        let flight_id = self.next_flight_id.fetch_add(1, Ordering::SeqCst);
        let weak: Weak<Self> = Arc::downgrade(self);

        let flight = async move {
            let Some(inner) = weak.upgrade() else {
                return Err(AuthError::SessionEnded);
            };
            let outcome = inner.perform_refresh(session, epoch).await;
            let mut slot = inner.refresh_flight.lock();
            if slot.as_ref().is_some_and(|(id, _)| *id == flight_id) {
                slot.take();
            }
            outcome
        }
        .boxed()
        .shared();

        *slot = Some((flight_id, flight.clone()));
        debug!("[SessionManager] refresh #{flight_id} started");
        Ok(flight)
    }

    async fn perform_refresh(self: &Arc<Self>, session: Session, epoch: u64) -> AuthResult<Session> {
        match self.api.refresh(session.refresh_token.as_deref()).await {
            Ok(payload) => {
                let mut updated = session;
                updated.apply_refresh(payload);
                if !self.commit(epoch, updated.clone()) {
                    debug!("[SessionManager] discarding refresh for an ended session");
                    return Err(AuthError::SessionEnded);
                }
                self.persist(&updated, epoch).await;
                if self.is_current(epoch) {
                    self.schedule_refresh(&updated, epoch);
                }
                info!("[SessionManager] credential refreshed");
                Ok(updated)
            }
            Err(err) => {
                warn!("[SessionManager] refresh failed: {err}");
                let message = match &err {
                    AuthError::RefreshFailed(message) => message.clone(),
                    other => other.to_string(),
                };
                if let Err(store_err) = self.end_session("refresh failed", Some(epoch)).await {
                    warn!("[SessionManager] could not clear stored session: {store_err}");
                }
                Err(AuthError::RefreshFailed(message))
            }
        }
    }

    async fn verify(self: &Arc<Self>) -> AuthResult<VerifyOutcome> {
        let Some(token) = self
            .state
            .with_state(|s| s.access_token().map(str::to_owned))
        else {
            return Err(AuthError::NotAuthenticated);
        };

        match self.api.verify(&token).await {
            Ok(()) => {
                debug!("[SessionManager] credential verified");
                Ok(VerifyOutcome::Verified)
            }
            Err(err) => {
                warn!("[SessionManager] verification failed ({err}); refreshing");
                let session = self.refresh_rejected(Some(&token)).await?;
                Ok(VerifyOutcome::Refreshed(session))
            }
        }
    }

    async fn restore(self: &Arc<Self>) {
        let epoch = {
            let _guard = self.transition.lock();
            let busy = self.state.with_state(|s| {
                matches!(
                    s,
                    SessionState::Authenticating
                        | SessionState::Authenticated(_)
                        | SessionState::Refreshing(_)
                )
            });
            if busy {
                debug!("[SessionManager] session already active; skipping restore");
                return;
            }
            self.advance_epoch()
        };
        self.immediate_refresh_spent.store(false, Ordering::SeqCst);

        let loaded = self.store.load_session().await;
        if !self.is_current(epoch) {
            return;
        }
        match loaded {
            Ok(Some(stored)) if stored.session.is_authenticated() => {
                info!(
                    "[SessionManager] restored session for {} (stored {})",
                    stored.session.user_id, stored.stored_at
                );
                if self.commit(epoch, stored.session.clone()) {
                    self.arm_timers(&stored.session, epoch);
                }
            }
            Ok(Some(_)) => {
                warn!("[SessionManager] stored session is incomplete; discarding");
                self.discard_unreadable(epoch).await;
            }
            Ok(None) => debug!("[SessionManager] no stored session"),
            Err(err) => {
                warn!("[SessionManager] stored session unreadable ({err}); discarding");
                self.discard_unreadable(epoch).await;
            }
        }
    }

    async fn discard_unreadable(&self, epoch: u64) {
        if let Err(err) = self.end_session("unreadable stored session", Some(epoch)).await {
            warn!("[SessionManager] could not clear stored session: {err}");
        }
    }

    async fn persist(&self, session: &Session, epoch: u64) {
        let _guard = self.store_lock.lock().await;
        if !self.is_current(epoch) {
            return;
        }
        if let Err(err) = self.store.save_session(&StoredSession::new(session.clone())).await {
            warn!("[SessionManager] failed to persist session: {err}");
        }
    }

    /// Sync half of ending a session. With `only_epoch` set, a session that
    /// has already been superseded is left alone.
    fn clear_state(&self, only_epoch: Option<u64>) -> bool {
        let _guard = self.transition.lock();
        if only_epoch.is_some_and(|epoch| !self.is_current(epoch)) {
            return false;
        }
        self.advance_epoch();
        self.state.clear();
        true
    }

    /// Clear credential, timers, caches and stored state.
    async fn end_session(&self, reason: &str, only_epoch: Option<u64>) -> Result<(), StorageError> {
        if !self.clear_state(only_epoch) {
            return Ok(());
        }
        let caches = self.caches.read().clone();
        for cache in caches {
            debug!("[SessionManager] clearing {}", cache.name());
            cache.clear_session_data();
        }
        self.device_id.lock().await.take();

        let _guard = self.store_lock.lock().await;
        debug!("[SessionManager] session ended: {reason}");
        self.store.clear().await
    }

    fn arm_timers(self: &Arc<Self>, session: &Session, epoch: u64) {
        self.schedule_refresh(session, epoch);
        self.schedule_verify(epoch);
    }

    fn schedule_refresh(self: &Arc<Self>, session: &Session, epoch: u64) {
        if !self.config.proactive_refresh {
            return;
        }
        let delay = match RefreshSchedule::for_token(
            &session.access_token,
            self.config.refresh_lead,
            Utc::now(),
        ) {
            RefreshSchedule::After(delay) => delay,
            schedule @ (RefreshSchedule::Expired | RefreshSchedule::Undecodable) => {
                if self.immediate_refresh_spent.swap(true, Ordering::SeqCst) {
                    debug!("[SessionManager] {schedule:?} token; no further proactive refresh");
                    self.refresh_timer.cancel();
                    return;
                }
                std::time::Duration::ZERO
            }
        };
        debug!("[SessionManager] proactive refresh in {delay:?}");

        let weak = Arc::downgrade(self);
        self.refresh_timer.replace(ScheduledTask::after(
            "proactive-refresh",
            delay,
            async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.is_current(epoch) {
                    return;
                }
                if let Err(err) = inner.refresh().await {
                    warn!("[SessionManager] proactive refresh failed: {err}");
                }
            },
        ));
    }

    fn schedule_verify(self: &Arc<Self>, epoch: u64) {
        let Some(period) = self.config.verify_interval else {
            return;
        };
        let weak = Arc::downgrade(self);
        self.verify_timer.replace(ScheduledTask::every("verify", period, move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return ControlFlow::Break(());
                };
                if !inner.is_current(epoch) {
                    return ControlFlow::Break(());
                }
                match inner.verify().await {
                    Ok(_) => ControlFlow::Continue(()),
                    Err(err) => {
                        debug!("[SessionManager] periodic verify ended session: {err}");
                        ControlFlow::Break(())
                    }
                }
            }
        }));
    }
}
