//! Shared stubs for the integration suites.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use cinedash_client::domains::auth::{AuthError, AuthResult, Session};
use cinedash_client::domains::player::{
    GrantSource, MediaAccessGrant, MediaBackend, MediaElement, MediaError, MediaResult,
    PlaybackSnapshot, PreloadTarget,
};
use cinedash_client::infrastructure::services::AuthApi;
use cinedash_config::{MediaConfig, SessionConfig};
use cinedash_contracts::auth::{AdminName, AdminUser, AuthPayload, LoginRequest, RefreshPayload};
use parking_lot::Mutex;
use url::Url;

pub const TEST_EMAIL: &str = "admin@example.com";
pub const TEST_PASSWORD: &str = "correct horse battery staple";

/// Unsigned JWT whose `exp` is `secs` from now.
pub fn jwt_expiring_in(secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let exp = Utc::now().timestamp() + secs;
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u1","exp":{exp}}}"#));
    format!("{header}.{payload}.signature")
}

pub fn admin_user() -> AdminUser {
    AdminUser {
        user_id: "u1".into(),
        email: TEST_EMAIL.into(),
        role: "admin".into(),
        name: AdminName {
            first_name: "Ada".into(),
            last_name: "Admin".into(),
        },
        ..AdminUser::default()
    }
}

pub fn session(access_token: &str, session_id: &str) -> Session {
    Session::from_login(AuthPayload {
        access_token: access_token.into(),
        user: admin_user(),
        session_id: session_id.into(),
        refresh_token: None,
    })
}

/// Background timers off unless a test turns them on.
pub fn quiet_session_config() -> SessionConfig {
    SessionConfig {
        verify_interval: None,
        proactive_refresh: false,
        ..SessionConfig::default()
    }
}

/// In-process auth endpoints with call counters.
#[derive(Debug)]
pub struct StubAuthApi {
    login_token: Mutex<String>,
    login_error: Mutex<Option<AuthError>>,
    refreshed_token: Mutex<String>,
    refresh_session_id: Mutex<Option<String>>,
    refresh_error: Mutex<Option<AuthError>>,
    refresh_delay: Mutex<Duration>,
    verify_error: Mutex<Option<AuthError>>,
    pub last_login: Mutex<Option<LoginRequest>>,
    pub refresh_tokens_sent: Mutex<Vec<Option<String>>>,
    pub authenticate_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
}

impl StubAuthApi {
    pub fn new(login_token: impl Into<String>, refreshed_token: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            login_token: Mutex::new(login_token.into()),
            login_error: Mutex::new(None),
            refreshed_token: Mutex::new(refreshed_token.into()),
            refresh_session_id: Mutex::new(None),
            refresh_error: Mutex::new(None),
            refresh_delay: Mutex::new(Duration::ZERO),
            verify_error: Mutex::new(None),
            last_login: Mutex::new(None),
            refresh_tokens_sent: Mutex::new(Vec::new()),
            authenticate_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        })
    }

    pub fn fail_login(&self, message: &str) {
        *self.login_error.lock() = Some(AuthError::AuthenticationFailed(message.into()));
    }

    pub fn fail_refresh(&self, message: &str) {
        *self.refresh_error.lock() = Some(AuthError::RefreshFailed(message.into()));
    }

    pub fn fail_verify(&self) {
        *self.verify_error.lock() = Some(AuthError::VerificationFailed(
            "Token verification failed".into(),
        ));
    }

    pub fn set_refreshed_token(&self, token: impl Into<String>) {
        *self.refreshed_token.lock() = token.into();
    }

    pub fn set_refresh_session_id(&self, session_id: Option<&str>) {
        *self.refresh_session_id.lock() = session_id.map(str::to_owned);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock() = delay;
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn verifies(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthApi for StubAuthApi {
    async fn authenticate(&self, request: &LoginRequest) -> AuthResult<AuthPayload> {
        self.authenticate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_login.lock() = Some(request.clone());
        if let Some(err) = self.login_error.lock().clone() {
            return Err(err);
        }
        Ok(AuthPayload {
            access_token: self.login_token.lock().clone(),
            user: admin_user(),
            session_id: "s1".into(),
            refresh_token: Some("r1".into()),
        })
    }

    async fn refresh(&self, refresh_token: Option<&str>) -> AuthResult<RefreshPayload> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_tokens_sent
            .lock()
            .push(refresh_token.map(str::to_owned));
        let delay = *self.refresh_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.refresh_error.lock().clone() {
            return Err(err);
        }
        Ok(RefreshPayload {
            access_token: self.refreshed_token.lock().clone(),
            user: None,
            session_id: self.refresh_session_id.lock().clone(),
            refresh_token: None,
        })
    }

    async fn verify(&self, _access_token: &str) -> AuthResult<()> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        match self.verify_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn logout(&self, _access_token: &str) -> AuthResult<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn media_config() -> MediaConfig {
    MediaConfig {
        fallback_refresh_interval: Duration::from_secs(30 * 60),
        refresh_lead: Duration::from_secs(60),
        min_refresh_interval: Duration::from_secs(5),
        preload_timeout: Duration::from_secs(10),
        failure_retry_delay: Duration::from_secs(30),
    }
}

#[derive(Debug)]
struct ElementState {
    source: Option<Url>,
    position: Duration,
    volume: f64,
    muted: bool,
    paused: bool,
    sources_set: Vec<Url>,
}

/// Media element that records what the controller does to it.
#[derive(Debug)]
pub struct FakeElement {
    state: Mutex<ElementState>,
    pub play_calls: AtomicUsize,
    pub pause_calls: AtomicUsize,
}

impl FakeElement {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ElementState {
                source: None,
                position: Duration::ZERO,
                volume: 1.0,
                muted: false,
                paused: true,
                sources_set: Vec::new(),
            }),
            play_calls: AtomicUsize::new(0),
            pause_calls: AtomicUsize::new(0),
        })
    }

    /// Simulate the user having watched to `position` with these settings.
    pub fn set_playing_at(&self, position: Duration, volume: f64, muted: bool) {
        let mut state = self.state.lock();
        state.position = position;
        state.volume = volume;
        state.muted = muted;
        state.paused = false;
    }

    pub fn sources_set(&self) -> Vec<Url> {
        self.state.lock().sources_set.clone()
    }
}

#[async_trait]
impl MediaElement for FakeElement {
    fn source(&self) -> Option<Url> {
        self.state.lock().source.clone()
    }

    fn set_source(&self, url: &Url) -> MediaResult<()> {
        let mut state = self.state.lock();
        state.source = Some(url.clone());
        state.sources_set.push(url.clone());
        // A new source resets the element like a browser does.
        state.position = Duration::ZERO;
        state.paused = true;
        Ok(())
    }

    fn position(&self) -> Duration {
        self.state.lock().position
    }

    fn seek(&self, position: Duration) -> MediaResult<()> {
        self.state.lock().position = position;
        Ok(())
    }

    fn volume(&self) -> f64 {
        self.state.lock().volume
    }

    fn set_volume(&self, volume: f64) {
        self.state.lock().volume = volume;
    }

    fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().muted = muted;
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    async fn play(&self) -> MediaResult<()> {
        self.play_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().paused = false;
        Ok(())
    }

    fn pause(&self) {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().paused = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadMode {
    Ready,
    Fails,
    NeverReady,
}

/// Backend whose preload targets become ready, fail or hang on demand.
#[derive(Debug)]
pub struct FakeBackend {
    mode: Mutex<PreloadMode>,
    pub preloads: AtomicUsize,
    pub releases: Arc<AtomicUsize>,
    pub applied: Arc<Mutex<Vec<PlaybackSnapshot>>>,
}

impl FakeBackend {
    pub fn new(mode: PreloadMode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            preloads: AtomicUsize::new(0),
            releases: Arc::new(AtomicUsize::new(0)),
            applied: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn set_mode(&self, mode: PreloadMode) {
        *self.mode.lock() = mode;
    }

    pub fn released(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

struct FakePreload {
    mode: PreloadMode,
    releases: Arc<AtomicUsize>,
    applied: Arc<Mutex<Vec<PlaybackSnapshot>>>,
}

#[async_trait]
impl PreloadTarget for FakePreload {
    fn apply(&mut self, snapshot: &PlaybackSnapshot) {
        self.applied.lock().push(*snapshot);
    }

    async fn until_ready(&mut self) -> MediaResult<()> {
        match self.mode {
            PreloadMode::Ready => Ok(()),
            PreloadMode::Fails => Err(MediaError::Element("network error".into())),
            PreloadMode::NeverReady => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl MediaBackend for FakeBackend {
    fn preload(&self, _url: &Url) -> MediaResult<Box<dyn PreloadTarget>> {
        self.preloads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePreload {
            mode: *self.mode.lock(),
            releases: Arc::clone(&self.releases),
            applied: Arc::clone(&self.applied),
        }))
    }
}

/// Hands out queued URLs; repeats the last one once the queue drains.
#[derive(Debug)]
pub struct StubGrants {
    urls: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    failing: Mutex<bool>,
    delay: Mutex<Duration>,
    pub calls: AtomicUsize,
}

impl StubGrants {
    pub fn new<I, S>(urls: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            urls: Mutex::new(urls.into_iter().map(Into::into).collect()),
            last: Mutex::new(None),
            failing: Mutex::new(false),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn push(&self, url: &str) {
        self.urls.lock().push_back(url.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn fetches(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GrantSource for StubGrants {
    async fn fetch_grant(&self, resource_id: &str) -> MediaResult<MediaAccessGrant> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if *self.failing.lock() {
            return Err(MediaError::GrantRefreshFailed("signing service unavailable".into()));
        }
        let next = self.urls.lock().pop_front();
        let raw = match next {
            Some(url) => {
                *self.last.lock() = Some(url.clone());
                url
            }
            None => self
                .last
                .lock()
                .clone()
                .ok_or_else(|| MediaError::GrantRefreshFailed("no URL queued".into()))?,
        };
        let url = Url::parse(&raw).map_err(|e| MediaError::GrantRefreshFailed(e.to_string()))?;
        Ok(MediaAccessGrant::new(resource_id, url))
    }
}
