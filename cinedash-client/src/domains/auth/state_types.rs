//! Session state machine
//!
//! Readers get cheap snapshots through a watch channel; all transitions go
//! through [`AuthStateStore`].

use std::sync::Arc;

use tokio::sync::watch;

use super::types::Session;

/// Session lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Nothing attempted yet
    Anonymous,

    /// Login request in flight
    Authenticating,

    /// Credential held
    Authenticated(Session),

    /// Refresh in flight; the previous credential stays readable
    Refreshing(Session),

    /// Credential cleared by logout, failed login or failed refresh
    Unauthenticated,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.session().is_some_and(Session::is_authenticated)
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session)
            | SessionState::Refreshing(session) => Some(session),
            _ => None,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session().map(|s| s.access_token.as_str())
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(self, SessionState::Refreshing(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Anonymous => "anonymous",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::Refreshing(_) => "refreshing",
            SessionState::Unauthenticated => "unauthenticated",
        }
    }
}

/// Thread-safe session state store using a watch channel
#[derive(Clone, Debug)]
pub struct AuthStateStore {
    sender: Arc<watch::Sender<SessionState>>,
    receiver: watch::Receiver<SessionState>,
}

impl AuthStateStore {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(SessionState::Anonymous);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn current(&self) -> SessionState {
        self.receiver.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.receiver.borrow().is_authenticated()
    }

    /// Access state without cloning
    pub fn with_state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SessionState) -> R,
    {
        f(&self.receiver.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.receiver.clone()
    }

    pub fn set(&self, state: SessionState) {
        log::trace!("[SessionState] -> {}", state.name());
        self.sender.send_replace(state);
    }

    pub fn begin_login(&self) {
        self.set(SessionState::Authenticating);
    }

    pub fn authenticate(&self, session: Session) {
        self.set(SessionState::Authenticated(session));
    }

    /// Move an authenticated session into `Refreshing`, returning the
    /// credential being refreshed.
    pub fn start_refresh(&self) -> Option<Session> {
        let mut started = None;
        self.sender.send_if_modified(|state| match state {
            SessionState::Authenticated(session) => {
                started = Some(session.clone());
                *state = SessionState::Refreshing(session.clone());
                true
            }
            SessionState::Refreshing(session) => {
                started = Some(session.clone());
                false
            }
            _ => false,
        });
        started
    }

    pub fn clear(&self) {
        self.set(SessionState::Unauthenticated);
    }
}

impl Default for AuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}
