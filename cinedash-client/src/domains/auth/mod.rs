//! Authentication domain
//!
//! Login, silent refresh, verification and logout for the admin session.

pub mod device;
pub mod errors;
pub mod manager;
pub mod state_types;
pub mod storage;
pub mod token;
pub mod types;

pub use device::DeviceIdentity;
pub use errors::*;
pub use manager::SessionManager;
pub use state_types::{AuthStateStore, SessionState};
pub use storage::{EncryptedFileStore, MemorySessionStore, SessionStore, StoredSession};
pub use types::{LoginCredentials, Session, VerifyOutcome};
