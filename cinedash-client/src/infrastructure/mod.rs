//! Infrastructure shared by the domains
//!
//! HTTP access to the admin API, background timers and the session-scoped
//! query cache.

pub mod api_client;
pub mod errors;
pub mod query_cache;
pub mod scheduler;
pub mod services;

pub use api_client::{ApiClient, CredentialSource};
pub use errors::{ApiError, ApiResult};
pub use query_cache::{QueryCache, SessionScopedCache};
pub use scheduler::{ScheduledTask, TaskSlot};
