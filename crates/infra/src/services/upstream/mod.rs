mod inmemory;
mod perfect_gym;

use classwatch_domain::{CatalogDimension, CatalogEntry, ClassInstance, TimeSpan, User, ID};
pub use inmemory::InMemoryUpstreamProvider;
pub use perfect_gym::PerfectGymProvider;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Opaque handle for one authenticated upstream session. A session belongs
/// to exactly one user and lives at most one cycle.
#[derive(Debug, Clone)]
pub struct UpstreamSession {
    pub user_id: ID,
    pub home_club_id: Option<i64>,
    pub(crate) auth_token: String,
}

impl UpstreamSession {
    pub fn new(user_id: ID, auth_token: &str) -> Self {
        Self {
            user_id,
            home_club_id: None,
            auth_token: auth_token.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// Network error, timeout or upstream 5xx. The affected slice is simply
    /// retried next cycle.
    #[error("Transient upstream failure: {0}")]
    Transient(String),
    /// The session is no longer accepted. Surfaced for re-authentication;
    /// only the owning user's slice is affected.
    #[error("Upstream session expired or unauthorized")]
    AuthExpired,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Upstream rejected the credentials of login: {0}")]
    InvalidCredentials(String),
    #[error("No credentials available for login: {0}")]
    MissingCredentials(String),
    #[error("Transient failure during login: {0}")]
    Transient(String),
}

#[derive(Debug, Clone)]
pub struct UpstreamCredentials {
    pub login: String,
    pub password: String,
}

/// Boundary to the external credential collaborator. The core never stores
/// secret material; it only asks for the credentials matching an upstream
/// login when opening a session.
pub trait ICredentialSource: Send + Sync {
    fn credentials(&self, upstream_login: &str) -> Option<UpstreamCredentials>;
}

/// Fixed credential set handed in at startup, the simplest implementation of
/// the credential boundary. Also used by tests.
pub struct StaticCredentialSource {
    credentials: Mutex<HashMap<String, String>>,
}

impl StaticCredentialSource {
    pub fn new() -> Self {
        Self {
            credentials: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, login: &str, password: &str) {
        let mut credentials = self.credentials.lock().unwrap();
        credentials.insert(login.to_string(), password.to_string());
    }
}

impl ICredentialSource for StaticCredentialSource {
    fn credentials(&self, upstream_login: &str) -> Option<UpstreamCredentials> {
        let credentials = self.credentials.lock().unwrap();
        credentials
            .get(upstream_login)
            .map(|password| UpstreamCredentials {
                login: upstream_login.to_string(),
                password: password.clone(),
            })
    }
}

/// Everything the monitoring core needs from the upstream scheduling
/// backend. Pagination, markup and authentication quirks stay behind this
/// boundary; the core only ever sees normalized `ClassInstance` records.
#[async_trait::async_trait]
pub trait IUpstreamProvider: Send + Sync {
    /// Open a session for the given user. Called once per user per cycle.
    async fn get_session(&self, user: &User) -> Result<UpstreamSession, AuthError>;

    /// All schedulable class instances of the given clubs within the
    /// lookahead window, deduplicated by natural key. All-or-nothing: a
    /// partial result is never returned.
    async fn fetch_classes(
        &self,
        session: &UpstreamSession,
        clubs: &[String],
        window: &TimeSpan,
    ) -> Result<Vec<ClassInstance>, FetchError>;

    /// The enumerable filter dimensions as the upstream currently publishes
    /// them
    async fn fetch_catalog(
        &self,
        session: &UpstreamSession,
    ) -> Result<Vec<(CatalogDimension, Vec<CatalogEntry>)>, FetchError>;
}
