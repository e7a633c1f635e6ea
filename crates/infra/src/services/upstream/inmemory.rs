use super::{AuthError, FetchError, IUpstreamProvider, UpstreamSession};
use classwatch_domain::{CatalogDimension, CatalogEntry, ClassInstance, TimeSpan, User, ID};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Scriptable upstream used by tests: serves a fixed class list, and can be
/// told to fail authentication per user or to fail the next fetches.
pub struct InMemoryUpstreamProvider {
    classes: Mutex<Vec<ClassInstance>>,
    catalog: Mutex<Vec<(CatalogDimension, Vec<CatalogEntry>)>>,
    auth_failures: Mutex<HashSet<ID>>,
    fetch_failures: Mutex<VecDeque<FetchError>>,
    catalog_failures: Mutex<VecDeque<FetchError>>,
}

impl InMemoryUpstreamProvider {
    pub fn new() -> Self {
        Self {
            classes: Mutex::new(Vec::new()),
            catalog: Mutex::new(Vec::new()),
            auth_failures: Mutex::new(HashSet::new()),
            fetch_failures: Mutex::new(VecDeque::new()),
            catalog_failures: Mutex::new(VecDeque::new()),
        }
    }

    pub fn set_classes(&self, classes: Vec<ClassInstance>) {
        *self.classes.lock().unwrap() = classes;
    }

    pub fn set_catalog(&self, dimension: CatalogDimension, entries: Vec<CatalogEntry>) {
        let mut catalog = self.catalog.lock().unwrap();
        catalog.retain(|(d, _)| *d != dimension);
        catalog.push((dimension, entries));
    }

    /// Make `get_session` fail for the given user until restored
    pub fn fail_auth_for(&self, user_id: &ID) {
        self.auth_failures.lock().unwrap().insert(user_id.clone());
    }

    pub fn restore_auth_for(&self, user_id: &ID) {
        self.auth_failures.lock().unwrap().remove(user_id);
    }

    /// Fail the next `fetch_classes` call with the given error
    pub fn push_fetch_failure(&self, error: FetchError) {
        self.fetch_failures.lock().unwrap().push_back(error);
    }

    /// Fail the next `fetch_catalog` call with the given error
    pub fn push_catalog_failure(&self, error: FetchError) {
        self.catalog_failures.lock().unwrap().push_back(error);
    }
}

#[async_trait::async_trait]
impl IUpstreamProvider for InMemoryUpstreamProvider {
    async fn get_session(&self, user: &User) -> Result<UpstreamSession, AuthError> {
        if self.auth_failures.lock().unwrap().contains(&user.id) {
            return Err(AuthError::InvalidCredentials(user.upstream_login.clone()));
        }
        Ok(UpstreamSession::new(user.id.clone(), "scripted-session"))
    }

    async fn fetch_classes(
        &self,
        _session: &UpstreamSession,
        clubs: &[String],
        window: &TimeSpan,
    ) -> Result<Vec<ClassInstance>, FetchError> {
        if let Some(error) = self.fetch_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let classes = self.classes.lock().unwrap();
        Ok(classes
            .iter()
            .filter(|c| clubs.contains(&c.club_id) && window.contains(c.start_ts))
            .cloned()
            .collect())
    }

    async fn fetch_catalog(
        &self,
        _session: &UpstreamSession,
    ) -> Result<Vec<(CatalogDimension, Vec<CatalogEntry>)>, FetchError> {
        if let Some(error) = self.catalog_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.catalog.lock().unwrap().clone())
    }
}
