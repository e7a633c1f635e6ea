use crate::shared::usecase::UseCase;
use classwatch_domain::{CatalogDimension, CatalogSnapshot};
use classwatch_infra::{ClasswatchContext, FetchError};
use tracing::{info, warn};

/// Re-fetch the enumerable filter dimensions and persist them as the new
/// snapshots. Runs on a cadence strictly slower than availability polls. Any
/// failure leaves the previous snapshots being served; staleness is
/// preferred to unavailability.
///
/// The upstream only exposes its dictionaries to an authenticated session,
/// so the refresh borrows the first user a session can be opened for.
#[derive(Debug)]
pub struct RefreshCatalogUseCase;

#[derive(Debug, Clone)]
pub struct CatalogRefreshReport {
    pub refreshed: Vec<CatalogDimension>,
}

#[derive(Debug)]
pub enum UseCaseError {
    /// No user session could be opened; previous snapshots stay live
    NoSession,
    /// The dictionary fetch failed; previous snapshots stay live
    Fetch(FetchError),
}

#[async_trait::async_trait(?Send)]
impl UseCase for RefreshCatalogUseCase {
    type Response = CatalogRefreshReport;

    type Error = UseCaseError;

    const NAME: &'static str = "RefreshCatalog";

    async fn execute(&mut self, ctx: &ClasswatchContext) -> Result<Self::Response, Self::Error> {
        let users = ctx.repos.users.find_all().await.unwrap_or_default();
        let mut session = None;
        for user in &users {
            match ctx.providers.upstream.get_session(user).await {
                Ok(opened) => {
                    session = Some(opened);
                    break;
                }
                Err(e) => warn!(
                    "Could not open a session for catalog refresh via user {}: {}",
                    user.id, e
                ),
            }
        }
        let session = match session {
            Some(session) => session,
            None => {
                warn!("Catalog refresh found no usable session, serving previous snapshots");
                return Err(UseCaseError::NoSession);
            }
        };

        let dimensions = match ctx.providers.upstream.fetch_catalog(&session).await {
            Ok(dimensions) => dimensions,
            Err(e) => {
                warn!(
                    "Catalog refresh failed, serving previous snapshots: {}",
                    e
                );
                return Err(UseCaseError::Fetch(e));
            }
        };

        let now = ctx.sys.get_timestamp_millis();
        let mut refreshed = Vec::new();
        for (dimension, entries) in dimensions {
            let snapshot = CatalogSnapshot {
                dimension,
                entries,
                refreshed_at: now,
            };
            match ctx.repos.catalog.save(&snapshot).await {
                Ok(()) => refreshed.push(dimension),
                Err(e) => warn!("Failed to persist {} snapshot: {}", dimension, e),
            }
        }
        info!("Catalog refreshed: {} dimensions", refreshed.len());
        Ok(CatalogRefreshReport { refreshed })
    }
}
