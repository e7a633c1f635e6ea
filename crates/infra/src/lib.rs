mod config;
mod repos;
mod retry;
mod services;
mod system;

pub use config::{normalize_cron, Config};
pub use repos::{DeleteResult, ICatalogRepo, ILedgerRepo, IUserFilterRepo, IUserRepo};
use repos::Repos;
pub use retry::RetryPolicy;
pub use services::*;
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
pub use system::{FixedTimeSys, ISys};
use system::RealSys;

#[derive(Clone)]
pub struct Providers {
    pub upstream: Arc<dyn IUpstreamProvider>,
    pub delivery: Arc<dyn IDeliveryChannel>,
}

#[derive(Clone)]
pub struct ClasswatchContext {
    pub repos: Repos,
    pub providers: Providers,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
}

struct ContextParams {
    pub postgres_connection_string: String,
    pub credentials: Arc<dyn ICredentialSource>,
}

impl ClasswatchContext {
    async fn create(params: ContextParams) -> Self {
        let config = Config::new();
        let repos = Repos::create_postgres(&params.postgres_connection_string)
            .await
            .expect("Postgres credentials must be set and valid");
        let upstream = Arc::new(PerfectGymProvider::new(
            config.upstream_base_url.clone(),
            config.upstream_timezone,
            params.credentials,
            config.retry.clone(),
            config.fetch_timeout,
        ));
        let webhook_url = config
            .delivery_webhook_url
            .clone()
            .expect("DELIVERY_WEBHOOK_URL env var to be present.");
        let delivery = Arc::new(WebhookDeliveryChannel::new(
            webhook_url,
            config.delivery_webhook_key.clone(),
            config.retry.clone(),
            config.dispatch_timeout,
        ));
        Self {
            repos,
            providers: Providers { upstream, delivery },
            config,
            sys: Arc::new(RealSys {}),
        }
    }

    /// Context over in-memory repos with the given providers, for tests and
    /// local experiments. No environment or database required.
    pub fn create_inmemory(
        upstream: Arc<dyn IUpstreamProvider>,
        delivery: Arc<dyn IDeliveryChannel>,
    ) -> Self {
        Self {
            repos: Repos::create_inmemory(),
            providers: Providers { upstream, delivery },
            config: Config::new(),
            sys: Arc::new(RealSys {}),
        }
    }
}

/// Will setup the infrastructure context given the environment
pub async fn setup_context() -> ClasswatchContext {
    // Single-credential deployments can hand the login pair in through the
    // environment; anything richer implements `ICredentialSource` and wires
    // the context itself.
    let credentials = StaticCredentialSource::new();
    if let (Ok(login), Ok(password)) = (
        std::env::var("UPSTREAM_LOGIN"),
        std::env::var("UPSTREAM_PASSWORD"),
    ) {
        credentials.insert(&login, &password);
    }
    ClasswatchContext::create(ContextParams {
        postgres_connection_string: get_psql_connection_string(),
        credentials: Arc::new(credentials),
    })
    .await
}

fn get_psql_connection_string() -> String {
    const PSQL_CONNECTION_STRING: &str = "DATABASE_URL";

    std::env::var(PSQL_CONNECTION_STRING)
        .unwrap_or_else(|_| panic!("{} env var to be present.", PSQL_CONNECTION_STRING))
}

pub async fn run_migration() -> Result<(), MigrateError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&get_psql_connection_string())
        .await
        .expect("TO CONNECT TO POSTGRES");

    sqlx::migrate!().run(&pool).await
}
