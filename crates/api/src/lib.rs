mod catalog;
mod error;
mod job_schedulers;
mod ledger;
mod monitor;
mod shared;
mod status;

pub use error::ClasswatchError;
pub use monitor::{CycleCoordinator, CycleSummary};

use actix_cors::Cors;
use actix_web::{dev::Server, middleware, web, App, HttpServer};
use classwatch_infra::ClasswatchContext;
use job_schedulers::{start_catalog_refresh_job, start_ledger_cleanup_job, start_poll_job};
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

pub fn configure_server_api(cfg: &mut web::ServiceConfig) {
    catalog::configure_routes(cfg);
    ledger::configure_routes(cfg);
    monitor::configure_routes(cfg);
    status::configure_routes(cfg);
}

pub struct Application {
    server: Server,
    port: u16,
    coordinator: Arc<CycleCoordinator>,
}

impl Application {
    pub async fn new(context: ClasswatchContext) -> Result<Self, std::io::Error> {
        let coordinator = Arc::new(CycleCoordinator::new());
        let (server, port) =
            Application::configure_server(context.clone(), coordinator.clone()).await?;

        Application::start_job_schedulers(context, coordinator.clone());

        Ok(Self {
            server,
            port,
            coordinator,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn start_job_schedulers(context: ClasswatchContext, coordinator: Arc<CycleCoordinator>) {
        start_poll_job(context.clone(), coordinator);
        start_catalog_refresh_job(context.clone());
        start_ledger_cleanup_job(context);
    }

    async fn configure_server(
        context: ClasswatchContext,
        coordinator: Arc<CycleCoordinator>,
    ) -> Result<(Server, u16), std::io::Error> {
        let port = context.config.port;
        let address = format!("0.0.0.0:{}", port);
        let listener = TcpListener::bind(&address)?;
        let port = listener.local_addr()?.port();

        let server = HttpServer::new(move || {
            let ctx = context.clone();
            let coordinator = coordinator.clone();

            App::new()
                .wrap(Cors::permissive())
                .wrap(middleware::Compress::default())
                .wrap(TracingLogger::default())
                .data(ctx)
                .app_data(web::Data::from(coordinator))
                .service(web::scope("/api/v1").configure(configure_server_api))
        })
        .listen(listener)?
        .workers(4)
        .run();

        Ok((server, port))
    }

    pub async fn start(self) -> std::io::Result<()> {
        let res = self.server.await;
        // The server has been told to stop; give any in-flight cycle its
        // cancellation point before the process exits
        self.coordinator.shutdown();
        res
    }
}
