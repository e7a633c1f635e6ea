use crate::monitor::{CycleCoordinator, CycleSummary};
use actix_web::{web, HttpResponse};
use classwatch_domain::CatalogDimension;
use classwatch_infra::ClasswatchContext;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize)]
struct APIResponse {
    message: String,
    /// Summary of the most recently completed poll cycle, if any
    last_cycle: Option<CycleSummary>,
    /// When each catalog dimension was last successfully refreshed, the
    /// externally observable staleness bound
    catalog_refreshed_at: HashMap<String, i64>,
}

async fn status(
    ctx: web::Data<ClasswatchContext>,
    coordinator: web::Data<CycleCoordinator>,
) -> HttpResponse {
    let mut catalog_refreshed_at = HashMap::new();
    for dimension in &CatalogDimension::ALL {
        if let Some(snapshot) = ctx.repos.catalog.find(*dimension).await {
            catalog_refreshed_at.insert(dimension.to_string(), snapshot.refreshed_at);
        }
    }

    HttpResponse::Ok().json(APIResponse {
        message: "Yo! We are up!\r\n".into(),
        last_cycle: coordinator.last_summary(),
        catalog_refreshed_at,
    })
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(status));
}
