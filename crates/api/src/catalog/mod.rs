use crate::error::ClasswatchError;
use actix_web::{web, HttpResponse};
use classwatch_domain::CatalogDimension;
use classwatch_infra::ClasswatchContext;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PathParams {
    dimension: String,
}

/// Serve the cached value of one filter dimension, for the external filter
/// editor to render choices from. Always the last successful refresh;
/// `refreshed_at` tells the caller how stale it is.
async fn get_catalog_controller(
    path_params: web::Path<PathParams>,
    ctx: web::Data<ClasswatchContext>,
) -> Result<HttpResponse, ClasswatchError> {
    let dimension = path_params
        .dimension
        .parse::<CatalogDimension>()
        .map_err(|e| ClasswatchError::BadClientData(e.to_string()))?;

    match ctx.repos.catalog.find(dimension).await {
        Some(snapshot) => Ok(HttpResponse::Ok().json(snapshot)),
        None => Err(ClasswatchError::NotFound(format!(
            "The catalog dimension: {}, has not been refreshed yet.",
            dimension
        ))),
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/catalog/{dimension}", web::get().to(get_catalog_controller));
}
