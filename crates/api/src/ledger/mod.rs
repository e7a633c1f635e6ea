mod clear_ledger;

use crate::error::ClasswatchError;
use crate::shared::usecase::execute;
use actix_web::{web, HttpResponse};
use classwatch_domain::ID;
use classwatch_infra::ClasswatchContext;
use clear_ledger::ClearLedgerUseCase;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct EntryPathParams {
    user_id: ID,
    instance_key: String,
}

#[derive(Debug, Deserialize)]
struct UserPathParams {
    user_id: ID,
}

#[derive(Debug, Serialize)]
struct APIResponse {
    cleared: usize,
}

/// Escape hatch for the external command surface: forget one notified pair
/// so that instance may notify again
async fn clear_ledger_entry_controller(
    path_params: web::Path<EntryPathParams>,
    ctx: web::Data<ClasswatchContext>,
) -> Result<HttpResponse, ClasswatchError> {
    let usecase = ClearLedgerUseCase {
        user_id: path_params.user_id.clone(),
        instance_key: Some(path_params.instance_key.clone()),
    };

    execute(usecase, &ctx)
        .await
        .map(|cleared| HttpResponse::Ok().json(APIResponse { cleared }))
        .map_err(ClasswatchError::from)
}

/// Full reset of a user's ledger, e.g. on logout
async fn reset_ledger_controller(
    path_params: web::Path<UserPathParams>,
    ctx: web::Data<ClasswatchContext>,
) -> Result<HttpResponse, ClasswatchError> {
    let usecase = ClearLedgerUseCase {
        user_id: path_params.user_id.clone(),
        instance_key: None,
    };

    execute(usecase, &ctx)
        .await
        .map(|cleared| HttpResponse::Ok().json(APIResponse { cleared }))
        .map_err(ClasswatchError::from)
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/users/{user_id}/ledger/{instance_key}",
        web::delete().to(clear_ledger_entry_controller),
    );
    cfg.route(
        "/users/{user_id}/ledger",
        web::delete().to(reset_ledger_controller),
    );
}
