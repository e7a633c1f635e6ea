mod check_user;
mod coordinator;
mod ledger_gc;
mod poll_cycle;
mod refresh_catalog;
mod render;

pub use coordinator::{CycleCoordinator, CycleRunError};
pub use ledger_gc::CleanupLedgerUseCase;
pub use poll_cycle::{CycleSummary, PollCycleUseCase};
pub use refresh_catalog::RefreshCatalogUseCase;

use crate::error::ClasswatchError;
use actix_web::{web, HttpResponse};
use classwatch_infra::ClasswatchContext;

/// "Run one cycle now", the single entry point offered to external
/// schedulers. Responds 409 when a cycle already holds the lock; the trigger
/// is dropped, never queued.
async fn trigger_cycle_controller(
    ctx: web::Data<ClasswatchContext>,
    coordinator: web::Data<CycleCoordinator>,
) -> Result<HttpResponse, ClasswatchError> {
    match coordinator.run_cycle(&ctx).await {
        Ok(summary) => Ok(HttpResponse::Ok().json(summary)),
        Err(CycleRunError::Skipped) => Err(ClasswatchError::Conflict(
            "A poll cycle is already running".into(),
        )),
        Err(CycleRunError::Storage) => Err(ClasswatchError::InternalError),
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/cycle/trigger", web::post().to(trigger_cycle_controller));
}
