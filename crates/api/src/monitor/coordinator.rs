use super::poll_cycle::{CycleSummary, PollCycleUseCase};
use crate::shared::stop_signal::StopSignal;
use crate::shared::usecase::execute;
use classwatch_infra::ClasswatchContext;
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, PartialEq)]
pub enum CycleRunError {
    /// Another cycle holds the lock. The trigger is dropped, never queued.
    Skipped,
    /// The cycle could not start because the user set was unreadable
    Storage,
}

/// Owns the single in-process cycle lock. Every trigger, whether from the
/// scheduler job or the HTTP surface, goes through `run_cycle`: a trigger
/// arriving while a cycle runs is dropped with a logged skip, so cycles
/// never overlap. The lock guard is released on all exit paths, including
/// panics, because release is its destructor.
pub struct CycleCoordinator {
    cycle_lock: tokio::sync::Mutex<()>,
    last_summary: Mutex<Option<CycleSummary>>,
    stop: StopSignal,
}

impl CycleCoordinator {
    pub fn new() -> Self {
        Self {
            cycle_lock: tokio::sync::Mutex::new(()),
            last_summary: Mutex::new(None),
            stop: StopSignal::new(),
        }
    }

    pub async fn run_cycle(&self, ctx: &ClasswatchContext) -> Result<CycleSummary, CycleRunError> {
        let _guard = match self.cycle_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!("Cycle trigger arrived while a cycle is running, dropping it");
                return Err(CycleRunError::Skipped);
            }
        };
        let summary = execute(
            PollCycleUseCase {
                stop: self.stop.clone(),
            },
            ctx,
        )
        .await
        .map_err(|_| CycleRunError::Storage)?;
        *self.last_summary.lock().unwrap() = Some(summary.clone());
        Ok(summary)
    }

    /// Summary of the most recently completed cycle, for the status surface
    pub fn last_summary(&self) -> Option<CycleSummary> {
        self.last_summary.lock().unwrap().clone()
    }

    /// Ask a running cycle to stop at its next cancellation point. An
    /// obligation that has been dispatched still completes its commit.
    pub fn shutdown(&self) {
        self.stop.cancel();
    }
}

impl Default for CycleCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
