//! Per-stage bookkeeping and the join barrier for stage tasks.

use crate::link::Halt;
use movierec_core::{RecError, RecResult};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// What a stage did before it terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub received: usize,
    pub emitted: usize,
    /// The stage was stopped by cancellation rather than running out of input.
    pub cancelled: bool,
}

impl StageReport {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            received: 0,
            emitted: 0,
            cancelled: false,
        }
    }

    /// Record why the stage's loop ended.
    pub(crate) fn halt(&mut self, halt: Halt) {
        if halt == Halt::Cancelled {
            self.cancelled = true;
        }
    }

    pub(crate) fn finish(self) -> Self {
        debug!(
            stage = %self.stage,
            received = self.received,
            emitted = self.emitted,
            cancelled = self.cancelled,
            "Stage finished"
        );
        self
    }
}

/// Handles of every spawned stage in one run.
#[derive(Default)]
pub struct StageSet {
    handles: Vec<JoinHandle<StageReport>>,
}

impl StageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: JoinHandle<StageReport>) {
        self.handles.push(handle);
    }

    /// Wait for every stage. All handles are awaited even if one failed, so no
    /// task outlives the call; the first failure is returned.
    pub async fn join_all(self) -> RecResult<Vec<StageReport>> {
        let mut reports = Vec::with_capacity(self.handles.len());
        let mut first_error = None;

        for handle in self.handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(error = %e, "Pipeline stage task failed");
                    first_error.get_or_insert(RecError::Stage(e.to_string()));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }
}
