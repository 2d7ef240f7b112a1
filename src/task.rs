//! Background analysis task handle.
//!
//! An [`AnalysisTask`] runs a blocking analysis job on tokio's blocking pool
//! and owns its result cell. The cell moves from [`TaskStatus::Pending`] to
//! `Succeeded` or `Failed` exactly once and can then be read any number of
//! times. A panic inside the job is caught and reported as `Failed`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tracing::{error, info};

use crate::models::AnswerRecord;

/// State of an analysis task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Succeeded(Vec<AnswerRecord>),
    Failed(String),
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

/// Handle to a running (or finished) analysis.
#[derive(Clone)]
pub struct AnalysisTask {
    result: Arc<OnceLock<TaskStatus>>,
    done: watch::Receiver<bool>,
}

impl AnalysisTask {
    /// Start `job` on the blocking pool. Must be called from within a tokio
    /// runtime.
    pub fn spawn<F>(job: F) -> Self
    where
        F: FnOnce() -> Vec<AnswerRecord> + Send + 'static,
    {
        let result = Arc::new(OnceLock::new());
        let (tx, done) = watch::channel(false);
        let slot = Arc::clone(&result);

        tokio::task::spawn_blocking(move || {
            let status = match catch_unwind(AssertUnwindSafe(job)) {
                Ok(records) => {
                    info!(records = records.len(), "Analysis finished");
                    TaskStatus::Succeeded(records)
                }
                Err(panic_info) => {
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        (*s).to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "unknown panic".to_string()
                    };
                    error!(panic = %panic_msg, "Analysis panicked");
                    TaskStatus::Failed(panic_msg)
                }
            };
            let _ = slot.set(status);
            let _ = tx.send(true);
        });

        Self { result, done }
    }

    /// Current state, without waiting.
    pub fn status(&self) -> TaskStatus {
        self.result.get().cloned().unwrap_or(TaskStatus::Pending)
    }

    /// Wait for the job to finish and return its final state.
    pub async fn wait(&self) -> TaskStatus {
        let mut done = self.done.clone();
        // A dropped sender means the job never reported; status() then
        // still reads Pending.
        let _ = done.wait_for(|finished| *finished).await;
        self.status()
    }
}
