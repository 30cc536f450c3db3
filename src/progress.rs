use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    StepID,
    error::Result,
    workflow::{StatusMessage, StatusSender},
};
use log::{info, warn};

/// Reports messages and progress of a single step to the caller, or to the log
/// when no status channel is attached.
pub struct ProgressReporter {
    tx: Option<StatusSender>,
    step_id: StepID,
    state: Mutex<ProgressState>,
}

struct ProgressState {
    total_work: Option<usize>,
    finished_work: usize,
}

impl ProgressReporter {
    pub fn new(tx: Option<StatusSender>, step_id: StepID, total_work: usize) -> Result<Self> {
        let reporter = Self {
            tx,
            step_id,
            state: Mutex::new(ProgressState {
                total_work: Some(total_work),
                finished_work: 0,
            }),
        };
        reporter.report_progress()?;
        Ok(reporter)
    }

    pub fn new_unknown_total_work(tx: Option<StatusSender>, step_id: StepID) -> Result<Self> {
        let reporter = Self {
            tx,
            step_id,
            state: Mutex::new(ProgressState {
                total_work: None,
                finished_work: 0,
            }),
        };
        reporter.report_progress()?;
        Ok(reporter)
    }

    pub fn info(&self, msg: &str) -> Result<()> {
        if let Some(ref tx) = self.tx {
            tx.send(StatusMessage::Info(msg.to_string()))?;
        } else {
            info!("{msg}");
        }
        Ok(())
    }

    pub fn warn(&self, msg: &str) -> Result<()> {
        if let Some(ref tx) = self.tx {
            tx.send(StatusMessage::Warning(msg.to_string()))?;
        } else {
            warn!("{msg}");
        }
        Ok(())
    }

    /// Mark some of the total work as finished.
    pub fn worked(&self, items: usize) -> Result<()> {
        {
            let mut state = self.state();
            state.finished_work += items;
            if let Some(total_work) = state.total_work {
                state.finished_work = state.finished_work.min(total_work);
            }
        }
        self.report_progress()
    }

    /// The counters stay valid even if another thread panicked while holding them.
    fn state(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report_progress(&self) -> Result<()> {
        if let Some(ref tx) = self.tx {
            let (total_work, finished_work) = {
                let state = self.state();
                (state.total_work, state.finished_work)
            };
            tx.send(StatusMessage::Progress {
                id: self.step_id.clone(),
                total_work,
                finished_work,
            })?;
        }
        Ok(())
    }
}
