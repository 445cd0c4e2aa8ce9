use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use psy_core::errors::ErrorInfo;
use psy_core::PsyError;

use crate::model::Psychometric;
use crate::posterior::PosteriorStore;
use crate::selector::{DesignSelector, Selection};

/// Owned copy of everything a design selection reads.
///
/// The task shares nothing mutable with the engine that created it.
#[derive(Debug)]
pub struct SelectionTask {
    posterior: PosteriorStore,
    selector: DesignSelector,
    model: Arc<dyn Psychometric>,
}

impl SelectionTask {
    /// Bundles a posterior snapshot with the selector and model.
    pub fn new(
        posterior: PosteriorStore,
        selector: DesignSelector,
        model: Arc<dyn Psychometric>,
    ) -> Self {
        Self {
            posterior,
            selector,
            model,
        }
    }

    /// Runs the selection on the calling thread.
    pub fn run(&self) -> Result<Selection, PsyError> {
        self.selector.select(&self.posterior, self.model.as_ref())
    }

    /// Runs the selection on a dedicated worker thread.
    ///
    /// `trial_index` is the history length the snapshot was taken at.
    pub fn spawn(self, trial_index: usize) -> PendingSelection {
        let ready = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ready);
        let handle = thread::Builder::new()
            .name("psy-select".into())
            .spawn(move || {
                let result = self.run();
                flag.store(true, Ordering::Release);
                result
            });
        let outcome = match handle {
            Ok(handle) => Worker::Running(handle),
            Err(err) => Worker::Failed(PsyError::Selector(
                ErrorInfo::new("worker-spawn", err.to_string()),
            )),
        };
        PendingSelection {
            trial_index,
            ready,
            worker: outcome,
        }
    }
}

#[derive(Debug)]
enum Worker {
    Running(JoinHandle<Result<Selection, PsyError>>),
    Failed(PsyError),
}

/// Handle to a selection running in the background.
///
/// Dropping it detaches the worker and discards its result.
#[derive(Debug)]
pub struct PendingSelection {
    trial_index: usize,
    ready: Arc<AtomicBool>,
    worker: Worker,
}

impl PendingSelection {
    /// History length at the time the snapshot was taken.
    pub fn trial_index(&self) -> usize {
        self.trial_index
    }

    /// Whether the worker has produced its result.
    pub fn is_ready(&self) -> bool {
        match self.worker {
            Worker::Running(_) => self.ready.load(Ordering::Acquire),
            Worker::Failed(_) => true,
        }
    }

    /// Blocks until the worker finishes. A panicked worker is reported as a selector error.
    pub fn join(self) -> Result<Selection, PsyError> {
        match self.worker {
            Worker::Running(handle) => handle.join().unwrap_or_else(|_| {
                Err(PsyError::Selector(ErrorInfo::new(
                    "worker-panicked",
                    "background selection thread panicked",
                )))
            }),
            Worker::Failed(err) => Err(err),
        }
    }
}
