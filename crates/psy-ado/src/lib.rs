#![deny(missing_docs)]

//! Grid-based adaptive design optimization for psychometric threshold estimation.
//!
//! The [`Engine`] keeps a posterior over psychometric-function parameters on
//! a discretized grid, picks each stimulus by maximal expected information
//! gain, and folds binary responses back into the posterior. A heuristic
//! staircase, a session runner with simulated observers, CSV trial export and
//! JSON snapshots round out the experiment loop.

/// YAML configuration schema and defaults.
pub mod config;
/// Convergence criteria, latch and summaries.
pub mod convergence;
/// Deterministic seed derivation for every random stream.
pub mod determinism;
/// Engine facade combining posterior, selector and convergence.
pub mod engine;
/// Parameter axes and broadcast meshes.
pub mod grid;
/// Psychometric functions.
pub mod model;
/// Background design selection on a worker thread.
pub mod prefetch;
/// Posterior probability mass over the grid.
pub mod posterior;
/// Per-axis prior densities.
pub mod prior;
/// Runtime dispatch between estimators.
pub mod procedure;
/// Trial row export.
pub mod records;
/// Mutual-information design selection.
pub mod selector;
/// Experiment loop and simulated observers.
pub mod session;
/// Session snapshots and replay.
pub mod snapshot;
/// Rolling-accuracy staircase.
pub mod staircase;

pub use config::{
    AxisSpec, EngineConfig, ExperimentConfig, ObserverConfig, ProcedureConfig, SeedPolicy,
    StaircaseConfig,
};
pub use convergence::{ConvergenceCriteria, ConvergenceMonitor, ConvergenceState, Summary};
pub use engine::Engine;
pub use grid::{ParameterAxis, ParameterGrid};
pub use model::{Psychometric, PsychometricModel, EPSILON};
pub use posterior::{CredibleInterval, ParameterEstimate, PosteriorStore, UpdateOutcome};
pub use prefetch::{PendingSelection, SelectionTask};
pub use prior::Prior;
pub use procedure::{Procedure, ProcedureKind, ProcedureReport};
pub use records::{write_rows_csv, TrialRow};
pub use selector::{argmax_first, DesignSelector, DesignSpace, DesignSpec, Selection};
pub use session::{run_session, Observation, Observer, SessionPolicy, SessionReport, SimulatedObserver};
pub use snapshot::SessionSnapshot;
pub use staircase::HeuristicStaircase;
