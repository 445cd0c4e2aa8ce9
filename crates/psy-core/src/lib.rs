#![deny(missing_docs)]
#![doc = "Core traits and data types shared by adaptive psychophysics procedures."]

pub mod errors;
pub mod provenance;
pub mod rng;
pub mod trial;

pub use errors::{ErrorInfo, PsyError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use trial::{TrialHistory, TrialRecord};

/// Contract shared by every adaptive threshold procedure.
///
/// Callers drive a session one trial at a time: ask for the next stimulus,
/// present it, then report the response. Implementations must never fail
/// mid-session; degraded behaviour is preferred over aborting.
pub trait AdaptiveProcedure: Send {
    /// Chooses the stimulus for the next trial.
    fn next_stimulus(&mut self) -> f64;

    /// Records the response observed for `stimulus`.
    fn record_response(&mut self, stimulus: f64, response: bool);

    /// Chronological log of the trials seen so far.
    fn history(&self) -> &TrialHistory;

    /// Current point estimate of the threshold.
    fn threshold_estimate(&self) -> f64;

    /// Whether the procedure considers its estimate converged.
    fn is_converged(&self) -> bool;
}
