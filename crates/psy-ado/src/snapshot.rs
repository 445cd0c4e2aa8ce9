use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use psy_core::errors::ErrorInfo;
use psy_core::{PsyError, RunProvenance, SchemaVersion, TrialHistory};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ExperimentConfig;
use crate::procedure::Procedure;

/// Schema written into every snapshot.
pub const SNAPSHOT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Everything needed to rebuild a session: config, seed and the trials so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Schema of this payload.
    pub schema_version: SchemaVersion,
    /// Who and when.
    pub provenance: RunProvenance,
    /// Configuration the session was started with.
    pub config: ExperimentConfig,
    /// Master seed of the procedure.
    pub seed: u64,
    /// Trials recorded so far.
    pub history: TrialHistory,
}

impl SessionSnapshot {
    /// Captures the current state of a session.
    pub fn capture(config: &ExperimentConfig, seed: u64, history: &TrialHistory) -> Self {
        let mut tool_versions = BTreeMap::new();
        tool_versions.insert(
            env!("CARGO_PKG_NAME").to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        Self {
            schema_version: SNAPSHOT_SCHEMA,
            provenance: RunProvenance {
                session_label: config.seed_policy.label.clone(),
                seed,
                created_at: Utc::now().to_rfc3339(),
                tool_versions,
            },
            config: config.clone(),
            seed,
            history: history.clone(),
        }
    }

    /// Rebuilds the procedure and replays the recorded trials.
    pub fn restore(&self) -> Result<Procedure, PsyError> {
        let mut procedure = Procedure::from_config(&self.config.procedure, self.seed)?;
        procedure.replay(&self.history);
        info!(
            trials = self.history.len(),
            kind = ?procedure.kind(),
            "session restored from snapshot"
        );
        Ok(procedure)
    }

    /// Reads a snapshot and checks its schema.
    pub fn load(path: &Path) -> Result<Self, PsyError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            PsyError::Serde(
                ErrorInfo::new("snapshot-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let snapshot: Self = serde_json::from_str(&contents).map_err(|err| {
            PsyError::Serde(
                ErrorInfo::new("snapshot-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        if !SNAPSHOT_SCHEMA.is_compatible_with(&snapshot.schema_version) {
            return Err(PsyError::Serde(
                ErrorInfo::new("snapshot-schema", "snapshot schema is not supported")
                    .with_context("expected_major", SNAPSHOT_SCHEMA.major.to_string())
                    .with_context("found_major", snapshot.schema_version.major.to_string()),
            ));
        }
        Ok(snapshot)
    }

    /// Writes the snapshot as pretty JSON, creating parent directories.
    pub fn store(&self, path: &Path) -> Result<(), PsyError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                PsyError::Serde(
                    ErrorInfo::new("snapshot-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            PsyError::Serde(
                ErrorInfo::new("snapshot-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            PsyError::Serde(
                ErrorInfo::new("snapshot-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}
