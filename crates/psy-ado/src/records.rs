use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use psy_core::errors::ErrorInfo;
use psy_core::PsyError;
use serde::{Deserialize, Serialize};

const FIXED_COLUMNS: [&str; 4] = ["trial_index", "stimulus", "response", "reaction_time"];

/// One exported trial: what was shown, what came back, and the estimates afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRow {
    /// Zero-based trial position in the session.
    pub trial_index: usize,
    /// Presented stimulus.
    pub stimulus: f64,
    /// Observed binary response.
    pub response: bool,
    /// Response latency, when measured.
    pub reaction_time: Option<f64>,
    /// Procedure estimates after the update.
    pub estimates: BTreeMap<String, f64>,
    /// Convergence flag after the update.
    pub converged: bool,
}

/// Column names for `rows`: fixed trial columns, every estimate key, then `converged`.
pub fn csv_header(rows: &[TrialRow]) -> Vec<String> {
    let keys: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.estimates.keys().map(String::as_str))
        .collect();
    FIXED_COLUMNS
        .iter()
        .copied()
        .chain(keys)
        .chain(std::iter::once("converged"))
        .map(str::to_string)
        .collect()
}

/// Writes `rows` as CSV. Estimates missing from a row are left empty.
pub fn write_rows_csv(path: &Path, rows: &[TrialRow]) -> Result<(), PsyError> {
    let mut writer = csv::Writer::from_path(path).map_err(|err| wrap_csv("rows-open", path, err))?;
    let header = csv_header(rows);
    writer
        .write_record(&header)
        .map_err(|err| wrap_csv("rows-write", path, err))?;
    let estimate_keys = &header[FIXED_COLUMNS.len()..header.len() - 1];
    for row in rows {
        let mut record = vec![
            row.trial_index.to_string(),
            row.stimulus.to_string(),
            u8::from(row.response).to_string(),
            row.reaction_time.map(|rt| rt.to_string()).unwrap_or_default(),
        ];
        record.extend(estimate_keys.iter().map(|key| {
            row.estimates
                .get(key)
                .map(|value| value.to_string())
                .unwrap_or_default()
        }));
        record.push(row.converged.to_string());
        writer
            .write_record(&record)
            .map_err(|err| wrap_csv("rows-write", path, err))?;
    }
    writer.flush().map_err(|err| {
        PsyError::Serde(
            ErrorInfo::new("rows-flush", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}

fn wrap_csv(code: &str, path: &Path, err: csv::Error) -> PsyError {
    PsyError::Serde(
        ErrorInfo::new(code, "trial row export failed")
            .with_context("path", path.display().to_string())
            .with_hint(err.to_string()),
    )
}
